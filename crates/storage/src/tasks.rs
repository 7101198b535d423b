// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task repository, including dependency edges and `#N` reference
//! resolution within a project.

use gobby_core::{
    classify_ref, DepType, Error, ProjectId, RefForm, Result, SessionId, Task, TaskDependency,
    TaskId, TaskPriority, TaskStatus,
};
use rusqlite::{params, Connection, OptionalExtension};

use crate::listeners::TableOp;
use crate::sessions::next_ordinal;
use crate::store::{map_write_err, Store, WriteTx};

fn status_to_str(s: TaskStatus) -> &'static str {
    match s {
        TaskStatus::Open => "open",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::NeedsReview => "needs_review",
        TaskStatus::Closed => "closed",
    }
}

fn status_from_str(s: &str) -> Result<TaskStatus> {
    Ok(match s {
        "open" => TaskStatus::Open,
        "in_progress" => TaskStatus::InProgress,
        "needs_review" => TaskStatus::NeedsReview,
        "closed" => TaskStatus::Closed,
        other => return Err(Error::internal(format!("unknown task status {other}"))),
    })
}

fn priority_to_str(p: TaskPriority) -> &'static str {
    match p {
        TaskPriority::Low => "low",
        TaskPriority::Medium => "medium",
        TaskPriority::High => "high",
        TaskPriority::Urgent => "urgent",
    }
}

fn priority_from_str(s: &str) -> Result<TaskPriority> {
    Ok(match s {
        "low" => TaskPriority::Low,
        "medium" => TaskPriority::Medium,
        "high" => TaskPriority::High,
        "urgent" => TaskPriority::Urgent,
        other => return Err(Error::internal(format!("unknown task priority {other}"))),
    })
}

const SELECT_COLUMNS: &str = "id, ordinal, project_id, title, description, status, task_type, priority, \
     parent_task_id, assignee, labels, test_strategy, created_at_ms, updated_at_ms";

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Result<Task>> {
    let status = match status_from_str(&row.get::<_, String>(5)?) {
        Ok(s) => s,
        Err(e) => return Ok(Err(e)),
    };
    let priority = match priority_from_str(&row.get::<_, String>(7)?) {
        Ok(p) => p,
        Err(e) => return Ok(Err(e)),
    };
    let labels_json: String = row.get(10)?;
    Ok(Ok(Task {
        id: TaskId::new(row.get::<_, String>(0)?),
        project_id: ProjectId::new(row.get::<_, String>(2)?),
        title: row.get(3)?,
        description: row.get(4)?,
        status,
        task_type: row.get(6)?,
        priority,
        parent_task_id: row.get::<_, Option<String>>(8)?.map(TaskId::new),
        assignee: row.get::<_, Option<String>>(9)?.map(SessionId::new),
        labels: serde_json::from_str(&labels_json).unwrap_or_default(),
        test_strategy: row.get(11)?,
        created_at_ms: row.get::<_, i64>(12)? as u64,
        updated_at_ms: row.get::<_, i64>(13)? as u64,
    }))
}

impl Store {
    pub fn insert_task(&self, tx: &mut WriteTx, task: &Task) -> Result<()> {
        let ordinal = next_ordinal(tx.conn(), "tasks", Some(&task.project_id))?;
        let labels_json = serde_json::to_string(&task.labels)?;
        tx.conn()
            .execute(
                &format!(
                    "INSERT INTO tasks ({SELECT_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)"
                ),
                params![
                    task.id.as_str(),
                    ordinal,
                    task.project_id.as_str(),
                    task.title,
                    task.description,
                    status_to_str(task.status),
                    task.task_type,
                    priority_to_str(task.priority),
                    task.parent_task_id.as_ref().map(|t| t.as_str()),
                    task.assignee.as_ref().map(|s| s.as_str()),
                    labels_json,
                    task.test_strategy,
                    task.created_at_ms as i64,
                    task.updated_at_ms as i64,
                ],
            )
            .map_err(|e| map_write_err(e, "insert task"))?;
        tx.notify(TableOp::Insert { table: "tasks".into(), id: task.id.to_string() });
        Ok(())
    }

    pub fn update_task_status(&self, tx: &mut WriteTx, id: &TaskId, next: TaskStatus, now_ms: u64) -> Result<()> {
        let subtasks = self.list_subtasks_conn(tx.conn(), id)?;
        if next == TaskStatus::Closed {
            let current = get_task_by_id(tx.conn(), id.as_str())?;
            if !current.is_closeable_given(&subtasks) {
                return Err(Error::invalid_state(format!("task {id} has open subtasks")));
            }
        }
        tx.conn()
            .execute(
                "UPDATE tasks SET status = ?1, updated_at_ms = ?2 WHERE id = ?3",
                params![status_to_str(next), now_ms as i64, id.as_str()],
            )
            .map_err(|e| map_write_err(e, "update task status"))?;
        tx.notify(TableOp::Update { table: "tasks".into(), id: id.to_string() });
        Ok(())
    }

    pub fn add_task_dependency(&self, tx: &mut WriteTx, dep: &TaskDependency) -> Result<()> {
        tx.conn()
            .execute(
                "INSERT INTO task_dependencies (task_id, depends_on, dep_type) VALUES (?1, ?2, ?3)",
                params![dep.task_id.as_str(), dep.depends_on.as_str(), "blocks"],
            )
            .map_err(|e| map_write_err(e, "add task dependency"))?;
        tx.notify(TableOp::Insert { table: "task_dependencies".into(), id: dep.task_id.to_string() });
        Ok(())
    }

    pub fn get_task(&self, id: &TaskId) -> Result<Task> {
        self.read(|conn| get_task_by_id(conn, id.as_str()))
    }

    pub fn list_subtasks(&self, parent: &TaskId) -> Result<Vec<Task>> {
        self.read(|conn| self.list_subtasks_conn(conn, parent))
    }

    fn list_subtasks_conn(&self, conn: &Connection, parent: &TaskId) -> Result<Vec<Task>> {
        let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE parent_task_id = ?1"))?;
        let rows = stmt.query_map(params![parent.as_str()], row_to_task)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row??);
        }
        Ok(tasks)
    }

    pub fn list_dependencies(&self, task: &TaskId) -> Result<Vec<TaskDependency>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT task_id, depends_on, dep_type FROM task_dependencies WHERE task_id = ?1",
            )?;
            let rows = stmt.query_map(params![task.as_str()], |row| {
                Ok(TaskDependency {
                    task_id: TaskId::new(row.get::<_, String>(0)?),
                    depends_on: TaskId::new(row.get::<_, String>(1)?),
                    dep_type: DepType::Blocks,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
        })
    }

    pub fn resolve_task_ref(&self, project_id: &ProjectId, raw: &str) -> Result<Task> {
        self.read(|conn| resolve_task_ref_conn(conn, project_id, raw))
    }

    /// Atomic claim (CORE §4.C7): sets assignee and moves `open` →
    /// `in_progress` in one update. Rejects a task already claimed by a
    /// different session unless `force=true`; re-claiming by the same
    /// session is an idempotent no-op success.
    pub fn claim_task(
        &self,
        tx: &mut WriteTx,
        id: &TaskId,
        session: &SessionId,
        force: bool,
        now_ms: u64,
    ) -> Result<()> {
        let current = get_task_by_id(tx.conn(), id.as_str())?;
        if current.assignee.as_ref() == Some(session) {
            return Ok(());
        }
        if let Some(holder) = &current.assignee {
            if !force {
                return Err(Error::conflict(format!("task {id} already claimed by {}", holder.as_str())));
            }
        }
        let affected = tx
            .conn()
            .execute(
                "UPDATE tasks SET assignee = ?1, status = ?2, updated_at_ms = ?3 WHERE id = ?4",
                params![session.as_str(), status_to_str(TaskStatus::InProgress), now_ms as i64, id.as_str()],
            )
            .map_err(|e| map_write_err(e, "claim task"))?;
        if affected == 0 {
            return Err(Error::not_found(format!("task {id}")));
        }
        tx.notify(TableOp::Update { table: "tasks".into(), id: id.to_string() });
        Ok(())
    }
}

fn get_task_by_id(conn: &Connection, id: &str) -> Result<Task> {
    conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE id = ?1"),
        params![id],
        row_to_task,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("task {id}")),
        other => other.into(),
    })?
}

fn resolve_task_ref_conn(conn: &Connection, project_id: &ProjectId, raw: &str) -> Result<Task> {
    let form = classify_ref(raw).ok_or_else(|| Error::validation(format!("not a valid task reference: {raw}")))?;
    match form {
        RefForm::Ordinal(n) | RefForm::Integer(n) => conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE project_id = ?1 AND ordinal = ?2"),
                params![project_id.as_str(), n as i64],
                row_to_task,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("task #{n}")),
                other => other.into(),
            })?,
        RefForm::Uuid(id) => get_task_by_id(conn, id),
        RefForm::UuidPrefix(prefix) => {
            let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE id LIKE ?1 || '%'"))?;
            let rows = stmt.query_map(params![prefix], row_to_task)?;
            let mut tasks = Vec::new();
            for row in rows {
                tasks.push(row??);
            }
            match tasks.len() {
                0 => Err(Error::not_found(format!("no task matches prefix {prefix}"))),
                1 => Ok(tasks.remove(0)),
                _ => Err(Error::conflict(format!(
                    "ambiguous prefix {prefix} matches: {}",
                    tasks.iter().map(|t| t.id.to_string()).collect::<Vec<_>>().join(", ")
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(store: &Store) -> ProjectId {
        let id = ProjectId::new("p1");
        store
            .write(|tx| {
                store.insert_project(
                    tx,
                    &gobby_core::Project {
                        id: id.clone(),
                        name: "demo".into(),
                        repo_path: "/r".into(),
                        upstream: vec![],
                        parent_project_path: None,
                        created_at_ms: 0,
                    },
                )
            })
            .unwrap();
        id
    }

    fn task(id: &str, project_id: &ProjectId, parent: Option<&str>) -> Task {
        Task {
            id: TaskId::new(id),
            project_id: project_id.clone(),
            title: "do it".into(),
            description: None,
            status: TaskStatus::Open,
            task_type: "feature".into(),
            priority: TaskPriority::Medium,
            parent_task_id: parent.map(TaskId::new),
            assignee: None,
            labels: vec![],
            test_strategy: None,
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }

    #[test]
    fn ordinals_increment_per_project() {
        let store = Store::open_in_memory().unwrap();
        let project_id = project(&store);
        let a = task("a", &project_id, None);
        let b = task("b", &project_id, None);
        store.write(|tx| store.insert_task(tx, &a)).unwrap();
        store.write(|tx| store.insert_task(tx, &b)).unwrap();

        assert_eq!(store.resolve_task_ref(&project_id, "#1").unwrap().id, a.id);
        assert_eq!(store.resolve_task_ref(&project_id, "#2").unwrap().id, b.id);
    }

    #[test]
    fn closing_with_open_subtask_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let project_id = project(&store);
        let parent = task("parent", &project_id, None);
        let child = task("child", &project_id, Some("parent"));
        store.write(|tx| store.insert_task(tx, &parent)).unwrap();
        store.write(|tx| store.insert_task(tx, &child)).unwrap();

        let err = store
            .write(|tx| store.update_task_status(tx, &parent.id, TaskStatus::Closed, 10))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_state");
    }

    #[test]
    fn closing_with_all_subtasks_closed_succeeds() {
        let store = Store::open_in_memory().unwrap();
        let project_id = project(&store);
        let parent = task("parent", &project_id, None);
        let child = task("child", &project_id, Some("parent"));
        store.write(|tx| store.insert_task(tx, &parent)).unwrap();
        store.write(|tx| store.insert_task(tx, &child)).unwrap();
        store.write(|tx| store.update_task_status(tx, &child.id, TaskStatus::Closed, 5)).unwrap();

        store.write(|tx| store.update_task_status(tx, &parent.id, TaskStatus::Closed, 10)).unwrap();
        assert_eq!(store.get_task(&parent.id).unwrap().status, TaskStatus::Closed);
    }

    #[test]
    fn claim_sets_assignee_and_moves_to_in_progress() {
        let store = Store::open_in_memory().unwrap();
        let project_id = project(&store);
        let t = task("a", &project_id, None);
        store.write(|tx| store.insert_task(tx, &t)).unwrap();
        store
            .write(|tx| store.claim_task(tx, &t.id, &SessionId::new("s1"), false, 10))
            .unwrap();

        let fetched = store.get_task(&t.id).unwrap();
        assert_eq!(fetched.assignee, Some(SessionId::new("s1")));
        assert_eq!(fetched.status, TaskStatus::InProgress);
    }

    #[test]
    fn claim_by_other_session_conflicts_without_force() {
        let store = Store::open_in_memory().unwrap();
        let project_id = project(&store);
        let t = task("a", &project_id, None);
        store.write(|tx| store.insert_task(tx, &t)).unwrap();
        store.write(|tx| store.claim_task(tx, &t.id, &SessionId::new("s1"), false, 10)).unwrap();

        let err = store
            .write(|tx| store.claim_task(tx, &t.id, &SessionId::new("s2"), false, 20))
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[test]
    fn claim_by_other_session_with_force_succeeds() {
        let store = Store::open_in_memory().unwrap();
        let project_id = project(&store);
        let t = task("a", &project_id, None);
        store.write(|tx| store.insert_task(tx, &t)).unwrap();
        store.write(|tx| store.claim_task(tx, &t.id, &SessionId::new("s1"), false, 10)).unwrap();
        store.write(|tx| store.claim_task(tx, &t.id, &SessionId::new("s2"), true, 20)).unwrap();

        assert_eq!(store.get_task(&t.id).unwrap().assignee, Some(SessionId::new("s2")));
    }

    #[test]
    fn reclaim_by_same_session_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let project_id = project(&store);
        let t = task("a", &project_id, None);
        store.write(|tx| store.insert_task(tx, &t)).unwrap();
        store.write(|tx| store.claim_task(tx, &t.id, &SessionId::new("s1"), false, 10)).unwrap();
        store.write(|tx| store.claim_task(tx, &t.id, &SessionId::new("s1"), false, 20)).unwrap();

        assert_eq!(store.get_task(&t.id).unwrap().assignee, Some(SessionId::new("s1")));
    }

    #[test]
    fn dependency_edges_round_trip() {
        let store = Store::open_in_memory().unwrap();
        let project_id = project(&store);
        let a = task("a", &project_id, None);
        let b = task("b", &project_id, None);
        store.write(|tx| store.insert_task(tx, &a)).unwrap();
        store.write(|tx| store.insert_task(tx, &b)).unwrap();
        store
            .write(|tx| {
                store.add_task_dependency(
                    tx,
                    &TaskDependency { task_id: b.id.clone(), depends_on: a.id.clone(), dep_type: DepType::Blocks },
                )
            })
            .unwrap();

        let deps = store.list_dependencies(&b.id).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].depends_on, a.id);
    }
}
