// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session repository, including the `#N` / integer / UUID / UUID-prefix
//! reference resolution rule shared across every MCP tool (CORE §3, §6).

use gobby_core::{classify_ref, Error, ProjectId, RefForm, Result, Session, SessionId, SessionKey, SessionStatus, Source};
use rusqlite::{params, Connection, OptionalExtension};

use crate::listeners::TableOp;
use crate::store::{map_write_err, Store, WriteTx};

fn source_to_str(source: &Source) -> String {
    source.to_string()
}

fn source_from_str(s: &str) -> Source {
    match s {
        "claude-code" => Source::ClaudeCode,
        "codex" => Source::Codex,
        "cursor" => Source::Cursor,
        "gemini" => Source::Gemini,
        other => Source::Other(other.to_string()),
    }
}

fn status_to_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Active => "active",
        SessionStatus::Paused => "paused",
        SessionStatus::HandoffReady => "handoff_ready",
        SessionStatus::Archived => "archived",
        SessionStatus::Expired => "expired",
    }
}

fn status_from_str(s: &str) -> Result<SessionStatus> {
    Ok(match s {
        "active" => SessionStatus::Active,
        "paused" => SessionStatus::Paused,
        "handoff_ready" => SessionStatus::HandoffReady,
        "archived" => SessionStatus::Archived,
        "expired" => SessionStatus::Expired,
        other => return Err(Error::internal(format!("unknown session status {other}"))),
    })
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Result<Session>> {
    let status_raw: String = row.get(9)?;
    let status = match status_from_str(&status_raw) {
        Ok(s) => s,
        Err(e) => return Ok(Err(e)),
    };
    Ok(Ok(Session {
        id: SessionId::new(row.get::<_, String>(0)?),
        external_id: row.get(2)?,
        machine_id: row.get(3)?,
        source: source_from_str(&row.get::<_, String>(4)?),
        project_id: row.get::<_, Option<String>>(5)?.map(ProjectId::new),
        parent_session_id: row.get::<_, Option<String>>(6)?.map(SessionId::new),
        agent_depth: row.get::<_, i64>(7)? as u32,
        spawned_by_agent_id: row.get(8)?,
        status,
        title: row.get(10)?,
        created_at_ms: row.get::<_, i64>(11)? as u64,
        updated_at_ms: row.get::<_, i64>(12)? as u64,
        cwd: std::path::PathBuf::from(row.get::<_, String>(13)?),
        git_branch: row.get(14)?,
        summary_markdown: row.get(15)?,
        compact_markdown: row.get(16)?,
    }))
}

const SELECT_COLUMNS: &str = "id, ordinal, external_id, machine_id, source, project_id, parent_session_id, \
     agent_depth, spawned_by_agent_id, status, title, created_at_ms, updated_at_ms, cwd, git_branch, \
     summary_markdown, compact_markdown";

impl Store {
    pub fn insert_session(&self, tx: &mut WriteTx, session: &Session) -> Result<()> {
        let ordinal = next_ordinal(tx.conn(), "sessions", session.project_id.as_ref())?;
        tx.conn()
            .execute(
                &format!("INSERT INTO sessions ({SELECT_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)"),
                params![
                    session.id.as_str(),
                    ordinal,
                    session.external_id,
                    session.machine_id,
                    source_to_str(&session.source),
                    session.project_id.as_ref().map(|p| p.as_str()),
                    session.parent_session_id.as_ref().map(|p| p.as_str()),
                    session.agent_depth,
                    session.spawned_by_agent_id,
                    status_to_str(session.status),
                    session.title,
                    session.created_at_ms as i64,
                    session.updated_at_ms as i64,
                    session.cwd.to_string_lossy(),
                    session.git_branch,
                    session.summary_markdown,
                    session.compact_markdown,
                ],
            )
            .map_err(|e| map_write_err(e, "insert session"))?;
        tx.notify(TableOp::Insert { table: "sessions".into(), id: session.id.to_string() });
        Ok(())
    }

    pub fn update_session_status(
        &self,
        tx: &mut WriteTx,
        id: &SessionId,
        next: SessionStatus,
        now_ms: u64,
    ) -> Result<()> {
        let current = get_session_by_id(tx.conn(), id.as_str())?;
        if !current.status.can_transition_to(next) {
            return Err(Error::invalid_state(format!(
                "session {id} cannot move from {:?} to {next:?}",
                current.status
            )));
        }
        tx.conn()
            .execute(
                "UPDATE sessions SET status = ?1, updated_at_ms = ?2 WHERE id = ?3",
                params![status_to_str(next), now_ms as i64, id.as_str()],
            )
            .map_err(|e| map_write_err(e, "update session status"))?;
        tx.notify(TableOp::Update { table: "sessions".into(), id: id.to_string() });
        Ok(())
    }

    pub fn find_session_by_key(&self, key: &SessionKey) -> Result<Option<Session>> {
        self.read(|conn| {
            let result = conn
                .query_row(
                    &format!(
                        "SELECT {SELECT_COLUMNS} FROM sessions \
                         WHERE external_id = ?1 AND machine_id = ?2 AND source = ?3"
                    ),
                    params![key.external_id, key.machine_id, source_to_str(&key.source)],
                    row_to_session,
                )
                .optional()?;
            result.transpose()
        })
    }

    pub fn get_session(&self, id: &SessionId) -> Result<Session> {
        self.read(|conn| get_session_by_id(conn, id.as_str()))
    }

    /// Direct children of `parent`, for lineage checks in the messaging
    /// tools (`send_to_child`, `broadcast_to_children`).
    pub fn list_child_sessions(&self, parent: &SessionId) -> Result<Vec<Session>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM sessions WHERE parent_session_id = ?1"
            ))?;
            let rows = stmt.query_map(params![parent.as_str()], row_to_session)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row??);
            }
            Ok(sessions)
        })
    }

    /// Resolve a user-supplied reference (`#N`, bare integer, UUID, or
    /// unique UUID prefix) scoped to `project_id` to a single session.
    /// Ambiguous prefixes return a `Conflict` listing candidate ids.
    pub fn resolve_session_ref(&self, project_id: &ProjectId, raw: &str) -> Result<Session> {
        self.read(|conn| resolve_session_ref_conn(conn, project_id, raw))
    }
}

fn get_session_by_id(conn: &Connection, id: &str) -> Result<Session> {
    conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM sessions WHERE id = ?1"),
        params![id],
        row_to_session,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("session {id}")),
        other => other.into(),
    })?
}

pub(crate) fn next_ordinal(conn: &Connection, table: &str, project_id: Option<&ProjectId>) -> Result<i64> {
    let Some(project_id) = project_id else {
        return Ok(1);
    };
    let next: i64 = conn.query_row(
        &format!("SELECT COALESCE(MAX(ordinal), 0) + 1 FROM {table} WHERE project_id = ?1"),
        params![project_id.as_str()],
        |row| row.get(0),
    )?;
    Ok(next)
}

fn resolve_session_ref_conn(conn: &Connection, project_id: &ProjectId, raw: &str) -> Result<Session> {
    let form = classify_ref(raw).ok_or_else(|| Error::validation(format!("not a valid session reference: {raw}")))?;
    match form {
        RefForm::Ordinal(n) | RefForm::Integer(n) => conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM sessions WHERE project_id = ?1 AND ordinal = ?2"),
                params![project_id.as_str(), n as i64],
                row_to_session,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("session #{n}")),
                other => other.into(),
            })?,
        RefForm::Uuid(id) => get_session_by_id(conn, id),
        RefForm::UuidPrefix(prefix) => {
            let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM sessions WHERE id LIKE ?1 || '%'"))?;
            let rows = stmt
                .query_map(params![prefix], row_to_session)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let mut sessions = Vec::with_capacity(rows.len());
            for row in rows {
                sessions.push(row?);
            }
            match sessions.len() {
                0 => Err(Error::not_found(format!("no session matches prefix {prefix}"))),
                1 => Ok(sessions.remove(0)),
                _ => Err(Error::conflict(format!(
                    "ambiguous prefix {prefix} matches: {}",
                    sessions.iter().map(|s| s.id.to_string()).collect::<Vec<_>>().join(", ")
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn session(id: &str, project: Option<&str>) -> Session {
        Session {
            id: SessionId::new(id),
            external_id: format!("ext-{id}"),
            machine_id: "m1".into(),
            source: Source::ClaudeCode,
            project_id: project.map(ProjectId::new),
            parent_session_id: None,
            agent_depth: 0,
            spawned_by_agent_id: None,
            status: SessionStatus::Active,
            title: None,
            created_at_ms: 0,
            updated_at_ms: 0,
            cwd: PathBuf::from("/tmp"),
            git_branch: None,
            summary_markdown: None,
            compact_markdown: None,
        }
    }

    fn seeded_store() -> (Store, ProjectId) {
        let store = Store::open_in_memory().unwrap();
        let project = ProjectId::new("p1");
        store
            .write(|tx| {
                store.insert_project(
                    tx,
                    &gobby_core::Project {
                        id: project.clone(),
                        name: "demo".into(),
                        repo_path: PathBuf::from("/r"),
                        upstream: vec![],
                        parent_project_path: None,
                        created_at_ms: 0,
                    },
                )
            })
            .unwrap();
        (store, project)
    }

    #[test]
    fn insert_assigns_sequential_ordinals_per_project() {
        let (store, project) = seeded_store();
        let a = session("a", Some(project.as_str()));
        let b = session("b", Some(project.as_str()));
        store.write(|tx| store.insert_session(tx, &a)).unwrap();
        store.write(|tx| store.insert_session(tx, &b)).unwrap();

        let by_ordinal_1 = store.resolve_session_ref(&project, "#1").unwrap();
        let by_ordinal_2 = store.resolve_session_ref(&project, "#2").unwrap();
        assert_eq!(by_ordinal_1.id, a.id);
        assert_eq!(by_ordinal_2.id, b.id);
    }

    #[test]
    fn resolves_by_full_uuid_and_unique_prefix() {
        let (store, project) = seeded_store();
        let s = session("aaaabbbb-cccc-dddd-eeee-ffffffffffff", Some(project.as_str()));
        store.write(|tx| store.insert_session(tx, &s)).unwrap();

        let by_uuid = store.resolve_session_ref(&project, &s.id.to_string()).unwrap();
        assert_eq!(by_uuid.id, s.id);

        let by_prefix = store.resolve_session_ref(&project, "aaaabbbb").unwrap();
        assert_eq!(by_prefix.id, s.id);
    }

    #[test]
    fn ambiguous_prefix_is_conflict() {
        let (store, project) = seeded_store();
        let a = session("aaaa1111-0000-0000-0000-000000000000", Some(project.as_str()));
        let b = session("aaaa2222-0000-0000-0000-000000000000", Some(project.as_str()));
        store.write(|tx| store.insert_session(tx, &a)).unwrap();
        store.write(|tx| store.insert_session(tx, &b)).unwrap();

        let err = store.resolve_session_ref(&project, "aaaa").unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[test]
    fn list_child_sessions_returns_only_direct_children() {
        let (store, project) = seeded_store();
        let parent = session("parent", Some(project.as_str()));
        let mut child = session("child", Some(project.as_str()));
        child.parent_session_id = Some(parent.id.clone());
        let mut grandchild = session("grandchild", Some(project.as_str()));
        grandchild.parent_session_id = Some(child.id.clone());
        store.write(|tx| store.insert_session(tx, &parent)).unwrap();
        store.write(|tx| store.insert_session(tx, &child)).unwrap();
        store.write(|tx| store.insert_session(tx, &grandchild)).unwrap();

        let children = store.list_child_sessions(&parent.id).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, child.id);
    }

    #[test]
    fn status_transition_rejects_invalid_moves() {
        let (store, project) = seeded_store();
        let mut s = session("a", Some(project.as_str()));
        s.status = SessionStatus::Archived;
        store.write(|tx| store.insert_session(tx, &s)).unwrap();

        let err = store
            .write(|tx| store.update_session_status(tx, &s.id, SessionStatus::Active, 10))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_state");
    }
}
