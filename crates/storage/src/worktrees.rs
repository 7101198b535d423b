// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree repository. The claim operation is a real compare-and-swap at
//! the SQL layer: `UPDATE ... WHERE agent_session_id IS NULL` either
//! affects one row or zero, so two concurrent claimants can never both
//! succeed even though [`Store::write`] already serializes writers.

use gobby_core::{Error, ProjectId, Result, SessionId, TaskId, Worktree, WorktreeId, WorktreeStatus};
use rusqlite::{params, OptionalExtension};
use std::path::PathBuf;

use crate::listeners::TableOp;
use crate::store::{map_write_err, Store, WriteTx};

fn status_to_str(s: WorktreeStatus) -> &'static str {
    match s {
        WorktreeStatus::Active => "active",
        WorktreeStatus::Stale => "stale",
        WorktreeStatus::Merged => "merged",
        WorktreeStatus::Abandoned => "abandoned",
    }
}

fn status_from_str(s: &str) -> Result<WorktreeStatus> {
    Ok(match s {
        "active" => WorktreeStatus::Active,
        "stale" => WorktreeStatus::Stale,
        "merged" => WorktreeStatus::Merged,
        "abandoned" => WorktreeStatus::Abandoned,
        other => return Err(Error::internal(format!("unknown worktree status {other}"))),
    })
}

const SELECT_COLUMNS: &str = "id, project_id, branch_name, base_branch, worktree_path, status, \
     agent_session_id, task_id, created_at_ms, last_synced_at_ms";

fn row_to_worktree(row: &rusqlite::Row) -> rusqlite::Result<Result<Worktree>> {
    let status = match status_from_str(&row.get::<_, String>(5)?) {
        Ok(s) => s,
        Err(e) => return Ok(Err(e)),
    };
    Ok(Ok(Worktree {
        id: WorktreeId::new(row.get::<_, String>(0)?),
        project_id: ProjectId::new(row.get::<_, String>(1)?),
        branch_name: row.get(2)?,
        base_branch: row.get(3)?,
        worktree_path: PathBuf::from(row.get::<_, String>(4)?),
        status,
        agent_session_id: row.get::<_, Option<String>>(6)?.map(SessionId::new),
        task_id: row.get::<_, Option<String>>(7)?.map(TaskId::new),
        created_at_ms: row.get::<_, i64>(8)? as u64,
        last_synced_at_ms: row.get::<_, Option<i64>>(9)?.map(|v| v as u64),
    }))
}

impl Store {
    pub fn insert_worktree(&self, tx: &mut WriteTx, worktree: &Worktree) -> Result<()> {
        tx.conn()
            .execute(
                &format!("INSERT INTO worktrees ({SELECT_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)"),
                params![
                    worktree.id.as_str(),
                    worktree.project_id.as_str(),
                    worktree.branch_name,
                    worktree.base_branch,
                    worktree.worktree_path.to_string_lossy(),
                    status_to_str(worktree.status),
                    worktree.agent_session_id.as_ref().map(|s| s.as_str()),
                    worktree.task_id.as_ref().map(|t| t.as_str()),
                    worktree.created_at_ms as i64,
                    worktree.last_synced_at_ms.map(|v| v as i64),
                ],
            )
            .map_err(|e| map_write_err(e, "insert worktree"))?;
        tx.notify(TableOp::Insert { table: "worktrees".into(), id: worktree.id.to_string() });
        Ok(())
    }

    /// Atomic claim: succeeds only if the row's `agent_session_id` is still
    /// `NULL` at the moment of the update.
    pub fn claim_worktree(&self, tx: &mut WriteTx, id: &WorktreeId, session: &SessionId) -> Result<()> {
        let affected = tx
            .conn()
            .execute(
                "UPDATE worktrees SET agent_session_id = ?1 WHERE id = ?2 AND agent_session_id IS NULL",
                params![session.as_str(), id.as_str()],
            )
            .map_err(|e| map_write_err(e, "claim worktree"))?;
        if affected == 0 {
            return Err(Error::conflict(format!("worktree {id} already claimed or missing")));
        }
        tx.notify(TableOp::Update { table: "worktrees".into(), id: id.to_string() });
        Ok(())
    }

    pub fn release_worktree(&self, tx: &mut WriteTx, id: &WorktreeId) -> Result<()> {
        tx.conn()
            .execute(
                "UPDATE worktrees SET agent_session_id = NULL WHERE id = ?1",
                params![id.as_str()],
            )
            .map_err(|e| map_write_err(e, "release worktree"))?;
        tx.notify(TableOp::Update { table: "worktrees".into(), id: id.to_string() });
        Ok(())
    }

    pub fn get_worktree(&self, id: &WorktreeId) -> Result<Worktree> {
        self.read(|conn| {
            conn.query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM worktrees WHERE id = ?1"),
                params![id.as_str()],
                row_to_worktree,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("worktree {id}")),
                other => other.into(),
            })?
        })
    }

    pub fn list_stale_candidates(&self, project_id: &ProjectId) -> Result<Vec<Worktree>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM worktrees \
                 WHERE project_id = ?1 AND status = 'active' AND agent_session_id IS NULL"
            ))?;
            let rows = stmt.query_map(params![project_id.as_str()], row_to_worktree)?;
            let mut worktrees = Vec::new();
            for row in rows {
                worktrees.push(row??);
            }
            Ok(worktrees)
        })
    }

    pub fn find_worktree_by_branch(&self, project_id: &ProjectId, branch: &str) -> Result<Option<Worktree>> {
        self.read(|conn| {
            let result = conn
                .query_row(
                    &format!("SELECT {SELECT_COLUMNS} FROM worktrees WHERE project_id = ?1 AND branch_name = ?2"),
                    params![project_id.as_str(), branch],
                    row_to_worktree,
                )
                .optional()?;
            result.transpose()
        })
    }
}
