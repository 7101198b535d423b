// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Full-text index maintenance. Row-level sync is handled by the triggers
//! installed in [`crate::schema`]; this module only covers the idempotent
//! full rebuild (`gobby doctor --reindex`) and the low-level match queries
//! `search.rs` composes into cross-entity results.

use gobby_core::Result;
use rusqlite::Connection;

/// Drop and repopulate both FTS tables from their content tables. Safe to
/// call at any time: the virtual tables are rebuilt from scratch, so a
/// rebuild after partial corruption converges to the same state a fresh
/// migration would have produced.
pub fn rebuild_all(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "INSERT INTO tasks_fts(tasks_fts) VALUES ('rebuild');
         INSERT INTO artifacts_fts(artifacts_fts) VALUES ('rebuild');",
    )?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct TaskMatch {
    pub task_id: String,
    pub rank: f64,
}

#[derive(Debug, Clone)]
pub struct ArtifactMatch {
    pub artifact_id: String,
    pub rank: f64,
}

/// Run `search_tasks`'s FTS half: bare `MATCH` query, ranked, with no
/// project/status/priority filters applied (those run on the caller's side
/// once the candidate id set comes back).
pub fn match_tasks(conn: &Connection, query: &str, limit: u32) -> Result<Vec<TaskMatch>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, bm25(tasks_fts) AS rank
         FROM tasks_fts
         JOIN tasks t ON t.rowid = tasks_fts.rowid
         WHERE tasks_fts MATCH ?1
         ORDER BY rank
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(rusqlite::params![query, limit], |row| {
        Ok(TaskMatch { task_id: row.get(0)?, rank: row.get(1)? })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

pub fn match_artifacts(conn: &Connection, query: &str, limit: u32) -> Result<Vec<ArtifactMatch>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, bm25(artifacts_fts) AS rank
         FROM artifacts_fts
         JOIN artifacts a ON a.rowid = artifacts_fts.rowid
         WHERE artifacts_fts MATCH ?1
         ORDER BY rank
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(rusqlite::params![query, limit], |row| {
        Ok(ArtifactMatch { artifact_id: row.get(0)?, rank: row.get(1)? })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::run_migrations;

    fn seed(conn: &mut Connection) {
        conn.execute_batch(
            "INSERT INTO projects (id, name, repo_path, created_at_ms) VALUES ('p1','n','/r',0);
             INSERT INTO tasks (id, ordinal, project_id, title, status, task_type, priority, created_at_ms, updated_at_ms)
                 VALUES ('t1', 1, 'p1', 'fix the flaky timeout bug', 'open', 'bug', 'medium', 0, 0);
             INSERT INTO tasks (id, ordinal, project_id, title, status, task_type, priority, created_at_ms, updated_at_ms)
                 VALUES ('t2', 2, 'p1', 'write release notes', 'open', 'chore', 'low', 0, 0);",
        )
        .unwrap();
    }

    #[test]
    fn match_tasks_finds_expected_row() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        seed(&mut conn);

        let hits = match_tasks(&conn, "timeout", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].task_id, "t1");
    }

    #[test]
    fn rebuild_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        seed(&mut conn);

        rebuild_all(&conn).unwrap();
        rebuild_all(&conn).unwrap();

        let hits = match_tasks(&conn, "release", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].task_id, "t2");
    }
}
