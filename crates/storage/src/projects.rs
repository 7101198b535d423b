// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project repository.

use std::path::PathBuf;

use gobby_core::{Error, Project, ProjectId, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::store::{map_write_err, Store, WriteTx};
use crate::listeners::TableOp;

fn row_to_project(row: &rusqlite::Row) -> rusqlite::Result<Project> {
    let upstream_json: String = row.get(3)?;
    Ok(Project {
        id: ProjectId::new(row.get::<_, String>(0)?),
        name: row.get(1)?,
        repo_path: PathBuf::from(row.get::<_, String>(2)?),
        upstream: serde_json::from_str(&upstream_json).unwrap_or_default(),
        parent_project_path: row.get::<_, Option<String>>(4)?.map(PathBuf::from),
        created_at_ms: row.get::<_, i64>(5)? as u64,
    })
}

impl Store {
    pub fn insert_project(&self, tx: &mut WriteTx, project: &Project) -> Result<()> {
        let upstream_json = serde_json::to_string(&project.upstream)?;
        tx.conn()
            .execute(
                "INSERT INTO projects (id, name, repo_path, upstream, parent_project_path, created_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    project.id.as_str(),
                    project.name,
                    project.repo_path.to_string_lossy(),
                    upstream_json,
                    project.parent_project_path.as_ref().map(|p| p.to_string_lossy().to_string()),
                    project.created_at_ms as i64,
                ],
            )
            .map_err(|e| map_write_err(e, "insert project"))?;
        tx.notify(TableOp::Insert { table: "projects".into(), id: project.id.to_string() });
        Ok(())
    }

    pub fn get_project(&self, id: &ProjectId) -> Result<Project> {
        self.read(|conn| get_project_by_id(conn, id.as_str()))
    }

    pub fn find_project_by_repo_path(&self, repo_path: &std::path::Path) -> Result<Option<Project>> {
        self.read(|conn| {
            conn.query_row(
                "SELECT id, name, repo_path, upstream, parent_project_path, created_at_ms
                 FROM projects WHERE repo_path = ?1",
                params![repo_path.to_string_lossy()],
                row_to_project,
            )
            .optional()
            .map_err(Into::into)
        })
    }
}

fn get_project_by_id(conn: &Connection, id: &str) -> Result<Project> {
    conn.query_row(
        "SELECT id, name, repo_path, upstream, parent_project_path, created_at_ms
         FROM projects WHERE id = ?1",
        params![id],
        row_to_project,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("project {id}")),
        other => other.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project {
            id: ProjectId::new("p1"),
            name: "demo".into(),
            repo_path: PathBuf::from("/repo"),
            upstream: vec!["origin".into()],
            parent_project_path: None,
            created_at_ms: 0,
        }
    }

    #[test]
    fn insert_then_get_roundtrips() {
        let store = Store::open_in_memory().unwrap();
        let p = project();
        store.write(|tx| store.insert_project(tx, &p)).unwrap();

        let fetched = store.get_project(&p.id).unwrap();
        assert_eq!(fetched.name, "demo");
        assert_eq!(fetched.upstream, vec!["origin".to_string()]);
    }

    #[test]
    fn get_missing_project_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let err = store.get_project(&ProjectId::new("nope")).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn duplicate_id_is_conflict() {
        let store = Store::open_in_memory().unwrap();
        let p = project();
        store.write(|tx| store.insert_project(tx, &p)).unwrap();
        let err = store.write(|tx| store.insert_project(tx, &p)).unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }
}
