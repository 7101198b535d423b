// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact repository. Insert/update/delete keep `artifacts_fts` in sync
//! automatically via the triggers installed in [`crate::schema`].

use gobby_core::{ArtifactType, Error, Result};
use gobby_core::{Artifact, ArtifactId, SessionId, TaskId};
use rusqlite::params;

use crate::listeners::TableOp;
use crate::store::{map_write_err, Store, WriteTx};

fn type_to_str(t: &ArtifactType) -> String {
    match t {
        ArtifactType::Code => "code".into(),
        ArtifactType::Diff => "diff".into(),
        ArtifactType::Log => "log".into(),
        ArtifactType::Note => "note".into(),
        ArtifactType::Other(s) => format!("other:{s}"),
    }
}

fn type_from_str(s: &str) -> ArtifactType {
    match s {
        "code" => ArtifactType::Code,
        "diff" => ArtifactType::Diff,
        "log" => ArtifactType::Log,
        "note" => ArtifactType::Note,
        other => ArtifactType::Other(other.strip_prefix("other:").unwrap_or(other).to_string()),
    }
}

const SELECT_COLUMNS: &str = "id, session_id, task_id, artifact_type, content, source_file, \
     line_start, line_end, metadata, tags, created_at_ms";

fn row_to_artifact(row: &rusqlite::Row) -> rusqlite::Result<Artifact> {
    let metadata_json: String = row.get(8)?;
    let tags_json: String = row.get(9)?;
    Ok(Artifact {
        id: ArtifactId::new(row.get::<_, String>(0)?),
        session_id: SessionId::new(row.get::<_, String>(1)?),
        task_id: row.get::<_, Option<String>>(2)?.map(TaskId::new),
        artifact_type: type_from_str(&row.get::<_, String>(3)?),
        content: row.get(4)?,
        source_file: row.get(5)?,
        line_start: row.get::<_, Option<i64>>(6)?.map(|v| v as u32),
        line_end: row.get::<_, Option<i64>>(7)?.map(|v| v as u32),
        metadata: serde_json::from_str(&metadata_json).unwrap_or(serde_json::Value::Null),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        created_at_ms: row.get::<_, i64>(10)? as u64,
    })
}

impl Store {
    pub fn insert_artifact(&self, tx: &mut WriteTx, artifact: &Artifact) -> Result<()> {
        let metadata_json = serde_json::to_string(&artifact.metadata)?;
        let tags_json = serde_json::to_string(&artifact.tags)?;
        tx.conn()
            .execute(
                &format!("INSERT INTO artifacts ({SELECT_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)"),
                params![
                    artifact.id.as_str(),
                    artifact.session_id.as_str(),
                    artifact.task_id.as_ref().map(|t| t.as_str()),
                    type_to_str(&artifact.artifact_type),
                    artifact.content,
                    artifact.source_file,
                    artifact.line_start,
                    artifact.line_end,
                    metadata_json,
                    tags_json,
                    artifact.created_at_ms as i64,
                ],
            )
            .map_err(|e| map_write_err(e, "insert artifact"))?;
        tx.notify(TableOp::Insert { table: "artifacts".into(), id: artifact.id.to_string() });
        Ok(())
    }

    pub fn get_artifact(&self, id: &ArtifactId) -> Result<Artifact> {
        self.read(|conn| {
            conn.query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM artifacts WHERE id = ?1"),
                params![id.as_str()],
                row_to_artifact,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("artifact {id}")),
                other => other.into(),
            })
        })
    }

    pub fn list_artifacts_for_session(&self, session_id: &SessionId) -> Result<Vec<Artifact>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM artifacts WHERE session_id = ?1 ORDER BY created_at_ms"
            ))?;
            let rows = stmt.query_map(params![session_id.as_str()], row_to_artifact)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
        })
    }

    pub fn fetch_artifacts_by_id(&self, ids: &[String]) -> Result<Vec<Artifact>> {
        self.read(|conn| {
            let mut result = Vec::with_capacity(ids.len());
            for id in ids {
                let artifact = conn
                    .query_row(
                        &format!("SELECT {SELECT_COLUMNS} FROM artifacts WHERE id = ?1"),
                        params![id],
                        row_to_artifact,
                    )
                    .map_err(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("artifact {id}")),
                        other => other.into(),
                    })?;
                result.push(artifact);
            }
            Ok(result)
        })
    }
}
