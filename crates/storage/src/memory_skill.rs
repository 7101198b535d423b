// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Memory and Skill repositories (CORE §4.C12 Sync Projectors' source of
//! truth). `scope` is stored as its JSON representation so `Scope::Global`
//! and `Scope::Project(id)` round-trip without a second nullable column.

use gobby_core::{Error, Memory, MemoryId, Result, Scope, Skill, SkillId};
use rusqlite::params;
use std::path::PathBuf;

use crate::listeners::TableOp;
use crate::store::{map_write_err, Store, WriteTx};

const MEMORY_COLUMNS: &str =
    "id, scope, title, content, tags, mirror_path, content_hash, created_at_ms, updated_at_ms";
const SKILL_COLUMNS: &str =
    "id, scope, name, description, body_markdown, content_hash, mirror_dir, created_at_ms, updated_at_ms";

fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<Result<Memory>> {
    let scope_json: String = row.get(1)?;
    let scope: Result<Scope> = serde_json::from_str(&scope_json).map_err(Into::into);
    let scope = match scope {
        Ok(s) => s,
        Err(e) => return Ok(Err(e)),
    };
    let tags_json: String = row.get(4)?;
    Ok(Ok(Memory {
        id: MemoryId::new(row.get::<_, String>(0)?),
        scope,
        title: row.get(2)?,
        content: row.get(3)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        mirror_path: row.get::<_, Option<String>>(5)?.map(PathBuf::from),
        content_hash: row.get(6)?,
        created_at_ms: row.get::<_, i64>(7)? as u64,
        updated_at_ms: row.get::<_, i64>(8)? as u64,
    }))
}

fn row_to_skill(row: &rusqlite::Row) -> rusqlite::Result<Result<Skill>> {
    let scope_json: String = row.get(1)?;
    let scope: Result<Scope> = serde_json::from_str(&scope_json).map_err(Into::into);
    let scope = match scope {
        Ok(s) => s,
        Err(e) => return Ok(Err(e)),
    };
    Ok(Ok(Skill {
        id: SkillId::new(row.get::<_, String>(0)?),
        scope,
        name: row.get(2)?,
        description: row.get(3)?,
        body_markdown: row.get(4)?,
        content_hash: row.get(5)?,
        mirror_dir: row.get::<_, Option<String>>(6)?.map(PathBuf::from),
        created_at_ms: row.get::<_, i64>(7)? as u64,
        updated_at_ms: row.get::<_, i64>(8)? as u64,
    }))
}

impl Store {
    pub fn upsert_memory(&self, tx: &mut WriteTx, memory: &Memory) -> Result<()> {
        let scope_json = serde_json::to_string(&memory.scope)?;
        let tags_json = serde_json::to_string(&memory.tags)?;
        tx.conn()
            .execute(
                &format!(
                    "INSERT INTO memories ({MEMORY_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9) \
                     ON CONFLICT (id) DO UPDATE SET title = excluded.title, content = excluded.content, \
                     tags = excluded.tags, mirror_path = excluded.mirror_path, \
                     content_hash = excluded.content_hash, updated_at_ms = excluded.updated_at_ms"
                ),
                params![
                    memory.id.as_str(),
                    scope_json,
                    memory.title,
                    memory.content,
                    tags_json,
                    memory.mirror_path.as_ref().map(|p| p.to_string_lossy().to_string()),
                    memory.content_hash,
                    memory.created_at_ms as i64,
                    memory.updated_at_ms as i64,
                ],
            )
            .map_err(|e| map_write_err(e, "upsert memory"))?;
        tx.notify(TableOp::Insert { table: "memories".into(), id: memory.id.to_string() });
        Ok(())
    }

    pub fn get_memory(&self, id: &MemoryId) -> Result<Memory> {
        self.read(|conn| {
            conn.query_row(
                &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1"),
                params![id.as_str()],
                row_to_memory,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("memory {id}")),
                other => other.into(),
            })?
        })
    }

    pub fn list_memories(&self, scope: &Scope) -> Result<Vec<Memory>> {
        let scope_json = serde_json::to_string(scope)?;
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE scope = ?1"))?;
            let rows = stmt.query_map(params![scope_json], row_to_memory)?;
            let mut memories = Vec::new();
            for row in rows {
                memories.push(row??);
            }
            Ok(memories)
        })
    }

    pub fn upsert_skill(&self, tx: &mut WriteTx, skill: &Skill) -> Result<()> {
        let scope_json = serde_json::to_string(&skill.scope)?;
        tx.conn()
            .execute(
                &format!(
                    "INSERT INTO skills ({SKILL_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9) \
                     ON CONFLICT (id) DO UPDATE SET description = excluded.description, \
                     body_markdown = excluded.body_markdown, content_hash = excluded.content_hash, \
                     updated_at_ms = excluded.updated_at_ms"
                ),
                params![
                    skill.id.as_str(),
                    scope_json,
                    skill.name,
                    skill.description,
                    skill.body_markdown,
                    skill.content_hash,
                    skill.mirror_dir.as_ref().map(|p| p.to_string_lossy().to_string()),
                    skill.created_at_ms as i64,
                    skill.updated_at_ms as i64,
                ],
            )
            .map_err(|e| map_write_err(e, "upsert skill"))?;
        tx.notify(TableOp::Insert { table: "skills".into(), id: skill.id.to_string() });
        Ok(())
    }

    pub fn get_skill(&self, id: &SkillId) -> Result<Skill> {
        self.read(|conn| {
            conn.query_row(
                &format!("SELECT {SKILL_COLUMNS} FROM skills WHERE id = ?1"),
                params![id.as_str()],
                row_to_skill,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("skill {id}")),
                other => other.into(),
            })?
        })
    }

    pub fn list_skills(&self, scope: &Scope) -> Result<Vec<Skill>> {
        let scope_json = serde_json::to_string(scope)?;
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {SKILL_COLUMNS} FROM skills WHERE scope = ?1"))?;
            let rows = stmt.query_map(params![scope_json], row_to_skill)?;
            let mut skills = Vec::new();
            for row in rows {
                skills.push(row??);
            }
            Ok(skills)
        })
    }
}
