// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `memories` MCP server (CORE §4.C7 / §4.C12).

use gobby_core::{Memory, MemoryId, ProjectId, Scope};
use gobby_storage::Store;
use serde_json::Value as Json;

use super::{now_ms, opt_str_arg, str_arg};
use crate::error::Result;

pub fn call(store: &Store, tool: &str, args: &Json) -> Result<Json> {
    match tool {
        "upsert" => upsert(store, args),
        "get" => get(store, args),
        "list" => list(store, args),
        other => Err(super::unknown_tool("memories", other)),
    }
}

fn scope(args: &Json) -> Scope {
    match opt_str_arg(args, "project_id") {
        Some(id) => Scope::Project(ProjectId::new(id)),
        None => Scope::Global,
    }
}

fn upsert(store: &Store, args: &Json) -> Result<Json> {
    let content = str_arg(args, "content")?.to_string();
    let content_hash = content_hash(&content);
    let id = match opt_str_arg(args, "id") {
        Some(existing) => MemoryId::new(existing),
        None => MemoryId::generate(),
    };
    let now = now_ms();
    let memory = Memory {
        id,
        scope: scope(args),
        title: str_arg(args, "title")?.to_string(),
        content,
        tags: args
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|t| t.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
        mirror_path: None,
        content_hash,
        created_at_ms: now,
        updated_at_ms: now,
    };
    store.write(|tx| store.upsert_memory(tx, &memory))?;
    Ok(serde_json::to_value(memory).unwrap_or(Json::Null))
}

fn get(store: &Store, args: &Json) -> Result<Json> {
    let id = MemoryId::new(str_arg(args, "id")?);
    Ok(serde_json::to_value(store.get_memory(&id)?).unwrap_or(Json::Null))
}

fn list(store: &Store, args: &Json) -> Result<Json> {
    let memories = store.list_memories(&scope(args))?;
    Ok(serde_json::to_value(memories).unwrap_or(Json::Null))
}

/// Used by the sync projector (CORE §4.C12) to skip re-importing content
/// it already wrote.
pub(crate) fn content_hash(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(content.as_bytes());
    format!("{digest:x}")
}
