// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `skills` MCP server (CORE §4.C7 / §4.C12).

use gobby_core::{ProjectId, Scope, Skill, SkillId};
use gobby_storage::Store;
use serde_json::Value as Json;

use super::memories::content_hash;
use super::{now_ms, opt_str_arg, str_arg};
use crate::error::Result;

pub fn call(store: &Store, tool: &str, args: &Json) -> Result<Json> {
    match tool {
        "upsert" => upsert(store, args),
        "get" => get(store, args),
        "list" => list(store, args),
        other => Err(super::unknown_tool("skills", other)),
    }
}

fn scope(args: &Json) -> Scope {
    match opt_str_arg(args, "project_id") {
        Some(id) => Scope::Project(ProjectId::new(id)),
        None => Scope::Global,
    }
}

fn upsert(store: &Store, args: &Json) -> Result<Json> {
    let body_markdown = str_arg(args, "body_markdown")?.to_string();
    let id = match opt_str_arg(args, "id") {
        Some(existing) => SkillId::new(existing),
        None => SkillId::generate(),
    };
    let now = now_ms();
    let skill = Skill {
        id,
        scope: scope(args),
        name: str_arg(args, "name")?.to_string(),
        description: str_arg(args, "description")?.to_string(),
        content_hash: content_hash(&body_markdown),
        body_markdown,
        mirror_dir: None,
        created_at_ms: now,
        updated_at_ms: now,
    };
    store.write(|tx| store.upsert_skill(tx, &skill))?;
    Ok(serde_json::to_value(skill).unwrap_or(Json::Null))
}

fn get(store: &Store, args: &Json) -> Result<Json> {
    let id = SkillId::new(str_arg(args, "id")?);
    Ok(serde_json::to_value(store.get_skill(&id)?).unwrap_or(Json::Null))
}

fn list(store: &Store, args: &Json) -> Result<Json> {
    let skills = store.list_skills(&scope(args))?;
    Ok(serde_json::to_value(skills).unwrap_or(Json::Null))
}
