// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `artifacts` MCP server (CORE §4.C7). Auto-classifies `artifact_type`
//! from `source_file`'s extension when the caller omits it.

use gobby_core::{Artifact, ArtifactId, ArtifactType, SessionId, TaskId};
use gobby_storage::Store;
use serde_json::Value as Json;

use super::{now_ms, opt_str_arg, str_arg};
use crate::error::Result;

pub fn call(store: &Store, tool: &str, args: &Json) -> Result<Json> {
    match tool {
        "create" => create(store, args),
        "get" => get(store, args),
        "list_for_session" => list_for_session(store, args),
        other => Err(super::unknown_tool("artifacts", other)),
    }
}

fn create(store: &Store, args: &Json) -> Result<Json> {
    let content = str_arg(args, "content")?.to_string();
    let source_file = opt_str_arg(args, "source_file").map(str::to_string);
    let artifact_type = match opt_str_arg(args, "artifact_type") {
        Some(t) => parse_type(t),
        None => ArtifactType::classify(source_file.as_deref(), &content),
    };
    let artifact = Artifact {
        id: ArtifactId::generate(),
        session_id: SessionId::new(str_arg(args, "session_id")?),
        task_id: opt_str_arg(args, "task_id").map(TaskId::new),
        artifact_type,
        content,
        source_file,
        line_start: args.get("line_start").and_then(|v| v.as_u64()).map(|n| n as u32),
        line_end: args.get("line_end").and_then(|v| v.as_u64()).map(|n| n as u32),
        metadata: args.get("metadata").cloned().unwrap_or(Json::Null),
        tags: args
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|t| t.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
        created_at_ms: now_ms(),
    };
    store.write(|tx| store.insert_artifact(tx, &artifact))?;
    Ok(serde_json::to_value(artifact).unwrap_or(Json::Null))
}

fn get(store: &Store, args: &Json) -> Result<Json> {
    let id = ArtifactId::new(str_arg(args, "id")?);
    Ok(serde_json::to_value(store.get_artifact(&id)?).unwrap_or(Json::Null))
}

fn list_for_session(store: &Store, args: &Json) -> Result<Json> {
    let session_id = SessionId::new(str_arg(args, "session_id")?);
    let artifacts = store.list_artifacts_for_session(&session_id)?;
    Ok(serde_json::to_value(artifacts).unwrap_or(Json::Null))
}

fn parse_type(s: &str) -> ArtifactType {
    match s {
        "code" => ArtifactType::Code,
        "diff" => ArtifactType::Diff,
        "log" => ArtifactType::Log,
        "note" => ArtifactType::Note,
        other => ArtifactType::Other(other.to_string()),
    }
}
