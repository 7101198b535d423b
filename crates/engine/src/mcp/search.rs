// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `search` MCP server (CORE §4.C7): FTS over tasks and artifacts, filters
//! applied after the match, empty query returns empty.

use gobby_core::{ArtifactType, ProjectId, SessionId, TaskPriority, TaskStatus};
use gobby_storage::{ArtifactSearchFilter, Store, TaskSearchFilter};
use serde_json::Value as Json;

use super::{opt_str_arg, str_arg};
use crate::error::Result;

pub fn call(store: &Store, tool: &str, args: &Json) -> Result<Json> {
    match tool {
        "search_tasks" => search_tasks(store, args),
        "search_artifacts" => search_artifacts(store, args),
        other => Err(super::unknown_tool("search", other)),
    }
}

fn limit(args: &Json) -> u32 {
    args.get("limit").and_then(|v| v.as_u64()).unwrap_or(20) as u32
}

fn search_tasks(store: &Store, args: &Json) -> Result<Json> {
    let query = str_arg(args, "query")?;
    let filter = TaskSearchFilter {
        project_id: opt_str_arg(args, "project_id").map(ProjectId::new),
        status: opt_str_arg(args, "status").and_then(parse_task_status),
        priority: opt_str_arg(args, "priority").and_then(parse_priority),
    };
    let tasks = store.search_tasks(query, &filter, limit(args))?;
    Ok(serde_json::to_value(tasks).unwrap_or(Json::Null))
}

fn search_artifacts(store: &Store, args: &Json) -> Result<Json> {
    let query = str_arg(args, "query")?;
    let filter = ArtifactSearchFilter {
        session_id: opt_str_arg(args, "session_id").map(SessionId::new),
        artifact_type: opt_str_arg(args, "artifact_type").map(parse_artifact_type),
        tag: opt_str_arg(args, "tag").map(str::to_string),
    };
    let artifacts = store.search_artifacts(query, &filter, limit(args))?;
    Ok(serde_json::to_value(artifacts).unwrap_or(Json::Null))
}

fn parse_task_status(s: &str) -> Option<TaskStatus> {
    Some(match s {
        "open" => TaskStatus::Open,
        "in_progress" => TaskStatus::InProgress,
        "needs_review" => TaskStatus::NeedsReview,
        "closed" => TaskStatus::Closed,
        _ => return None,
    })
}

fn parse_artifact_type(s: &str) -> ArtifactType {
    match s {
        "code" => ArtifactType::Code,
        "diff" => ArtifactType::Diff,
        "log" => ArtifactType::Log,
        "note" => ArtifactType::Note,
        other => ArtifactType::Other(other.to_string()),
    }
}

fn parse_priority(s: &str) -> Option<TaskPriority> {
    Some(match s {
        "low" => TaskPriority::Low,
        "medium" => TaskPriority::Medium,
        "high" => TaskPriority::High,
        "urgent" => TaskPriority::Urgent,
        _ => return None,
    })
}
