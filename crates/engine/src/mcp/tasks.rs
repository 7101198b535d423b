// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tasks` MCP server (CORE §4.C7).

use gobby_core::{Context, Error, ProjectId, SessionId, Task, TaskId, TaskPriority, TaskStatus};
use gobby_storage::Store;
use serde_json::Value as Json;

use super::{bool_arg, now_ms, opt_str_arg, project_id, str_arg};
use crate::error::Result;

pub fn call(store: &Store, ctx: &Context, tool: &str, args: &Json) -> Result<Json> {
    match tool {
        "get" => get(store, ctx, args),
        "create" => create(store, ctx, args),
        "claim" => claim(store, ctx, args),
        "update_status" => update_status(store, ctx, args),
        "list_subtasks" => list_subtasks(store, args),
        other => Err(super::unknown_tool("tasks", other)),
    }
}

fn resolve(store: &Store, project_id: &ProjectId, raw: &str) -> Result<Task> {
    Ok(store.resolve_task_ref(project_id, raw)?)
}

fn get(store: &Store, ctx: &Context, args: &Json) -> Result<Json> {
    let task = resolve(store, &project_id(ctx)?, str_arg(args, "task_id")?)?;
    Ok(serde_json::to_value(task).unwrap_or(Json::Null))
}

fn create(store: &Store, ctx: &Context, args: &Json) -> Result<Json> {
    let title = str_arg(args, "title")?.to_string();
    let task_type = opt_str_arg(args, "task_type").unwrap_or("task").to_string();
    let priority = match opt_str_arg(args, "priority") {
        Some("low") => TaskPriority::Low,
        Some("high") => TaskPriority::High,
        Some("urgent") => TaskPriority::Urgent,
        _ => TaskPriority::Medium,
    };
    let parent_task_id = match opt_str_arg(args, "parent_task_id") {
        Some(raw) => Some(resolve(store, &project_id(ctx)?, raw)?.id),
        None => None,
    };
    let now = now_ms();
    let task = Task {
        id: TaskId::generate(),
        project_id: project_id(ctx)?,
        title,
        description: opt_str_arg(args, "description").map(str::to_string),
        status: TaskStatus::Open,
        task_type,
        priority,
        parent_task_id,
        assignee: None,
        labels: Vec::new(),
        test_strategy: opt_str_arg(args, "test_strategy").map(str::to_string),
        created_at_ms: now,
        updated_at_ms: now,
    };
    store.write(|tx| store.insert_task(tx, &task))?;
    Ok(serde_json::to_value(task).unwrap_or(Json::Null))
}

fn claim(store: &Store, ctx: &Context, args: &Json) -> Result<Json> {
    let task = resolve(store, &project_id(ctx)?, str_arg(args, "task_id")?)?;
    let session = SessionId::new(str_arg(args, "session_id")?);
    let force = bool_arg(args, "force", false);
    store.write(|tx| store.claim_task(tx, &task.id, &session, force, now_ms()))?;
    Ok(serde_json::to_value(store.get_task(&task.id)?).unwrap_or(Json::Null))
}

fn update_status(store: &Store, ctx: &Context, args: &Json) -> Result<Json> {
    let task = resolve(store, &project_id(ctx)?, str_arg(args, "task_id")?)?;
    let next = match str_arg(args, "status")? {
        "open" => TaskStatus::Open,
        "in_progress" => TaskStatus::InProgress,
        "needs_review" => TaskStatus::NeedsReview,
        "closed" => TaskStatus::Closed,
        other => return Err(crate::error::EngineError::Core(Error::validation(format!("unknown task status '{other}'")))),
    };
    store.write(|tx| store.update_task_status(tx, &task.id, next, now_ms()))?;
    Ok(serde_json::to_value(store.get_task(&task.id)?).unwrap_or(Json::Null))
}

fn list_subtasks(store: &Store, args: &Json) -> Result<Json> {
    let parent = TaskId::new(str_arg(args, "task_id")?);
    let subtasks = store.list_subtasks(&parent)?;
    Ok(serde_json::to_value(subtasks).unwrap_or(Json::Null))
}
