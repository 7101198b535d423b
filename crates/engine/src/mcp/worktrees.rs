// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `worktrees` MCP server (CORE §4.C7). Record-keeping only: the actual
//! git plumbing (branch creation, `git worktree add`, merge/rebase sync)
//! lives in the Worktree Manager this server's `create`/`sync` calls will
//! delegate to once it exists; until then `create` records the row at the
//! path the manager would use, so callers and tests can depend on the
//! shape now.

use gobby_core::{Context, SessionId, Worktree, WorktreeId, WorktreeStatus};
use gobby_storage::Store;
use serde_json::Value as Json;

use super::{bool_arg, now_ms, project_id, str_arg};
use crate::error::{EngineError, Result};

pub fn call(store: &Store, ctx: &Context, tool: &str, args: &Json) -> Result<Json> {
    match tool {
        "create" => create(store, ctx, args),
        "claim" => claim(store, args),
        "release" => release(store, args),
        other => Err(super::unknown_tool("worktrees", other)),
    }
}

fn create(store: &Store, ctx: &Context, args: &Json) -> Result<Json> {
    let project = project_id(ctx)?;
    let branch = str_arg(args, "branch")?.to_string();
    let base_branch = str_arg(args, "base_branch")?.to_string();
    if let Some(existing) = store.find_worktree_by_branch(&project, &branch)? {
        return Ok(serde_json::to_value(existing).unwrap_or(Json::Null));
    }
    let worktree_path = std::env::temp_dir()
        .join("gobby-worktrees")
        .join(project.as_str())
        .join(&branch);
    let worktree = Worktree {
        id: WorktreeId::generate(),
        project_id: project,
        branch_name: branch,
        base_branch,
        worktree_path,
        status: WorktreeStatus::Active,
        agent_session_id: None,
        task_id: None,
        created_at_ms: now_ms(),
        last_synced_at_ms: None,
    };
    store.write(|tx| store.insert_worktree(tx, &worktree))?;
    Ok(serde_json::to_value(worktree).unwrap_or(Json::Null))
}

fn claim(store: &Store, args: &Json) -> Result<Json> {
    let id = WorktreeId::new(str_arg(args, "worktree_id")?);
    let session = SessionId::new(str_arg(args, "session_id")?);
    store.write(|tx| store.claim_worktree(tx, &id, &session))?;
    Ok(serde_json::to_value(store.get_worktree(&id)?).unwrap_or(Json::Null))
}

fn release(store: &Store, args: &Json) -> Result<Json> {
    let id = WorktreeId::new(str_arg(args, "worktree_id")?);
    let force = bool_arg(args, "force", false);
    let worktree = store.get_worktree(&id)?;
    if worktree.agent_session_id.is_some() && !force && !claimed_by(&worktree, args) {
        return Err(EngineError::Core(gobby_core::Error::conflict(format!("worktree {id} claimed by another session"))));
    }
    store.write(|tx| store.release_worktree(tx, &id))?;
    Ok(serde_json::to_value(store.get_worktree(&id)?).unwrap_or(Json::Null))
}

fn claimed_by(worktree: &Worktree, args: &Json) -> bool {
    match (&worktree.agent_session_id, super::opt_str_arg(args, "session_id")) {
        (Some(holder), Some(caller)) => holder.as_str() == caller,
        _ => false,
    }
}
