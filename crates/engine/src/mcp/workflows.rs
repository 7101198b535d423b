// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `workflows` MCP server (CORE §4.C7): lets an agent explicitly activate
//! or end a workflow instance on its own session, alongside the implicit
//! activation the Hook Dispatcher drives from events.

use std::collections::HashMap;

use gobby_core::{Context, Error, SessionId, WorkflowInstance, WorkflowInstanceId, WorkflowKind};
use gobby_runbook::WorkflowLoader;
use gobby_storage::Store;
use serde_json::Value as Json;

use super::{now_ms, str_arg};
use crate::error::{EngineError, Result};
use crate::workflow::WorkflowEngine;

pub fn call(
    store: &Store,
    loader: &WorkflowLoader,
    _engine: &WorkflowEngine,
    _ctx: &Context,
    session_id: &SessionId,
    tool: &str,
    args: &Json,
) -> Result<Json> {
    match tool {
        "activate" => activate(store, loader, session_id, args),
        "end" => end(store, session_id, args),
        other => Err(super::unknown_tool("workflows", other)),
    }
}

fn activate(store: &Store, loader: &WorkflowLoader, session_id: &SessionId, args: &Json) -> Result<Json> {
    let name = str_arg(args, "name")?;
    let resume = super::bool_arg(args, "resume", false);
    let existing = store
        .list_workflow_instances_for_session(session_id)?
        .into_iter()
        .find(|i| i.workflow_name == name);
    if let Some(mut instance) = existing {
        if resume {
            instance.enabled = true;
            store.write(|tx| store.upsert_workflow_instance(tx, &instance))?;
        }
        return Ok(serde_json::to_value(instance).unwrap_or(Json::Null));
    }

    let def = loader.load(name)?;
    let now = now_ms();
    let instance = match def.kind {
        WorkflowKind::Step => {
            let first = def
                .first_step_name()
                .ok_or_else(|| EngineError::Core(Error::validation(format!("workflow '{name}' has no steps"))))?;
            WorkflowInstance::new_step_instance(WorkflowInstanceId::generate(), session_id.clone(), name, first, now)
        }
        WorkflowKind::Lifecycle => WorkflowInstance {
            id: WorkflowInstanceId::generate(),
            session_id: session_id.clone(),
            workflow_name: name.to_string(),
            kind: WorkflowKind::Lifecycle,
            enabled: true,
            step: None,
            step_entered_at_ms: now,
            step_action_count: 0,
            total_action_count: 0,
            context_injected: false,
            variables: HashMap::new(),
            pending_approval: None,
        },
    };
    store.write(|tx| store.upsert_workflow_instance(tx, &instance))?;
    Ok(serde_json::to_value(instance).unwrap_or(Json::Null))
}

fn end(store: &Store, session_id: &SessionId, args: &Json) -> Result<Json> {
    let name = str_arg(args, "name")?;
    let mut instance = store
        .list_workflow_instances_for_session(session_id)?
        .into_iter()
        .find(|i| i.workflow_name == name)
        .ok_or_else(|| EngineError::Core(Error::not_found(format!("no active workflow '{name}' on session"))))?;
    instance.enabled = false;
    store.write(|tx| store.upsert_workflow_instance(tx, &instance))?;
    Ok(serde_json::to_value(instance).unwrap_or(Json::Null))
}
