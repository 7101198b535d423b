// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool Registry / MCP (CORE §4.C7): the internal RPC surface agents call
//! to read and mutate supervisor state. Tools are grouped into namespaced
//! servers and dispatched through the three verbs every server supports:
//! `list_tools`, `get_schema`, `call_tool`.

mod artifacts;
mod memories;
mod messaging;
mod search;
mod skills;
mod tasks;
mod worktrees;
mod workflows;

use std::collections::HashMap;

use gobby_core::{Context, SessionId};
use gobby_runbook::WorkflowLoader;
use gobby_storage::Store;
use serde::Serialize;
use serde_json::Value as Json;

use crate::error::{EngineError, Result};
use crate::workflow::WorkflowEngine;

/// One call into a namespaced tool.
pub struct ToolCall {
    pub server: String,
    pub tool: String,
    pub arguments: Json,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub server: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// Every tool this build exposes, used to answer `list_tools` without a
/// round trip through each server module.
const CATALOG: &[ToolDescriptor] = &[
    ToolDescriptor { server: "tasks", name: "get", description: "Resolve and return a task by reference." },
    ToolDescriptor { server: "tasks", name: "create", description: "Create a task under a project." },
    ToolDescriptor { server: "tasks", name: "claim", description: "Atomically claim a task for a session." },
    ToolDescriptor { server: "tasks", name: "update_status", description: "Advance a task's status." },
    ToolDescriptor { server: "tasks", name: "list_subtasks", description: "List a task's direct subtasks." },
    ToolDescriptor { server: "memories", name: "upsert", description: "Create or update a memory." },
    ToolDescriptor { server: "memories", name: "get", description: "Fetch a memory by id." },
    ToolDescriptor { server: "memories", name: "list", description: "List memories in a scope." },
    ToolDescriptor { server: "skills", name: "upsert", description: "Create or update a skill." },
    ToolDescriptor { server: "skills", name: "get", description: "Fetch a skill by id." },
    ToolDescriptor { server: "skills", name: "list", description: "List skills in a scope." },
    ToolDescriptor { server: "artifacts", name: "create", description: "Capture an artifact from a session." },
    ToolDescriptor { server: "artifacts", name: "get", description: "Fetch an artifact by id." },
    ToolDescriptor { server: "artifacts", name: "list_for_session", description: "List artifacts captured by a session." },
    ToolDescriptor { server: "messaging", name: "send_to_parent", description: "Send a message to the calling session's parent." },
    ToolDescriptor { server: "messaging", name: "send_to_child", description: "Send a message to a direct child session." },
    ToolDescriptor { server: "messaging", name: "broadcast_to_children", description: "Send a message to every active direct child." },
    ToolDescriptor { server: "messaging", name: "list_unread", description: "List unread inbound messages for the calling session." },
    ToolDescriptor { server: "search", name: "search_tasks", description: "Full-text search over tasks." },
    ToolDescriptor { server: "search", name: "search_artifacts", description: "Full-text search over artifacts." },
    ToolDescriptor { server: "worktrees", name: "create", description: "Create (or reuse) a worktree for a branch." },
    ToolDescriptor { server: "worktrees", name: "claim", description: "CAS-claim a worktree for a session." },
    ToolDescriptor { server: "worktrees", name: "release", description: "Release a session's claim on a worktree." },
    ToolDescriptor { server: "workflows", name: "activate", description: "Activate a workflow instance for a session." },
    ToolDescriptor { server: "workflows", name: "end", description: "End a session's workflow instance." },
];

pub struct ToolRegistry {
    store: Store,
    loader: WorkflowLoader,
    engine: WorkflowEngine,
}

impl ToolRegistry {
    pub fn new(store: Store, loader: WorkflowLoader, engine: WorkflowEngine) -> Self {
        Self { store, loader, engine }
    }

    pub fn list_tools(&self) -> &'static [ToolDescriptor] {
        CATALOG
    }

    pub fn get_schema(&self, server: &str, tool: &str) -> Result<&'static ToolDescriptor> {
        CATALOG
            .iter()
            .find(|t| t.server == server && t.name == tool)
            .ok_or_else(|| unknown_tool(server, tool))
    }

    /// Dispatches one call, then persists it into `variables.mcp_calls` /
    /// `variables.mcp_results` on every workflow instance the session has
    /// running (CORE §4.C7: "allowing condition helpers to reason about
    /// them").
    pub fn call_tool(&self, ctx: &Context, session_id: &SessionId, call: ToolCall) -> Result<Json> {
        let result = match call.server.as_str() {
            "tasks" => tasks::call(&self.store, ctx, &call.tool, &call.arguments),
            "memories" => memories::call(&self.store, &call.tool, &call.arguments),
            "skills" => skills::call(&self.store, &call.tool, &call.arguments),
            "artifacts" => artifacts::call(&self.store, &call.tool, &call.arguments),
            "messaging" => messaging::call(&self.store, session_id, &call.tool, &call.arguments),
            "search" => search::call(&self.store, &call.tool, &call.arguments),
            "worktrees" => worktrees::call(&self.store, ctx, &call.tool, &call.arguments),
            "workflows" => workflows::call(&self.store, &self.loader, &self.engine, ctx, session_id, &call.tool, &call.arguments),
            other => Err(unknown_tool(other, &call.tool)),
        }?;
        self.record_mcp_call(session_id, &call.server, &call.tool, &result)?;
        Ok(result)
    }

    fn record_mcp_call(&self, session_id: &SessionId, server: &str, tool: &str, result: &Json) -> Result<()> {
        let instances = self.store.list_workflow_instances_for_session(session_id)?;
        if instances.is_empty() {
            return Ok(());
        }
        self.store.write(|tx| {
            for mut instance in instances {
                record_into_variables(&mut instance.variables, server, tool, result);
                self.store.upsert_workflow_instance(tx, &instance)?;
            }
            Ok(())
        })
    }
}

fn record_into_variables(variables: &mut HashMap<String, Json>, server: &str, tool: &str, result: &Json) {
    let calls = variables.entry("mcp_calls".to_string()).or_insert_with(|| Json::Object(Default::default()));
    if let Json::Object(map) = calls {
        let list = map.entry(server.to_string()).or_insert_with(|| Json::Array(Vec::new()));
        if let Json::Array(names) = list {
            names.push(Json::String(tool.to_string()));
        }
    }
    let results = variables.entry("mcp_results".to_string()).or_insert_with(|| Json::Object(Default::default()));
    if let Json::Object(map) = results {
        let per_server = map.entry(server.to_string()).or_insert_with(|| Json::Object(Default::default()));
        if let Json::Object(per_tool) = per_server {
            per_tool.insert(tool.to_string(), result.clone());
        }
    }
}

fn unknown_tool(server: &str, tool: &str) -> EngineError {
    EngineError::Core(gobby_core::Error::not_found(format!("no such tool {server}.{tool}")))
}

pub(crate) fn str_arg<'a>(args: &'a Json, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| EngineError::Core(gobby_core::Error::validation(format!("'{name}' is required"))))
}

pub(crate) fn opt_str_arg<'a>(args: &'a Json, name: &str) -> Option<&'a str> {
    args.get(name).and_then(|v| v.as_str())
}

pub(crate) fn bool_arg(args: &Json, name: &str, default: bool) -> bool {
    args.get(name).and_then(|v| v.as_bool()).unwrap_or(default)
}

pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn project_id(ctx: &Context) -> Result<gobby_core::ProjectId> {
    ctx.project_id
        .clone()
        .ok_or_else(|| EngineError::Core(gobby_core::Error::validation("no project in context")))
}
