// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named, pluggable workflow actions (CORE §4.C5: "the engine only knows
//! their registration table"). Each built-in is registered at startup the
//! way the specification's "Decorator-driven tool registration" design
//! note asks for: an explicit `register(name, handler)` call, erroring on
//! a duplicate key, rather than a decorator/attribute scan.

use std::collections::HashMap;
use std::sync::Arc;

use gobby_core::{Context, Decision};
use serde_json::Value as Json;

use crate::error::{EngineError, Result};

/// What an action wants to happen to the in-flight `HookResponse` plus any
/// workflow variable updates (CORE §4.C5: "Every action returns a dict
/// that may set flags on the pending response").
#[derive(Debug, Clone, Default)]
pub struct ActionOutcome {
    pub decision: Option<Decision>,
    pub context: Option<String>,
    pub reason: Option<String>,
    pub system_message: Option<String>,
    pub variable_updates: HashMap<String, Json>,
}

impl ActionOutcome {
    pub fn with_context(context: impl Into<String>) -> Self {
        Self {
            context: Some(context.into()),
            ..Default::default()
        }
    }
}

/// Everything an action handler needs to run, borrowed for the duration of
/// one action dispatch.
pub struct ActionContext<'a> {
    pub ctx: &'a Context,
    pub session_id: &'a gobby_core::SessionId,
    pub variables: &'a HashMap<String, Json>,
    pub params: &'a Json,
}

pub type ActionHandler = Arc<dyn Fn(&ActionContext<'_>) -> Result<ActionOutcome> + Send + Sync>;

#[derive(Default, Clone)]
pub struct ActionRegistry {
    handlers: HashMap<String, ActionHandler>,
}

impl ActionRegistry {
    /// The built-ins named in CORE §4.C5: `inject_context`, `set_variable`.
    /// The remaining named built-ins (`call_tool`, `spawn_agent`,
    /// `send_message`, `archive_session`, `create_task`, `execute_pipeline`,
    /// `emit_webhook`) dispatch into the other engine components and are
    /// registered by [`crate::Engine::new`] once those components exist,
    /// since they need handles this module doesn't own.
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        // Registering into a fresh, empty table under distinct literal
        // names cannot hit the duplicate-key branch; the registration
        // errors are deliberately discarded rather than unwrapped.
        let _ = registry.register("inject_context", Arc::new(inject_context));
        let _ = registry.register("set_variable", Arc::new(set_variable));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, handler: ActionHandler) -> Result<()> {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            return Err(EngineError::Core(gobby_core::Error::conflict(format!(
                "action '{name}' already registered"
            ))));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    pub fn dispatch(&self, name: &str, ctx: &ActionContext<'_>) -> Result<ActionOutcome> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| EngineError::Core(gobby_core::Error::not_found(format!("action '{name}'"))))?;
        handler(ctx)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

fn inject_context(ctx: &ActionContext<'_>) -> Result<ActionOutcome> {
    let text = ctx
        .params
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    Ok(ActionOutcome::with_context(text))
}

fn set_variable(ctx: &ActionContext<'_>) -> Result<ActionOutcome> {
    let name = ctx
        .params
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| EngineError::Core(gobby_core::Error::validation("set_variable requires 'name'")))?;
    let value = ctx.params.get("value").cloned().unwrap_or(Json::Null);
    let mut updates = HashMap::new();
    updates.insert(name.to_string(), value);
    Ok(ActionOutcome {
        variable_updates: updates,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gobby_core::SessionId;

    fn ctx<'a>(c: &'a Context, session: &'a SessionId, vars: &'a HashMap<String, Json>, params: &'a Json) -> ActionContext<'a> {
        ActionContext {
            ctx: c,
            session_id: session,
            variables: vars,
            params,
        }
    }

    #[test]
    fn inject_context_returns_text_param() {
        let registry = ActionRegistry::with_builtins();
        let c = Context::new("m1");
        let session = SessionId::new("s1");
        let vars = HashMap::new();
        let params = serde_json::json!({"text": "remember X"});
        let outcome = registry.dispatch("inject_context", &ctx(&c, &session, &vars, &params)).unwrap();
        assert_eq!(outcome.context.as_deref(), Some("remember X"));
    }

    #[test]
    fn set_variable_requires_name() {
        let registry = ActionRegistry::with_builtins();
        let c = Context::new("m1");
        let session = SessionId::new("s1");
        let vars = HashMap::new();
        let params = serde_json::json!({"value": 1});
        let err = registry.dispatch("set_variable", &ctx(&c, &session, &vars, &params)).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ActionRegistry::with_builtins();
        let result = registry.register("inject_context", Arc::new(inject_context));
        assert!(result.is_err());
    }

    #[test]
    fn unknown_action_is_not_found() {
        let registry = ActionRegistry::with_builtins();
        let c = Context::new("m1");
        let session = SessionId::new("s1");
        let vars = HashMap::new();
        let params = serde_json::json!({});
        let err = registry.dispatch("nope", &ctx(&c, &session, &vars, &params)).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
