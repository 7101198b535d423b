// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook Dispatcher (CORE §4.C6): the single entry point every vendor
//! adapter calls with a unified `HookEvent` and gets a `HookResponse`
//! back. Fail-open throughout: a bug or a slow store must never hang the
//! calling agent.

use std::time::Duration;

use gobby_core::{
    BusEvent, Context, Decision, HookEvent, HookEventType, HookResponse, Session, SessionId,
    SessionKey, SessionStatus, WorkflowKind,
};
use gobby_runbook::WorkflowLoader;
use gobby_storage::Store;

use crate::error::Result;
use crate::event_bus::EventBus;
use crate::workflow::WorkflowEngine;

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

pub struct HookDispatcher {
    store: Store,
    loader: WorkflowLoader,
    engine: WorkflowEngine,
    bus: EventBus,
    enabled: bool,
    deadline: Option<Duration>,
}

impl HookDispatcher {
    pub fn new(store: Store, loader: WorkflowLoader, engine: WorkflowEngine, bus: EventBus) -> Self {
        Self {
            store,
            loader,
            engine,
            bus,
            enabled: true,
            deadline: Some(DEFAULT_DEADLINE),
        }
    }

    /// `workflow.enabled = false` is the master off-switch (CORE §6):
    /// always allow, never touch the engine.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// A configured deadline of zero disables the timeout entirely.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = if timeout.is_zero() { None } else { Some(timeout) };
        self
    }

    pub async fn dispatch(&self, ctx: &Context, event: HookEvent) -> HookResponse {
        if !self.enabled {
            return HookResponse::allow();
        }

        let deadline_ctx = match self.deadline {
            Some(d) => ctx.with_deadline(d),
            None => ctx.clone(),
        };

        let response = match self.deadline {
            Some(d) => match tokio::time::timeout(d, self.run(&deadline_ctx, &event)).await {
                Ok(response) => response,
                Err(_) => {
                    tracing::warn!(event_type = ?event.event_type, "hook dispatch exceeded deadline, allowing");
                    HookResponse::allow()
                }
            },
            None => self.run(&deadline_ctx, &event).await,
        };

        self.bus.publish(BusEvent {
            event_type: event.event_type,
            session_id: event.session_id.clone(),
            source: event.source,
            timestamp_ms: event.timestamp_ms,
            machine_id: event.machine_id,
            data: event.data,
            metadata: event.metadata,
        });

        response
    }

    /// Steps (1)-(5) of the dispatch loop. Any internal error here is
    /// caught by the caller's fail-open wrapper via `catch_unwind`-free
    /// `Result` propagation collapsed to `allow`.
    async fn run(&self, ctx: &Context, event: &HookEvent) -> HookResponse {
        match self.run_fallible(ctx, event) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, event_type = ?event.event_type, "hook handling failed, allowing");
                HookResponse::allow()
            }
        }
    }

    fn run_fallible(&self, ctx: &Context, event: &HookEvent) -> Result<HookResponse> {
        let Some(session_id) = self.resolve_session(event)? else {
            return Ok(HookResponse::allow());
        };

        let now_ms = event.timestamp_ms;
        let mut response = HookResponse::allow();

        let instances = self.store.list_workflow_instances_for_session(&session_id)?;

        // Step 3: the session's single step workflow, if any.
        if let Some(mut step_instance) = instances.iter().find(|i| i.kind == WorkflowKind::Step).cloned() {
            if let Ok(def) = self.loader.load(&step_instance.workflow_name) {
                let step_response = self
                    .engine
                    .handle_step_event(ctx, &mut step_instance, &def, event, now_ms)?;
                response = response.merge(step_response);
            }
        }

        // Step 4: fan out through every enabled lifecycle workflow,
        // collecting injected context by concatenation in registration
        // order (store returns rows in insertion order).
        for mut lifecycle_instance in instances.into_iter().filter(|i| i.kind == WorkflowKind::Lifecycle) {
            if !lifecycle_instance.enabled {
                continue;
            }
            let Ok(def) = self.loader.load(&lifecycle_instance.workflow_name) else {
                continue;
            };
            let canonical = canonical_event_name(event.event_type);
            for trigger in def.triggers.iter().filter(|t| t.event_type == canonical) {
                let root = gobby_eval::context_from_map({
                    let mut map = serde_json::Map::new();
                    map.insert(
                        "variables".into(),
                        serde_json::to_value(&lifecycle_instance.variables).unwrap_or_default(),
                    );
                    map.insert("event".into(), event.data.clone());
                    map
                });
                let passes = match &trigger.when {
                    None => true,
                    Some(cond) => {
                        let eval_ctx = gobby_eval::EvalContext {
                            root: &root,
                            helpers: &gobby_eval::HelperRegistry::new(),
                        };
                        gobby_eval::evaluate(cond, &eval_ctx).unwrap_or(false)
                    }
                };
                if !passes {
                    continue;
                }
                for spec in &trigger.actions {
                    let action_ctx = crate::workflow::ActionContext {
                        ctx,
                        session_id: &session_id,
                        variables: &lifecycle_instance.variables,
                        params: &spec.params,
                    };
                    if let Ok(outcome) = self.engine.actions().dispatch(&spec.action, &action_ctx) {
                        for (k, v) in outcome.variable_updates {
                            lifecycle_instance.variables.insert(k, v);
                        }
                        response = response.merge(HookResponse {
                            decision: outcome.decision.unwrap_or(Decision::Allow),
                            context: outcome.context,
                            reason: outcome.reason,
                            system_message: outcome.system_message,
                            metadata: serde_json::Value::Null,
                        });
                    }
                }
            }
            self.store
                .write(|tx| self.store.upsert_workflow_instance(tx, &lifecycle_instance))?;
        }

        Ok(response)
    }

    /// Resolve `event.session_id` (the adapter-native external id) to an
    /// internal [`SessionId`], registering a fresh session on
    /// `session_start` when no row exists yet (CORE §4.C6 steps 1-2).
    fn resolve_session(&self, event: &HookEvent) -> Result<Option<SessionId>> {
        let Some(raw_id) = &event.session_id else {
            return Ok(None);
        };
        let key = SessionKey {
            external_id: raw_id.as_str().to_string(),
            machine_id: event.machine_id.clone(),
            source: event.source.clone(),
        };
        if let Some(found) = self.store.find_session_by_key(&key)? {
            return Ok(Some(found.id));
        }
        if event.event_type != HookEventType::SessionStart {
            return Ok(None);
        }
        let session = Session {
            id: SessionId::generate(),
            external_id: key.external_id,
            machine_id: key.machine_id,
            source: key.source,
            project_id: None,
            parent_session_id: None,
            agent_depth: 0,
            spawned_by_agent_id: None,
            status: SessionStatus::Active,
            title: None,
            created_at_ms: event.timestamp_ms,
            updated_at_ms: event.timestamp_ms,
            cwd: event.cwd.clone(),
            git_branch: None,
            summary_markdown: None,
            compact_markdown: None,
        };
        let id = session.id.clone();
        self.store.write(|tx| self.store.insert_session(tx, &session))?;
        Ok(Some(id))
    }
}

fn canonical_event_name(event_type: HookEventType) -> String {
    serde_json::to_value(event_type)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::ActionRegistry;
    use gobby_core::Source;
    use std::path::PathBuf;

    fn dispatcher(tmp: &std::path::Path) -> HookDispatcher {
        let store = Store::open_in_memory().unwrap();
        let loader = WorkflowLoader::new(Some(tmp.to_path_buf()), tmp.join("global"));
        let engine = WorkflowEngine::new(store.clone(), gobby_eval::HelperRegistry::new(), ActionRegistry::with_builtins());
        let bus = EventBus::new(64);
        HookDispatcher::new(store, loader, engine, bus)
    }

    fn session_start_event(id: &str) -> HookEvent {
        HookEvent {
            event_type: HookEventType::SessionStart,
            session_id: Some(SessionId::new(id)),
            source: Source::ClaudeCode,
            timestamp_ms: 1,
            machine_id: "m1".into(),
            cwd: PathBuf::from("/tmp"),
            data: serde_json::json!({}),
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn session_start_registers_a_new_session() {
        let tmp = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(tmp.path());
        let ctx = Context::new("m1");
        let response = dispatcher.dispatch(&ctx, session_start_event("ext-1")).await;
        assert_eq!(response.decision, Decision::Allow);

        let key = SessionKey {
            external_id: "ext-1".into(),
            machine_id: "m1".into(),
            source: Source::ClaudeCode,
        };
        assert!(dispatcher.store.find_session_by_key(&key).unwrap().is_some());
    }

    #[tokio::test]
    async fn disabled_dispatcher_always_allows() {
        let tmp = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(tmp.path()).with_enabled(false);
        let ctx = Context::new("m1");
        let response = dispatcher.dispatch(&ctx, session_start_event("ext-2")).await;
        assert_eq!(response.decision, Decision::Allow);

        let key = SessionKey {
            external_id: "ext-2".into(),
            machine_id: "m1".into(),
            source: Source::ClaudeCode,
        };
        assert!(dispatcher.store.find_session_by_key(&key).unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_session_on_non_start_event_is_allow_with_no_registration() {
        let tmp = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(tmp.path());
        let ctx = Context::new("m1");
        let mut event = session_start_event("ext-3");
        event.event_type = HookEventType::BeforeTool;
        let response = dispatcher.dispatch(&ctx, event).await;
        assert_eq!(response.decision, Decision::Allow);

        let key = SessionKey {
            external_id: "ext-3".into(),
            machine_id: "m1".into(),
            source: Source::ClaudeCode,
        };
        assert!(dispatcher.store.find_session_by_key(&key).unwrap().is_none());
    }
}
