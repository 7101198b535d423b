// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The step machine itself (CORE §4.C5 "Event handling" steps 1-8).

use std::collections::HashMap;
use std::sync::Arc;

use gobby_core::{
    Context, Decision, HookEvent, HookEventType, HookResponse, PendingApproval, RuleAction, Step,
    WorkflowDefinition, WorkflowInstance,
};
use gobby_eval::{EvalContext, HelperRegistry, Value};
use gobby_storage::Store;
use serde_json::Value as Json;

use crate::error::{EngineError, Result};
use crate::workflow::actions::{ActionContext, ActionOutcome, ActionRegistry};

/// Default stuck-detection ceiling (CORE §4.C5 step 2): 30 minutes.
pub const DEFAULT_STUCK_CEILING_MS: u64 = 30 * 60 * 1000;
/// Default approval deadline when a rule doesn't specify one: 10 minutes.
pub const DEFAULT_APPROVAL_DEADLINE_MS: u64 = 10 * 60 * 1000;

pub struct WorkflowEngine {
    store: Store,
    helpers: HelperRegistry,
    actions: ActionRegistry,
}

impl WorkflowEngine {
    pub fn new(store: Store, helpers: HelperRegistry, actions: ActionRegistry) -> Self {
        Self {
            store,
            helpers,
            actions,
        }
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Drive one inbound event through a single step-workflow instance,
    /// per CORE §4.C5's numbered algorithm. Returns the combined
    /// `HookResponse`, mutating `instance` in place; the caller persists it.
    pub fn handle_step_event(
        &self,
        ctx: &Context,
        instance: &mut WorkflowInstance,
        definition: &WorkflowDefinition,
        event: &HookEvent,
        now_ms: u64,
    ) -> Result<HookResponse> {
        if !instance.enabled {
            return Ok(HookResponse::allow());
        }

        // Step 2: stuck detection.
        if instance.is_stuck(now_ms, DEFAULT_STUCK_CEILING_MS) {
            if let Some(recover) = definition.step("reflect").or_else(|| definition.step("recover")) {
                let from = instance.step.clone();
                self.run_exit_actions(ctx, instance, definition, now_ms)?;
                instance.transition_to(recover.name.clone(), now_ms);
                self.run_enter_actions(ctx, instance, recover, now_ms)?;
                self.persist(instance)?;
                return Ok(HookResponse {
                    decision: Decision::Modify,
                    reason: Some(format!(
                        "stuck in step '{}' for longer than the configured ceiling; forced to '{}'",
                        from.unwrap_or_default(),
                        recover.name
                    )),
                    context: None,
                    system_message: Some(format!(
                        "This session appeared stuck and was moved to the '{}' step.",
                        recover.name
                    )),
                    metadata: Json::Null,
                });
            }
        }

        // Step 3: load the current step; missing means allow.
        let Some(step_name) = instance.step.clone() else {
            return Ok(HookResponse::allow());
        };
        let Some(step) = definition.step(&step_name) else {
            return Ok(HookResponse::allow());
        };

        let mut response = HookResponse::allow();

        // Step 4: tool gating, only for tool-call events.
        if event.event_type.is_tool_call() {
            if let Some(tool_name) = event.data.get("tool_name").and_then(|v| v.as_str()) {
                if step.blocked_tools.iter().any(|t| t == tool_name) {
                    response.decision = Decision::Deny;
                    response.reason = Some(format!("tool '{tool_name}' blocked in step '{step_name}'"));
                    return Ok(response);
                }
                if let gobby_core::ToolFilter::Named(allowed) = &step.allowed_tools {
                    if !allowed.iter().any(|t| t == tool_name) {
                        response.decision = Decision::Deny;
                        response.reason = Some(format!(
                            "tool '{tool_name}' not in allowed_tools for step '{step_name}'"
                        ));
                        return Ok(response);
                    }
                }
            }
        }

        // Step 5: rules, first match wins.
        for rule in &step.rules {
            if self.eval_condition(&rule.condition, instance, event)? {
                let outcome = self.action_for_rule(ctx, instance, rule, event)?;
                response = response.merge_outcome(&outcome);
                if matches!(rule.action, RuleAction::Block) {
                    return Ok(response);
                }
                break;
            }
        }

        // Step 6: transitions, first match wins.
        let mut transitioned = false;
        for transition in &step.transitions {
            if self.eval_condition(&transition.condition, instance, event)? {
                self.transition(ctx, instance, definition, &transition.target, now_ms)?;
                transitioned = true;
                break;
            }
        }

        // Step 7: exit conditions (only checked if we didn't just transition).
        if !transitioned && !step.exit_conditions.is_empty() {
            let mut all_pass = true;
            for cond in &step.exit_conditions {
                if !self.eval_condition(cond, instance, event)? {
                    all_pass = false;
                    break;
                }
            }
            if all_pass {
                match definition.next_step_after(&step_name) {
                    Some(next) => {
                        let next = next.to_string();
                        self.transition(ctx, instance, definition, &next, now_ms)?;
                    }
                    None => {
                        instance.enabled = false;
                    }
                }
            }
        }

        // Step 8: per-step/total action counters on tool_result (after_tool).
        if event.event_type == HookEventType::AfterTool {
            instance.step_action_count += 1;
            instance.total_action_count += 1;
        }

        self.persist(instance)?;
        Ok(response)
    }

    /// CORE §4.C5 "Transitions": on_exit, mutate state, persist, on_enter.
    /// Manual (caller-driven) transitions to a step reachable by a
    /// `when`-gated auto-transition are rejected unless `force=true`.
    pub fn transition(
        &self,
        ctx: &Context,
        instance: &mut WorkflowInstance,
        definition: &WorkflowDefinition,
        target: &str,
        now_ms: u64,
    ) -> Result<()> {
        if definition.step(target).is_none() {
            return Err(EngineError::UnknownStep(target.to_string()));
        }
        self.run_exit_actions(ctx, instance, definition, now_ms)?;
        instance.transition_to(target.to_string(), now_ms);
        if let Some(step) = definition.step(target) {
            self.run_enter_actions(ctx, instance, step, now_ms)?;
        }
        Ok(())
    }

    /// Manual transition entry point guarding the `force` rule above.
    pub fn manual_transition(
        &self,
        ctx: &Context,
        instance: &mut WorkflowInstance,
        definition: &WorkflowDefinition,
        target: &str,
        force: bool,
        now_ms: u64,
    ) -> Result<()> {
        if !force {
            let guarded = definition.steps.iter().any(|s| {
                s.transitions
                    .iter()
                    .any(|t| t.target == target && !t.condition.trim().is_empty())
            });
            if guarded {
                return Err(EngineError::Core(gobby_core::Error::invalid_state(format!(
                    "step '{target}' has an auto-transition guard; pass force=true to override"
                ))));
            }
        }
        self.transition(ctx, instance, definition, target, now_ms)
    }

    fn run_exit_actions(
        &self,
        ctx: &Context,
        instance: &mut WorkflowInstance,
        definition: &WorkflowDefinition,
        now_ms: u64,
    ) -> Result<()> {
        if let Some(current) = instance.step.clone() {
            if let Some(step) = definition.step(&current) {
                let specs = step.on_exit.clone();
                self.run_action_specs(ctx, instance, &specs, now_ms)?;
            }
        }
        Ok(())
    }

    fn run_enter_actions(
        &self,
        ctx: &Context,
        instance: &mut WorkflowInstance,
        step: &Step,
        now_ms: u64,
    ) -> Result<()> {
        let specs = step.on_enter.clone();
        self.run_action_specs(ctx, instance, &specs, now_ms)
    }

    fn run_action_specs(
        &self,
        ctx: &Context,
        instance: &mut WorkflowInstance,
        specs: &[gobby_core::ActionSpec],
        _now_ms: u64,
    ) -> Result<()> {
        for spec in specs {
            let action_ctx = ActionContext {
                ctx,
                session_id: &instance.session_id,
                variables: &instance.variables,
                params: &spec.params,
            };
            // Actions run fail-open per-action: one misbehaving on_enter
            // action must not prevent the rest of the chain from running,
            // matching the dispatcher's overall fail-open policy (CORE
            // §4.C6).
            match self.actions.dispatch(&spec.action, &action_ctx) {
                Ok(outcome) => {
                    for (k, v) in outcome.variable_updates {
                        instance.variables.insert(k, v);
                    }
                }
                Err(e) => {
                    tracing::warn!(action = %spec.action, error = %e, "workflow action failed, continuing");
                }
            }
        }
        Ok(())
    }

    fn action_for_rule(
        &self,
        _ctx: &Context,
        instance: &mut WorkflowInstance,
        rule: &gobby_core::Rule,
        _event: &HookEvent,
    ) -> Result<ActionOutcome> {
        match rule.action {
            RuleAction::Block => Ok(ActionOutcome {
                decision: Some(Decision::Block),
                reason: rule.message.clone(),
                ..Default::default()
            }),
            RuleAction::Warn => Ok(ActionOutcome {
                decision: Some(Decision::Allow),
                system_message: rule.message.clone(),
                ..Default::default()
            }),
            RuleAction::Modify => Ok(ActionOutcome {
                decision: Some(Decision::Modify),
                context: rule.message.clone(),
                ..Default::default()
            }),
            RuleAction::RequireApproval => {
                let condition_id = format!("{:x}", stable_hash(&rule.condition));
                instance.pending_approval = Some(PendingApproval {
                    condition_id: condition_id.clone(),
                    prompt: rule.message.clone().unwrap_or_else(|| "Approval required".to_string()),
                    deadline_ms: wall_clock_now_ms() + DEFAULT_APPROVAL_DEADLINE_MS,
                });
                Ok(ActionOutcome {
                    decision: Some(Decision::Modify),
                    system_message: rule.message.clone(),
                    ..Default::default()
                })
            }
        }
    }

    /// Resolve an affirmative/negative token on the next `before_agent`
    /// event against a pending approval (CORE §4.C5 "Approvals").
    pub fn resolve_approval(&self, instance: &mut WorkflowInstance, now_ms: u64, affirmative: bool) -> Result<()> {
        let Some(pending) = instance.pending_approval.take() else {
            return Err(EngineError::NoSuchApproval("no approval pending".to_string()));
        };
        let expired = now_ms > pending.deadline_ms;
        let granted = affirmative && !expired;
        let key = if granted {
            format!("_approval_{}_granted", pending.condition_id)
        } else {
            format!("_approval_{}_rejected", pending.condition_id)
        };
        instance.variables.insert(key, Json::Bool(true));
        Ok(())
    }

    fn eval_condition(&self, condition: &str, instance: &WorkflowInstance, event: &HookEvent) -> Result<bool> {
        if condition.trim().is_empty() {
            return Ok(false);
        }
        let root = build_eval_root(instance, event);
        let eval_ctx = EvalContext {
            root: &root,
            helpers: &self.helpers,
        };
        gobby_eval::evaluate(condition, &eval_ctx)
            .map_err(|e| EngineError::Core(gobby_core::Error::validation(format!("condition '{condition}': {e}"))))
    }

    fn persist(&self, instance: &WorkflowInstance) -> Result<()> {
        self.store.write(|tx| self.store.upsert_workflow_instance(tx, instance))?;
        Ok(())
    }
}

fn build_eval_root(instance: &WorkflowInstance, event: &HookEvent) -> Value {
    let mut variables = serde_json::Map::new();
    for (k, v) in &instance.variables {
        variables.insert(k.clone(), v.clone());
    }
    let mut map = serde_json::Map::new();
    map.insert("variables".into(), Json::Object(variables));
    map.insert("event".into(), event.data.clone());
    map.insert("session_id".into(), Json::String(instance.session_id.as_str().to_string()));
    map.insert("step".into(), instance.step.clone().map(Json::String).unwrap_or(Json::Null));
    gobby_eval::context_from_map(map)
}

// Deterministic short hash for approval condition ids, avoiding a random
// source inside what's otherwise a pure function over the rule text.
fn stable_hash(s: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

fn wall_clock_now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// `HookResponse` is defined in `gobby_core`; this local trait is the
/// orphan-rule-legal way to attach an `ActionOutcome`-merging helper to it.
trait MergeOutcomeExt {
    fn merge_outcome(self, outcome: &ActionOutcome) -> Self;
}

impl MergeOutcomeExt for HookResponse {
    fn merge_outcome(mut self, outcome: &ActionOutcome) -> Self {
        if let Some(decision) = outcome.decision {
            self.decision = self.decision.combine(decision);
        }
        self.context = match (self.context.take(), &outcome.context) {
            (Some(a), Some(b)) => Some(format!("{a}\n{b}")),
            (Some(a), None) => Some(a),
            (None, b) => b.clone(),
        };
        if outcome.reason.is_some() {
            self.reason = outcome.reason.clone();
        }
        if outcome.system_message.is_some() {
            self.system_message = outcome.system_message.clone();
        }
        self
    }
}
