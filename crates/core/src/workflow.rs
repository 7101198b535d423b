// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow definitions and runtime instance state (CORE §4.C5).
//!
//! This module holds only the data shapes: step/lifecycle definitions as
//! loaded from YAML, and the per-session runtime state the engine mutates.
//! Evaluation lives in the engine crate; this crate stays free of any
//! dispatch logic so both the engine and the daemon's read-only surfaces
//! (status queries, the admin API) can depend on the same types.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    pub struct WorkflowInstanceId;
}

/// A condition string, evaluated by the expression evaluator crate against
/// a session's variables and helper predicates. Kept opaque here; parsing
/// and evaluation is the eval crate's job.
pub type Condition = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFilter {
    All,
    Named(Vec<String>),
}

impl Default for ToolFilter {
    fn default() -> Self {
        ToolFilter::Named(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Block,
    Warn,
    RequireApproval,
    Modify,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub condition: Condition,
    pub action: RuleAction,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub condition: Condition,
    pub target: String,
}

/// A named, pluggable action spec. `params` is passed verbatim to the
/// action's registered handler (CORE §4.C5 "Actions are named and
/// pluggable; the engine only knows their registration table").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    pub action: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(default)]
    pub allowed_tools: ToolFilter,
    #[serde(default)]
    pub blocked_tools: Vec<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub exit_conditions: Vec<Condition>,
    #[serde(default)]
    pub on_enter: Vec<ActionSpec>,
    #[serde(default)]
    pub on_exit: Vec<ActionSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    /// Canonical event type name; aliases (e.g. `on_before_agent` ≡
    /// `on_prompt_submit`) are resolved by the loader into the canonical
    /// form before this struct is constructed.
    pub event_type: String,
    #[serde(default)]
    pub when: Option<Condition>,
    pub actions: Vec<ActionSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Step,
    Lifecycle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    pub kind: WorkflowKind,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

impl WorkflowDefinition {
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn first_step_name(&self) -> Option<&str> {
        self.steps.first().map(|s| s.name.as_str())
    }

    /// The step immediately after `current` in declaration order, per
    /// CORE §4.C5 step 7: "advance to the next-linearly-declared step".
    pub fn next_step_after(&self, current: &str) -> Option<&str> {
        let idx = self.steps.iter().position(|s| s.name == current)?;
        self.steps.get(idx + 1).map(|s| s.name.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingApproval {
    pub condition_id: String,
    pub prompt: String,
    pub deadline_ms: u64,
}

/// Per-session, per-workflow runtime state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: WorkflowInstanceId,
    pub session_id: SessionId,
    pub workflow_name: String,
    pub kind: WorkflowKind,
    pub enabled: bool,
    pub step: Option<String>,
    pub step_entered_at_ms: u64,
    pub step_action_count: u32,
    pub total_action_count: u32,
    pub context_injected: bool,
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
    pub pending_approval: Option<PendingApproval>,
}

impl WorkflowInstance {
    pub fn new_step_instance(
        id: WorkflowInstanceId,
        session_id: SessionId,
        workflow_name: impl Into<String>,
        first_step: impl Into<String>,
        now_ms: u64,
    ) -> Self {
        WorkflowInstance {
            id,
            session_id,
            workflow_name: workflow_name.into(),
            kind: WorkflowKind::Step,
            enabled: true,
            step: Some(first_step.into()),
            step_entered_at_ms: now_ms,
            step_action_count: 0,
            total_action_count: 0,
            context_injected: false,
            variables: HashMap::new(),
            pending_approval: None,
        }
    }

    /// Whether the configured stuck-detection ceiling has elapsed since
    /// entering the current step (CORE §4.C5 step 2, default 30 min).
    pub fn is_stuck(&self, now_ms: u64, ceiling_ms: u64) -> bool {
        now_ms.saturating_sub(self.step_entered_at_ms) > ceiling_ms
    }

    /// Mutates state to reflect entering `target`: resets per-step
    /// counters and the context-injection flag (CORE §4.C5 "Transitions").
    /// Caller is responsible for running on_exit/on_enter actions around
    /// this call.
    pub fn transition_to(&mut self, target: impl Into<String>, now_ms: u64) {
        self.step = Some(target.into());
        self.step_entered_at_ms = now_ms;
        self.step_action_count = 0;
        self.context_injected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def() -> WorkflowDefinition {
        WorkflowDefinition {
            name: "review".into(),
            kind: WorkflowKind::Step,
            extends: None,
            steps: vec![
                Step {
                    name: "draft".into(),
                    allowed_tools: ToolFilter::All,
                    blocked_tools: vec![],
                    rules: vec![],
                    transitions: vec![],
                    exit_conditions: vec![],
                    on_enter: vec![],
                    on_exit: vec![],
                },
                Step {
                    name: "review".into(),
                    allowed_tools: ToolFilter::All,
                    blocked_tools: vec![],
                    rules: vec![],
                    transitions: vec![],
                    exit_conditions: vec![],
                    on_enter: vec![],
                    on_exit: vec![],
                },
            ],
            triggers: vec![],
        }
    }

    #[test]
    fn next_step_follows_declaration_order() {
        let d = def();
        assert_eq!(d.next_step_after("draft"), Some("review"));
        assert_eq!(d.next_step_after("review"), None);
    }

    #[test]
    fn stuck_detection_uses_configured_ceiling() {
        let inst = WorkflowInstance::new_step_instance(
            WorkflowInstanceId::new("wi-1"),
            SessionId::new("s1"),
            "review",
            "draft",
            0,
        );
        assert!(!inst.is_stuck(1_000, 1_800_000));
        assert!(inst.is_stuck(1_800_001, 1_800_000));
    }

    #[test]
    fn transition_resets_step_counters() {
        let mut inst = WorkflowInstance::new_step_instance(
            WorkflowInstanceId::new("wi-1"),
            SessionId::new("s1"),
            "review",
            "draft",
            0,
        );
        inst.step_action_count = 5;
        inst.context_injected = true;
        inst.transition_to("review", 500);
        assert_eq!(inst.step.as_deref(), Some("review"));
        assert_eq!(inst.step_action_count, 0);
        assert!(!inst.context_injected);
        assert_eq!(inst.step_entered_at_ms, 500);
    }
}
