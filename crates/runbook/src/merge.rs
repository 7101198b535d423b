// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `extends` merge semantics for workflow definitions (CORE §4.C5):
//! "child fields override parent; lists of steps or triggers merge by
//! name."

use gobby_core::{Step, Trigger, WorkflowDefinition};

pub fn merge_workflow(parent: WorkflowDefinition, child: WorkflowDefinition) -> WorkflowDefinition {
    WorkflowDefinition {
        name: child.name,
        kind: child.kind,
        extends: None,
        steps: merge_steps(parent.steps, child.steps),
        triggers: merge_triggers(parent.triggers, child.triggers),
    }
}

fn merge_steps(parent: Vec<Step>, child: Vec<Step>) -> Vec<Step> {
    let mut result = parent;
    for step in child {
        match result.iter_mut().find(|s| s.name == step.name) {
            Some(existing) => *existing = step,
            None => result.push(step),
        }
    }
    result
}

fn merge_triggers(parent: Vec<Trigger>, child: Vec<Trigger>) -> Vec<Trigger> {
    let mut result = parent;
    for trigger in child {
        match result.iter_mut().find(|t| t.event_type == trigger.event_type) {
            Some(existing) => *existing = trigger,
            None => result.push(trigger),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use gobby_core::{ActionSpec, ToolFilter, WorkflowKind};

    fn step(name: &str) -> Step {
        Step {
            name: name.into(),
            allowed_tools: ToolFilter::All,
            blocked_tools: vec![],
            rules: vec![],
            transitions: vec![],
            exit_conditions: vec![],
            on_enter: vec![],
            on_exit: vec![],
        }
    }

    fn def(name: &str, steps: Vec<Step>) -> WorkflowDefinition {
        WorkflowDefinition {
            name: name.into(),
            kind: WorkflowKind::Step,
            extends: None,
            steps,
            triggers: vec![],
        }
    }

    #[test]
    fn child_step_overrides_same_named_parent_step() {
        let mut overridden = step("draft");
        overridden.blocked_tools = vec!["bash".into()];
        let parent = def("base", vec![step("draft"), step("review")]);
        let child = def("strict", vec![overridden]);

        let merged = merge_workflow(parent, child);
        assert_eq!(merged.steps.len(), 2);
        assert_eq!(merged.steps[0].blocked_tools, vec!["bash".to_string()]);
        assert_eq!(merged.steps[1].name, "review");
    }

    #[test]
    fn child_only_step_is_appended() {
        let parent = def("base", vec![step("draft")]);
        let child = def("extended", vec![step("ship")]);

        let merged = merge_workflow(parent, child);
        assert_eq!(merged.steps.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), vec!["draft", "ship"]);
    }

    #[test]
    fn merged_name_and_kind_come_from_child() {
        let parent = def("base", vec![]);
        let mut child = def("specific", vec![]);
        child.kind = WorkflowKind::Step;

        let merged = merge_workflow(parent, child);
        assert_eq!(merged.name, "specific");
        assert!(merged.extends.is_none());
    }

    #[test]
    fn trigger_merges_by_event_type() {
        let mut parent = def("base", vec![]);
        parent.triggers.push(Trigger {
            event_type: "before_agent".into(),
            when: None,
            actions: vec![ActionSpec { action: "log".into(), params: serde_json::Value::Null }],
        });
        let mut child = def("specific", vec![]);
        child.triggers.push(Trigger {
            event_type: "before_agent".into(),
            when: Some("true".into()),
            actions: vec![ActionSpec { action: "inject_context".into(), params: serde_json::Value::Null }],
        });

        let merged = merge_workflow(parent, child);
        assert_eq!(merged.triggers.len(), 1);
        assert_eq!(merged.triggers[0].actions[0].action, "inject_context");
    }
}
