// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline definitions and runtime execution records (CORE §4.C10).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    pub struct PipelineExecutionId;
}

crate::define_id! {
    pub struct StepExecutionId;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalSpec {
    pub required: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Untagged so the flattened form on the wire is just `exec: "..."` or
/// `prompt: "..."`, not a nested `{exec: {exec: "..."}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepBody {
    Exec { exec: String },
    Prompt { prompt: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    pub id: String,
    #[serde(flatten)]
    pub body: StepBody,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub input: serde_json::Value,
    #[serde(default)]
    pub approval: Option<ApprovalSpec>,
    #[serde(default)]
    pub continue_on_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    #[serde(default)]
    pub inputs_schema: serde_json::Value,
    pub steps: Vec<PipelineStep>,
    #[serde(default)]
    pub outputs: HashMap<String, String>,
}

impl PipelineDefinition {
    pub fn step(&self, id: &str) -> Option<&PipelineStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Validates that no step references a step declared after it, and
    /// that every `$<step_id>.output...` reference resolves to a real
    /// step (CORE §4.C10 loader invariant).
    pub fn validate_no_forward_references(&self) -> Result<(), crate::error::Error> {
        let mut seen: Vec<&str> = Vec::new();
        for step in &self.steps {
            if let StepBody::Prompt { prompt } = &step.body {
                check_refs(prompt, &seen, &step.id)?;
            }
            if let StepBody::Exec { exec } = &step.body {
                check_refs(exec, &seen, &step.id)?;
            }
            if let Some(cond) = &step.condition {
                check_refs(cond, &seen, &step.id)?;
            }
            seen.push(step.id.as_str());
        }
        Ok(())
    }
}

fn check_refs(text: &str, visible: &[&str], current_step: &str) -> Result<(), crate::error::Error> {
    let ids: Vec<String> = text
        .match_indices('$')
        .filter_map(|(i, _)| {
            let rest = &text[i + 1..];
            let id: String = rest
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
                .collect();
            if id.is_empty() || id == "inputs" {
                None
            } else {
                Some(id)
            }
        })
        .collect();
    for id in &ids {
        if !visible.contains(&id.as_str()) {
            return Err(crate::error::Error::validation(format!(
                "step '{current_step}' references unknown or forward step '{id}'"
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    WaitingApproval,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineExecution {
    pub id: PipelineExecutionId,
    pub pipeline_name: String,
    pub status: PipelineStatus,
    #[serde(default)]
    pub inputs: serde_json::Value,
    #[serde(default)]
    pub outputs: serde_json::Value,
    pub resume_token: Option<String>,
    pub created_at_ms: u64,
    pub completed_at_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepExecution {
    pub id: StepExecutionId,
    pub execution_id: PipelineExecutionId,
    pub step_id: String,
    pub status: StepStatus,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub approval_token: Option<String>,
    pub started_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> PipelineDefinition {
        PipelineDefinition {
            name: "release".into(),
            inputs_schema: serde_json::json!({}),
            steps: vec![
                PipelineStep {
                    id: "build".into(),
                    body: StepBody::Exec { exec: "cargo build".into() },
                    condition: None,
                    input: serde_json::Value::Null,
                    approval: None,
                    continue_on_error: false,
                },
                PipelineStep {
                    id: "notify".into(),
                    body: StepBody::Prompt { prompt: "summarize $build.output".into() },
                    condition: None,
                    input: serde_json::Value::Null,
                    approval: None,
                    continue_on_error: false,
                },
            ],
            outputs: HashMap::new(),
        }
    }

    #[test]
    fn accepts_backward_references() {
        assert!(pipeline().validate_no_forward_references().is_ok());
    }

    #[test]
    fn rejects_forward_references() {
        let mut p = pipeline();
        p.steps[0].body = StepBody::Exec {
            exec: "echo $notify.output".into(),
        };
        let err = p.validate_no_forward_references().unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn inputs_reference_is_not_treated_as_a_step() {
        let mut p = pipeline();
        p.steps[0].body = StepBody::Exec {
            exec: "echo $inputs.branch".into(),
        };
        assert!(p.validate_no_forward_references().is_ok());
    }
}
