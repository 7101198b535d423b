// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AgentRun — a spawned subagent invocation, tracked from spawn request
//! through completion or reap.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    pub struct AgentRunId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    InProcess,
    Terminal,
    Embedded,
    Headless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRunStatus {
    Pending,
    Running,
    Success,
    Error,
    Timeout,
    Cancelled,
}

impl AgentRunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AgentRunStatus::Success
                | AgentRunStatus::Error
                | AgentRunStatus::Timeout
                | AgentRunStatus::Cancelled
        )
    }
}

impl fmt::Display for AgentRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentRunStatus::Pending => "pending",
            AgentRunStatus::Running => "running",
            AgentRunStatus::Success => "success",
            AgentRunStatus::Error => "error",
            AgentRunStatus::Timeout => "timeout",
            AgentRunStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    pub id: AgentRunId,
    pub parent_session_id: SessionId,
    pub child_session_id: Option<SessionId>,
    pub workflow_name: Option<String>,
    pub prompt: String,
    pub provider: String,
    pub model: Option<String>,
    pub mode: ExecutionMode,
    pub status: AgentRunStatus,
    pub turns_used: u32,
    pub tool_calls_count: u32,
    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
    pub result: Option<String>,
    pub error: Option<String>,
    /// Per-run timeout override in minutes; `None` uses the configured
    /// default (CORE §4.C8 reaping: `running > N min`, default 30).
    pub timeout_minutes: Option<u32>,
    pub max_turns: Option<u32>,
}

impl AgentRun {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(any(test, feature = "test-support"))]
pub struct AgentRunBuilder {
    inner: AgentRun,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for AgentRunBuilder {
    fn default() -> Self {
        Self {
            inner: AgentRun {
                id: AgentRunId::new("run-1"),
                parent_session_id: SessionId::new("sess-1"),
                child_session_id: None,
                workflow_name: None,
                prompt: "do the thing".into(),
                provider: "claude".into(),
                model: None,
                mode: ExecutionMode::Headless,
                status: AgentRunStatus::Pending,
                turns_used: 0,
                tool_calls_count: 0,
                created_at_ms: 0,
                started_at_ms: None,
                completed_at_ms: None,
                result: None,
                error: None,
                timeout_minutes: None,
                max_turns: None,
            },
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl AgentRunBuilder {
    pub fn id(mut self, v: impl Into<String>) -> Self {
        self.inner.id = AgentRunId::new(v);
        self
    }
    pub fn parent(mut self, v: impl Into<String>) -> Self {
        self.inner.parent_session_id = SessionId::new(v);
        self
    }
    pub fn status(mut self, v: AgentRunStatus) -> Self {
        self.inner.status = v;
        self
    }
    pub fn mode(mut self, v: ExecutionMode) -> Self {
        self.inner.mode = v;
        self
    }
    pub fn build(self) -> AgentRun {
        self.inner
    }
}

#[cfg(any(test, feature = "test-support"))]
impl AgentRun {
    pub fn builder() -> AgentRunBuilder {
        AgentRunBuilder::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(AgentRunStatus::Success.is_terminal());
        assert!(AgentRunStatus::Error.is_terminal());
        assert!(AgentRunStatus::Timeout.is_terminal());
        assert!(AgentRunStatus::Cancelled.is_terminal());
        assert!(!AgentRunStatus::Pending.is_terminal());
        assert!(!AgentRunStatus::Running.is_terminal());
    }

    #[test]
    fn builder_produces_sane_defaults() {
        let run = AgentRun::builder().id("run-7").build();
        assert_eq!(run.id.as_str(), "run-7");
        assert_eq!(run.status, AgentRunStatus::Pending);
    }
}
