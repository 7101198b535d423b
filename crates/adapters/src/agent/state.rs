// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Point-in-time agent liveness state and the watcher's event channel
//! message type.
//!
//! `AgentState` is distinct from `gobby_core::AgentRunStatus`: the latter
//! is the persisted, terminal-oriented status stored on the `agent_runs`
//! row, while this tracks the provider process's own state between polls
//! (working, waiting for input, gone) as observed by the session log
//! watcher.

use gobby_core::{AgentRunId, SessionId};
use std::fmt;

/// State of an agent as detected from monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentState {
    /// Agent is actively working (processing or running tools).
    Working,
    /// Agent finished a turn and is waiting for user input.
    WaitingForInput,
    /// Agent encountered a failure.
    Failed(FailureReason),
    /// Agent process exited.
    Exited { exit_code: Option<i32> },
    /// Agent's session is gone (process terminated unexpectedly).
    SessionGone,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentState::Working => write!(f, "working"),
            AgentState::WaitingForInput => write!(f, "waiting for input"),
            AgentState::Failed(reason) => write!(f, "failed: {}", reason),
            AgentState::Exited {
                exit_code: Some(code),
            } => write!(f, "exited with code {}", code),
            AgentState::Exited { exit_code: None } => write!(f, "exited"),
            AgentState::SessionGone => write!(f, "session gone"),
        }
    }
}

/// Categorized failure reason extracted from a provider's session log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Invalid API key or authentication failure.
    Unauthorized,
    /// Exceeded quota or billing issue.
    OutOfCredits,
    /// Network connectivity issue.
    NoInternet,
    /// Rate limited by the provider.
    RateLimited,
    /// Other error with message.
    Other(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Unauthorized => write!(f, "unauthorized"),
            FailureReason::OutOfCredits => write!(f, "out of credits"),
            FailureReason::NoInternet => write!(f, "no internet connection"),
            FailureReason::RateLimited => write!(f, "rate limited"),
            FailureReason::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Message sent from the watcher to whoever is supervising an agent (the
/// engine crate's Agent Supervisor).
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// The agent's liveness state changed.
    StateChanged {
        agent_id: AgentRunId,
        state: AgentState,
        session_id: SessionId,
    },
    /// The agent is idle (from the Notification hook rather than log polling).
    AgentIdle { agent_id: AgentRunId },
    /// The agent's tmux session disappeared before a log was ever found.
    AgentGone {
        agent_id: AgentRunId,
        session_id: SessionId,
    },
}

impl AgentEvent {
    pub fn from_agent_state(agent_id: AgentRunId, state: AgentState, session_id: SessionId) -> Self {
        AgentEvent::StateChanged {
            agent_id,
            state,
            session_id,
        }
    }
}
