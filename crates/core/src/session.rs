// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session — a single conversation with one agent CLI.
//!
//! Uniquely keyed by `(external_id, machine_id, source)`. Forms a DAG via
//! `parent_session_id` with `agent_depth` tracking distance from the
//! user-rooted root (depth 0).

use crate::project::ProjectId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a session (internal; distinct from the vendor
    /// CLI's own `external_id`).
    pub struct SessionId;
}

/// Vendor tag identifying which agent CLI produced this session. The adapter
/// layer that speaks each vendor's native hook schema is out of this crate's
/// scope; this enum is the closed set the core dispatches on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    ClaudeCode,
    Codex,
    Cursor,
    Gemini,
    Other(String),
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::ClaudeCode => write!(f, "claude-code"),
            Source::Codex => write!(f, "codex"),
            Source::Cursor => write!(f, "cursor"),
            Source::Gemini => write!(f, "gemini"),
            Source::Other(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Paused,
    HandoffReady,
    Archived,
    Expired,
}

impl SessionStatus {
    /// The fixed transition table from CORE §4.C3: `active ↔ paused`,
    /// `active → handoff_ready → archived`, `any → expired`, `archived` is
    /// terminal.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (Archived, _) => false,
            (_, Expired) => true,
            (Active, Paused) | (Paused, Active) => true,
            (Active, HandoffReady) => true,
            (HandoffReady, Archived) => true,
            (same, other) if same == other => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub external_id: String,
    pub machine_id: String,
    pub source: Source,
    pub project_id: Option<ProjectId>,
    pub parent_session_id: Option<SessionId>,
    pub agent_depth: u32,
    pub spawned_by_agent_id: Option<String>,
    pub status: SessionStatus,
    pub title: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    pub cwd: std::path::PathBuf,
    pub git_branch: Option<String>,
    pub summary_markdown: Option<String>,
    pub compact_markdown: Option<String>,
}

/// The composite natural key identifying a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub external_id: String,
    pub machine_id: String,
    pub source: Source,
}

/// Safety limit on the number of hops `session_depth` will walk before
/// assuming a cycle (CORE §4.C3).
pub const MAX_DEPTH_HOPS: u32 = 11;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_and_paused_transition_both_ways() {
        assert!(SessionStatus::Active.can_transition_to(SessionStatus::Paused));
        assert!(SessionStatus::Paused.can_transition_to(SessionStatus::Active));
    }

    #[test]
    fn archived_is_terminal() {
        assert!(!SessionStatus::Archived.can_transition_to(SessionStatus::Active));
        assert!(!SessionStatus::Archived.can_transition_to(SessionStatus::Paused));
    }

    #[test]
    fn any_status_can_expire() {
        for s in [
            SessionStatus::Active,
            SessionStatus::Paused,
            SessionStatus::HandoffReady,
        ] {
            assert!(s.can_transition_to(SessionStatus::Expired));
        }
    }

    #[test]
    fn handoff_chain_is_linear() {
        assert!(SessionStatus::Active.can_transition_to(SessionStatus::HandoffReady));
        assert!(SessionStatus::HandoffReady.can_transition_to(SessionStatus::Archived));
        assert!(!SessionStatus::Paused.can_transition_to(SessionStatus::Archived));
    }
}
