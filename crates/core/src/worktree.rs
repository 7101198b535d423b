// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree — an isolated git working directory linked to a branch, claimed
//! by at most one session at a time.

use crate::project::ProjectId;
use crate::session::SessionId;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    pub struct WorktreeId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorktreeStatus {
    Active,
    Stale,
    Merged,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worktree {
    pub id: WorktreeId,
    pub project_id: ProjectId,
    pub branch_name: String,
    pub base_branch: String,
    pub worktree_path: PathBuf,
    pub status: WorktreeStatus,
    pub agent_session_id: Option<SessionId>,
    pub task_id: Option<TaskId>,
    pub created_at_ms: u64,
    pub last_synced_at_ms: Option<u64>,
}

impl Worktree {
    pub fn is_claimed(&self) -> bool {
        self.agent_session_id.is_some()
    }

    /// Compare-and-swap claim: succeeds only when currently unclaimed.
    /// Mirrors the Store's `CAS agent_session_id from null -> session_id`
    /// semantics (CORE §4.C9); the actual atomicity lives in the store
    /// layer, this is the in-memory precondition check.
    pub fn try_claim(&mut self, session: SessionId) -> Result<(), crate::error::Error> {
        if self.is_claimed() {
            return Err(crate::error::Error::conflict(format!(
                "worktree {} already claimed",
                self.id
            )));
        }
        self.agent_session_id = Some(session);
        Ok(())
    }

    pub fn release(&mut self) {
        self.agent_session_id = None;
    }

    /// Whether this worktree is idle long enough to be marked stale, given
    /// `now_ms` and a threshold in milliseconds.
    pub fn is_stale(&self, now_ms: u64, threshold_ms: u64) -> bool {
        if self.status != WorktreeStatus::Active || self.is_claimed() {
            return false;
        }
        let last_activity = self.last_synced_at_ms.unwrap_or(self.created_at_ms);
        now_ms.saturating_sub(last_activity) > threshold_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worktree() -> Worktree {
        Worktree {
            id: WorktreeId::new("wt-1"),
            project_id: ProjectId::new("p1"),
            branch_name: "agent/wt-1".into(),
            base_branch: "main".into(),
            worktree_path: PathBuf::from("/tmp/wt-1"),
            status: WorktreeStatus::Active,
            agent_session_id: None,
            task_id: None,
            created_at_ms: 0,
            last_synced_at_ms: None,
        }
    }

    #[test]
    fn claim_succeeds_when_unclaimed() {
        let mut wt = worktree();
        assert!(wt.try_claim(SessionId::new("s1")).is_ok());
        assert!(wt.is_claimed());
    }

    #[test]
    fn claim_fails_when_already_claimed() {
        let mut wt = worktree();
        wt.try_claim(SessionId::new("s1")).unwrap();
        let err = wt.try_claim(SessionId::new("s2")).unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[test]
    fn stale_detection_respects_threshold_and_claim() {
        let mut wt = worktree();
        assert!(!wt.is_stale(1_000, 500));
        assert!(wt.is_stale(1_000_000, 500));

        wt.try_claim(SessionId::new("s1")).unwrap();
        assert!(!wt.is_stale(1_000_000, 500));
    }
}
