// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Context` — a request-scoped value carrying identity, cancellation, and
//! a deadline through component constructors, replacing the module-level
//! singletons (project context, machine id, daemon clients) that the
//! source relied on (CORE §9 Design Notes).

use crate::project::ProjectId;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct Context {
    pub machine_id: String,
    pub project_id: Option<ProjectId>,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl Context {
    pub fn new(machine_id: impl Into<String>) -> Self {
        Context {
            machine_id: machine_id.into(),
            project_id: None,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// A child context sharing this one's cancellation (cancelling the
    /// parent cancels the child) but carrying its own deadline. Used by
    /// the Hook Dispatcher to scope a per-event timeout (CORE §4.C6,
    /// default 30s) beneath the process-wide context.
    pub fn with_deadline(&self, timeout: Duration) -> Self {
        Context {
            machine_id: self.machine_id.clone(),
            project_id: self.project_id.clone(),
            deadline: Some(Instant::now() + timeout),
            cancel: self.cancel.child_token(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
