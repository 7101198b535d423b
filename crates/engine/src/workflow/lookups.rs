// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete [`gobby_eval::TaskLookup`]/[`gobby_eval::StopRegistry`]
//! implementations backing the evaluator's helper predicates against the
//! real store and an in-memory stop signal set.

use std::collections::HashSet;
use std::sync::Arc;

use gobby_core::TaskId;
use gobby_eval::{StopRegistry, TaskInfo, TaskLookup};
use gobby_storage::Store;
use parking_lot::Mutex;

pub struct StoreTaskLookup {
    store: Store,
}

impl StoreTaskLookup {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

impl TaskLookup for StoreTaskLookup {
    fn info(&self, task_id: &str) -> Option<TaskInfo> {
        let task = self.store.get_task(&TaskId::new(task_id)).ok()?;
        let status = serde_json::to_value(task.status)
            .ok()?
            .as_str()?
            .to_string();
        Some(TaskInfo {
            requires_user_review: status == "needs_review",
            status,
        })
    }

    fn child_ids(&self, task_id: &str) -> Vec<String> {
        self.store
            .list_subtasks(&TaskId::new(task_id))
            .map(|tasks| tasks.into_iter().map(|t| t.id.as_str().to_string()).collect())
            .unwrap_or_default()
    }
}

/// CORE §4.C4's "small stop-registry" — a set of session ids with a
/// pending stop signal, cleared once consumed. Not store-backed: a stop
/// signal is a transient in-process flag, not durable state.
#[derive(Clone, Default)]
pub struct StoreStopRegistry {
    pending: Arc<Mutex<HashSet<String>>>,
}

impl StoreStopRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self, session_id: &str) {
        self.pending.lock().insert(session_id.to_string());
    }

    pub fn clear(&self, session_id: &str) {
        self.pending.lock().remove(session_id);
    }
}

impl StopRegistry for StoreStopRegistry {
    fn has_pending_signal(&self, session_id: &str) -> bool {
        self.pending.lock().contains(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_registry_signal_and_clear() {
        let reg = StoreStopRegistry::new();
        assert!(!reg.has_pending_signal("s1"));
        reg.signal("s1");
        assert!(reg.has_pending_signal("s1"));
        reg.clear("s1");
        assert!(!reg.has_pending_signal("s1"));
    }
}
