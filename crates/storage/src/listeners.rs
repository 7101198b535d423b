// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change notification for Sync Projectors (CORE §4.C12) and the Event Bus.
//! Listeners run synchronously, on the writer's thread, after the owning
//! transaction has committed — never on the same connection, so a listener
//! that itself needs to write must go through [`crate::Store::write`] again.

use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOp {
    Insert { table: String, id: String },
    Update { table: String, id: String },
    Delete { table: String, id: String },
}

pub trait ChangeListener: Send + Sync {
    fn on_change(&self, op: &TableOp);
}

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners.write().push(listener);
    }

    pub fn notify(&self, op: &TableOp) {
        for listener in self.listeners.read().iter() {
            listener.on_change(op);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct RecordingListener {
        seen: Mutex<Vec<TableOp>>,
    }

    impl RecordingListener {
        pub fn seen(&self) -> Vec<TableOp> {
            self.seen.lock().clone()
        }
    }

    impl ChangeListener for RecordingListener {
        fn on_change(&self, op: &TableOp) {
            self.seen.lock().push(op.clone());
        }
    }

    #[test]
    fn registry_dispatches_to_every_listener() {
        let registry = ListenerRegistry::new();
        let a = Arc::new(RecordingListener::default());
        let b = Arc::new(RecordingListener::default());
        registry.register(a.clone());
        registry.register(b.clone());

        registry.notify(&TableOp::Insert { table: "tasks".into(), id: "t1".into() });

        assert_eq!(a.seen().len(), 1);
        assert_eq!(b.seen().len(), 1);
    }
}
