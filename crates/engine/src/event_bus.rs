// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process multi-consumer event fan-out (CORE §4.C2).
//!
//! Producers publish [`BusEvent`]s; consumers subscribe with an optional
//! `(event_type, filter)` predicate. Delivery is best-effort: a slow
//! consumer's bounded queue drops its oldest entries rather than stalling
//! the producer. `tokio::sync::broadcast` already implements exactly this
//! "ring buffer, lagging readers skip ahead" policy, so it's the transport;
//! the wrapper here just turns a lag into a counted, logged drop instead of
//! a bare error the caller has to know to handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gobby_core::BusEvent;
use tokio::sync::broadcast;

/// Default bound on a consumer's queue before the oldest entries start
/// getting dropped (CORE §5: "bounded per-consumer queues (default 256)").
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish an event to every current subscriber. Never blocks: a
    /// channel with no subscribers simply discards the event.
    pub fn publish(&self, event: BusEvent) {
        // send() only errors when there are zero receivers, which is not a
        // failure from the producer's point of view.
        let _ = self.sender.send(event);
    }

    /// Total events dropped across all subscribers due to a slow consumer
    /// falling behind the ring buffer (exposed at `/admin/metrics`).
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Subscribe with an optional filter; events not matching `filter` are
    /// skipped without counting against the caller's lag budget.
    pub fn subscribe(&self, filter: Option<EventFilter>) -> BusSubscription {
        BusSubscription {
            receiver: self.sender.subscribe(),
            filter,
            dropped: self.dropped.clone(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A `(event_type, session_id)` subscription filter; either side `None`
/// matches everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub event_type: Option<gobby_core::HookEventType>,
    pub session_id: Option<gobby_core::SessionId>,
}

impl EventFilter {
    fn matches(&self, event: &BusEvent) -> bool {
        if let Some(want) = &self.event_type {
            if &event.event_type != want {
                return false;
            }
        }
        if let Some(want) = &self.session_id {
            if event.session_id.as_ref() != Some(want) {
                return false;
            }
        }
        true
    }
}

pub struct BusSubscription {
    receiver: broadcast::Receiver<BusEvent>,
    filter: Option<EventFilter>,
    dropped: Arc<AtomicU64>,
}

impl BusSubscription {
    /// Await the next event matching this subscription's filter, recording
    /// (and skipping past) any lag the underlying channel reports.
    pub async fn recv(&mut self) -> Option<BusEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    let matches = self.filter.as_ref().map(|f| f.matches(&event)).unwrap_or(true);
                    if matches {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    self.dropped.fetch_add(skipped, Ordering::Relaxed);
                    tracing::warn!(skipped, "event bus consumer lagged, dropping oldest events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gobby_core::{HookEventType, SessionId, Source};

    fn event(event_type: HookEventType, session_id: &str) -> BusEvent {
        BusEvent {
            event_type,
            session_id: Some(SessionId::new(session_id)),
            source: Source::ClaudeCode,
            timestamp_ms: 0,
            machine_id: "m1".into(),
            data: serde_json::json!({}),
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe(None);
        bus.publish(event(HookEventType::BeforeTool, "s1"));
        let received = sub.recv().await.unwrap();
        assert_eq!(received.session_id, Some(SessionId::new("s1")));
    }

    #[tokio::test]
    async fn filter_skips_non_matching_events() {
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe(Some(EventFilter {
            event_type: None,
            session_id: Some(SessionId::new("s1")),
        }));
        bus.publish(event(HookEventType::BeforeTool, "other"));
        bus.publish(event(HookEventType::BeforeTool, "s1"));
        let received = sub.recv().await.unwrap();
        assert_eq!(received.session_id, Some(SessionId::new("s1")));
    }

    #[tokio::test]
    async fn slow_consumer_drops_oldest_and_counts_them() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe(None);
        for i in 0..5 {
            bus.publish(event(HookEventType::BeforeTool, &format!("s{i}")));
        }
        // The subscriber is behind; recv() should skip the lag rather than hang.
        let received = sub.recv().await;
        assert!(received.is_some());
        assert!(bus.dropped_count() > 0);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new(8);
        bus.publish(event(HookEventType::SessionStart, "s1"));
    }
}
