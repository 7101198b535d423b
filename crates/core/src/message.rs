// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message — transcript entries and inter-session mailbox messages.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    pub struct MessageId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePriority {
    Normal,
    Urgent,
}

impl Default for MessagePriority {
    fn default() -> Self {
        MessagePriority::Normal
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub session_id: SessionId,
    pub role: String,
    pub content: String,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterSessionMessage {
    pub id: MessageId,
    pub from_session_id: SessionId,
    pub to_session_id: SessionId,
    pub body: String,
    #[serde(default)]
    pub priority: MessagePriority,
    pub created_at_ms: u64,
    pub read_at_ms: Option<u64>,
}

impl InterSessionMessage {
    pub fn is_unread(&self) -> bool {
        self.read_at_ms.is_none()
    }

    pub fn mark_read(&mut self, now_ms: u64) {
        if self.read_at_ms.is_none() {
            self.read_at_ms = Some(now_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg() -> InterSessionMessage {
        InterSessionMessage {
            id: MessageId::new("msg-1"),
            from_session_id: SessionId::new("a"),
            to_session_id: SessionId::new("b"),
            body: "hello".into(),
            priority: MessagePriority::Normal,
            created_at_ms: 0,
            read_at_ms: None,
        }
    }

    #[test]
    fn unread_until_marked() {
        let mut m = msg();
        assert!(m.is_unread());
        m.mark_read(100);
        assert!(!m.is_unread());
        assert_eq!(m.read_at_ms, Some(100));
    }

    #[test]
    fn marking_read_twice_keeps_first_timestamp() {
        let mut m = msg();
        m.mark_read(100);
        m.mark_read(200);
        assert_eq!(m.read_at_ms, Some(100));
    }

    #[test]
    fn urgent_outranks_normal() {
        assert!(MessagePriority::Urgent > MessagePriority::Normal);
    }
}
