// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The unified hook event/response shapes (CORE §4.C6) and the Event Bus's
//! own transient event envelope (CORE §3).

use crate::session::{SessionId, Source};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The closed set of hook event types a vendor adapter may translate a
/// native payload into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEventType {
    SessionStart,
    SessionEnd,
    BeforeAgent,
    AfterAgent,
    BeforeTool,
    AfterTool,
    PreCompact,
    SubagentStart,
    SubagentStop,
    Notification,
    BeforeToolSelection,
    BeforeModel,
    AfterModel,
    PermissionRequest,
    Stop,
}

impl HookEventType {
    pub const ALL: [HookEventType; 15] = [
        HookEventType::SessionStart,
        HookEventType::SessionEnd,
        HookEventType::BeforeAgent,
        HookEventType::AfterAgent,
        HookEventType::BeforeTool,
        HookEventType::AfterTool,
        HookEventType::PreCompact,
        HookEventType::SubagentStart,
        HookEventType::SubagentStop,
        HookEventType::Notification,
        HookEventType::BeforeToolSelection,
        HookEventType::BeforeModel,
        HookEventType::AfterModel,
        HookEventType::PermissionRequest,
        HookEventType::Stop,
    ];

    pub fn is_tool_call(self) -> bool {
        matches!(self, HookEventType::BeforeTool | HookEventType::AfterTool)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookEvent {
    pub event_type: HookEventType,
    pub session_id: Option<SessionId>,
    pub source: Source,
    pub timestamp_ms: u64,
    pub machine_id: String,
    pub cwd: PathBuf,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
    Modify,
    Block,
}

impl Decision {
    /// Combine per CORE §4.C6 step 5: any `deny`/`block` wins over
    /// `allow`; `modify` is weaker than deny/block but stronger than
    /// allow (its context still gets merged).
    pub fn combine(self, other: Decision) -> Decision {
        use Decision::*;
        match (self, other) {
            (Deny, _) | (_, Deny) => Deny,
            (Block, _) | (_, Block) => Block,
            (Modify, _) | (_, Modify) => Modify,
            _ => Allow,
        }
    }
}

impl Default for Decision {
    fn default() -> Self {
        Decision::Allow
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookResponse {
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl HookResponse {
    pub fn allow() -> Self {
        HookResponse::default()
    }

    /// Merge another response's context into this one by concatenation,
    /// in registration order (CORE §4.C6 step 4), and upgrade the
    /// decision via `Decision::combine`.
    pub fn merge(mut self, other: HookResponse) -> Self {
        self.decision = self.decision.combine(other.decision);
        self.context = match (self.context.take(), other.context) {
            (Some(a), Some(b)) => Some(format!("{a}\n{b}")),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };
        if other.reason.is_some() {
            self.reason = other.reason;
        }
        if other.system_message.is_some() {
            self.system_message = other.system_message;
        }
        self
    }
}

/// A transient record on the Event Bus. Not all instances are persisted;
/// persistence is a per-subscriber decision (CORE §3 Event).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub event_type: HookEventType,
    pub session_id: Option<SessionId>,
    pub source: Source,
    pub timestamp_ms: u64,
    pub machine_id: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub metadata: serde_json::Value,
}
