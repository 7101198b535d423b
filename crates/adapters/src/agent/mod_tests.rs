// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gobby_core::SessionId;
use std::path::PathBuf;

#[test]
fn agent_error_display() {
    let err = AgentError::NotFound("run-1".to_string());
    assert_eq!(err.to_string(), "agent not found: run-1");

    let err = AgentError::SpawnFailed("boom".to_string());
    assert_eq!(err.to_string(), "spawn failed: boom");
}

#[test]
fn agent_handle_construction() {
    let handle = AgentHandle::new(
        AgentRunId::new("run-1"),
        "gobby-sess-1".to_string(),
        PathBuf::from("/workspace/run-1"),
    );
    assert_eq!(handle.agent_id, AgentRunId::new("run-1"));
    assert_eq!(handle.session_id, "gobby-sess-1");
}

#[test]
fn reconnect_config_carries_parent_session() {
    let config = AgentReconnectConfig {
        agent_id: AgentRunId::new("run-1"),
        parent_session_id: SessionId::new("sess-1"),
        session_id: "gobby-sess-1".to_string(),
        workspace_path: PathBuf::from("/workspace/run-1"),
        process_name: "claude".to_string(),
    };
    assert_eq!(config.parent_session_id, SessionId::new("sess-1"));
}
