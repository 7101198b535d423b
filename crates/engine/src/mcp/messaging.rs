// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `messaging` MCP server (CORE §4.C7): inter-session mail, restricted to
//! direct parent/child lineage.

use gobby_core::{Error, InterSessionMessage, MessageId, MessagePriority, SessionId, SessionStatus};
use gobby_storage::Store;
use serde_json::{json, Value as Json};

use super::{now_ms, opt_str_arg, str_arg};
use crate::error::{EngineError, Result};

pub fn call(store: &Store, caller: &SessionId, tool: &str, args: &Json) -> Result<Json> {
    match tool {
        "send_to_parent" => send_to_parent(store, caller, args),
        "send_to_child" => send_to_child(store, caller, args),
        "broadcast_to_children" => broadcast_to_children(store, caller, args),
        "list_unread" => list_unread(store, caller),
        other => Err(super::unknown_tool("messaging", other)),
    }
}

fn priority(args: &Json) -> MessagePriority {
    match opt_str_arg(args, "priority") {
        Some("urgent") => MessagePriority::Urgent,
        _ => MessagePriority::Normal,
    }
}

fn send(store: &Store, from: &SessionId, to: &SessionId, body: &str, priority: MessagePriority) -> Result<InterSessionMessage> {
    let message = InterSessionMessage {
        id: MessageId::generate(),
        from_session_id: from.clone(),
        to_session_id: to.clone(),
        body: body.to_string(),
        priority,
        created_at_ms: now_ms(),
        read_at_ms: None,
    };
    store.write(|tx| store.send_inter_session_message(tx, &message))?;
    Ok(message)
}

fn send_to_parent(store: &Store, caller: &SessionId, args: &Json) -> Result<Json> {
    let session = store.get_session(caller)?;
    let parent = session
        .parent_session_id
        .ok_or_else(|| EngineError::Core(Error::validation("session has no parent")))?;
    let message = send(store, caller, &parent, str_arg(args, "body")?, priority(args))?;
    Ok(serde_json::to_value(message).unwrap_or(Json::Null))
}

fn send_to_child(store: &Store, caller: &SessionId, args: &Json) -> Result<Json> {
    let target = SessionId::new(str_arg(args, "session_id")?);
    let children = store.list_child_sessions(caller)?;
    if !children.iter().any(|c| c.id == target) {
        return Err(EngineError::Core(Error::validation(format!("{target} is not a direct child of {caller}"))));
    }
    let message = send(store, caller, &target, str_arg(args, "body")?, priority(args))?;
    Ok(serde_json::to_value(message).unwrap_or(Json::Null))
}

fn broadcast_to_children(store: &Store, caller: &SessionId, args: &Json) -> Result<Json> {
    let body = str_arg(args, "body")?;
    let prio = priority(args);
    let children = store.list_child_sessions(caller)?;
    let mut sent = 0u32;
    let mut skipped = 0u32;
    for child in children {
        if child.status != SessionStatus::Active {
            skipped += 1;
            continue;
        }
        send(store, caller, &child.id, body, prio)?;
        sent += 1;
    }
    Ok(json!({ "sent": sent, "skipped": skipped }))
}

fn list_unread(store: &Store, caller: &SessionId) -> Result<Json> {
    let messages = store.list_unread_for_session(caller)?;
    Ok(serde_json::to_value(messages).unwrap_or(Json::Null))
}
