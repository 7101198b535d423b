// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transcript message and inter-session mailbox repositories.

use gobby_core::{Error, InterSessionMessage, Message, MessageId, MessagePriority, Result, SessionId};
use rusqlite::params;

use crate::listeners::TableOp;
use crate::store::{map_write_err, Store, WriteTx};

fn priority_to_str(p: MessagePriority) -> &'static str {
    match p {
        MessagePriority::Normal => "normal",
        MessagePriority::Urgent => "urgent",
    }
}

fn priority_from_str(s: &str) -> Result<MessagePriority> {
    Ok(match s {
        "normal" => MessagePriority::Normal,
        "urgent" => MessagePriority::Urgent,
        other => return Err(Error::internal(format!("unknown message priority {other}"))),
    })
}

impl Store {
    pub fn insert_message(&self, tx: &mut WriteTx, message: &Message) -> Result<()> {
        tx.conn()
            .execute(
                "INSERT INTO messages (id, session_id, role, content, created_at_ms) VALUES (?1,?2,?3,?4,?5)",
                params![
                    message.id.as_str(),
                    message.session_id.as_str(),
                    message.role,
                    message.content,
                    message.created_at_ms as i64,
                ],
            )
            .map_err(|e| map_write_err(e, "insert message"))?;
        tx.notify(TableOp::Insert { table: "messages".into(), id: message.id.to_string() });
        Ok(())
    }

    pub fn list_messages_for_session(&self, session_id: &SessionId) -> Result<Vec<Message>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, role, content, created_at_ms FROM messages \
                 WHERE session_id = ?1 ORDER BY created_at_ms",
            )?;
            let rows = stmt.query_map(params![session_id.as_str()], |row| {
                Ok(Message {
                    id: MessageId::new(row.get::<_, String>(0)?),
                    session_id: SessionId::new(row.get::<_, String>(1)?),
                    role: row.get(2)?,
                    content: row.get(3)?,
                    created_at_ms: row.get::<_, i64>(4)? as u64,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
        })
    }

    pub fn send_inter_session_message(&self, tx: &mut WriteTx, message: &InterSessionMessage) -> Result<()> {
        tx.conn()
            .execute(
                "INSERT INTO inter_session_messages \
                 (id, from_session_id, to_session_id, body, priority, created_at_ms, read_at_ms) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7)",
                params![
                    message.id.as_str(),
                    message.from_session_id.as_str(),
                    message.to_session_id.as_str(),
                    message.body,
                    priority_to_str(message.priority),
                    message.created_at_ms as i64,
                    message.read_at_ms.map(|v| v as i64),
                ],
            )
            .map_err(|e| map_write_err(e, "send inter-session message"))?;
        tx.notify(TableOp::Insert { table: "inter_session_messages".into(), id: message.id.to_string() });
        Ok(())
    }

    pub fn mark_message_read(&self, tx: &mut WriteTx, id: &MessageId, now_ms: u64) -> Result<()> {
        tx.conn()
            .execute(
                "UPDATE inter_session_messages SET read_at_ms = COALESCE(read_at_ms, ?1) WHERE id = ?2",
                params![now_ms as i64, id.as_str()],
            )
            .map_err(|e| map_write_err(e, "mark message read"))?;
        tx.notify(TableOp::Update { table: "inter_session_messages".into(), id: id.to_string() });
        Ok(())
    }

    pub fn list_unread_for_session(&self, to: &SessionId) -> Result<Vec<InterSessionMessage>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, from_session_id, to_session_id, body, priority, created_at_ms, read_at_ms \
                 FROM inter_session_messages WHERE to_session_id = ?1 AND read_at_ms IS NULL \
                 ORDER BY priority DESC, created_at_ms",
            )?;
            let rows = stmt.query_map(params![to.as_str()], row_to_inter_session_message)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row??);
            }
            Ok(messages)
        })
    }
}

fn row_to_inter_session_message(row: &rusqlite::Row) -> rusqlite::Result<Result<InterSessionMessage>> {
    let priority = match priority_from_str(&row.get::<_, String>(4)?) {
        Ok(p) => p,
        Err(e) => return Ok(Err(e)),
    };
    Ok(Ok(InterSessionMessage {
        id: MessageId::new(row.get::<_, String>(0)?),
        from_session_id: SessionId::new(row.get::<_, String>(1)?),
        to_session_id: SessionId::new(row.get::<_, String>(2)?),
        body: row.get(3)?,
        priority,
        created_at_ms: row.get::<_, i64>(5)? as u64,
        read_at_ms: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .write(|tx| {
                for id in ["a", "b"] {
                    store.insert_session(
                        tx,
                        &gobby_core::Session {
                            id: SessionId::new(id),
                            external_id: format!("ext-{id}"),
                            machine_id: "m1".into(),
                            source: gobby_core::Source::ClaudeCode,
                            project_id: None,
                            parent_session_id: None,
                            agent_depth: 0,
                            spawned_by_agent_id: None,
                            status: gobby_core::SessionStatus::Active,
                            title: None,
                            created_at_ms: 0,
                            updated_at_ms: 0,
                            cwd: "/tmp".into(),
                            git_branch: None,
                            summary_markdown: None,
                            compact_markdown: None,
                        },
                    )?;
                }
                Ok(())
            })
            .unwrap();
        store
    }

    #[test]
    fn unread_ordering_puts_urgent_first() {
        let store = seeded();
        let normal = InterSessionMessage {
            id: MessageId::new("msg-1"),
            from_session_id: SessionId::new("a"),
            to_session_id: SessionId::new("b"),
            body: "normal".into(),
            priority: MessagePriority::Normal,
            created_at_ms: 0,
            read_at_ms: None,
        };
        let urgent = InterSessionMessage {
            id: MessageId::new("msg-2"),
            from_session_id: SessionId::new("a"),
            to_session_id: SessionId::new("b"),
            body: "urgent".into(),
            priority: MessagePriority::Urgent,
            created_at_ms: 1,
            read_at_ms: None,
        };
        store.write(|tx| store.send_inter_session_message(tx, &normal)).unwrap();
        store.write(|tx| store.send_inter_session_message(tx, &urgent)).unwrap();

        let unread = store.list_unread_for_session(&SessionId::new("b")).unwrap();
        assert_eq!(unread[0].id, urgent.id);
    }

    #[test]
    fn marking_read_removes_from_unread_list() {
        let store = seeded();
        let msg = InterSessionMessage {
            id: MessageId::new("msg-1"),
            from_session_id: SessionId::new("a"),
            to_session_id: SessionId::new("b"),
            body: "hi".into(),
            priority: MessagePriority::Normal,
            created_at_ms: 0,
            read_at_ms: None,
        };
        store.write(|tx| store.send_inter_session_message(tx, &msg)).unwrap();
        store.write(|tx| store.mark_message_read(tx, &msg.id, 100)).unwrap();

        assert!(store.list_unread_for_session(&SessionId::new("b")).unwrap().is_empty());
    }
}
