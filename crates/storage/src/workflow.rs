// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WorkflowInstance persistence (CORE §4.C5 runtime state). Definitions
//! themselves are loaded and cached by the runbook crate, not stored here.

use std::collections::HashMap;

use gobby_core::{
    Error, PendingApproval, Result, SessionId, WorkflowInstance, WorkflowInstanceId, WorkflowKind,
};
use rusqlite::{params, OptionalExtension};

use crate::listeners::TableOp;
use crate::store::{map_write_err, Store, WriteTx};

fn kind_to_str(k: WorkflowKind) -> &'static str {
    match k {
        WorkflowKind::Step => "step",
        WorkflowKind::Lifecycle => "lifecycle",
    }
}

fn kind_from_str(s: &str) -> Result<WorkflowKind> {
    Ok(match s {
        "step" => WorkflowKind::Step,
        "lifecycle" => WorkflowKind::Lifecycle,
        other => return Err(Error::internal(format!("unknown workflow kind {other}"))),
    })
}

const SELECT_COLUMNS: &str = "id, session_id, workflow_name, kind, enabled, step, step_entered_at_ms, \
     step_action_count, total_action_count, context_injected, variables, pending_approval";

fn row_to_instance(row: &rusqlite::Row) -> rusqlite::Result<Result<WorkflowInstance>> {
    let kind = match kind_from_str(&row.get::<_, String>(3)?) {
        Ok(k) => k,
        Err(e) => return Ok(Err(e)),
    };
    let variables_json: String = row.get(10)?;
    let variables: HashMap<String, serde_json::Value> = serde_json::from_str(&variables_json).unwrap_or_default();
    let pending_approval_json: Option<String> = row.get(11)?;
    let pending_approval = pending_approval_json
        .map(|s| serde_json::from_str::<PendingApproval>(&s))
        .transpose();
    let pending_approval = match pending_approval {
        Ok(p) => p,
        Err(e) => return Ok(Err(Error::from(e))),
    };
    Ok(Ok(WorkflowInstance {
        id: WorkflowInstanceId::new(row.get::<_, String>(0)?),
        session_id: SessionId::new(row.get::<_, String>(1)?),
        workflow_name: row.get(2)?,
        kind,
        enabled: row.get(4)?,
        step: row.get(5)?,
        step_entered_at_ms: row.get::<_, i64>(6)? as u64,
        step_action_count: row.get::<_, i64>(7)? as u32,
        total_action_count: row.get::<_, i64>(8)? as u32,
        context_injected: row.get(9)?,
        variables,
        pending_approval,
    }))
}

impl Store {
    pub fn upsert_workflow_instance(&self, tx: &mut WriteTx, instance: &WorkflowInstance) -> Result<()> {
        let variables_json = serde_json::to_string(&instance.variables)?;
        let pending_approval_json = instance
            .pending_approval
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        tx.conn()
            .execute(
                "INSERT INTO workflow_instances \
                 (id, session_id, workflow_name, kind, enabled, step, step_entered_at_ms, \
                  step_action_count, total_action_count, context_injected, variables, pending_approval) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12) \
                 ON CONFLICT (session_id, workflow_name) DO UPDATE SET \
                 enabled = excluded.enabled, step = excluded.step, \
                 step_entered_at_ms = excluded.step_entered_at_ms, \
                 step_action_count = excluded.step_action_count, \
                 total_action_count = excluded.total_action_count, \
                 context_injected = excluded.context_injected, \
                 variables = excluded.variables, pending_approval = excluded.pending_approval",
                params![
                    instance.id.as_str(),
                    instance.session_id.as_str(),
                    instance.workflow_name,
                    kind_to_str(instance.kind),
                    instance.enabled,
                    instance.step,
                    instance.step_entered_at_ms as i64,
                    instance.step_action_count,
                    instance.total_action_count,
                    instance.context_injected,
                    variables_json,
                    pending_approval_json,
                ],
            )
            .map_err(|e| map_write_err(e, "upsert workflow instance"))?;
        tx.notify(TableOp::Insert { table: "workflow_instances".into(), id: instance.id.to_string() });
        Ok(())
    }

    pub fn get_workflow_instance(
        &self,
        session_id: &SessionId,
        workflow_name: &str,
    ) -> Result<Option<WorkflowInstance>> {
        self.read(|conn| {
            let result = conn
                .query_row(
                    &format!(
                        "SELECT {SELECT_COLUMNS} FROM workflow_instances \
                         WHERE session_id = ?1 AND workflow_name = ?2"
                    ),
                    params![session_id.as_str(), workflow_name],
                    row_to_instance,
                )
                .optional()?;
            result.transpose()
        })
    }

    pub fn list_workflow_instances_for_session(&self, session_id: &SessionId) -> Result<Vec<WorkflowInstance>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM workflow_instances WHERE session_id = ?1"
            ))?;
            let rows = stmt.query_map(params![session_id.as_str()], row_to_instance)?;
            let mut instances = Vec::new();
            for row in rows {
                instances.push(row??);
            }
            Ok(instances)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .write(|tx| {
                store.insert_session(
                    tx,
                    &gobby_core::Session {
                        id: SessionId::new("s1"),
                        external_id: "e1".into(),
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
                )
            })
            .unwrap();
        store
    }

    #[test]
    fn upsert_then_reupsert_overwrites_step_state() {
        let store = seeded();
        let mut instance = WorkflowInstance::new_step_instance(
            WorkflowInstanceId::new("wi-1"),
            SessionId::new("s1"),
            "review",
            "draft",
            0,
        );
        store.write(|tx| store.upsert_workflow_instance(tx, &instance)).unwrap();

        instance.transition_to("review", 500);
        store.write(|tx| store.upsert_workflow_instance(tx, &instance)).unwrap();

        let fetched = store.get_workflow_instance(&SessionId::new("s1"), "review").unwrap().unwrap();
        assert_eq!(fetched.step.as_deref(), Some("review"));
        assert_eq!(fetched.step_entered_at_ms, 500);
    }

    #[test]
    fn missing_instance_returns_none() {
        let store = seeded();
        assert!(store.get_workflow_instance(&SessionId::new("s1"), "nope").unwrap().is_none());
    }
}
