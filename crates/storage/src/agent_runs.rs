// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent run repository (CORE §4.C8 Agent Supervisor's persisted ledger).

use gobby_core::{AgentRun, AgentRunId, AgentRunStatus, Error, ExecutionMode, Result, SessionId};
use rusqlite::params;

use crate::listeners::TableOp;
use crate::store::{map_write_err, Store, WriteTx};

fn mode_to_str(m: ExecutionMode) -> &'static str {
    match m {
        ExecutionMode::InProcess => "in_process",
        ExecutionMode::Terminal => "terminal",
        ExecutionMode::Embedded => "embedded",
        ExecutionMode::Headless => "headless",
    }
}

fn mode_from_str(s: &str) -> Result<ExecutionMode> {
    Ok(match s {
        "in_process" => ExecutionMode::InProcess,
        "terminal" => ExecutionMode::Terminal,
        "embedded" => ExecutionMode::Embedded,
        "headless" => ExecutionMode::Headless,
        other => return Err(Error::internal(format!("unknown execution mode {other}"))),
    })
}

fn status_to_str(s: AgentRunStatus) -> &'static str {
    match s {
        AgentRunStatus::Pending => "pending",
        AgentRunStatus::Running => "running",
        AgentRunStatus::Success => "success",
        AgentRunStatus::Error => "error",
        AgentRunStatus::Timeout => "timeout",
        AgentRunStatus::Cancelled => "cancelled",
    }
}

fn status_from_str(s: &str) -> Result<AgentRunStatus> {
    Ok(match s {
        "pending" => AgentRunStatus::Pending,
        "running" => AgentRunStatus::Running,
        "success" => AgentRunStatus::Success,
        "error" => AgentRunStatus::Error,
        "timeout" => AgentRunStatus::Timeout,
        "cancelled" => AgentRunStatus::Cancelled,
        other => return Err(Error::internal(format!("unknown agent run status {other}"))),
    })
}

const SELECT_COLUMNS: &str = "id, parent_session_id, child_session_id, workflow_name, prompt, provider, \
     model, mode, status, turns_used, tool_calls_count, created_at_ms, started_at_ms, completed_at_ms, \
     result, error, timeout_minutes, max_turns";

fn row_to_agent_run(row: &rusqlite::Row) -> rusqlite::Result<Result<AgentRun>> {
    let mode = match mode_from_str(&row.get::<_, String>(7)?) {
        Ok(m) => m,
        Err(e) => return Ok(Err(e)),
    };
    let status = match status_from_str(&row.get::<_, String>(8)?) {
        Ok(s) => s,
        Err(e) => return Ok(Err(e)),
    };
    Ok(Ok(AgentRun {
        id: AgentRunId::new(row.get::<_, String>(0)?),
        parent_session_id: SessionId::new(row.get::<_, String>(1)?),
        child_session_id: row.get::<_, Option<String>>(2)?.map(SessionId::new),
        workflow_name: row.get(3)?,
        prompt: row.get(4)?,
        provider: row.get(5)?,
        model: row.get(6)?,
        mode,
        status,
        turns_used: row.get::<_, i64>(9)? as u32,
        tool_calls_count: row.get::<_, i64>(10)? as u32,
        created_at_ms: row.get::<_, i64>(11)? as u64,
        started_at_ms: row.get::<_, Option<i64>>(12)?.map(|v| v as u64),
        completed_at_ms: row.get::<_, Option<i64>>(13)?.map(|v| v as u64),
        result: row.get(14)?,
        error: row.get(15)?,
        timeout_minutes: row.get::<_, Option<i64>>(16)?.map(|v| v as u32),
        max_turns: row.get::<_, Option<i64>>(17)?.map(|v| v as u32),
    }))
}

impl Store {
    pub fn insert_agent_run(&self, tx: &mut WriteTx, run: &AgentRun) -> Result<()> {
        tx.conn()
            .execute(
                &format!(
                    "INSERT INTO agent_runs ({SELECT_COLUMNS}) \
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)"
                ),
                params![
                    run.id.as_str(),
                    run.parent_session_id.as_str(),
                    run.child_session_id.as_ref().map(|s| s.as_str()),
                    run.workflow_name,
                    run.prompt,
                    run.provider,
                    run.model,
                    mode_to_str(run.mode),
                    status_to_str(run.status),
                    run.turns_used,
                    run.tool_calls_count,
                    run.created_at_ms as i64,
                    run.started_at_ms.map(|v| v as i64),
                    run.completed_at_ms.map(|v| v as i64),
                    run.result,
                    run.error,
                    run.timeout_minutes,
                    run.max_turns,
                ],
            )
            .map_err(|e| map_write_err(e, "insert agent run"))?;
        tx.notify(TableOp::Insert { table: "agent_runs".into(), id: run.id.to_string() });
        Ok(())
    }

    pub fn update_agent_run_status(
        &self,
        tx: &mut WriteTx,
        id: &AgentRunId,
        status: AgentRunStatus,
        result: Option<&str>,
        error: Option<&str>,
        now_ms: u64,
    ) -> Result<()> {
        let completed_at = if status.is_terminal() { Some(now_ms as i64) } else { None };
        tx.conn()
            .execute(
                "UPDATE agent_runs SET status = ?1, result = COALESCE(?2, result), \
                 error = COALESCE(?3, error), completed_at_ms = COALESCE(?4, completed_at_ms) \
                 WHERE id = ?5",
                params![status_to_str(status), result, error, completed_at, id.as_str()],
            )
            .map_err(|e| map_write_err(e, "update agent run status"))?;
        tx.notify(TableOp::Update { table: "agent_runs".into(), id: id.to_string() });
        Ok(())
    }

    pub fn get_agent_run(&self, id: &AgentRunId) -> Result<AgentRun> {
        self.read(|conn| {
            conn.query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM agent_runs WHERE id = ?1"),
                params![id.as_str()],
                row_to_agent_run,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("agent run {id}")),
                other => other.into(),
            })?
        })
    }

    /// Running agent runs whose `started_at_ms` predates `older_than_ms` —
    /// reap candidates for the supervisor's timeout sweep.
    pub fn list_running_agent_runs_older_than(&self, older_than_ms: u64) -> Result<Vec<AgentRun>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM agent_runs \
                 WHERE status = 'running' AND started_at_ms IS NOT NULL AND started_at_ms < ?1"
            ))?;
            let rows = stmt.query_map(params![older_than_ms as i64], row_to_agent_run)?;
            let mut runs = Vec::new();
            for row in rows {
                runs.push(row??);
            }
            Ok(runs)
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
                        id: SessionId::new("sess-1"),
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
    fn insert_then_get_roundtrips() {
        let store = seeded();
        let run = AgentRun::builder().id("r1").status(AgentRunStatus::Pending).build();
        store.write(|tx| store.insert_agent_run(tx, &run)).unwrap();

        let fetched = store.get_agent_run(&run.id).unwrap();
        assert_eq!(fetched.status, AgentRunStatus::Pending);
    }

    #[test]
    fn terminal_status_update_stamps_completed_at() {
        let store = seeded();
        let run = AgentRun::builder().id("r1").status(AgentRunStatus::Running).build();
        store.write(|tx| store.insert_agent_run(tx, &run)).unwrap();

        store
            .write(|tx| {
                store.update_agent_run_status(tx, &run.id, AgentRunStatus::Success, Some("done"), None, 500)
            })
            .unwrap();

        let fetched = store.get_agent_run(&run.id).unwrap();
        assert_eq!(fetched.status, AgentRunStatus::Success);
        assert_eq!(fetched.completed_at_ms, Some(500));
        assert_eq!(fetched.result.as_deref(), Some("done"));
    }

    #[test]
    fn reap_sweep_finds_only_stale_running_runs() {
        let store = seeded();
        let mut stale = AgentRun::builder().id("stale").status(AgentRunStatus::Running).build();
        stale.started_at_ms = Some(0);
        let mut fresh = AgentRun::builder().id("fresh").status(AgentRunStatus::Running).build();
        fresh.started_at_ms = Some(1_000_000);
        store.write(|tx| store.insert_agent_run(tx, &stale)).unwrap();
        store.write(|tx| store.insert_agent_run(tx, &fresh)).unwrap();

        let candidates = store.list_running_agent_runs_older_than(500).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, stale.id);
    }
}
