// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PipelineExecution / StepExecution persistence (CORE §4.C10).

use gobby_core::{
    Error, PipelineExecution, PipelineExecutionId, PipelineStatus, Result, StepExecution, StepExecutionId,
    StepStatus,
};
use rusqlite::{params, OptionalExtension};

use crate::listeners::TableOp;
use crate::store::{map_write_err, Store, WriteTx};

fn pstatus_to_str(s: PipelineStatus) -> &'static str {
    match s {
        PipelineStatus::Pending => "pending",
        PipelineStatus::Running => "running",
        PipelineStatus::Completed => "completed",
        PipelineStatus::Failed => "failed",
    }
}

fn pstatus_from_str(s: &str) -> Result<PipelineStatus> {
    Ok(match s {
        "pending" => PipelineStatus::Pending,
        "running" => PipelineStatus::Running,
        "completed" => PipelineStatus::Completed,
        "failed" => PipelineStatus::Failed,
        other => return Err(Error::internal(format!("unknown pipeline status {other}"))),
    })
}

fn sstatus_to_str(s: StepStatus) -> &'static str {
    match s {
        StepStatus::Pending => "pending",
        StepStatus::Running => "running",
        StepStatus::Completed => "completed",
        StepStatus::Failed => "failed",
        StepStatus::WaitingApproval => "waiting_approval",
        StepStatus::Skipped => "skipped",
    }
}

fn sstatus_from_str(s: &str) -> Result<StepStatus> {
    Ok(match s {
        "pending" => StepStatus::Pending,
        "running" => StepStatus::Running,
        "completed" => StepStatus::Completed,
        "failed" => StepStatus::Failed,
        "waiting_approval" => StepStatus::WaitingApproval,
        "skipped" => StepStatus::Skipped,
        other => return Err(Error::internal(format!("unknown step status {other}"))),
    })
}

const EXEC_COLUMNS: &str = "id, pipeline_name, status, inputs, outputs, resume_token, created_at_ms, completed_at_ms";
const STEP_COLUMNS: &str =
    "id, execution_id, step_id, status, output, error, approval_token, started_at_ms, completed_at_ms";

fn row_to_execution(row: &rusqlite::Row) -> rusqlite::Result<Result<PipelineExecution>> {
    let status = match pstatus_from_str(&row.get::<_, String>(2)?) {
        Ok(s) => s,
        Err(e) => return Ok(Err(e)),
    };
    let inputs_json: String = row.get(3)?;
    let outputs_json: String = row.get(4)?;
    Ok(Ok(PipelineExecution {
        id: PipelineExecutionId::new(row.get::<_, String>(0)?),
        pipeline_name: row.get(1)?,
        status,
        inputs: serde_json::from_str(&inputs_json).unwrap_or(serde_json::Value::Null),
        outputs: serde_json::from_str(&outputs_json).unwrap_or(serde_json::Value::Null),
        resume_token: row.get(5)?,
        created_at_ms: row.get::<_, i64>(6)? as u64,
        completed_at_ms: row.get::<_, Option<i64>>(7)?.map(|v| v as u64),
    }))
}

fn row_to_step(row: &rusqlite::Row) -> rusqlite::Result<Result<StepExecution>> {
    let status = match sstatus_from_str(&row.get::<_, String>(3)?) {
        Ok(s) => s,
        Err(e) => return Ok(Err(e)),
    };
    let output_json: Option<String> = row.get(4)?;
    Ok(Ok(StepExecution {
        id: StepExecutionId::new(row.get::<_, String>(0)?),
        execution_id: PipelineExecutionId::new(row.get::<_, String>(1)?),
        step_id: row.get(2)?,
        status,
        output: output_json.map(|s| serde_json::from_str(&s)).transpose().unwrap_or(None),
        error: row.get(5)?,
        approval_token: row.get(6)?,
        started_at_ms: row.get::<_, Option<i64>>(7)?.map(|v| v as u64),
        completed_at_ms: row.get::<_, Option<i64>>(8)?.map(|v| v as u64),
    }))
}

impl Store {
    pub fn insert_pipeline_execution(&self, tx: &mut WriteTx, exec: &PipelineExecution) -> Result<()> {
        tx.conn()
            .execute(
                &format!("INSERT INTO pipeline_executions ({EXEC_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)"),
                params![
                    exec.id.as_str(),
                    exec.pipeline_name,
                    pstatus_to_str(exec.status),
                    serde_json::to_string(&exec.inputs)?,
                    serde_json::to_string(&exec.outputs)?,
                    exec.resume_token,
                    exec.created_at_ms as i64,
                    exec.completed_at_ms.map(|v| v as i64),
                ],
            )
            .map_err(|e| map_write_err(e, "insert pipeline execution"))?;
        tx.notify(TableOp::Insert { table: "pipeline_executions".into(), id: exec.id.to_string() });
        Ok(())
    }

    pub fn update_pipeline_execution_status(
        &self,
        tx: &mut WriteTx,
        id: &PipelineExecutionId,
        status: PipelineStatus,
        outputs: Option<&serde_json::Value>,
        now_ms: u64,
    ) -> Result<()> {
        let completed_at = matches!(status, PipelineStatus::Completed | PipelineStatus::Failed).then_some(now_ms as i64);
        let outputs_json = outputs.map(serde_json::to_string).transpose()?;
        tx.conn()
            .execute(
                "UPDATE pipeline_executions SET status = ?1, outputs = COALESCE(?2, outputs), \
                 completed_at_ms = COALESCE(?3, completed_at_ms) WHERE id = ?4",
                params![pstatus_to_str(status), outputs_json, completed_at, id.as_str()],
            )
            .map_err(|e| map_write_err(e, "update pipeline execution status"))?;
        tx.notify(TableOp::Update { table: "pipeline_executions".into(), id: id.to_string() });
        Ok(())
    }

    pub fn get_pipeline_execution(&self, id: &PipelineExecutionId) -> Result<PipelineExecution> {
        self.read(|conn| {
            conn.query_row(
                &format!("SELECT {EXEC_COLUMNS} FROM pipeline_executions WHERE id = ?1"),
                params![id.as_str()],
                row_to_execution,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("pipeline execution {id}")),
                other => other.into(),
            })?
        })
    }

    pub fn insert_step_execution(&self, tx: &mut WriteTx, step: &StepExecution) -> Result<()> {
        let output_json = step.output.as_ref().map(serde_json::to_string).transpose()?;
        tx.conn()
            .execute(
                &format!("INSERT INTO step_executions ({STEP_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)"),
                params![
                    step.id.as_str(),
                    step.execution_id.as_str(),
                    step.step_id,
                    sstatus_to_str(step.status),
                    output_json,
                    step.error,
                    step.approval_token,
                    step.started_at_ms.map(|v| v as i64),
                    step.completed_at_ms.map(|v| v as i64),
                ],
            )
            .map_err(|e| map_write_err(e, "insert step execution"))?;
        tx.notify(TableOp::Insert { table: "step_executions".into(), id: step.id.to_string() });
        Ok(())
    }

    pub fn update_step_execution(&self, tx: &mut WriteTx, step: &StepExecution) -> Result<()> {
        let output_json = step.output.as_ref().map(serde_json::to_string).transpose()?;
        tx.conn()
            .execute(
                "UPDATE step_executions SET status = ?1, output = ?2, error = ?3, \
                 approval_token = ?4, started_at_ms = ?5, completed_at_ms = ?6 WHERE id = ?7",
                params![
                    sstatus_to_str(step.status),
                    output_json,
                    step.error,
                    step.approval_token,
                    step.started_at_ms.map(|v| v as i64),
                    step.completed_at_ms.map(|v| v as i64),
                    step.id.as_str(),
                ],
            )
            .map_err(|e| map_write_err(e, "update step execution"))?;
        tx.notify(TableOp::Update { table: "step_executions".into(), id: step.id.to_string() });
        Ok(())
    }

    pub fn list_step_executions(&self, execution_id: &PipelineExecutionId) -> Result<Vec<StepExecution>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {STEP_COLUMNS} FROM step_executions WHERE execution_id = ?1 ORDER BY rowid"
            ))?;
            let rows = stmt.query_map(params![execution_id.as_str()], row_to_step)?;
            let mut steps = Vec::new();
            for row in rows {
                steps.push(row??);
            }
            Ok(steps)
        })
    }

    pub fn find_pipeline_execution_by_resume_token(&self, token: &str) -> Result<Option<PipelineExecution>> {
        self.read(|conn| {
            let result = conn
                .query_row(
                    &format!("SELECT {EXEC_COLUMNS} FROM pipeline_executions WHERE resume_token = ?1"),
                    params![token],
                    row_to_execution,
                )
                .optional()?;
            result.transpose()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_lifecycle_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let exec = PipelineExecution {
            id: PipelineExecutionId::new("pe1"),
            pipeline_name: "release".into(),
            status: PipelineStatus::Running,
            inputs: serde_json::json!({"branch": "main"}),
            outputs: serde_json::Value::Null,
            resume_token: Some("tok-1".into()),
            created_at_ms: 0,
            completed_at_ms: None,
        };
        store.write(|tx| store.insert_pipeline_execution(tx, &exec)).unwrap();

        store
            .write(|tx| {
                store.update_pipeline_execution_status(
                    tx,
                    &exec.id,
                    PipelineStatus::Completed,
                    Some(&serde_json::json!({"artifact": "x"})),
                    1000,
                )
            })
            .unwrap();

        let fetched = store.get_pipeline_execution(&exec.id).unwrap();
        assert_eq!(fetched.status, PipelineStatus::Completed);
        assert_eq!(fetched.completed_at_ms, Some(1000));
        assert_eq!(fetched.outputs["artifact"], "x");

        let by_token = store.find_pipeline_execution_by_resume_token("tok-1").unwrap().unwrap();
        assert_eq!(by_token.id, exec.id);
    }

    #[test]
    fn step_executions_list_in_insertion_order() {
        let store = Store::open_in_memory().unwrap();
        let exec = PipelineExecution {
            id: PipelineExecutionId::new("pe1"),
            pipeline_name: "release".into(),
            status: PipelineStatus::Running,
            inputs: serde_json::Value::Null,
            outputs: serde_json::Value::Null,
            resume_token: None,
            created_at_ms: 0,
            completed_at_ms: None,
        };
        store.write(|tx| store.insert_pipeline_execution(tx, &exec)).unwrap();

        for step_id in ["build", "notify"] {
            let step = StepExecution {
                id: StepExecutionId::new(format!("se-{step_id}")),
                execution_id: exec.id.clone(),
                step_id: step_id.into(),
                status: StepStatus::Pending,
                output: None,
                error: None,
                approval_token: None,
                started_at_ms: None,
                completed_at_ms: None,
            };
            store.write(|tx| store.insert_step_execution(tx, &step)).unwrap();
        }

        let steps = store.list_step_executions(&exec.id).unwrap();
        assert_eq!(steps.iter().map(|s| s.step_id.as_str()).collect::<Vec<_>>(), vec!["build", "notify"]);
    }
}
