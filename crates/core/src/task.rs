// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task — a unit of work tracked by the supervisor and claimable by agents.

use crate::project::ProjectId;
use crate::session::SessionId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    pub struct TaskId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    NeedsReview,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepType {
    Blocks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub task_type: String,
    pub priority: TaskPriority,
    pub parent_task_id: Option<TaskId>,
    pub assignee: Option<SessionId>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub test_strategy: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDependency {
    pub task_id: TaskId,
    pub depends_on: TaskId,
    pub dep_type: DepType,
}

impl Task {
    pub fn is_closeable_given(&self, subtasks: &[Task]) -> bool {
        subtasks.iter().all(|t| t.status == TaskStatus::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, status: TaskStatus) -> Task {
        Task {
            id: TaskId::new(id),
            project_id: ProjectId::new("p1"),
            title: "t".into(),
            description: None,
            status,
            task_type: "feature".into(),
            priority: TaskPriority::Medium,
            parent_task_id: None,
            assignee: None,
            labels: vec![],
            test_strategy: None,
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }

    #[test]
    fn closeable_when_all_subtasks_closed() {
        let parent = task("parent", TaskStatus::InProgress);
        let subtasks = vec![task("a", TaskStatus::Closed), task("b", TaskStatus::Closed)];
        assert!(parent.is_closeable_given(&subtasks));
    }

    #[test]
    fn not_closeable_when_a_subtask_is_open() {
        let parent = task("parent", TaskStatus::InProgress);
        let subtasks = vec![task("a", TaskStatus::Closed), task("b", TaskStatus::Open)];
        assert!(!parent.is_closeable_given(&subtasks));
    }

    #[test]
    fn closeable_with_no_subtasks() {
        let parent = task("parent", TaskStatus::InProgress);
        assert!(parent.is_closeable_given(&[]));
    }
}
