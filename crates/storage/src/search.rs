// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-entity search composing the FTS match with post-match filters, the
//! way `search_tasks`/`search_artifacts` are specified (CORE §6): "filters
//! are applied after the FTS match. Empty query returns empty."

use gobby_core::{ArtifactType, ProjectId, Result, SessionId, Task, TaskPriority, TaskStatus};

use crate::fts;
use crate::store::Store;

#[derive(Debug, Clone, Default)]
pub struct TaskSearchFilter {
    pub project_id: Option<ProjectId>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

#[derive(Debug, Clone, Default)]
pub struct ArtifactSearchFilter {
    pub session_id: Option<SessionId>,
    pub artifact_type: Option<ArtifactType>,
    pub tag: Option<String>,
}

impl Store {
    /// Empty query returns an empty result set rather than "everything".
    pub fn search_tasks(&self, query: &str, filter: &TaskSearchFilter, limit: u32) -> Result<Vec<Task>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let hits = self.read(|conn| fts::match_tasks(conn, query, limit.max(1)))?;
        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let task = self.get_task(&gobby_core::TaskId::new(hit.task_id))?;
            if let Some(project_id) = &filter.project_id {
                if &task.project_id != project_id {
                    continue;
                }
            }
            if let Some(status) = filter.status {
                if task.status != status {
                    continue;
                }
            }
            if let Some(priority) = filter.priority {
                if task.priority != priority {
                    continue;
                }
            }
            results.push(task);
        }
        Ok(results)
    }

    pub fn search_artifacts(&self, query: &str, filter: &ArtifactSearchFilter, limit: u32) -> Result<Vec<gobby_core::Artifact>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let hits = self.read(|conn| fts::match_artifacts(conn, query, limit.max(1)))?;
        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let artifact = self.get_artifact(&gobby_core::ArtifactId::new(hit.artifact_id))?;
            if let Some(session_id) = &filter.session_id {
                if &artifact.session_id != session_id {
                    continue;
                }
            }
            if let Some(artifact_type) = &filter.artifact_type {
                if &artifact.artifact_type != artifact_type {
                    continue;
                }
            }
            if let Some(tag) = &filter.tag {
                if !artifact.tags.iter().any(|t| t == tag) {
                    continue;
                }
            }
            results.push(artifact);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_returns_empty_not_everything() {
        let store = Store::open_in_memory().unwrap();
        let result = store.search_tasks("", &TaskSearchFilter::default(), 10).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn matches_then_applies_status_filter() {
        let store = Store::open_in_memory().unwrap();
        let project_id = gobby_core::ProjectId::new("p1");
        store
            .write(|tx| {
                store.insert_project(
                    tx,
                    &gobby_core::Project {
                        id: project_id.clone(),
                        name: "demo".into(),
                        repo_path: "/r".into(),
                        upstream: vec![],
                        parent_project_path: None,
                        created_at_ms: 0,
                    },
                )?;
                store.insert_task(
                    tx,
                    &Task {
                        id: gobby_core::TaskId::new("t1"),
                        project_id: project_id.clone(),
                        title: "fix the timeout bug".into(),
                        description: None,
                        status: TaskStatus::Open,
                        task_type: "bug".into(),
                        priority: TaskPriority::Medium,
                        parent_task_id: None,
                        assignee: None,
                        labels: vec![],
                        test_strategy: None,
                        created_at_ms: 0,
                        updated_at_ms: 0,
                    },
                )
            })
            .unwrap();

        let open_hits = store
            .search_tasks("timeout", &TaskSearchFilter { status: Some(TaskStatus::Open), ..Default::default() }, 10)
            .unwrap();
        assert_eq!(open_hits.len(), 1);

        let closed_hits = store
            .search_tasks("timeout", &TaskSearchFilter { status: Some(TaskStatus::Closed), ..Default::default() }, 10)
            .unwrap();
        assert!(closed_hits.is_empty());
    }
}
