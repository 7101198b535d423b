// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project — a workspace root. Created on first session registration in a
//! directory; destroyed only by explicit user action.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a project.
    pub struct ProjectId;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub repo_path: PathBuf,
    #[serde(default)]
    pub upstream: Vec<String>,
    /// Path to a parent project, when this project is itself a worktree
    /// checkout spawned for an agent run.
    #[serde(default)]
    pub parent_project_path: Option<PathBuf>,
    pub created_at_ms: u64,
}

/// On-disk marker written at `<project>/.gobby/project.json`, used to walk
/// upward from a session's `cwd` and assign it to a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMarker {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub parent_project_path: Option<PathBuf>,
}

/// Walk upward from `start` looking for a `.gobby/project.json` marker file.
/// Returns the marker and the directory it was found in.
pub fn find_project_marker(start: &std::path::Path) -> Option<(ProjectMarker, PathBuf)> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        let candidate = d.join(".gobby").join("project.json");
        if let Ok(bytes) = std::fs::read(&candidate) {
            if let Ok(marker) = serde_json::from_slice::<ProjectMarker>(&bytes) {
                return Some((marker, d.to_path_buf()));
            }
        }
        dir = d.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_marker_in_ancestor_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let gobby_dir = tmp.path().join(".gobby");
        std::fs::create_dir_all(&gobby_dir).unwrap();
        let marker = ProjectMarker {
            id: ProjectId::new("proj-1"),
            name: "demo".into(),
            parent_project_path: None,
        };
        std::fs::write(
            gobby_dir.join("project.json"),
            serde_json::to_vec(&marker).unwrap(),
        )
        .unwrap();

        let nested = tmp.path().join("src").join("lib");
        std::fs::create_dir_all(&nested).unwrap();

        let (found, root) = find_project_marker(&nested).expect("marker found");
        assert_eq!(found.id, marker.id);
        assert_eq!(root, tmp.path());
    }

    #[test]
    fn returns_none_when_absent() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(find_project_marker(tmp.path()).is_none());
    }
}
