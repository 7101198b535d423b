// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact — a content blob captured from a session, indexed for full-text
//! search. Tags are a many-to-many side table, kept here as a plain `Vec`.

use crate::session::SessionId;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    pub struct ArtifactId;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    Code,
    Diff,
    Log,
    Note,
    Other(String),
}

impl ArtifactType {
    /// Best-effort classification from a source file extension, used when
    /// the caller omits `artifact_type` (CORE §3 Artifact).
    pub fn classify(source_file: Option<&str>, content: &str) -> ArtifactType {
        if let Some(path) = source_file {
            let ext = path.rsplit('.').next().unwrap_or("");
            match ext {
                "rs" | "py" | "js" | "ts" | "go" | "java" | "c" | "cpp" | "rb" => {
                    return ArtifactType::Code
                }
                "log" => return ArtifactType::Log,
                _ => {}
            }
        }
        if content.starts_with("diff --git") || content.starts_with("--- ") {
            return ArtifactType::Diff;
        }
        ArtifactType::Note
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub session_id: SessionId,
    pub task_id: Option<TaskId>,
    pub artifact_type: ArtifactType,
    pub content: String,
    pub source_file: Option<String>,
    pub line_start: Option<u32>,
    pub line_end: Option<u32>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(
            ArtifactType::classify(Some("src/main.rs"), ""),
            ArtifactType::Code
        );
        assert_eq!(
            ArtifactType::classify(Some("run.log"), ""),
            ArtifactType::Log
        );
    }

    #[test]
    fn classifies_diff_by_content_when_no_extension_hint() {
        assert_eq!(
            ArtifactType::classify(None, "diff --git a/x b/x\n"),
            ArtifactType::Diff
        );
    }

    #[test]
    fn falls_back_to_note() {
        assert_eq!(ArtifactType::classify(None, "just some thoughts"), ArtifactType::Note);
    }
}
