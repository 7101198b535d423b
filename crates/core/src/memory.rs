// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Memory — a free-form long-term note, scoped by project or global and
//! optionally mirrored to a file on disk by a Sync Projector (CORE §4.C12).

use crate::project::ProjectId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    pub struct MemoryId;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Global,
    Project(ProjectId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    pub scope: Scope,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Path on disk this memory mirrors to, when the memories projector is
    /// enabled. `None` means store-only.
    pub mirror_path: Option<std::path::PathBuf>,
    pub content_hash: String,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Memory {
    /// Sync projectors skip re-import of content they already wrote (CORE
    /// §4.C12: "skipping duplicates by content hash").
    pub fn content_unchanged(&self, incoming_hash: &str) -> bool {
        self.content_hash == incoming_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_unchanged_content_by_hash() {
        let m = Memory {
            id: MemoryId::new("m1"),
            scope: Scope::Global,
            title: "t".into(),
            content: "c".into(),
            tags: vec![],
            mirror_path: None,
            content_hash: "abc".into(),
            created_at_ms: 0,
            updated_at_ms: 0,
        };
        assert!(m.content_unchanged("abc"));
        assert!(!m.content_unchanged("def"));
    }
}
