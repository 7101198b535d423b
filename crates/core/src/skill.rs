// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Skill — a reusable instruction fragment, scoped by project or global,
//! mirrored on disk as `<name>/SKILL.md` plus a `.gobby-meta.json` sidecar
//! to coexist with other tools' skill directory conventions.

use crate::memory::Scope;
use serde::{Deserialize, Serialize};

crate::define_id! {
    pub struct SkillId;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: SkillId,
    pub scope: Scope,
    pub name: String,
    pub description: String,
    pub body_markdown: String,
    pub content_hash: String,
    pub mirror_dir: Option<std::path::PathBuf>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

/// Sidecar written next to `SKILL.md` so the projector can tell apart a
/// file it owns from one a human edited directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillMeta {
    pub id: SkillId,
    pub content_hash: String,
}
