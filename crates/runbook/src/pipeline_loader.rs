// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline definition loading (CORE §4.C10). Shares the workflow
//! loader's search-path and mtime-cache shape but has no `extends`
//! chain to resolve; every load is validated for forward references
//! before being handed back.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use gobby_core::{Error, PipelineDefinition, Result};
use parking_lot::Mutex;

use crate::search::{default_global_dir, find_definition_file, search_dirs};

struct CachedEntry {
    path: PathBuf,
    modified: SystemTime,
    definition: PipelineDefinition,
}

pub struct PipelineLoader {
    project_dir: Option<PathBuf>,
    global_dir: PathBuf,
    cache: Mutex<HashMap<String, CachedEntry>>,
}

impl PipelineLoader {
    pub fn new(project_dir: Option<PathBuf>, global_dir: PathBuf) -> Self {
        PipelineLoader { project_dir, global_dir, cache: Mutex::new(HashMap::new()) }
    }

    pub fn with_default_global_dir(project_dir: Option<PathBuf>) -> Self {
        Self::new(project_dir, default_global_dir())
    }

    fn dirs(&self) -> Vec<PathBuf> {
        search_dirs(self.project_dir.as_deref(), &self.global_dir, "pipelines")
    }

    pub fn load(&self, name: &str) -> Result<PipelineDefinition> {
        let path = find_definition_file(&self.dirs(), name)
            .ok_or_else(|| Error::not_found(format!("pipeline '{name}' not found on search path")))?;
        let modified = fs::metadata(&path)?.modified()?;

        if let Some(cached) = self.cache.lock().get(name) {
            if cached.path == path && cached.modified == modified {
                return Ok(cached.definition.clone());
            }
        }

        tracing::debug!(name, path = %path.display(), "loading pipeline definition from disk");
        let text = fs::read_to_string(&path)?;
        let definition: PipelineDefinition = serde_yaml::from_str(&text)?;
        definition.validate_no_forward_references()?;

        self.cache.lock().insert(
            name.to_string(),
            CachedEntry { path, modified, definition: definition.clone() },
        );
        Ok(definition)
    }

    pub fn invalidate(&self) {
        self.cache.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_pipeline(dir: &Path, name: &str, yaml: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(format!("{name}.yaml")), yaml).unwrap();
    }

    #[test]
    fn loads_a_valid_pipeline() {
        let tmp = tempfile::tempdir().unwrap();
        let pipelines = tmp.path().join(".gobby").join("pipelines");
        write_pipeline(
            &pipelines,
            "release",
            r#"
name: release
steps:
  - id: build
    exec: "cargo build"
  - id: notify
    prompt: "summarize $build.output"
"#,
        );
        let loader = PipelineLoader::new(Some(tmp.path().to_path_buf()), tmp.path().join("global"));
        let def = loader.load("release").unwrap();
        assert_eq!(def.steps.len(), 2);
    }

    #[test]
    fn forward_reference_is_rejected_at_load_time() {
        let tmp = tempfile::tempdir().unwrap();
        let pipelines = tmp.path().join(".gobby").join("pipelines");
        write_pipeline(
            &pipelines,
            "broken",
            r#"
name: broken
steps:
  - id: build
    exec: "echo $notify.output"
  - id: notify
    prompt: "done"
"#,
        );
        let loader = PipelineLoader::new(Some(tmp.path().to_path_buf()), tmp.path().join("global"));
        let err = loader.load("broken").unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn missing_pipeline_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = PipelineLoader::new(Some(tmp.path().to_path_buf()), tmp.path().join("global"));
        let err = loader.load("nope").unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
