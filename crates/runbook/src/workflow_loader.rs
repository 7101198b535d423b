// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow definition loading (CORE §4.C5): YAML documents found on the
//! project-local → user-global search path, cached by name, with
//! `extends` resolved by loading the parent and merging.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use gobby_core::{Error, Result, Trigger, WorkflowDefinition};
use parking_lot::Mutex;

use crate::merge::merge_workflow;
use crate::search::{default_global_dir, find_definition_file, search_dirs};

/// Canonical event type name for every alias a workflow author may write.
/// CORE §4.C5: "triggers keyed by event type (using both canonical and
/// alias names, e.g. `on_before_agent` ≡ `on_prompt_submit`)".
const EVENT_ALIASES: &[(&str, &str)] = &[
    ("on_session_start", "session_start"),
    ("on_session_end", "session_end"),
    ("on_before_agent", "before_agent"),
    ("on_prompt_submit", "before_agent"),
    ("on_after_agent", "after_agent"),
    ("on_before_tool", "before_tool"),
    ("on_tool_use", "before_tool"),
    ("on_after_tool", "after_tool"),
    ("on_tool_result", "after_tool"),
    ("on_pre_compact", "pre_compact"),
    ("on_subagent_start", "subagent_start"),
    ("on_subagent_stop", "subagent_stop"),
    ("on_notification", "notification"),
    ("on_before_tool_selection", "before_tool_selection"),
    ("on_before_model", "before_model"),
    ("on_after_model", "after_model"),
    ("on_permission_request", "permission_request"),
    ("on_stop", "stop"),
];

fn canonicalize_event_type(raw: &str) -> String {
    EVENT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == raw)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or_else(|| raw.to_string())
}

fn canonicalize_triggers(triggers: &mut [Trigger]) {
    for trigger in triggers {
        trigger.event_type = canonicalize_event_type(&trigger.event_type);
    }
}

struct CachedEntry {
    path: PathBuf,
    modified: SystemTime,
    definition: WorkflowDefinition,
}

pub struct WorkflowLoader {
    project_dir: Option<PathBuf>,
    global_dir: PathBuf,
    cache: Mutex<HashMap<String, CachedEntry>>,
}

impl WorkflowLoader {
    pub fn new(project_dir: Option<PathBuf>, global_dir: PathBuf) -> Self {
        WorkflowLoader { project_dir, global_dir, cache: Mutex::new(HashMap::new()) }
    }

    pub fn with_default_global_dir(project_dir: Option<PathBuf>) -> Self {
        Self::new(project_dir, default_global_dir())
    }

    fn dirs(&self) -> Vec<PathBuf> {
        search_dirs(self.project_dir.as_deref(), &self.global_dir, "workflows")
    }

    /// Load a workflow definition by name, following `extends` chains and
    /// returning a cached copy when the backing file's mtime hasn't
    /// changed since the last load.
    pub fn load(&self, name: &str) -> Result<WorkflowDefinition> {
        self.load_with_chain(name, &mut Vec::new())
    }

    fn load_with_chain(&self, name: &str, chain: &mut Vec<String>) -> Result<WorkflowDefinition> {
        if chain.iter().any(|seen| seen == name) {
            return Err(Error::validation(format!("workflow '{name}' extends itself through a cycle")));
        }
        chain.push(name.to_string());

        let path = find_definition_file(&self.dirs(), name)
            .ok_or_else(|| Error::not_found(format!("workflow '{name}' not found on search path")))?;
        let modified = fs::metadata(&path)?.modified()?;

        if let Some(cached) = self.cache.lock().get(name) {
            if cached.path == path && cached.modified == modified {
                return Ok(cached.definition.clone());
            }
        }

        tracing::debug!(name, path = %path.display(), "loading workflow definition from disk");
        let text = fs::read_to_string(&path)?;
        let mut definition: WorkflowDefinition = serde_yaml::from_str(&text)?;
        canonicalize_triggers(&mut definition.triggers);

        if let Some(parent_name) = definition.extends.clone() {
            let parent = self.load_with_chain(&parent_name, chain)?;
            definition = merge_workflow(parent, definition);
        }

        self.cache.lock().insert(
            name.to_string(),
            CachedEntry { path, modified, definition: definition.clone() },
        );
        Ok(definition)
    }

    /// Drop all cached entries, forcing the next `load` to re-read from disk.
    pub fn invalidate(&self) {
        self.cache.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_workflow(dir: &Path, name: &str, yaml: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(format!("{name}.yaml")), yaml).unwrap();
    }

    #[test]
    fn loads_a_flat_step_workflow() {
        let tmp = tempfile::tempdir().unwrap();
        let workflows = tmp.path().join(".gobby").join("workflows");
        write_workflow(
            &workflows,
            "review",
            r#"
name: review
kind: step
steps:
  - name: draft
    on_enter: []
    on_exit: []
"#,
        );
        let loader = WorkflowLoader::new(Some(tmp.path().to_path_buf()), tmp.path().join("global"));
        let def = loader.load("review").unwrap();
        assert_eq!(def.steps[0].name, "draft");
    }

    #[test]
    fn extends_merges_child_over_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let workflows = tmp.path().join(".gobby").join("workflows");
        write_workflow(
            &workflows,
            "base",
            r#"
name: base
kind: step
steps:
  - name: draft
  - name: review
"#,
        );
        write_workflow(
            &workflows,
            "strict",
            r#"
name: strict
kind: step
extends: base
steps:
  - name: review
    blocked_tools: ["bash"]
"#,
        );
        let loader = WorkflowLoader::new(Some(tmp.path().to_path_buf()), tmp.path().join("global"));
        let def = loader.load("strict").unwrap();
        assert_eq!(def.steps.len(), 2);
        let review = def.step("review").unwrap();
        assert_eq!(review.blocked_tools, vec!["bash".to_string()]);
    }

    #[test]
    fn trigger_alias_is_canonicalized() {
        let tmp = tempfile::tempdir().unwrap();
        let workflows = tmp.path().join(".gobby").join("workflows");
        write_workflow(
            &workflows,
            "lifecycle",
            r#"
name: lifecycle
kind: lifecycle
triggers:
  - event_type: on_prompt_submit
    actions:
      - action: inject_context
"#,
        );
        let loader = WorkflowLoader::new(Some(tmp.path().to_path_buf()), tmp.path().join("global"));
        let def = loader.load("lifecycle").unwrap();
        assert_eq!(def.triggers[0].event_type, "before_agent");
    }

    #[test]
    fn missing_workflow_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = WorkflowLoader::new(Some(tmp.path().to_path_buf()), tmp.path().join("global"));
        let err = loader.load("nope").unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn self_extending_workflow_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let workflows = tmp.path().join(".gobby").join("workflows");
        write_workflow(
            &workflows,
            "loopy",
            r#"
name: loopy
kind: step
extends: loopy
steps: []
"#,
        );
        let loader = WorkflowLoader::new(Some(tmp.path().to_path_buf()), tmp.path().join("global"));
        let err = loader.load("loopy").unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn reload_after_file_change_bypasses_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let workflows = tmp.path().join(".gobby").join("workflows");
        write_workflow(&workflows, "review", "name: review\nkind: step\nsteps: [{name: draft}]\n");
        let loader = WorkflowLoader::new(Some(tmp.path().to_path_buf()), tmp.path().join("global"));
        let first = loader.load("review").unwrap();
        assert_eq!(first.steps.len(), 1);

        std::thread::sleep(std::time::Duration::from_millis(10));
        write_workflow(
            &workflows,
            "review",
            "name: review\nkind: step\nsteps: [{name: draft}, {name: ship}]\n",
        );
        let second = loader.load("review").unwrap();
        assert_eq!(second.steps.len(), 2);
    }
}
