// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration (CORE §6). A single user-global YAML file plus optional
//! per-project overrides, deep-merged project-over-global.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

fn default_daemon_port() -> u16 {
    8787
}

fn default_health_check_interval() -> u64 {
    30
}

fn default_workflow_timeout() -> u64 {
    30
}

fn default_export_debounce() -> u64 {
    1
}

fn default_poll_interval() -> u64 {
    5
}

fn default_expire_after() -> u64 {
    86_400 * 7
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub enabled: bool,
    pub timeout: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        WorkflowConfig {
            enabled: true,
            timeout: default_workflow_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    #[serde(default)]
    pub auth_mode: Option<String>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySyncConfig {
    pub enabled: bool,
    pub export_debounce: u64,
    pub stealth: bool,
}

impl Default for MemorySyncConfig {
    fn default() -> Self {
        MemorySyncConfig {
            enabled: false,
            export_debounce: default_export_debounce(),
            stealth: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillSyncConfig {
    pub enabled: bool,
}

impl Default for SkillSyncConfig {
    fn default() -> Self {
        SkillSyncConfig { enabled: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageTrackingConfig {
    pub enabled: bool,
    pub poll_interval: u64,
}

impl Default for MessageTrackingConfig {
    fn default() -> Self {
        MessageTrackingConfig {
            enabled: false,
            poll_interval: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionLifecycleConfig {
    pub expire_after: u64,
}

impl Default for SessionLifecycleConfig {
    fn default() -> Self {
        SessionLifecycleConfig {
            expire_after: default_expire_after(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskExpansionConfig {
    pub enabled: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub timeout: Option<u64>,
    pub research_timeout: Option<u64>,
    pub web_research_enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskValidationConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GobbyTasksConfig {
    pub expansion: TaskExpansionConfig,
    pub validation: TaskValidationConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HookExtensionsConfig {
    pub webhooks: Vec<String>,
    pub plugins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GobbyConfig {
    pub daemon_port: u16,
    pub daemon_health_check_interval: u64,
    pub workflow: WorkflowConfig,
    pub llm_providers: HashMap<String, LlmProviderConfig>,
    pub memory_sync: MemorySyncConfig,
    pub skill_sync: SkillSyncConfig,
    pub message_tracking: MessageTrackingConfig,
    pub session_lifecycle: SessionLifecycleConfig,
    pub gobby_tasks: GobbyTasksConfig,
    pub hook_extensions: HookExtensionsConfig,
}

impl Default for GobbyConfig {
    fn default() -> Self {
        GobbyConfig {
            daemon_port: default_daemon_port(),
            daemon_health_check_interval: default_health_check_interval(),
            workflow: WorkflowConfig::default(),
            llm_providers: HashMap::new(),
            memory_sync: MemorySyncConfig::default(),
            skill_sync: SkillSyncConfig::default(),
            message_tracking: MessageTrackingConfig::default(),
            session_lifecycle: SessionLifecycleConfig::default(),
            gobby_tasks: GobbyTasksConfig::default(),
            hook_extensions: HookExtensionsConfig::default(),
        }
    }
}

impl GobbyConfig {
    pub fn load_from_str(yaml: &str) -> crate::error::Result<GobbyConfig> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load the user-global config, then deep-merge a per-project override
    /// on top if present. Either file missing from disk is not an error;
    /// a malformed one is.
    pub fn load(global_path: &Path, project_path: Option<&Path>) -> crate::error::Result<GobbyConfig> {
        let mut value = serde_yaml::Value::Mapping(Default::default());
        if let Ok(text) = std::fs::read_to_string(global_path) {
            value = serde_yaml::from_str(&text)?;
        }
        if let Some(p) = project_path {
            if let Ok(text) = std::fs::read_to_string(p) {
                let overlay: serde_yaml::Value = serde_yaml::from_str(&text)?;
                value = deep_merge(value, overlay);
            }
        }
        Ok(serde_yaml::from_value(value)?)
    }
}

fn deep_merge(base: serde_yaml::Value, overlay: serde_yaml::Value) -> serde_yaml::Value {
    use serde_yaml::Value;
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (k, v) in overlay_map {
                let merged = match base_map.remove(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => v,
                };
                base_map.insert(k, merged);
            }
            Value::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}
