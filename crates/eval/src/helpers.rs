// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helper predicates registered as callable leaves, not host methods
//! (CORE §4.C4). Each predicate degrades gracefully to a fixed default
//! when its backing dependency (task lookup, stop registry) is absent,
//! matching the truth table observed in the original evaluator's tests.

use crate::error::EvalError;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub status: String,
    pub requires_user_review: bool,
}

/// Narrow read-only view onto task state the evaluator needs, implemented
/// by the engine crate over its own task store.
pub trait TaskLookup: Send + Sync {
    fn info(&self, task_id: &str) -> Option<TaskInfo>;
    fn child_ids(&self, task_id: &str) -> Vec<String>;
}

pub trait StopRegistry: Send + Sync {
    fn has_pending_signal(&self, session_id: &str) -> bool;
}

type PluginPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

#[derive(Default)]
pub struct HelperRegistry {
    task_lookup: Option<Arc<dyn TaskLookup>>,
    stop_registry: Option<Arc<dyn StopRegistry>>,
    plugins: HashMap<String, PluginPredicate>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        HelperRegistry::default()
    }

    pub fn with_task_lookup(mut self, lookup: Arc<dyn TaskLookup>) -> Self {
        self.task_lookup = Some(lookup);
        self
    }

    pub fn with_stop_registry(mut self, registry: Arc<dyn StopRegistry>) -> Self {
        self.stop_registry = Some(registry);
        self
    }

    pub fn register_plugin(&mut self, name: impl Into<String>, f: PluginPredicate) {
        self.plugins.insert(name.into(), f);
    }

    pub fn call(&self, name: &str, args: &[Value], root: &Value) -> Result<Value, EvalError> {
        match name {
            "task_tree_complete" => Ok(Value::Bool(self.task_tree_complete(arg_str(args, 0)))),
            "task_needs_user_review" => {
                Ok(Value::Bool(self.task_needs_user_review(arg_str(args, 0))))
            }
            "has_stop_signal" => Ok(Value::Bool(self.has_stop_signal(arg_str(args, 0)))),
            "mcp_called" => Ok(Value::Bool(mcp_called(
                root,
                arg_str(args, 0),
                arg_str(args, 1),
            ))),
            "mcp_result_is_null" => Ok(Value::Bool(mcp_result_is_null(
                root,
                arg_str(args, 0),
                arg_str(args, 1),
            ))),
            "mcp_failed" => Ok(Value::Bool(mcp_failed(
                root,
                arg_str(args, 0),
                arg_str(args, 1),
            ))),
            "mcp_result_has" => Ok(Value::Bool(mcp_result_has(
                root,
                arg_str(args, 0),
                arg_str(args, 1),
                arg_str(args, 2),
                args.get(3),
            ))),
            _ => {
                if let Some(f) = self.plugins.get(name) {
                    Ok(Value::Bool(f()))
                } else {
                    Err(EvalError::UnknownHelper(name.to_string()))
                }
            }
        }
    }

    fn task_tree_complete(&self, task_id: Option<&str>) -> bool {
        let Some(task_id) = task_id else { return true };
        let Some(lookup) = &self.task_lookup else { return true };
        fn walk(lookup: &dyn TaskLookup, id: &str) -> bool {
            let closed = lookup
                .info(id)
                .map(|info| info.status == "closed")
                .unwrap_or(true);
            closed && lookup.child_ids(id).iter().all(|c| walk(lookup, c))
        }
        walk(lookup.as_ref(), task_id)
    }

    fn task_needs_user_review(&self, task_id: Option<&str>) -> bool {
        let Some(task_id) = task_id else { return false };
        let Some(lookup) = &self.task_lookup else { return false };
        lookup
            .info(task_id)
            .map(|info| info.status == "needs_review" || info.requires_user_review)
            .unwrap_or(false)
    }

    fn has_stop_signal(&self, session_id: Option<&str>) -> bool {
        let Some(session_id) = session_id else { return false };
        self.stop_registry
            .as_ref()
            .map(|r| r.has_pending_signal(session_id))
            .unwrap_or(false)
    }
}

fn arg_str(args: &[Value], idx: usize) -> Option<&str> {
    match args.get(idx) {
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

/// Looks up `variables.<bucket>.<server>` directly against the underlying
/// JSON, since `Value` intentionally has no owning accessor for nested
/// `serde_json::Value` references.
fn mcp_lookup_raw<'a>(root: &'a Value, bucket: &str, server: &str) -> Option<&'a serde_json::Value> {
    let Value::Map(vars_holder) = root else { return None };
    let variables = vars_holder.get("variables")?.as_object()?;
    let bucket_val = variables.get(bucket)?.as_object()?;
    bucket_val.get(server)
}

fn mcp_called(root: &Value, server: Option<&str>, tool: Option<&str>) -> bool {
    let Some(server) = server else { return false };
    let Some(tools) = mcp_lookup_raw(root, "mcp_calls", server).and_then(|v| v.as_array()) else {
        return false;
    };
    match tool {
        None => !tools.is_empty(),
        Some(t) => tools.iter().any(|v| v.as_str() == Some(t)),
    }
}

fn mcp_result(root: &Value, server: &str, tool: &str) -> Option<&serde_json::Value> {
    mcp_lookup_raw(root, "mcp_results", server)?
        .as_object()?
        .get(tool)
}

fn mcp_result_is_null(root: &Value, server: Option<&str>, tool: Option<&str>) -> bool {
    let (Some(server), Some(tool)) = (server, tool) else { return true };
    match mcp_result(root, server, tool) {
        None => true,
        Some(v) => v.is_null(),
    }
}

fn mcp_failed(root: &Value, server: Option<&str>, tool: Option<&str>) -> bool {
    let (Some(server), Some(tool)) = (server, tool) else { return false };
    let Some(result) = mcp_result(root, server, tool) else { return false };
    let Some(obj) = result.as_object() else { return false };
    if obj.get("success").and_then(|v| v.as_bool()) == Some(false) {
        return true;
    }
    if obj.contains_key("error") {
        return true;
    }
    if obj.get("status").and_then(|v| v.as_str()) == Some("failed") {
        return true;
    }
    false
}

fn mcp_result_has(
    root: &Value,
    server: Option<&str>,
    tool: Option<&str>,
    field: Option<&str>,
    value: Option<&Value>,
) -> bool {
    let (Some(server), Some(tool), Some(field), Some(value)) = (server, tool, field, value) else {
        return false;
    };
    let Some(result) = mcp_result(root, server, tool) else { return false };
    let Some(obj) = result.as_object() else { return false };
    let Some(actual) = obj.get(field) else { return false };
    match value {
        Value::Bool(b) => actual.as_bool() == Some(*b),
        Value::String(s) => actual.as_str() == Some(s.as_str()),
        Value::Number(n) => actual.as_f64() == Some(*n),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeTasks {
        tasks: HashMap<String, (TaskInfo, Vec<String>)>,
    }

    impl TaskLookup for FakeTasks {
        fn info(&self, task_id: &str) -> Option<TaskInfo> {
            self.tasks.get(task_id).map(|(info, _)| info.clone())
        }
        fn child_ids(&self, task_id: &str) -> Vec<String> {
            self.tasks
                .get(task_id)
                .map(|(_, kids)| kids.clone())
                .unwrap_or_default()
        }
    }

    fn root_with_vars(vars: serde_json::Value) -> Value {
        Value::Map(serde_json::json!({"variables": vars}).as_object().unwrap().clone())
    }

    #[test]
    fn task_tree_complete_true_when_id_is_none() {
        let registry = HelperRegistry::new();
        let root = root_with_vars(serde_json::json!({}));
        assert_eq!(
            registry.call("task_tree_complete", &[], &root).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn task_tree_complete_true_without_task_manager() {
        let registry = HelperRegistry::new();
        let root = root_with_vars(serde_json::json!({}));
        let result = registry
            .call("task_tree_complete", &[Value::String("task-123".into())], &root)
            .unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn task_tree_complete_false_when_subtask_open() {
        let mut tasks = HashMap::new();
        tasks.insert(
            "parent".to_string(),
            (
                TaskInfo { status: "closed".into(), requires_user_review: false },
                vec!["child".to_string()],
            ),
        );
        tasks.insert(
            "child".to_string(),
            (TaskInfo { status: "open".into(), requires_user_review: false }, vec![]),
        );
        let registry = HelperRegistry::new().with_task_lookup(Arc::new(FakeTasks { tasks }));
        let root = root_with_vars(serde_json::json!({}));
        let result = registry
            .call("task_tree_complete", &[Value::String("parent".into())], &root)
            .unwrap();
        assert_eq!(result, Value::Bool(false));
    }

    #[test]
    fn task_needs_user_review_false_without_task_manager() {
        let registry = HelperRegistry::new();
        let root = root_with_vars(serde_json::json!({}));
        let result = registry
            .call("task_needs_user_review", &[Value::String("task-123".into())], &root)
            .unwrap();
        assert_eq!(result, Value::Bool(false));
    }

    #[test]
    fn has_stop_signal_false_without_registry() {
        let registry = HelperRegistry::new();
        let root = root_with_vars(serde_json::json!({}));
        let result = registry
            .call("has_stop_signal", &[Value::String("session-abc".into())], &root)
            .unwrap();
        assert_eq!(result, Value::Bool(false));
    }

    #[test]
    fn mcp_called_checks_server_and_tool() {
        let registry = HelperRegistry::new();
        let root = root_with_vars(
            serde_json::json!({"mcp_calls": {"gobby-tasks": ["create_task", "claim_task"]}}),
        );
        assert_eq!(
            registry
                .call("mcp_called", &[Value::String("gobby-tasks".into())], &root)
                .unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            registry
                .call(
                    "mcp_called",
                    &[Value::String("gobby-tasks".into()), Value::String("close_task".into())],
                    &root
                )
                .unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn mcp_result_is_null_true_when_no_results_at_all() {
        let registry = HelperRegistry::new();
        let root = root_with_vars(serde_json::json!({}));
        let result = registry
            .call(
                "mcp_result_is_null",
                &[
                    Value::String("gobby-tasks".into()),
                    Value::String("suggest_next_task".into()),
                ],
                &root,
            )
            .unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn mcp_failed_detects_success_false_error_and_status() {
        let registry = HelperRegistry::new();
        let root = root_with_vars(serde_json::json!({
            "mcp_results": {"gobby-agents": {"spawn_agent": {"success": false, "error": "fail"}}}
        }));
        let result = registry
            .call(
                "mcp_failed",
                &[Value::String("gobby-agents".into()), Value::String("spawn_agent".into())],
                &root,
            )
            .unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn mcp_result_has_matches_field_value() {
        let registry = HelperRegistry::new();
        let root = root_with_vars(serde_json::json!({
            "mcp_results": {"gobby-tasks": {"get_task": {"status": "closed"}}}
        }));
        let result = registry
            .call(
                "mcp_result_has",
                &[
                    Value::String("gobby-tasks".into()),
                    Value::String("get_task".into()),
                    Value::String("status".into()),
                    Value::String("closed".into()),
                ],
                &root,
            )
            .unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn plugin_predicate_dispatches_by_name() {
        let mut registry = HelperRegistry::new();
        registry.register_plugin("plugin_passes_lint", Arc::new(|| true));
        let root = root_with_vars(serde_json::json!({}));
        let result = registry.call("plugin_passes_lint", &[], &root).unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn unknown_helper_errors() {
        let registry = HelperRegistry::new();
        let root = root_with_vars(serde_json::json!({}));
        assert!(registry.call("not_a_real_helper", &[], &root).is_err());
    }
}
