// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use gobby_eval::{evaluate, EvalContext, HelperRegistry, Value};
use proptest::prelude::*;

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}".prop_map(|s| s)
}

fn leaf() -> impl Strategy<Value = String> {
    prop_oneof![
        ident(),
        "'[a-z]{0,6}'".prop_map(|s| s),
        (0u32..1000).prop_map(|n| n.to_string()),
        Just("True".to_string()),
        Just("False".to_string()),
        Just("None".to_string()),
    ]
}

fn expr() -> impl Strategy<Value = String> {
    let leaf = leaf();
    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{a} and {b}")),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{a} or {b}")),
            inner.clone().prop_map(|a| format!("not {a}")),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{a} == {b}")),
            inner.clone().prop_map(|a| format!("({a})")),
        ]
    })
}

proptest! {
    /// Never panics on arbitrary well-formed expressions, whether or not
    /// they evaluate successfully (undefined identifiers are valid).
    #[test]
    fn never_panics_on_generated_expressions(e in expr()) {
        let root = Value::Map(serde_json::Map::new());
        let helpers = HelperRegistry::new();
        let ctx = EvalContext { root: &root, helpers: &helpers };
        let _ = evaluate(&e, &ctx);
    }

    /// Never panics on fully arbitrary byte-ish strings either.
    #[test]
    fn never_panics_on_arbitrary_strings(s in "\\PC{0,40}") {
        let root = Value::Map(serde_json::Map::new());
        let helpers = HelperRegistry::new();
        let ctx = EvalContext { root: &root, helpers: &helpers };
        let _ = evaluate(&s, &ctx);
    }
}
