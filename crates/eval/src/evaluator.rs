// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Expression evaluation (CORE §4.C4).
//!
//! `and`/`or` return the actual operand value internally, matching Python
//! short-circuit semantics so chained `(d.get(k) or {}).get(k2)` patterns
//! keep working; only the outer `evaluate` call coerces to `bool`.

use crate::ast::{CmpOp, Expr, Literal};
use crate::error::EvalError;
use crate::helpers::HelperRegistry;
use crate::parser::Parser;
use crate::value::Value;
use serde_json::Map;

pub struct EvalContext<'a> {
    pub root: &'a Value,
    pub helpers: &'a HelperRegistry,
}

/// Evaluate a condition string against a context dictionary tree, returning
/// the final boolean per CORE §4.C4's `evaluate(expression, context) → bool`
/// contract.
pub fn evaluate(expression: &str, ctx: &EvalContext<'_>) -> Result<bool, EvalError> {
    let ast = Parser::parse(expression)?;
    Ok(eval_expr(&ast, ctx)?.truthy())
}

fn eval_expr(expr: &Expr, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(lit) => Ok(literal_value(lit)),
        Expr::Ident(name) => Ok(ctx.root.get(name)),
        Expr::Attr(base, name) => {
            let base_val = eval_expr(base, ctx)?;
            Ok(base_val.get(name))
        }
        Expr::Subscript(base, index) => {
            let base_val = eval_expr(base, ctx)?;
            let idx_val = eval_expr(index, ctx)?;
            Ok(match idx_val {
                Value::String(s) => base_val.get(&s),
                Value::Number(n) => base_val.index(n as usize),
                _ => Value::Undefined,
            })
        }
        Expr::Call(name, args) => {
            let arg_values: Result<Vec<Value>, EvalError> =
                args.iter().map(|a| eval_expr(a, ctx)).collect();
            ctx.helpers.call(name, &arg_values?, ctx.root)
        }
        Expr::Not(inner) => {
            let v = eval_expr(inner, ctx)?;
            Ok(Value::Bool(!v.truthy()))
        }
        Expr::And(lhs, rhs) => {
            let lv = eval_expr(lhs, ctx)?;
            if !lv.truthy() {
                Ok(lv)
            } else {
                eval_expr(rhs, ctx)
            }
        }
        Expr::Or(lhs, rhs) => {
            let lv = eval_expr(lhs, ctx)?;
            if lv.truthy() {
                Ok(lv)
            } else {
                eval_expr(rhs, ctx)
            }
        }
        Expr::Cmp(op, lhs, rhs) => {
            let lv = eval_expr(lhs, ctx)?;
            let rv = eval_expr(rhs, ctx)?;
            Ok(Value::Bool(compare(*op, &lv, &rv)))
        }
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Number(n) => Value::Number(*n),
        Literal::Str(s) => Value::String(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::None => Value::Null,
    }
}

fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> bool {
    match op {
        CmpOp::Eq => values_equal(lhs, rhs),
        CmpOp::NotEq => !values_equal(lhs, rhs),
        CmpOp::In => rhs.contains(lhs),
        CmpOp::Lt | CmpOp::LtEq | CmpOp::Gt | CmpOp::GtEq => {
            let (Value::Number(a), Value::Number(b)) = (lhs, rhs) else {
                return false;
            };
            match op {
                CmpOp::Lt => a < b,
                CmpOp::LtEq => a <= b,
                CmpOp::Gt => a > b,
                CmpOp::GtEq => a >= b,
                _ => unreachable!(),
            }
        }
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Undefined, Value::Undefined) => true,
        (Value::Undefined, _) | (_, Value::Undefined) => false,
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        _ => lhs == rhs,
    }
}

/// Build the root context value from a free-form JSON object, typically
/// `{"variables": {...}, "task": {...}, ...}` per the engine's call site.
pub fn context_from_map(map: Map<String, serde_json::Value>) -> Value {
    Value::Map(map)
}
