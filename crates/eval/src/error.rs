// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("unknown helper predicate: {0}")]
    UnknownHelper(String),
}

impl From<EvalError> for gobby_core::Error {
    fn from(err: EvalError) -> Self {
        gobby_core::Error::validation(err.to_string())
    }
}
