// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-local error type. Wraps [`gobby_core::Error`] plus the handful of
//! failure modes that only make sense once you're actually running a
//! workflow or pipeline (forward reference, unknown step, depth limit).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] gobby_core::Error),
    #[error("unknown step '{0}'")]
    UnknownStep(String),
    #[error("max agent depth exceeded")]
    MaxDepthExceeded,
    #[error("path escapes project root: {0}")]
    PathTraversal(String),
    #[error("approval '{0}' not pending")]
    NoSuchApproval(String),
    #[error("pipeline step '{0}' not runnable yet")]
    StepNotReady(String),
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Core(e) => e.kind(),
            EngineError::UnknownStep(_) => "invalid_state",
            EngineError::MaxDepthExceeded => "validation",
            EngineError::PathTraversal(_) => "validation",
            EngineError::NoSuchApproval(_) => "not_found",
            EngineError::StepNotReady(_) => "invalid_state",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
