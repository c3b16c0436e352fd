// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the build engine

use std::error::Error as _;
use tb_adapters::{LoaderError, ResolveError, WorkerError};
use tb_core::{FailureReason, JobError};
use thiserror::Error;

/// Errors that abort a build loop
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("job error: {0}")]
    Job(#[from] JobError),
    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),
    #[error("resolver error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("loader error: {0}")]
    Loader(#[from] LoaderError),
    #[error("resolve task failed: {0}")]
    ResolveTask(#[from] tokio::task::JoinError),
    #[error("dependency handler invariant violated: {0}")]
    Invariant(String),
}

impl EngineError {
    /// Render as an internal failure, with the source chain as the trace.
    pub fn into_failure(self) -> FailureReason {
        let mut trace = Vec::new();
        let mut source = self.source();
        while let Some(e) = source {
            trace.push(format!("caused by: {e}"));
            source = e.source();
        }
        FailureReason::internal(self.to_string(), trace.join("\n"))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
