// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build worker dispatch

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{default_artifacts, FakeOutcome, FakeWorker, WorkerCall};

use async_trait::async_trait;
use tb_core::{ArtifactId, FailureReason, TroveSpec};
use thiserror::Error;
use tokio::sync::mpsc;

tb_core::define_id! {
    /// Handle for one dispatched build command.
    pub struct CommandHandle;
}

/// Errors from worker operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    #[error("no worker available: {0}")]
    Unavailable(String),
    #[error("failed to set up build environment: {0}")]
    Environment(String),
    #[error("unknown command handle {0}")]
    UnknownHandle(CommandHandle),
    #[error("worker error: {0}")]
    Other(String),
}

impl WorkerError {
    /// Failure recorded against a trove whose dispatch raised this error.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            WorkerError::Environment(msg) => FailureReason::chroot_failed(msg.clone()),
            other => FailureReason::internal("Failed to dispatch build", other.to_string()),
        }
    }
}

/// Everything a worker needs to build one trove.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub trove: TroveSpec,
    /// Artifacts to install into the build root
    pub resolved: Vec<ArtifactId>,
    pub target_label: String,
    /// Stop after preparing the build root
    pub prepare_only: bool,
    /// Channel for progress reports
    pub notifier: WorkerNotifier,
}

/// Final outcome of a dispatched build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildResult {
    Built { artifacts: Vec<ArtifactId> },
    Prepared,
    Failed(FailureReason),
}

/// Progress reported by a worker while a build runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Building {
        handle: CommandHandle,
        pid: u32,
        worker: Option<String>,
    },
    Finished {
        handle: CommandHandle,
        result: BuildResult,
    },
    Log {
        handle: CommandHandle,
        message: String,
    },
}

impl WorkerEvent {
    pub fn handle(&self) -> &CommandHandle {
        match self {
            WorkerEvent::Building { handle, .. }
            | WorkerEvent::Finished { handle, .. }
            | WorkerEvent::Log { handle, .. } => handle,
        }
    }
}

/// Cloneable sender workers use to report progress back to the builder.
#[derive(Debug, Clone)]
pub struct WorkerNotifier {
    tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl WorkerNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: WorkerEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("worker notification dropped, builder has gone away");
        }
    }

    pub fn on_building(&self, handle: &CommandHandle, pid: u32, worker: Option<String>) {
        self.send(WorkerEvent::Building {
            handle: handle.clone(),
            pid,
            worker,
        });
    }

    pub fn on_built(&self, handle: &CommandHandle, artifacts: Vec<ArtifactId>) {
        self.send(WorkerEvent::Finished {
            handle: handle.clone(),
            result: BuildResult::Built { artifacts },
        });
    }

    pub fn on_prepared(&self, handle: &CommandHandle) {
        self.send(WorkerEvent::Finished {
            handle: handle.clone(),
            result: BuildResult::Prepared,
        });
    }

    pub fn on_failed(&self, handle: &CommandHandle, reason: FailureReason) {
        self.send(WorkerEvent::Finished {
            handle: handle.clone(),
            result: BuildResult::Failed(reason),
        });
    }

    pub fn on_log_update(&self, handle: &CommandHandle, message: impl Into<String>) {
        self.send(WorkerEvent::Log {
            handle: handle.clone(),
            message: message.into(),
        });
    }
}

/// Dispatches builds to isolated workers
#[async_trait]
pub trait WorkerDispatch: Clone + Send + Sync + 'static {
    /// Start building `request.trove`
    async fn dispatch_build(&self, request: BuildRequest) -> Result<CommandHandle, WorkerError>;

    /// Outcome of a dispatched build, or `None` while it is still running
    async fn check_result(&self, handle: &CommandHandle) -> Result<Option<BuildResult>, WorkerError>;

    /// Ask the build to stop
    async fn stop(&self, handle: &CommandHandle) -> Result<(), WorkerError>;

    /// Forcefully terminate the build
    async fn kill(&self, handle: &CommandHandle) -> Result<(), WorkerError>;
}
