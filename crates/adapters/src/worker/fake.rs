// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake worker for deterministic testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{BuildRequest, BuildResult, CommandHandle, WorkerDispatch, WorkerError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tb_core::{ArtifactId, FailureReason, TroveSpec};

/// Recorded call to FakeWorker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerCall {
    Dispatch { trove: TroveSpec, resolved: Vec<ArtifactId> },
    Stop { handle: CommandHandle },
    Kill { handle: CommandHandle },
}

/// How a scripted build ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeOutcome {
    /// Built with `name:runtime` artifacts derived from the trove
    Built,
    BuiltWith(Vec<ArtifactId>),
    Prepared,
    Failed(FailureReason),
    /// Never finishes; ignores stop requests
    Hang,
    /// Runs until stopped, then reports a stopped failure
    RunUntilStopped,
}

struct Running {
    trove: TroveSpec,
    outcome: FakeOutcome,
    stopped: bool,
    reported: bool,
}

struct FakeWorkerState {
    outcomes: HashMap<String, FakeOutcome>,
    dispatch_errors: HashMap<String, WorkerError>,
    running: HashMap<CommandHandle, Running>,
    calls: Vec<WorkerCall>,
    next_id: u32,
    notify_results: bool,
}

/// Fake worker for testing
///
/// Builds complete on the first `check_result` with a scripted outcome
/// (default: built). Every dispatch reports `Building` through the
/// request's notifier.
#[derive(Clone)]
pub struct FakeWorker {
    inner: Arc<Mutex<FakeWorkerState>>,
}

impl Default for FakeWorker {
    fn default() -> Self {
        Self::new()
    }
}

/// Artifacts a default fake build produces for `trove`.
pub fn default_artifacts(trove: &TroveSpec) -> Vec<ArtifactId> {
    vec![ArtifactId::new(
        format!("{}:runtime", trove.package()),
        trove.version.clone(),
        trove.flavor.clone(),
    )]
}

impl FakeWorker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeWorkerState {
                outcomes: HashMap::new(),
                dispatch_errors: HashMap::new(),
                running: HashMap::new(),
                calls: Vec::new(),
                next_id: 1,
                notify_results: false,
            })),
        }
    }

    /// Script the outcome for troves named `name`.
    pub fn set_outcome(&self, name: &str, outcome: FakeOutcome) {
        self.inner.lock().outcomes.insert(name.to_string(), outcome);
    }

    /// Make dispatching troves named `name` fail.
    pub fn fail_dispatch(&self, name: &str, error: WorkerError) {
        self.inner
            .lock()
            .dispatch_errors
            .insert(name.to_string(), error);
    }

    /// Report results through the notifier instead of `check_result`.
    pub fn notify_results(&self) {
        self.inner.lock().notify_results = true;
    }

    pub fn calls(&self) -> Vec<WorkerCall> {
        self.inner.lock().calls.clone()
    }

    /// Troves dispatched so far, in order.
    pub fn dispatched(&self) -> Vec<TroveSpec> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                WorkerCall::Dispatch { trove, .. } => Some(trove.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn killed(&self) -> Vec<CommandHandle> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                WorkerCall::Kill { handle } => Some(handle.clone()),
                _ => None,
            })
            .collect()
    }
}

fn finish(running: &Running) -> Option<BuildResult> {
    match &running.outcome {
        FakeOutcome::Built => Some(BuildResult::Built {
            artifacts: default_artifacts(&running.trove),
        }),
        FakeOutcome::BuiltWith(artifacts) => Some(BuildResult::Built {
            artifacts: artifacts.clone(),
        }),
        FakeOutcome::Prepared => Some(BuildResult::Prepared),
        FakeOutcome::Failed(reason) => Some(BuildResult::Failed(reason.clone())),
        FakeOutcome::Hang => None,
        FakeOutcome::RunUntilStopped if running.stopped => Some(BuildResult::Failed(
            FailureReason::stopped("stop requested"),
        )),
        FakeOutcome::RunUntilStopped => None,
    }
}

#[async_trait]
impl WorkerDispatch for FakeWorker {
    async fn dispatch_build(&self, request: BuildRequest) -> Result<CommandHandle, WorkerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(WorkerCall::Dispatch {
            trove: request.trove.clone(),
            resolved: request.resolved.clone(),
        });
        if let Some(err) = inner.dispatch_errors.get(&request.trove.name) {
            return Err(err.clone());
        }
        let n = inner.next_id;
        inner.next_id += 1;
        let handle = CommandHandle::new(format!("cmd-{n}"));
        let outcome = if request.prepare_only {
            FakeOutcome::Prepared
        } else {
            inner
                .outcomes
                .get(&request.trove.name)
                .cloned()
                .unwrap_or(FakeOutcome::Built)
        };
        let mut running = Running {
            trove: request.trove,
            outcome,
            stopped: false,
            reported: false,
        };
        request
            .notifier
            .on_building(&handle, 1000 + n, Some("fake-worker".to_string()));
        request
            .notifier
            .on_log_update(&handle, format!("building {}", running.trove));
        if inner.notify_results {
            if let Some(result) = finish(&running) {
                running.reported = true;
                match result {
                    BuildResult::Built { artifacts } => request.notifier.on_built(&handle, artifacts),
                    BuildResult::Prepared => request.notifier.on_prepared(&handle),
                    BuildResult::Failed(reason) => request.notifier.on_failed(&handle, reason),
                }
            }
        }
        inner.running.insert(handle.clone(), running);
        Ok(handle)
    }

    async fn check_result(&self, handle: &CommandHandle) -> Result<Option<BuildResult>, WorkerError> {
        let mut inner = self.inner.lock();
        let running = inner
            .running
            .get_mut(handle)
            .ok_or_else(|| WorkerError::UnknownHandle(handle.clone()))?;
        if running.reported {
            return Ok(None);
        }
        let result = finish(running);
        if result.is_some() {
            running.reported = true;
        }
        Ok(result)
    }

    async fn stop(&self, handle: &CommandHandle) -> Result<(), WorkerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(WorkerCall::Stop {
            handle: handle.clone(),
        });
        if let Some(running) = inner.running.get_mut(handle) {
            running.stopped = true;
        }
        Ok(())
    }

    async fn kill(&self, handle: &CommandHandle) -> Result<(), WorkerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(WorkerCall::Kill {
            handle: handle.clone(),
        });
        inner.running.remove(handle);
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
