// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stop requests for a running build

use parking_lot::Mutex;
use std::sync::Arc;
use tb_core::TroveSpec;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;

/// Reason recorded when a watched signal arrives
pub const SIGNAL_REASON: &str = "received signal";

#[derive(Debug, Default)]
struct StopState {
    reason: Option<String>,
    troves: Vec<TroveSpec>,
}

/// Shared flag a [`Builder`](crate::Builder) checks every iteration.
///
/// A job-wide request stops every build; the first reason wins. Single
/// troves can be stopped without stopping the job.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    state: Arc<Mutex<StopState>>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the whole job.
    pub fn request(&self, reason: impl Into<String>) {
        let mut state = self.state.lock();
        if state.reason.is_none() {
            state.reason = Some(reason.into());
        }
    }

    /// The job-wide stop reason, once requested
    pub fn requested(&self) -> Option<String> {
        self.state.lock().reason.clone()
    }

    pub fn is_requested(&self) -> bool {
        self.state.lock().reason.is_some()
    }

    /// Stop one trove, leaving the rest of the job running.
    pub fn stop_trove(&self, trove: TroveSpec) {
        let mut state = self.state.lock();
        if !state.troves.contains(&trove) {
            state.troves.push(trove);
        }
    }

    /// Trove stop requests made since the last call, oldest first.
    pub fn take_trove_requests(&self) -> Vec<TroveSpec> {
        std::mem::take(&mut self.state.lock().troves)
    }
}

/// Request a stop on `handle` when SIGTERM or SIGINT arrives.
///
/// Must be called from within a tokio runtime.
pub fn spawn_signal_watcher(handle: StopHandle) -> std::io::Result<JoinHandle<()>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM, stopping build"),
            _ = sigint.recv() => tracing::info!("received SIGINT, stopping build"),
        }
        handle.request(SIGNAL_REASON);
    }))
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
