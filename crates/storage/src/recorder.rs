// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscriber that persists job events.

use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};
use parking_lot::Mutex;
use std::path::Path;
use tb_core::{Event, EventKind, Interest, JobState, Subscriber, SubscriberError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("event log: {0}")]
    Wal(#[from] WalError),
}

struct Inner {
    wal: Wal,
    state: MaterializedState,
}

/// Appends every event to a WAL and folds it into a [`MaterializedState`].
///
/// Entries are group committed. The log is flushed whenever a job reaches a
/// terminal state, so a finished job is always durable when its final
/// transition returns.
pub struct JobRecorder {
    inner: Mutex<Inner>,
}

impl JobRecorder {
    /// Open the WAL at `path` and rebuild state from what it already holds.
    pub fn open(path: &Path) -> Result<Self, RecorderError> {
        let wal = Wal::open(path)?;
        let mut state = MaterializedState::default();
        let entries = wal.entries_after(0)?;
        for entry in &entries {
            state.apply_event(&entry.event);
        }
        tracing::debug!(
            path = %path.display(),
            replayed = entries.len(),
            jobs = state.jobs.len(),
            "job recorder opened"
        );
        Ok(Self {
            inner: Mutex::new(Inner { wal, state }),
        })
    }

    pub fn record(&self, event: &Event) -> Result<u64, RecorderError> {
        let mut inner = self.inner.lock();
        let seq = inner.wal.append(event)?;
        let finished = matches!(
            event,
            Event::JobStateUpdated { state, .. } if state.is_terminal()
        );
        if finished || inner.wal.needs_flush() {
            inner.wal.flush()?;
        }
        inner.state.apply_event(event);
        Ok(seq)
    }

    pub fn flush(&self) -> Result<(), RecorderError> {
        Ok(self.inner.lock().wal.flush()?)
    }

    /// Copy of the current materialized state.
    pub fn state(&self) -> MaterializedState {
        self.inner.lock().state.clone()
    }

    pub fn job_state(&self, job_id: &str) -> Option<JobState> {
        self.inner.lock().state.job(job_id).map(|job| job.state)
    }
}

impl Drop for JobRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.inner.get_mut().wal.flush() {
            tracing::warn!(error = %e, "failed to flush event log on close");
        }
    }
}

impl Subscriber for JobRecorder {
    fn name(&self) -> &str {
        "job-recorder"
    }

    fn interests(&self) -> Vec<Interest> {
        EventKind::ALL.into_iter().map(Interest::Kind).collect()
    }

    fn handle(&self, event: &Event) -> Result<(), SubscriberError> {
        self.record(event)
            .map(|_| ())
            .map_err(|e| SubscriberError::new(e.to_string()))
    }
}

#[cfg(test)]
#[path = "recorder_tests.rs"]
mod tests;
