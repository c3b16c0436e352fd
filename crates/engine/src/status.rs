// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Forwards job progress to `tracing`.

use tb_core::{Event, EventKind, Interest, Subscriber, SubscriberError, TrovePayload};

/// Severity of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warn,
}

/// Subscriber that reports state changes as structured log records.
///
/// Failures are reported at warn, everything else at info.
#[derive(Debug, Default)]
pub struct StatusReporter;

impl StatusReporter {
    pub fn new() -> Self {
        Self
    }
}

/// The level and message `StatusReporter` emits for `event`.
pub fn describe(event: &Event) -> Option<(StatusLevel, String)> {
    match event {
        Event::JobStateUpdated {
            state,
            old_state,
            reason,
            ..
        } => match reason {
            Some(reason) => Some((
                StatusLevel::Warn,
                format!("job {old_state} -> {state}: {}", reason.short()),
            )),
            None => Some((StatusLevel::Info, format!("job {old_state} -> {state}"))),
        },
        Event::TroveStateUpdated {
            trove,
            state,
            old_state,
            payload,
            ..
        } => match payload {
            TrovePayload::Failed { reason, primary } => {
                let kind = if *primary { "failed" } else { "unbuildable" };
                Some((
                    StatusLevel::Warn,
                    format!("{trove} {kind}: {}", reason.short()),
                ))
            }
            _ => Some((StatusLevel::Info, format!("{trove} {old_state} -> {state}"))),
        },
        _ => None,
    }
}

impl Subscriber for StatusReporter {
    fn name(&self) -> &str {
        "status"
    }

    fn interests(&self) -> Vec<Interest> {
        vec![
            Interest::Kind(EventKind::JobStateUpdated),
            Interest::Kind(EventKind::TroveStateUpdated),
        ]
    }

    fn handle(&self, event: &Event) -> Result<(), SubscriberError> {
        let job_id = event.job_id();
        match describe(event) {
            Some((StatusLevel::Warn, message)) => tracing::warn!(job_id = %job_id, "{message}"),
            Some((StatusLevel::Info, message)) => tracing::info!(job_id = %job_id, "{message}"),
            None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
