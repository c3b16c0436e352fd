// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events raised by job and trove state changes

use crate::failure::FailureReason;
use crate::job::{JobId, JobState};
use crate::reqspec::ArtifactId;
use crate::trove::{TroveSpec, TroveState};
use serde::{Deserialize, Serialize};

/// Transition-specific data carried by a trove state change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrovePayload {
    #[default]
    None,
    Resolving {
        at_ms: u64,
    },
    Resolved {
        requirements: Vec<ArtifactId>,
    },
    Delayed {
        blocking: Vec<TroveSpec>,
    },
    Building {
        pid: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        worker: Option<String>,
    },
    Built {
        artifacts: Vec<ArtifactId>,
    },
    Failed {
        reason: FailureReason,
        primary: bool,
    },
    Prebuilt {
        artifacts: Vec<ArtifactId>,
        source_matches: bool,
    },
    Duplicate {
        artifacts: Vec<ArtifactId>,
    },
}

/// Closed set of event kinds listeners can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    JobStateUpdated,
    JobLogUpdated,
    JobTrovesSet,
    JobCommitted,
    TroveStateUpdated,
    TroveLogUpdated,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::JobStateUpdated,
        EventKind::JobLogUpdated,
        EventKind::JobTrovesSet,
        EventKind::JobCommitted,
        EventKind::TroveStateUpdated,
        EventKind::TroveLogUpdated,
    ];
}

/// State-change notifications published through the
/// [`Publisher`](crate::Publisher).
///
/// Serializes with `{"type": "event:name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- job --
    #[serde(rename = "job:state")]
    JobStateUpdated {
        job_id: JobId,
        state: JobState,
        old_state: JobState,
        #[serde(default)]
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<FailureReason>,
    },

    #[serde(rename = "job:log")]
    JobLogUpdated { job_id: JobId, message: String },

    #[serde(rename = "job:troves_set")]
    JobTrovesSet {
        job_id: JobId,
        troves: Vec<TroveSpec>,
    },

    #[serde(rename = "job:committed")]
    JobCommitted {
        job_id: JobId,
        artifacts: Vec<ArtifactId>,
    },

    // -- trove --
    #[serde(rename = "trove:state")]
    TroveStateUpdated {
        job_id: JobId,
        trove: TroveSpec,
        state: TroveState,
        old_state: TroveState,
        #[serde(default)]
        status: String,
        #[serde(default)]
        payload: TrovePayload,
    },

    #[serde(rename = "trove:log")]
    TroveLogUpdated {
        job_id: JobId,
        trove: TroveSpec,
        message: String,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::JobStateUpdated { .. } => EventKind::JobStateUpdated,
            Event::JobLogUpdated { .. } => EventKind::JobLogUpdated,
            Event::JobTrovesSet { .. } => EventKind::JobTrovesSet,
            Event::JobCommitted { .. } => EventKind::JobCommitted,
            Event::TroveStateUpdated { .. } => EventKind::TroveStateUpdated,
            Event::TroveLogUpdated { .. } => EventKind::TroveLogUpdated,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::JobStateUpdated { .. } => "job:state",
            Event::JobLogUpdated { .. } => "job:log",
            Event::JobTrovesSet { .. } => "job:troves_set",
            Event::JobCommitted { .. } => "job:committed",
            Event::TroveStateUpdated { .. } => "trove:state",
            Event::TroveLogUpdated { .. } => "trove:log",
        }
    }

    pub fn job_id(&self) -> &JobId {
        match self {
            Event::JobStateUpdated { job_id, .. }
            | Event::JobLogUpdated { job_id, .. }
            | Event::JobTrovesSet { job_id, .. }
            | Event::JobCommitted { job_id, .. }
            | Event::TroveStateUpdated { job_id, .. }
            | Event::TroveLogUpdated { job_id, .. } => job_id,
        }
    }

    /// The trove this event is about, if any.
    pub fn trove(&self) -> Option<&TroveSpec> {
        match self {
            Event::TroveStateUpdated { trove, .. } | Event::TroveLogUpdated { trove, .. } => {
                Some(trove)
            }
            _ => None,
        }
    }

    /// One-line summary for log output
    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            Event::JobStateUpdated {
                job_id,
                state,
                old_state,
                ..
            } => format!("{t} id={job_id} {old_state:?}->{state:?}"),
            Event::JobLogUpdated { job_id, .. } => format!("{t} id={job_id}"),
            Event::JobTrovesSet { job_id, troves } => {
                format!("{t} id={job_id} troves={}", troves.len())
            }
            Event::JobCommitted { job_id, artifacts } => {
                format!("{t} id={job_id} artifacts={}", artifacts.len())
            }
            Event::TroveStateUpdated {
                job_id,
                trove,
                state,
                old_state,
                ..
            } => format!("{t} id={job_id} trove={trove} {old_state:?}->{state:?}"),
            Event::TroveLogUpdated { job_id, trove, .. } => {
                format!("{t} id={job_id} trove={trove}")
            }
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
