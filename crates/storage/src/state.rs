// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized job state built by replaying events

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tb_core::{
    ArtifactId, Event, FailureReason, JobId, JobState, TrovePayload, TroveSpec, TroveState,
};

/// Last known state of one trove
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroveRecord {
    pub spec: TroveSpec,
    pub state: TroveState,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
    #[serde(default)]
    pub log: Vec<String>,
}

impl TroveRecord {
    pub fn new(spec: TroveSpec) -> Self {
        Self {
            spec,
            state: TroveState::Init,
            status: String::new(),
            failure: None,
            artifacts: Vec::new(),
            pid: None,
            worker: None,
            log: Vec::new(),
        }
    }
}

/// Last known state of one job and its troves, in the order they were added
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub state: JobState,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    #[serde(default)]
    pub troves: Vec<TroveRecord>,
    #[serde(default)]
    pub log: Vec<String>,
    #[serde(default)]
    pub committed: Vec<ArtifactId>,
}

impl JobRecord {
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            state: JobState::Init,
            status: String::new(),
            failure: None,
            troves: Vec::new(),
            log: Vec::new(),
            committed: Vec::new(),
        }
    }

    pub fn trove(&self, spec: &TroveSpec) -> Option<&TroveRecord> {
        self.troves.iter().find(|t| &t.spec == spec)
    }

    fn trove_entry(&mut self, spec: &TroveSpec) -> &mut TroveRecord {
        let index = match self.troves.iter().position(|t| &t.spec == spec) {
            Some(index) => index,
            None => {
                self.troves.push(TroveRecord::new(spec.clone()));
                self.troves.len() - 1
            }
        };
        &mut self.troves[index]
    }

    /// Troves that have not reached a terminal state.
    pub fn unfinished(&self) -> impl Iterator<Item = &TroveRecord> {
        self.troves.iter().filter(|t| !t.state.is_finished())
    }

    /// Troves that failed through their own fault.
    pub fn primary_failures(&self) -> impl Iterator<Item = &TroveRecord> {
        self.troves
            .iter()
            .filter(|t| t.state == TroveState::Failed)
    }
}

/// Every job seen in the event stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializedState {
    pub jobs: HashMap<String, JobRecord>,
}

impl MaterializedState {
    pub fn job(&self, id: &str) -> Option<&JobRecord> {
        self.jobs.get(id)
    }

    fn job_entry(&mut self, id: &JobId) -> &mut JobRecord {
        self.jobs
            .entry(id.as_str().to_string())
            .or_insert_with(|| JobRecord::new(id.clone()))
    }

    /// Apply one event.
    ///
    /// Applying the same state change twice leaves the record unchanged, so a
    /// replay that overlaps already applied entries is harmless. Log events
    /// are the exception and are appended each time.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::JobStateUpdated {
                job_id,
                state,
                status,
                reason,
                ..
            } => {
                let job = self.job_entry(job_id);
                job.state = *state;
                job.status = status.clone();
                if reason.is_some() {
                    job.failure = reason.clone();
                }
            }
            Event::JobLogUpdated { job_id, message } => {
                self.job_entry(job_id).log.push(message.clone());
            }
            Event::JobTrovesSet { job_id, troves } => {
                let job = self.job_entry(job_id);
                for spec in troves {
                    job.trove_entry(spec);
                }
            }
            Event::JobCommitted { job_id, artifacts } => {
                self.job_entry(job_id).committed = artifacts.clone();
            }
            Event::TroveStateUpdated {
                job_id,
                trove,
                state,
                status,
                payload,
                ..
            } => {
                let record = self.job_entry(job_id).trove_entry(trove);
                record.state = *state;
                record.status = status.clone();
                match payload {
                    TrovePayload::Building { pid, worker } => {
                        record.pid = Some(*pid);
                        record.worker = worker.clone();
                    }
                    TrovePayload::Built { artifacts }
                    | TrovePayload::Prebuilt { artifacts, .. }
                    | TrovePayload::Duplicate { artifacts } => {
                        record.artifacts = artifacts.clone();
                    }
                    TrovePayload::Failed { reason, .. } => {
                        record.failure = Some(reason.clone());
                    }
                    TrovePayload::None
                    | TrovePayload::Resolving { .. }
                    | TrovePayload::Resolved { .. }
                    | TrovePayload::Delayed { .. } => {}
                }
                if state.is_finished() {
                    record.pid = None;
                }
            }
            Event::TroveLogUpdated {
                job_id,
                trove,
                message,
            } => {
                self.job_entry(job_id)
                    .trove_entry(trove)
                    .log
                    .push(message.clone());
            }
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
