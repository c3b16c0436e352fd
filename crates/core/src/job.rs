// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier and state machine.
//!
//! A [`Job`] owns every [`BuildTrove`] in one build and is the only place
//! their state changes. Each transition is validated and then published
//! through the job's [`Publisher`].

use crate::clock::Clock;
use crate::config::ContextConfig;
use crate::event::{Event, TrovePayload};
use crate::failure::FailureReason;
use crate::publisher::{PublishError, Publisher};
use crate::reqspec::{ArtifactId, ReqSpec};
use crate::trove::{BuildTrove, TroveMetadata, TroveSpec, TroveState};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for a build job.
    ///
    /// Used as the key for job logs, snapshots, and every event the job
    /// publishes.
    pub struct JobId;
}

impl JobId {
    /// A fresh id: `job-` and a random v4 UUID in simple form.
    pub fn random() -> Self {
        Self(format!("job-{}", uuid::Uuid::new_v4().simple()))
    }
}

/// Lifecycle state of a whole job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Init,
    Loading,
    Building,
    Built,
    Failed,
}

impl JobState {
    pub fn display_name(self) -> &'static str {
        match self {
            JobState::Init => "Initialized",
            JobState::Loading => "Loading",
            JobState::Building => "Building",
            JobState::Built => "Built",
            JobState::Failed => "Failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Built | JobState::Failed)
    }

    pub fn can_become(self, next: JobState) -> bool {
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (_, JobState::Failed) => true,
            (JobState::Init, JobState::Loading)
            | (JobState::Loading, JobState::Building)
            | (JobState::Building, JobState::Built) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Errors from job mutation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("trove {0} is already in the job")]
    DuplicateTrove(String),
    #[error("no configuration for context {0:?}")]
    UnknownContext(String),
    #[error("trove {0} is not in the job")]
    UnknownTrove(String),
    #[error("trove {trove} already finished as {state}")]
    TroveFinished { trove: String, state: TroveState },
    #[error("trove {trove} cannot move from {from} to {to}")]
    InvalidTransition {
        trove: String,
        from: TroveState,
        to: TroveState,
    },
    #[error("job cannot move from {from} to {to}")]
    InvalidJobTransition { from: JobState, to: JobState },
    #[error("context {0:?} is read-only once a trove using it has been dispatched")]
    ConfigInUse(String),
    #[error("trove {0} has no prebuilt record")]
    NoPrebuiltRecord(String),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// A set of troves built together.
pub struct Job {
    pub(crate) id: JobId,
    pub(crate) state: JobState,
    pub(crate) status: String,
    pub(crate) failure: Option<FailureReason>,
    pub(crate) troves: IndexMap<TroveSpec, BuildTrove>,
    pub(crate) main: ContextConfig,
    pub(crate) contexts: BTreeMap<String, ContextConfig>,
    pub(crate) dispatched_contexts: BTreeSet<String>,
    pub(crate) committed: Vec<ArtifactId>,
    pub(crate) log: Vec<String>,
    pub(crate) created_at_ms: u64,
    pub(crate) publisher: Arc<Publisher>,
    pub(crate) publish_errors: Option<PublishError>,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("troves", &self.troves.len())
            .finish_non_exhaustive()
    }
}

impl Job {
    /// A new job under a random id, created at `clock`'s current time.
    pub fn create(main: ContextConfig, clock: &impl Clock) -> Self {
        Self::new(JobId::random(), main, clock.epoch_ms())
    }

    pub fn new(id: JobId, main: ContextConfig, epoch_ms: u64) -> Self {
        Self::with_publisher(id, main, Arc::new(Publisher::new()), epoch_ms)
    }

    pub fn with_publisher(
        id: JobId,
        main: ContextConfig,
        publisher: Arc<Publisher>,
        epoch_ms: u64,
    ) -> Self {
        Self {
            id,
            state: JobState::Init,
            status: String::new(),
            failure: None,
            troves: IndexMap::new(),
            main,
            contexts: BTreeMap::new(),
            dispatched_contexts: BTreeSet::new(),
            committed: Vec::new(),
            log: Vec::new(),
            created_at_ms: epoch_ms,
            publisher,
            publish_errors: None,
        }
    }

    // -- accessors --

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    pub fn publisher(&self) -> &Arc<Publisher> {
        &self.publisher
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    pub fn committed(&self) -> &[ArtifactId] {
        &self.committed
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn is_built(&self) -> bool {
        self.state == JobState::Built
    }

    pub fn len(&self) -> usize {
        self.troves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.troves.is_empty()
    }

    /// Troves in the order they were added.
    pub fn troves(&self) -> impl Iterator<Item = &BuildTrove> {
        self.troves.values()
    }

    pub fn trove(&self, spec: &TroveSpec) -> Option<&BuildTrove> {
        self.troves.get(spec)
    }

    pub fn specs(&self) -> Vec<TroveSpec> {
        self.troves.keys().cloned().collect()
    }

    /// Position of `spec` in insertion order.
    pub fn index_of(&self, spec: &TroveSpec) -> Option<usize> {
        self.troves.get_index_of(spec)
    }

    pub fn unfinished(&self) -> impl Iterator<Item = &BuildTrove> {
        self.troves.values().filter(|t| !t.is_finished())
    }

    pub fn primary_failures(&self) -> impl Iterator<Item = &BuildTrove> {
        self.troves.values().filter(|t| t.is_primary_failure())
    }

    /// Config for `context`; the empty name is the main context.
    pub fn config(&self, context: &str) -> Option<&ContextConfig> {
        if context.is_empty() {
            Some(&self.main)
        } else {
            self.contexts.get(context)
        }
    }

    pub fn main_config(&self) -> &ContextConfig {
        &self.main
    }

    /// Config governing `spec`.
    pub fn config_for(&self, spec: &TroveSpec) -> &ContextConfig {
        self.config(&spec.context).unwrap_or(&self.main)
    }

    /// Named contexts, excluding the main one.
    pub fn contexts(&self) -> impl Iterator<Item = (&String, &ContextConfig)> {
        self.contexts.iter()
    }

    pub fn is_dispatched(&self, context: &str) -> bool {
        self.dispatched_contexts.contains(context)
    }

    // -- publishing --

    fn emit(&mut self, event: Event) {
        if let Err(e) = self.publisher.publish(event) {
            self.record_publish_error(e);
        }
    }

    fn record_publish_error(&mut self, e: PublishError) {
        tracing::warn!(job_id = %self.id, error = %e, "event delivery failed");
        match &mut self.publish_errors {
            Some(existing) => existing.merge(e),
            None => self.publish_errors = Some(e),
        }
    }

    /// Take subscriber failures collected since the last call.
    pub fn take_publish_errors(&mut self) -> Option<PublishError> {
        self.publish_errors.take()
    }

    /// Surface collected subscriber failures as an error.
    pub fn check_published(&mut self) -> Result<(), JobError> {
        match self.take_publish_errors() {
            Some(e) => Err(JobError::Publish(e)),
            None => Ok(()),
        }
    }

    /// Buffer published events until the matching [`uncork`](Self::uncork).
    pub fn cork(&self) {
        self.publisher.cork();
    }

    pub fn uncork(&mut self) {
        if let Err(e) = self.publisher.uncork() {
            self.record_publish_error(e);
        }
    }

    // -- setup --

    pub fn add_context(&mut self, name: impl Into<String>, config: ContextConfig) -> Result<(), JobError> {
        let name = name.into();
        if self.dispatched_contexts.contains(&name) {
            return Err(JobError::ConfigInUse(name));
        }
        if name.is_empty() {
            self.main = config;
        } else {
            self.contexts.insert(name, config);
        }
        Ok(())
    }

    /// Edit a context's config. Rejected once a trove of that context has been dispatched.
    pub fn configure(
        &mut self,
        context: &str,
        edit: impl FnOnce(&mut ContextConfig),
    ) -> Result<(), JobError> {
        if self.dispatched_contexts.contains(context) {
            return Err(JobError::ConfigInUse(context.to_string()));
        }
        let config = if context.is_empty() {
            &mut self.main
        } else {
            self.contexts
                .get_mut(context)
                .ok_or_else(|| JobError::UnknownContext(context.to_string()))?
        };
        edit(config);
        Ok(())
    }

    pub fn add_trove(&mut self, spec: TroveSpec) -> Result<(), JobError> {
        if self.config(&spec.context).is_none() {
            return Err(JobError::UnknownContext(spec.context.clone()));
        }
        if self.troves.contains_key(&spec) {
            return Err(JobError::DuplicateTrove(spec.to_string()));
        }
        self.troves.insert(spec.clone(), BuildTrove::new(spec));
        Ok(())
    }

    /// Populate the job and announce its trove list.
    pub fn set_troves(&mut self, specs: Vec<TroveSpec>) -> Result<(), JobError> {
        for spec in &specs {
            self.add_trove(spec.clone())?;
        }
        self.emit(Event::JobTrovesSet {
            job_id: self.id.clone(),
            troves: specs,
        });
        Ok(())
    }

    /// Apply loaded recipe metadata to a trove that has not started.
    pub fn set_metadata(&mut self, spec: &TroveSpec, metadata: TroveMetadata) -> Result<(), JobError> {
        let trove = self.trove_mut(spec)?;
        if trove.state != TroveState::Init {
            return Err(JobError::InvalidTransition {
                trove: spec.to_string(),
                from: trove.state,
                to: TroveState::Init,
            });
        }
        trove.apply_metadata(metadata);
        let message = format!(
            "Loaded {:?} recipe with {} build requirements and {} cross requirements",
            trove.recipe_type,
            trove.build_requirements.len(),
            trove.cross_requirements.len()
        );
        self.trove_log(spec, message)
    }

    fn trove_mut(&mut self, spec: &TroveSpec) -> Result<&mut BuildTrove, JobError> {
        self.troves
            .get_mut(spec)
            .ok_or_else(|| JobError::UnknownTrove(spec.to_string()))
    }

    // -- trove transitions --

    fn transition(
        &mut self,
        spec: &TroveSpec,
        to: TroveState,
        status: String,
        payload: TrovePayload,
        apply: impl FnOnce(&mut BuildTrove),
    ) -> Result<(), JobError> {
        let trove = self.trove_mut(spec)?;
        let from = trove.state;
        if from.is_finished() {
            return Err(JobError::TroveFinished {
                trove: spec.to_string(),
                state: from,
            });
        }
        if !from.can_become(to) {
            return Err(JobError::InvalidTransition {
                trove: spec.to_string(),
                from,
                to,
            });
        }
        trove.state = to;
        trove.status = status.clone();
        apply(trove);
        self.emit(Event::TroveStateUpdated {
            job_id: self.id.clone(),
            trove: spec.clone(),
            state: to,
            old_state: from,
            status,
            payload,
        });
        Ok(())
    }

    /// Queue for a resolve slot.
    pub fn trove_waiting(&mut self, spec: &TroveSpec) -> Result<(), JobError> {
        self.transition(
            spec,
            TroveState::Waiting,
            "Waiting to resolve build requirements".to_string(),
            TrovePayload::None,
            |_| {},
        )
    }

    pub fn trove_resolving(&mut self, spec: &TroveSpec, epoch_ms: u64) -> Result<(), JobError> {
        self.transition(
            spec,
            TroveState::Resolving,
            "Resolving build requirements".to_string(),
            TrovePayload::Resolving { at_ms: epoch_ms },
            |_| {},
        )
    }

    pub fn trove_buildable(&mut self, spec: &TroveSpec, resolved: Vec<ArtifactId>) -> Result<(), JobError> {
        self.transition(
            spec,
            TroveState::Buildable,
            "Ready to build".to_string(),
            TrovePayload::Resolved {
                requirements: resolved.clone(),
            },
            |t| t.resolved_requirements = resolved,
        )
    }

    /// Resolution picked artifacts that troves in this job will rebuild.
    pub fn trove_delayed(&mut self, spec: &TroveSpec, blocking: Vec<TroveSpec>) -> Result<(), JobError> {
        let names: Vec<String> = blocking.iter().map(ToString::to_string).collect();
        let status = format!(
            "Resolved buildreqs include {} other troves scheduled to be built - delaying: {}",
            blocking.len(),
            names.join(", ")
        );
        self.transition(
            spec,
            TroveState::Init,
            status,
            TrovePayload::Delayed { blocking },
            |_| {},
        )
    }

    /// A cycle-breaking resolve found nothing for `requirements`.
    pub fn trove_cycle_unresolvable(&mut self, spec: &TroveSpec, requirements: &[ReqSpec]) -> Result<(), JobError> {
        let reqs: Vec<String> = requirements.iter().map(ToString::to_string).collect();
        let status = format!(
            "Trove in cycle could not resolve build requirements: {}",
            reqs.join(", ")
        );
        self.transition(spec, TroveState::Init, status, TrovePayload::None, |_| {})
    }

    /// Resolution needs runtime dependencies that troves in this job produce.
    pub fn trove_waiting_on_dependencies(&mut self, spec: &TroveSpec, producers: &[TroveSpec]) -> Result<(), JobError> {
        let names: Vec<String> = producers.iter().map(ToString::to_string).collect();
        let status = format!(
            "Trove could not resolve dependencies, waiting until troves are built: {}",
            names.join(", ")
        );
        self.transition(spec, TroveState::Init, status, TrovePayload::None, |_| {})
    }

    /// A worker was chosen and is preparing the build environment.
    ///
    /// Locks the trove's context config against further edits.
    pub fn trove_preparing(&mut self, spec: &TroveSpec, epoch_ms: u64) -> Result<(), JobError> {
        self.transition(
            spec,
            TroveState::Preparing,
            "Preparing build environment".to_string(),
            TrovePayload::None,
            |t| t.start_ms = Some(epoch_ms),
        )?;
        self.dispatched_contexts.insert(spec.context.clone());
        Ok(())
    }

    pub fn trove_building(
        &mut self,
        spec: &TroveSpec,
        pid: u32,
        worker: Option<String>,
        epoch_ms: u64,
    ) -> Result<(), JobError> {
        let status = match &worker {
            Some(w) => format!("Building on {w} (pid {pid})"),
            None => format!("Building (pid {pid})"),
        };
        self.transition(
            spec,
            TroveState::Building,
            status,
            TrovePayload::Building {
                pid,
                worker: worker.clone(),
            },
            |t| {
                t.pid = Some(pid);
                t.worker = worker;
                t.start_ms.get_or_insert(epoch_ms);
            },
        )?;
        self.dispatched_contexts.insert(spec.context.clone());
        Ok(())
    }

    pub fn trove_built(&mut self, spec: &TroveSpec, artifacts: Vec<ArtifactId>, epoch_ms: u64) -> Result<(), JobError> {
        self.transition(
            spec,
            TroveState::Built,
            "Trove built".to_string(),
            TrovePayload::Built {
                artifacts: artifacts.clone(),
            },
            |t| {
                t.built_artifacts = artifacts;
                t.pid = None;
                t.finish_ms = Some(epoch_ms);
            },
        )
    }

    /// Terminal state for prepare-only builds.
    pub fn trove_prepared(&mut self, spec: &TroveSpec, epoch_ms: u64) -> Result<(), JobError> {
        self.transition(
            spec,
            TroveState::Prepared,
            "Build environment prepared".to_string(),
            TrovePayload::None,
            |t| {
                t.pid = None;
                t.finish_ms = Some(epoch_ms);
            },
        )
    }

    /// Fail a trove. Primary failures are the trove's own fault; secondary
    /// ones were caused by another trove and land in `Unbuildable`.
    pub fn trove_failed(&mut self, spec: &TroveSpec, reason: FailureReason, primary: bool) -> Result<(), JobError> {
        let to = if primary {
            TroveState::Failed
        } else {
            TroveState::Unbuildable
        };
        self.transition(
            spec,
            to,
            reason.short(),
            TrovePayload::Failed {
                reason: reason.clone(),
                primary,
            },
            |t| {
                t.failure = Some(reason);
                t.pid = None;
            },
        )
    }

    /// Reuse the trove's prebuilt record instead of building.
    pub fn trove_prebuilt(&mut self, spec: &TroveSpec) -> Result<(), JobError> {
        let record = self
            .trove_mut(spec)?
            .prebuilt
            .clone()
            .ok_or_else(|| JobError::NoPrebuiltRecord(spec.to_string()))?;
        self.transition(
            spec,
            TroveState::Prebuilt,
            "Trove prebuilt".to_string(),
            TrovePayload::Prebuilt {
                artifacts: record.artifacts.clone(),
                source_matches: record.source_matches,
            },
            |t| t.built_artifacts = record.artifacts,
        )
    }

    /// Another trove in this job already built identical output.
    pub fn trove_duplicate(&mut self, spec: &TroveSpec, artifacts: Vec<ArtifactId>) -> Result<(), JobError> {
        self.transition(
            spec,
            TroveState::Duplicate,
            "Trove duplicates an already built trove".to_string(),
            TrovePayload::Duplicate {
                artifacts: artifacts.clone(),
            },
            |t| {
                t.built_artifacts = artifacts;
                t.pid = None;
            },
        )
    }

    pub fn trove_log(&mut self, spec: &TroveSpec, message: impl Into<String>) -> Result<(), JobError> {
        self.trove_mut(spec)?;
        self.emit(Event::TroveLogUpdated {
            job_id: self.id.clone(),
            trove: spec.clone(),
            message: message.into(),
        });
        Ok(())
    }

    // -- job transitions --

    fn set_state(
        &mut self,
        to: JobState,
        status: String,
        reason: Option<FailureReason>,
    ) -> Result<(), JobError> {
        let from = self.state;
        if !from.can_become(to) {
            return Err(JobError::InvalidJobTransition { from, to });
        }
        self.state = to;
        self.status = status.clone();
        if reason.is_some() {
            self.failure = reason.clone();
        }
        self.emit(Event::JobStateUpdated {
            job_id: self.id.clone(),
            state: to,
            old_state: from,
            status,
            reason,
        });
        Ok(())
    }

    pub fn job_loading(&mut self) -> Result<(), JobError> {
        self.set_state(JobState::Loading, "Loading troves".to_string(), None)
    }

    pub fn job_building(&mut self) -> Result<(), JobError> {
        self.set_state(JobState::Building, "Building troves".to_string(), None)
    }

    pub fn job_built(&mut self) -> Result<(), JobError> {
        self.set_state(JobState::Built, "Job built".to_string(), None)
    }

    /// Fail the job. Every unfinished trove fails secondarily with the same reason.
    pub fn job_failed(&mut self, reason: FailureReason) -> Result<(), JobError> {
        if !self.state.can_become(JobState::Failed) {
            return Err(JobError::InvalidJobTransition {
                from: self.state,
                to: JobState::Failed,
            });
        }
        self.cork();
        let unfinished: Vec<TroveSpec> = self.unfinished().map(|t| t.spec.clone()).collect();
        let mut result = Ok(());
        for spec in &unfinished {
            if let Err(e) = self.trove_failed(spec, reason.clone(), false) {
                result = Err(e);
                break;
            }
        }
        if result.is_ok() {
            result = self.set_state(JobState::Failed, reason.to_string(), Some(reason));
        }
        self.uncork();
        result
    }

    pub fn job_log(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.log.push(message.clone());
        self.emit(Event::JobLogUpdated {
            job_id: self.id.clone(),
            message,
        });
    }

    /// Record that the host committed the job's output.
    pub fn job_committed(&mut self, artifacts: Vec<ArtifactId>) -> Result<(), JobError> {
        if self.state != JobState::Built {
            return Err(JobError::InvalidJobTransition {
                from: self.state,
                to: JobState::Built,
            });
        }
        self.committed = artifacts.clone();
        self.emit(Event::JobCommitted {
            job_id: self.id.clone(),
            artifacts,
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
