// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The build loop: load, sanity check, then dispatch, poll and resolve
//! until the dependency handler runs dry.

use crate::dephandler::{DependencyHandler, ResolveJob, ResolveJobGenerator, ResolveOutcome};
use crate::env::EngineConfig;
use crate::error::EngineError;
use crate::scheduler::StopTimers;
use crate::signal::StopHandle;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use tb_adapters::{
    BuildRequest, BuildResult, CommandHandle, DependencyResolver, MetadataLoader, ResolveError,
    ResolveResponse, WorkerDispatch, WorkerEvent, WorkerNotifier,
};
use tb_core::{ArtifactId, Clock, FailureReason, Job, JobState, TroveSpec, TroveState};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

const SANITY_ERROR: &str = "group, redirect, and fileset packages must be alone in their own job";

/// External collaborators a [`Builder`] drives
pub struct BuilderDeps<W, R, L> {
    pub worker: W,
    pub resolver: R,
    pub loader: L,
}

/// What happened to a finished build relative to the rest of the job
enum BuiltVerdict {
    Fresh,
    DuplicateOf(TroveSpec),
    Conflict(String),
}

/// A resolve running on its own task while the loop keeps polling
struct PendingResolve {
    job: ResolveJob,
    task: JoinHandle<Result<ResolveResponse, ResolveError>>,
}

/// Drives one job from `Init` to `Built` or `Failed`.
pub struct Builder<W, R, L, C: Clock> {
    job: Job,
    deps: BuilderDeps<W, R, L>,
    clock: C,
    config: EngineConfig,
    stop: StopHandle,
    notifier: WorkerNotifier,
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    in_flight: IndexMap<CommandHandle, TroveSpec>,
    /// Stopped builds that have not exited yet
    stopping: IndexMap<CommandHandle, TroveSpec>,
    resolving: Option<PendingResolve>,
    timers: StopTimers,
    dispatched_any: bool,
}

impl<W, R, L, C> Builder<W, R, L, C>
where
    W: WorkerDispatch,
    R: DependencyResolver,
    L: MetadataLoader,
    C: Clock,
{
    pub fn new(job: Job, deps: BuilderDeps<W, R, L>, clock: C, config: EngineConfig) -> Self {
        let (notifier, events) = WorkerNotifier::channel();
        Self {
            job,
            deps,
            clock,
            config,
            stop: StopHandle::new(),
            notifier,
            events,
            in_flight: IndexMap::new(),
            stopping: IndexMap::new(),
            resolving: None,
            timers: StopTimers::new(),
            dispatched_any: false,
        }
    }

    /// Share an existing stop handle, e.g. one watched by a signal task.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn into_job(self) -> Job {
        self.job
    }

    /// Run the job to completion and return its final state.
    ///
    /// Loop errors never escape: in-flight work is stopped and the job is
    /// failed with an internal error.
    pub async fn build(&mut self) -> JobState {
        let span = tracing::info_span!("job.build", job_id = %self.job.id());
        async {
            if let Err(e) = self.run().await {
                tracing::error!(error = %e, "build loop aborted");
                self.stop_in_flight().await;
                if !self.job.state().is_terminal() {
                    if let Err(e) = self.job.job_failed(e.into_failure()) {
                        tracing::error!(error = %e, "failed to record job failure");
                    }
                }
            }
            if let Some(e) = self.job.take_publish_errors() {
                tracing::warn!(error = %e, "subscribers failed during the build");
            }
            tracing::info!(state = %self.job.state().display_name(), "build finished");
            self.job.state()
        }
        .instrument(span)
        .await
    }

    async fn run(&mut self) -> Result<(), EngineError> {
        self.job.job_loading()?;
        self.job.job_log("Build started - loading troves");
        self.load().await?;
        if !self.sanity_check()? {
            return Ok(());
        }
        self.job.job_building()?;
        self.job.job_log("Finding a buildable trove");

        let mut handler = DependencyHandler::new(&mut self.job)?;
        let mut backoff = self.config.idle_backoff;
        loop {
            if let Some(reason) = self.stop.requested() {
                drop(handler);
                return self.stop_job(reason).await;
            }
            self.stop_requested_troves().await?;
            self.fire_timers().await;

            handler.update(&mut self.job)?;
            if !handler.more_to_do() && self.in_flight.is_empty() && self.resolving.is_none() {
                break;
            }

            let progressed = if self.collect_resolution(&mut handler).await? {
                true
            } else if self.collect_results().await? {
                true
            } else if let Some(spec) = handler.pop_buildable(&self.job) {
                self.dispatch(spec).await?;
                true
            } else if self.resolving.is_some() {
                false
            } else if let Some(rj) = handler.next_resolve_job(&self.job) {
                self.resolve(&mut handler, rj).await?;
                true
            } else {
                false
            };

            if progressed {
                backoff = self.config.idle_backoff;
            } else {
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2).min(self.config.idle_backoff_max);
            }
        }
        drop(handler);

        self.drain_stopping().await;
        self.finish()
    }

    async fn load(&mut self) -> Result<(), EngineError> {
        let specs = self.job.specs();
        let results = self.deps.loader.load_unit_metadata(&specs).await?;
        for spec in &specs {
            match results.get(spec) {
                Some(Ok(metadata)) => self.job.set_metadata(spec, metadata.clone())?,
                Some(Err(message)) => {
                    tracing::warn!(trove = %spec, error = %message, "failed to load recipe");
                    self.job
                        .trove_failed(spec, FailureReason::load_failed(message.clone()), true)?;
                }
                None => {
                    self.job.trove_failed(
                        spec,
                        FailureReason::load_failed("loader returned no result"),
                        true,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Aggregating recipes must be alone. Returns false when the job failed.
    fn sanity_check(&mut self) -> Result<bool, EngineError> {
        if self.job.len() < 2 {
            return Ok(true);
        }
        let offenders: Vec<TroveSpec> = self
            .job
            .troves()
            .filter(|t| !t.is_finished() && t.recipe_type().must_build_alone())
            .map(|t| t.spec().clone())
            .collect();
        if offenders.is_empty() {
            return Ok(true);
        }

        for spec in &offenders {
            self.job.trove_failed(
                spec,
                FailureReason::failed(format!("Trove failed sanity check: {SANITY_ERROR}")),
                true,
            )?;
        }
        let names: Vec<&str> = offenders.iter().map(TroveSpec::package).collect();
        let reason = FailureReason::failed(format!(
            "Job failed sanity check: {SANITY_ERROR}: {}",
            names.join(", ")
        ));
        self.job.job_failed(reason)?;
        Ok(false)
    }

    async fn dispatch(&mut self, spec: TroveSpec) -> Result<(), EngineError> {
        let trove = self
            .job
            .trove(&spec)
            .ok_or_else(|| EngineError::Invariant(format!("buildable trove {spec} is not in the job")))?;
        let config = self.job.config_for(&spec);
        let request = BuildRequest {
            trove: spec.clone(),
            resolved: trove.resolved_requirements().to_vec(),
            target_label: config.target_label.clone(),
            prepare_only: config.prepare_only,
            notifier: self.notifier.clone(),
        };

        self.job.job_log(format!("Building {}", spec.name));
        self.job.trove_preparing(&spec, self.clock.epoch_ms())?;
        self.dispatched_any = true;
        match self.deps.worker.dispatch_build(request).await {
            Ok(handle) => {
                tracing::info!(trove = %spec, %handle, "dispatched build");
                self.in_flight.insert(handle, spec);
            }
            Err(e) => {
                tracing::warn!(trove = %spec, error = %e, "dispatch failed");
                self.job.trove_failed(&spec, e.failure_reason(), true)?;
            }
        }
        Ok(())
    }

    /// Start resolving `rj`. Locally satisfied jobs apply at once; the rest
    /// run on a task that [`collect_resolution`](Self::collect_resolution) polls.
    async fn resolve(
        &mut self,
        handler: &mut DependencyHandler,
        rj: ResolveJob,
    ) -> Result<(), EngineError> {
        self.job.trove_resolving(&rj.trove, self.clock.epoch_ms())?;
        if rj.is_local() {
            let outcome = ResolveOutcome::Resolved(rj.local.clone());
            tracing::debug!(trove = %rj.trove, cycle_break = rj.cycle_break, ?outcome, "resolved locally");
            return handler.apply_resolution(&mut self.job, &rj, outcome);
        }

        let request = ResolveJobGenerator::new(&self.job).request(&rj);
        let resolver = self.deps.resolver.clone();
        let task = tokio::spawn(async move { resolver.resolve(&request).await });
        self.resolving = Some(PendingResolve { job: rj, task });
        // Fast resolvers answer before the next pass
        tokio::task::yield_now().await;
        Ok(())
    }

    /// Apply the pending resolve if its task has finished.
    async fn collect_resolution(&mut self, handler: &mut DependencyHandler) -> Result<bool, EngineError> {
        if !self.resolving.as_ref().is_some_and(|p| p.task.is_finished()) {
            return Ok(false);
        }
        let Some(PendingResolve { job: rj, task }) = self.resolving.take() else {
            return Ok(false);
        };
        let result = task.await?;
        let outcome = ResolveJobGenerator::new(&self.job).interpret(&rj, result)?;
        tracing::debug!(trove = %rj.trove, cycle_break = rj.cycle_break, ?outcome, "resolved");
        handler.apply_resolution(&mut self.job, &rj, outcome)?;
        Ok(true)
    }

    fn abort_resolution(&mut self) {
        if let Some(pending) = self.resolving.take() {
            tracing::info!(trove = %pending.job.trove, "abandoning resolve");
            pending.task.abort();
        }
    }

    // -- results --

    /// Drain worker notifications, then poll every running build.
    async fn collect_results(&mut self) -> Result<bool, EngineError> {
        let mut progressed = false;
        while let Ok(event) = self.events.try_recv() {
            progressed = true;
            self.apply_worker_event(event)?;
        }

        let handles: Vec<CommandHandle> = self.in_flight.keys().cloned().collect();
        for handle in handles {
            if let Some(result) = self.deps.worker.check_result(&handle).await? {
                progressed = true;
                self.apply_result(&handle, result)?;
            }
        }

        self.poll_stopping().await;
        Ok(progressed)
    }

    fn apply_worker_event(&mut self, event: WorkerEvent) -> Result<(), EngineError> {
        match event {
            WorkerEvent::Building {
                handle,
                pid,
                worker,
            } => {
                let Some(spec) = self.in_flight.get(&handle).cloned() else {
                    tracing::debug!(%handle, "building notice for unknown handle");
                    return Ok(());
                };
                if self
                    .job
                    .trove(&spec)
                    .is_some_and(|t| t.state() == TroveState::Preparing)
                {
                    self.job
                        .trove_building(&spec, pid, worker, self.clock.epoch_ms())?;
                }
            }
            WorkerEvent::Log { handle, message } => {
                let spec = self
                    .in_flight
                    .get(&handle)
                    .or_else(|| self.stopping.get(&handle))
                    .cloned();
                if let Some(spec) = spec {
                    self.job.trove_log(&spec, message)?;
                }
            }
            WorkerEvent::Finished { handle, result } => {
                if self.stopping.shift_remove(&handle).is_some() {
                    self.timers.cancel(&handle);
                    tracing::debug!(%handle, "stopped build exited");
                    return Ok(());
                }
                self.apply_result(&handle, result)?;
            }
        }
        Ok(())
    }

    fn apply_result(&mut self, handle: &CommandHandle, result: BuildResult) -> Result<(), EngineError> {
        let Some(spec) = self.in_flight.shift_remove(handle) else {
            tracing::debug!(%handle, "result for unknown handle");
            return Ok(());
        };
        if self.job.trove(&spec).is_none_or(|t| t.is_finished()) {
            tracing::debug!(trove = %spec, "result for finished trove ignored");
            return Ok(());
        }
        let now = self.clock.epoch_ms();
        match result {
            BuildResult::Built { artifacts } => self.built(&spec, artifacts, now)?,
            BuildResult::Prepared => self.job.trove_prepared(&spec, now)?,
            BuildResult::Failed(reason) => {
                tracing::warn!(trove = %spec, reason = %reason.short(), "build failed");
                self.job.trove_failed(&spec, reason, true)?;
            }
        }
        Ok(())
    }

    fn built(&mut self, spec: &TroveSpec, artifacts: Vec<ArtifactId>, now: u64) -> Result<(), EngineError> {
        match self.compare_built(spec, &artifacts) {
            BuiltVerdict::Fresh => {
                tracing::info!(trove = %spec, artifacts = artifacts.len(), "trove built");
                self.job.trove_built(spec, artifacts, now)?;
            }
            BuiltVerdict::DuplicateOf(other) => {
                tracing::info!(trove = %spec, duplicate_of = %other, "trove duplicates another build");
                self.job.trove_duplicate(spec, artifacts)?;
            }
            BuiltVerdict::Conflict(name) => {
                let reason = FailureReason::build_failed(format!(
                    "Two versions of {name} were built at the same time but resulted in different components"
                ));
                self.job.trove_failed(spec, reason, true)?;
            }
        }
        Ok(())
    }

    fn compare_built(&self, spec: &TroveSpec, artifacts: &[ArtifactId]) -> BuiltVerdict {
        let mine: BTreeSet<(&str, &str)> = artifacts
            .iter()
            .map(|a| (a.name.as_str(), a.version.as_str()))
            .collect();
        for other in self.job.troves() {
            if other.spec() == spec || other.state() != TroveState::Built {
                continue;
            }
            let theirs: BTreeSet<(&str, &str)> = other
                .built_artifacts()
                .iter()
                .map(|a| (a.name.as_str(), a.version.as_str()))
                .collect();
            if theirs == mine {
                return BuiltVerdict::DuplicateOf(other.spec().clone());
            }
            if let Some((name, _)) = mine.intersection(&theirs).next() {
                return BuiltVerdict::Conflict(name.to_string());
            }
        }
        BuiltVerdict::Fresh
    }

    // -- stopping --

    async fn stop_requested_troves(&mut self) -> Result<(), EngineError> {
        for spec in self.stop.take_trove_requests() {
            let handle = self
                .in_flight
                .iter()
                .find(|(_, s)| **s == spec)
                .map(|(h, _)| h.clone());
            match handle {
                Some(handle) => self.stop_build(handle).await?,
                None if self.resolving.as_ref().is_some_and(|p| p.job.trove == spec) => {
                    self.abort_resolution();
                    self.job
                        .trove_failed(&spec, FailureReason::stopped("stop requested"), true)?;
                }
                None if self.job.trove(&spec).is_some_and(|t| !t.is_finished()) => {
                    self.job
                        .trove_failed(&spec, FailureReason::stopped("stop requested"), true)?;
                }
                None => tracing::debug!(trove = %spec, "stop request for finished trove ignored"),
            }
        }
        Ok(())
    }

    /// Ask one build to stop, fail its trove, and arm the kill timer.
    async fn stop_build(&mut self, handle: CommandHandle) -> Result<(), EngineError> {
        let Some(spec) = self.in_flight.shift_remove(&handle) else {
            return Ok(());
        };
        tracing::info!(trove = %spec, %handle, "stopping build");
        if let Err(e) = self.deps.worker.stop(&handle).await {
            tracing::warn!(%handle, error = %e, "failed to stop build");
        }
        if self.job.trove(&spec).is_some_and(|t| !t.is_finished()) {
            self.job
                .trove_failed(&spec, FailureReason::stopped("stop requested"), true)?;
        }
        self.timers
            .arm(handle.clone(), self.config.stop_grace, self.clock.now());
        self.stopping.insert(handle, spec);
        Ok(())
    }

    async fn stop_job(&mut self, reason: String) -> Result<(), EngineError> {
        tracing::warn!(%reason, "stopping job");
        self.abort_resolution();
        let handles: Vec<CommandHandle> = self.in_flight.keys().cloned().collect();
        for handle in handles {
            self.stop_build(handle).await?;
        }
        self.drain_stopping().await;
        self.job.job_failed(FailureReason::stopped(reason))?;
        Ok(())
    }

    /// Best-effort stop used when the loop itself failed.
    async fn stop_in_flight(&mut self) {
        self.abort_resolution();
        let handles: Vec<CommandHandle> = self.in_flight.keys().cloned().collect();
        for handle in handles {
            if let Err(e) = self.stop_build(handle).await {
                tracing::warn!(error = %e, "failed to stop build after loop error");
            }
        }
        self.drain_stopping().await;
    }

    async fn fire_timers(&mut self) {
        for handle in self.timers.fired(self.clock.now()) {
            let spec = self.stopping.shift_remove(&handle);
            tracing::warn!(%handle, trove = ?spec, "stop grace expired, killing build");
            if let Err(e) = self.deps.worker.kill(&handle).await {
                tracing::warn!(%handle, error = %e, "failed to kill build");
            }
        }
    }

    /// Forget stopped builds that have exited.
    async fn poll_stopping(&mut self) {
        let handles: Vec<CommandHandle> = self.stopping.keys().cloned().collect();
        for handle in handles {
            match self.deps.worker.check_result(&handle).await {
                Ok(None) => {}
                Ok(Some(_)) | Err(_) => {
                    self.timers.cancel(&handle);
                    self.stopping.shift_remove(&handle);
                }
            }
        }
    }

    /// Wait until every stopped build has exited or been killed.
    async fn drain_stopping(&mut self) {
        while !self.stopping.is_empty() {
            while let Ok(event) = self.events.try_recv() {
                if let Err(e) = self.apply_worker_event(event) {
                    tracing::warn!(error = %e, "worker event dropped while stopping");
                }
            }
            self.poll_stopping().await;
            self.fire_timers().await;
            if self.stopping.is_empty() {
                break;
            }
            let wait = self
                .timers
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(self.clock.now()))
                .unwrap_or(self.config.idle_backoff)
                .max(self.config.idle_backoff)
                .min(self.config.idle_backoff_max);
            tokio::time::sleep(wait).await;
        }
    }

    // -- exit --

    fn finish(&mut self) -> Result<(), EngineError> {
        let failures: Vec<String> = self
            .job
            .primary_failures()
            .map(|t| {
                let reason = t.failure().map(FailureReason::short).unwrap_or_default();
                format!("{}: {}", t.spec(), reason)
            })
            .collect();
        let unfinished: Vec<TroveSpec> = self.job.unfinished().map(|t| t.spec().clone()).collect();

        if failures.is_empty() && !self.dispatched_any {
            tracing::warn!(unfinished = unfinished.len(), "no trove was ever buildable");
            self.job
                .job_failed(FailureReason::failed("Did not find any buildable troves"))?;
            return Ok(());
        }
        if failures.is_empty() && unfinished.is_empty() {
            self.job.job_built()?;
            return Ok(());
        }

        // Without a primary failure, the stuck troves are the cause
        let lines: Vec<String> = if failures.is_empty() {
            self.job
                .unfinished()
                .map(|t| {
                    let status = match t.status() {
                        "" => t.state().display_name(),
                        status => status,
                    };
                    format!("{}: {}", t.spec(), status)
                })
                .collect()
        } else {
            failures
        };
        let mut summary = String::from("Build job had failures:");
        for line in &lines {
            summary.push_str("\n   ");
            summary.push_str(line);
        }
        self.job.cork();
        let mut result = Ok(());
        for spec in &unfinished {
            result = self
                .job
                .trove_failed(spec, FailureReason::stopped(summary.clone()), false);
            if result.is_err() {
                break;
            }
        }
        self.job.uncork();
        result?;
        self.job.job_failed(FailureReason::failed(summary))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
