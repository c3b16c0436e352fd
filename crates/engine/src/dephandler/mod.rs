// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency-driven scheduling of a job's troves.
//!
//! The handler keeps a graph of unfinished troves (an edge points from a
//! requirer to an in-job provider) and watches the job's own trove events
//! to learn what finished. Each [`update`](DependencyHandler::update)
//! settles everything that follows from those events: leaves get queued
//! for resolution, failures cascade to requirers, and when nothing else
//! can move, leaf cycles get a cycle-breaking resolve.

mod prebuilt;
mod resolve;

pub use prebuilt::{diff_lines, Reuse};
pub use resolve::{choose, ResolveJob, ResolveJobGenerator, ResolveOutcome};

use crate::graph::DependencyGraph;
use crate::EngineError;
use indexmap::IndexMap;
use resolve::{push_unique, unfinished_producers};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tb_core::{
    package_name, ArtifactId, BuildTrove, Event, EventKind, EventQueue, FailureReason, Interest,
    Job, MissingDependency, Publisher, RebuildPolicy, ReqSpec, Subscriber, TroveSpec, TroveState,
};

/// Which requirement list a requirement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReqKind {
    Build,
    Cross,
}

/// Whether in-job trove `provider` can satisfy `req` of `requirer`.
///
/// Build requirements run on the build host, so a cross-compiled provider
/// never counts. Cross requirements of a cross-compiled trove need a
/// provider cross-compiled for the same target; otherwise they follow the
/// build rule.
pub fn provides(provider: &BuildTrove, requirer: &TroveSpec, req: &ReqSpec, kind: ReqKind) -> bool {
    let pf = &provider.spec().flavor;
    let uf = &requirer.flavor;
    if !provider.produces(req.package()) || !req.version_matches(&provider.spec().version) {
        return false;
    }
    if req.flavor.as_ref().is_some_and(|f| !pf.satisfies(f)) {
        return false;
    }
    match kind {
        ReqKind::Cross if uf.is_cross_compiled() => {
            pf.is_cross_compiled() && pf.target() == uf.target()
        }
        ReqKind::Build | ReqKind::Cross => !pf.is_cross_compiled() && pf.covers_arch(uf),
    }
}

#[derive(Debug, Clone)]
struct TrackedReq {
    req: ReqSpec,
    kind: ReqKind,
    /// In-job troves that could satisfy it; failed ones are dropped
    providers: Vec<TroveSpec>,
}

pub struct DependencyHandler {
    graph: DependencyGraph<TroveSpec>,
    requirements: IndexMap<TroveSpec, Vec<TrackedReq>>,
    buildable: VecDeque<TroveSpec>,
    resolve_queue: Vec<TroveSpec>,
    cycle_queue: VecDeque<TroveSpec>,
    cycle_attempts: HashSet<TroveSpec>,
    /// Artifacts built (not prebuilt) in this job
    fresh: HashSet<ArtifactId>,
    dirty: bool,
    inbox: Arc<EventQueue>,
    publisher: Arc<Publisher>,
}

impl DependencyHandler {
    /// Attach to `job`'s publisher and build the graph of its unfinished troves.
    ///
    /// Troves that already failed (during loading, or before a thaw) cascade
    /// to their requirers right away.
    pub fn new(job: &mut Job) -> Result<Self, EngineError> {
        let inbox = Arc::new(EventQueue::new(
            "dependency-handler",
            vec![Interest::Kind(EventKind::TroveStateUpdated)],
        ));
        let publisher = Arc::clone(job.publisher());
        publisher.attach(inbox.clone());
        let mut handler = Self {
            graph: DependencyGraph::new(),
            requirements: IndexMap::new(),
            buildable: VecDeque::new(),
            resolve_queue: Vec::new(),
            cycle_queue: VecDeque::new(),
            cycle_attempts: HashSet::new(),
            fresh: HashSet::new(),
            dirty: true,
            inbox,
            publisher,
        };
        handler.prepare(job)?;
        Ok(handler)
    }

    fn prepare(&mut self, job: &mut Job) -> Result<(), EngineError> {
        for trove in job.unfinished() {
            self.graph.add_node(trove.spec().clone());
        }
        for trove in job.unfinished() {
            let spec = trove.spec();
            let lists = [
                (trove.build_requirements(), ReqKind::Build),
                (trove.cross_requirements(), ReqKind::Cross),
            ];
            let mut tracked = Vec::new();
            for (reqs, kind) in lists {
                for req in reqs {
                    let providers: Vec<TroveSpec> = job
                        .troves()
                        .filter(|p| provides(p, spec, req, kind))
                        .map(|p| p.spec().clone())
                        .collect();
                    for provider in &providers {
                        self.graph.add_edge(spec, provider);
                    }
                    tracked.push(TrackedReq {
                        req: req.clone(),
                        kind,
                        providers,
                    });
                }
            }
            self.requirements.insert(spec.clone(), tracked);
        }
        for trove in job.troves() {
            if matches!(trove.state(), TroveState::Built | TroveState::Duplicate) {
                self.fresh.extend(trove.built_artifacts().iter().cloned());
            }
        }

        let failed: Vec<TroveSpec> = job
            .troves()
            .filter(|t| t.state().is_failure())
            .map(|t| t.spec().clone())
            .collect();
        for spec in &failed {
            self.fail_requirers(job, spec)?;
        }
        Ok(())
    }

    // -- queries --

    /// Work is queued: something to dispatch or resolve.
    pub fn more_to_do(&self) -> bool {
        !self.buildable.is_empty() || !self.resolve_queue.is_empty() || !self.cycle_queue.is_empty()
    }

    pub fn buildable(&self) -> impl Iterator<Item = &TroveSpec> {
        self.buildable.iter()
    }

    pub fn graph(&self) -> &DependencyGraph<TroveSpec> {
        &self.graph
    }

    /// Troves whose cycle-breaking resolve already failed.
    pub fn cycle_attempts(&self) -> &HashSet<TroveSpec> {
        &self.cycle_attempts
    }

    // -- scheduling --

    /// Apply every trove event since the last call and schedule what follows.
    pub fn update(&mut self, job: &mut Job) -> Result<(), EngineError> {
        loop {
            let mut progressed = self.process_events(job)?;
            progressed |= self.schedule_leaves(job)?;
            if !progressed {
                break;
            }
        }
        self.prune(job);
        if self.dirty && self.is_idle(job) {
            self.dirty = false;
            self.queue_cycle_breaks(job);
        }
        Ok(())
    }

    fn process_events(&mut self, job: &mut Job) -> Result<bool, EngineError> {
        let mut progressed = false;
        for event in self.inbox.drain() {
            let Event::TroveStateUpdated {
                job_id,
                trove,
                state,
                ..
            } = event
            else {
                continue;
            };
            if &job_id != job.id() || !state.is_finished() {
                continue;
            }
            progressed = true;
            self.graph.remove_node(&trove);
            self.requirements.shift_remove(&trove);
            self.cycle_attempts.clear();
            self.dirty = true;
            if state.is_failure() {
                self.fail_requirers(job, &trove)?;
            } else if matches!(state, TroveState::Built | TroveState::Duplicate) {
                if let Some(t) = job.trove(&trove) {
                    self.fresh.extend(t.built_artifacts().iter().cloned());
                }
            }
        }
        Ok(progressed)
    }

    /// Fail requirers left with no provider for some requirement once
    /// `failed` is gone.
    fn fail_requirers(&mut self, job: &mut Job, failed: &TroveSpec) -> Result<(), EngineError> {
        let mut doomed: Vec<(TroveSpec, Vec<ReqSpec>)> = Vec::new();
        for (spec, tracked) in self.requirements.iter_mut() {
            let mut lost = Vec::new();
            for t in tracked.iter_mut() {
                let before = t.providers.len();
                t.providers.retain(|p| p != failed);
                if before != t.providers.len() && t.providers.is_empty() {
                    lost.push(t.req.clone());
                }
            }
            if !lost.is_empty() && job.trove(spec).is_some_and(|t| !t.is_finished()) {
                doomed.push((spec.clone(), lost));
            }
        }
        if doomed.is_empty() {
            return Ok(());
        }

        job.cork();
        let mut result = Ok(());
        for (spec, reqs) in doomed {
            tracing::info!(trove = %spec, failed = %failed, "requirement failed, trove cannot build");
            if let Err(e) =
                job.trove_failed(&spec, FailureReason::missing_build_requirements(reqs), false)
            {
                result = Err(e);
                break;
            }
        }
        job.uncork();
        result.map_err(Into::into)
    }

    fn schedule_leaves(&mut self, job: &mut Job) -> Result<bool, EngineError> {
        let mut progressed = false;
        for spec in self.graph.leaves() {
            let trove = job
                .trove(&spec)
                .ok_or_else(|| EngineError::Invariant(format!("graph node {spec} is not in the job")))?;
            if trove.state() != TroveState::Init {
                continue;
            }
            progressed = true;
            if !trove.has_requirements() {
                self.mark_ready(job, &spec, Vec::new())?;
            } else if self.reuse_without_resolving(job, trove) {
                tracing::debug!(trove = %spec, "prebuilt without resolving");
                job.trove_prebuilt(&spec)?;
            } else {
                job.trove_waiting(&spec)?;
                self.resolve_queue.push(spec);
            }
        }
        Ok(progressed)
    }

    /// Fast restart: the record is trusted outright, or its source matches
    /// and every in-job provider was itself prebuilt.
    fn reuse_without_resolving(&self, job: &Job, trove: &BuildTrove) -> bool {
        let Some(record) = trove.prebuilt() else {
            return false;
        };
        if job.config_for(trove.spec()).rebuild_policy() == RebuildPolicy::IgnoreAll {
            return true;
        }
        record.source_matches
            && self
                .requirements
                .get(trove.spec())
                .into_iter()
                .flatten()
                .flat_map(|t| &t.providers)
                .all(|p| job.trove(p).is_some_and(|p| p.state() == TroveState::Prebuilt))
    }

    /// All requirements are met by `resolved`: become buildable, or prebuilt
    /// when the record allows.
    fn mark_ready(
        &mut self,
        job: &mut Job,
        spec: &TroveSpec,
        resolved: Vec<ArtifactId>,
    ) -> Result<(), EngineError> {
        self.requirements.shift_remove(spec);
        let record = job.trove(spec).and_then(|t| t.prebuilt()).cloned();
        if let Some(record) = record {
            let policy = job.config_for(spec).rebuild_policy();
            match prebuilt::decide(spec, policy, &record, &resolved, &self.fresh) {
                Reuse::Prebuilt => {
                    job.trove_prebuilt(spec)?;
                    return Ok(());
                }
                Reuse::Rebuild(lines) if !lines.is_empty() => {
                    job.trove_log(spec, lines.join("\n"))?;
                }
                Reuse::Rebuild(_) => {}
            }
        }
        job.trove_buildable(spec, resolved)?;
        self.buildable.push_back(spec.clone());
        Ok(())
    }

    /// Drop queued troves that moved on, e.g. failed by a cascade.
    fn prune(&mut self, job: &Job) {
        let in_state = |spec: &TroveSpec, state: TroveState| {
            job.trove(spec).is_some_and(|t| t.state() == state)
        };
        self.buildable.retain(|s| in_state(s, TroveState::Buildable));
        self.resolve_queue.retain(|s| in_state(s, TroveState::Waiting));
        self.cycle_queue.retain(|s| in_state(s, TroveState::Init));
    }

    /// Nothing queued and nothing handed to a collaborator.
    fn is_idle(&self, job: &Job) -> bool {
        !self.more_to_do()
            && !job
                .unfinished()
                .any(|t| t.state().is_in_flight() || t.state() == TroveState::Buildable)
    }

    fn queue_cycle_breaks(&mut self, job: &Job) {
        for cycle in self.graph.leaf_cycles() {
            let mut candidates: Vec<(usize, usize, TroveSpec)> = cycle
                .into_iter()
                .filter(|spec| !self.cycle_attempts.contains(spec))
                .filter(|spec| job.trove(spec).is_some_and(|t| t.state() == TroveState::Init))
                .map(|spec| {
                    let requirer_degree = self
                        .graph
                        .parents(&spec)
                        .map(|p| self.graph.out_degree(p))
                        .min()
                        .unwrap_or(0);
                    let index = job.index_of(&spec).unwrap_or(usize::MAX);
                    (requirer_degree, index, spec)
                })
                .collect();
            candidates.sort();
            if let Some((_, _, spec)) = candidates.into_iter().next() {
                tracing::info!(trove = %spec, "breaking dependency cycle");
                self.cycle_queue.push_back(spec);
            }
        }
    }

    /// Next trove to dispatch.
    pub fn pop_buildable(&mut self, job: &Job) -> Option<TroveSpec> {
        while let Some(spec) = self.buildable.pop_front() {
            if job.trove(&spec).is_some_and(|t| t.state() == TroveState::Buildable) {
                return Some(spec);
            }
        }
        None
    }

    /// Next resolution to run: the waiting trove with the most direct
    /// dependents (earliest in the job on ties), else a cycle break.
    pub fn next_resolve_job(&mut self, job: &Job) -> Option<ResolveJob> {
        self.prune(job);
        let mut best: Option<(usize, usize, usize)> = None;
        for (pos, spec) in self.resolve_queue.iter().enumerate() {
            let dependents = self.graph.in_degree(spec);
            let index = job.index_of(spec).unwrap_or(usize::MAX);
            let better = best.is_none_or(|(_, d, i)| dependents > d || (dependents == d && index < i));
            if better {
                best = Some((pos, dependents, index));
            }
        }
        if let Some((pos, _, _)) = best {
            let spec = self.resolve_queue.remove(pos);
            return Some(self.resolve_job(job, spec, false));
        }
        let spec = self.cycle_queue.pop_front()?;
        Some(self.resolve_job(job, spec, true))
    }

    /// Split a trove's requirements into locally satisfied and external ones.
    fn resolve_job(&self, job: &Job, trove: TroveSpec, cycle_break: bool) -> ResolveJob {
        let mut rj = ResolveJob {
            trove,
            requirements: Vec::new(),
            cross_requirements: Vec::new(),
            local: Vec::new(),
            cycle_break,
        };
        let tracked = self.requirements.get(&rj.trove).map(Vec::as_slice).unwrap_or_default();
        for t in tracked {
            let local = t
                .providers
                .iter()
                .filter_map(|p| job.trove(p))
                .filter(|p| p.state().is_success())
                .flat_map(|p| p.built_artifacts())
                .find(|a| t.req.matches(a));
            match (local, t.kind) {
                (Some(artifact), _) => push_unique(&mut rj.local, artifact.clone()),
                (None, ReqKind::Build) => rj.requirements.push(t.req.clone()),
                (None, ReqKind::Cross) => rj.cross_requirements.push(t.req.clone()),
            }
        }
        rj
    }

    /// Apply the outcome of resolving `rj`.
    ///
    /// Outcomes for troves no longer resolving (failed meanwhile) are dropped.
    pub fn apply_resolution(
        &mut self,
        job: &mut Job,
        rj: &ResolveJob,
        outcome: ResolveOutcome,
    ) -> Result<(), EngineError> {
        let spec = &rj.trove;
        let state = job
            .trove(spec)
            .map(BuildTrove::state)
            .ok_or_else(|| EngineError::Invariant(format!("resolved trove {spec} is not in the job")))?;
        if state != TroveState::Resolving {
            tracing::debug!(trove = %spec, %state, "ignoring resolution for trove no longer resolving");
            return Ok(());
        }

        let unresolved = !matches!(outcome, ResolveOutcome::Resolved(_));
        if rj.cycle_break && unresolved {
            self.cycle_attempts.insert(spec.clone());
            self.dirty = true;
        }

        match outcome {
            ResolveOutcome::Resolved(resolved) => {
                if rj.cycle_break {
                    self.graph.delete_edges(spec);
                    self.dirty = true;
                }
                self.mark_ready(job, spec, resolved)?;
            }
            ResolveOutcome::Missing(reqs) if rj.cycle_break => {
                job.trove_cycle_unresolvable(spec, &reqs)?;
            }
            ResolveOutcome::Missing(reqs) => {
                job.trove_failed(spec, FailureReason::missing_build_requirements(reqs), true)?;
            }
            ResolveOutcome::Delayed(blocking) => {
                for b in &blocking {
                    self.graph.add_edge(spec, b);
                }
                job.trove_delayed(spec, blocking)?;
            }
            ResolveOutcome::MissingDependencies(deps) => match self.producers_of(job, spec, &deps) {
                Some(producers) => {
                    for p in &producers {
                        self.graph.add_edge(spec, p);
                    }
                    job.trove_waiting_on_dependencies(spec, &producers)?;
                }
                None => {
                    job.trove_failed(spec, FailureReason::missing_dependencies(deps), true)?;
                }
            },
        }
        Ok(())
    }

    /// Unfinished troves producing every missing dependency, or `None` when
    /// some dependency has no producer in this job.
    fn producers_of(
        &self,
        job: &Job,
        requirer: &TroveSpec,
        deps: &[MissingDependency],
    ) -> Option<Vec<TroveSpec>> {
        if deps.is_empty() {
            return None;
        }
        let mut producers = Vec::new();
        for dep in deps {
            let name = ReqSpec::parse(&dep.dependency)
                .map(|r| r.name)
                .unwrap_or_else(|_| package_name(&dep.dependency).to_string());
            let found = unfinished_producers(job, requirer, &ReqSpec::new(name), ReqKind::Build);
            if found.is_empty() {
                return None;
            }
            for p in found {
                push_unique(&mut producers, p);
            }
        }
        Some(producers)
    }
}

impl Drop for DependencyHandler {
    fn drop(&mut self) {
        let inbox: Arc<dyn Subscriber> = self.inbox.clone();
        self.publisher.detach(&inbox);
    }
}

#[cfg(test)]
#[path = "../dephandler_tests/mod.rs"]
mod tests;
