// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency handler tests

mod cross;
mod cycles;
mod failures;
mod prebuilt;
mod scheduling;

use super::*;
use tb_adapters::default_artifacts;
use tb_core::test_support::{artifact, job_of, requires, source};
use tb_core::TroveMetadata;

/// A job driven by hand: the test plays the builder.
struct Harness {
    job: Job,
    handler: DependencyHandler,
}

impl Harness {
    fn new(troves: Vec<(TroveSpec, TroveMetadata)>) -> Self {
        let mut job = job_of(troves.iter().map(|(s, _)| s.clone()).collect());
        for (spec, metadata) in troves {
            job.set_metadata(&spec, metadata).unwrap();
        }
        Self::from_job(job)
    }

    fn from_job(mut job: Job) -> Self {
        let handler = DependencyHandler::new(&mut job).unwrap();
        let mut harness = Self { job, handler };
        harness.update();
        harness
    }

    fn update(&mut self) {
        self.handler.update(&mut self.job).unwrap();
    }

    fn state(&self, spec: &TroveSpec) -> TroveState {
        self.job.trove(spec).unwrap().state()
    }

    fn trove(&self, spec: &TroveSpec) -> &BuildTrove {
        self.job.trove(spec).unwrap()
    }

    fn buildable(&self) -> Vec<TroveSpec> {
        self.handler.buildable().cloned().collect()
    }

    /// Dispatch and finish `spec` with the default fake artifacts.
    fn build(&mut self, spec: &TroveSpec) {
        assert_eq!(self.handler.pop_buildable(&self.job).as_ref(), Some(spec));
        self.job.trove_preparing(spec, 0).unwrap();
        self.job
            .trove_built(spec, default_artifacts(spec), 0)
            .unwrap();
        self.update();
    }

    fn fail(&mut self, spec: &TroveSpec, reason: FailureReason) {
        self.job.trove_failed(spec, reason, true).unwrap();
        self.update();
    }

    /// Run the next resolve job with an outcome chosen by `decide`.
    fn resolve(&mut self, decide: impl FnOnce(&ResolveJob) -> ResolveOutcome) -> ResolveJob {
        let rj = self
            .handler
            .next_resolve_job(&self.job)
            .expect("a resolve job is queued");
        self.job.trove_resolving(&rj.trove, 0).unwrap();
        let outcome = decide(&rj);
        self.handler
            .apply_resolution(&mut self.job, &rj, outcome)
            .unwrap();
        self.update();
        rj
    }

    /// Resolve the next job, satisfying every external requirement with `name=1[]`.
    fn resolve_externally(&mut self) -> ResolveJob {
        self.resolve(externally)
    }
}

fn externally(rj: &ResolveJob) -> ResolveOutcome {
    let mut resolved = rj.local.clone();
    for req in rj.requirements.iter().chain(&rj.cross_requirements) {
        resolved.push(artifact(&format!("{}=1[]", req.name)));
    }
    ResolveOutcome::Resolved(resolved)
}

fn none() -> TroveMetadata {
    TroveMetadata::default()
}
