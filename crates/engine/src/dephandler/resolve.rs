// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Turning a trove's open requirements into resolver requests, and
//! resolver responses back into scheduling outcomes.

use super::{provides, ReqKind};
use tb_adapters::{Candidate, ResolveError, ResolveRequest, ResolveResponse, ResolveSource};
use tb_core::{
    ArtifactId, Flavor, Job, MissingDependency, ReqSpec, ResolvePolicy, TroveSpec,
};

/// Requirements of one trove that still need resolving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveJob {
    pub trove: TroveSpec,
    /// Build requirements left for the external resolver
    pub requirements: Vec<ReqSpec>,
    /// Cross requirements left for the external resolver
    pub cross_requirements: Vec<ReqSpec>,
    /// Artifacts built in this job that already satisfy requirements
    pub local: Vec<ArtifactId>,
    /// Issued to break a dependency cycle
    pub cycle_break: bool,
}

impl ResolveJob {
    /// Everything was satisfied from this job's own output.
    pub fn is_local(&self) -> bool {
        self.requirements.is_empty() && self.cross_requirements.is_empty()
    }
}

/// What a resolution means for the trove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Every requirement has an artifact; the full install set
    Resolved(Vec<ArtifactId>),
    /// Requirements with no candidate in any bucket
    Missing(Vec<ReqSpec>),
    /// Chosen artifacts are about to be rebuilt by these troves
    Delayed(Vec<TroveSpec>),
    /// Candidates pull in runtime dependencies nothing provides
    MissingDependencies(Vec<MissingDependency>),
}

/// Builds resolver requests for a job and interprets the answers.
pub struct ResolveJobGenerator<'a> {
    job: &'a Job,
}

impl<'a> ResolveJobGenerator<'a> {
    pub fn new(job: &'a Job) -> Self {
        Self { job }
    }

    /// Request for the external part of `rj`, with buckets in priority order.
    pub fn request(&self, rj: &ResolveJob) -> ResolveRequest {
        let config = self.job.config_for(&rj.trove);
        let mut buckets: Vec<ResolveSource> = config
            .resolve_troves
            .iter()
            .map(|troves| ResolveSource::Troves(troves.clone()))
            .collect();
        if config.resolve_policy() == ResolvePolicy::ResolveTrovesThenLabelPath {
            buckets.extend(
                config
                    .install_label_path
                    .iter()
                    .cloned()
                    .map(ResolveSource::Label),
            );
        }
        ResolveRequest {
            trove: rj.trove.clone(),
            requirements: rj.requirements.clone(),
            cross_requirements: rj.cross_requirements.clone(),
            buckets,
            install_flavors: config.flavor.clone(),
        }
    }

    /// Classify the resolver's answer for `rj`.
    ///
    /// Only an unavailable repository is an error; everything else is an
    /// outcome the dependency handler applies to the trove.
    pub fn interpret(
        &self,
        rj: &ResolveJob,
        result: Result<ResolveResponse, ResolveError>,
    ) -> Result<ResolveOutcome, ResolveError> {
        let response = match result {
            Ok(response) => response,
            Err(ResolveError::MissingDependencies(deps)) => {
                return Ok(ResolveOutcome::MissingDependencies(deps));
            }
            Err(e) => return Err(e),
        };

        let config = self.job.config_for(&rj.trove);
        let mut chosen: Vec<(ArtifactId, ReqKind)> = Vec::new();
        let mut missing = Vec::new();
        let reqs = (rj.requirements.iter().map(|r| (r, ReqKind::Build)))
            .chain(rj.cross_requirements.iter().map(|r| (r, ReqKind::Cross)));
        for (req, kind) in reqs {
            let pick = response
                .candidates
                .get(req)
                .and_then(|c| choose(c, &config.flavor_preferences, &config.flavor));
            match pick {
                Some(artifact) => push_unique(&mut chosen, (artifact.clone(), kind)),
                None => missing.push(req.clone()),
            }
        }
        if !missing.is_empty() {
            return Ok(ResolveOutcome::Missing(missing));
        }
        for dep in response.dependencies {
            push_unique(&mut chosen, (dep, ReqKind::Build));
        }

        if !rj.cycle_break {
            let mut blocking = Vec::new();
            for (artifact, kind) in &chosen {
                let req = ReqSpec::new(artifact.name.clone());
                for producer in unfinished_producers(self.job, &rj.trove, &req, *kind) {
                    push_unique(&mut blocking, producer);
                }
            }
            if !blocking.is_empty() {
                return Ok(ResolveOutcome::Delayed(blocking));
            }
        }

        let mut resolved = rj.local.clone();
        for (artifact, _) in chosen {
            push_unique(&mut resolved, artifact);
        }
        Ok(ResolveOutcome::Resolved(resolved))
    }
}

/// Pick one candidate: earliest bucket only, then the first flavor
/// preference matched, then the best install-flavor score, then the first.
pub fn choose<'c>(
    candidates: &'c [Candidate],
    preferences: &[Flavor],
    install: &[Flavor],
) -> Option<&'c ArtifactId> {
    let bucket = candidates.iter().map(|c| c.bucket).min()?;
    let pool: Vec<&ArtifactId> = candidates
        .iter()
        .filter(|c| c.bucket == bucket)
        .map(|c| &c.artifact)
        .collect();

    for pref in preferences {
        if let Some(artifact) = pool.iter().find(|a| a.flavor.matches_preference(pref)) {
            return Some(*artifact);
        }
    }

    let mut best: Option<(i32, &ArtifactId)> = None;
    for artifact in pool {
        let score = install
            .iter()
            .map(|f| artifact.flavor.score(f))
            .max()
            .unwrap_or(0);
        if best.is_none_or(|(top, _)| score > top) {
            best = Some((score, artifact));
        }
    }
    best.map(|(_, artifact)| artifact)
}

/// Unfinished troves of `job`, other than `requirer`, that could satisfy
/// `req` under the same rules as the dependency graph.
pub(crate) fn unfinished_producers(
    job: &Job,
    requirer: &TroveSpec,
    req: &ReqSpec,
    kind: ReqKind,
) -> Vec<TroveSpec> {
    job.unfinished()
        .filter(|t| t.spec() != requirer && provides(t, requirer, req, kind))
        .map(|t| t.spec().clone())
        .collect()
}

pub(crate) fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
