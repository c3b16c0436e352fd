// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{
    ArtifactId, ContextConfig, Event, EventKind, EventQueue, Flavor, Interest, Job, JobId,
    PrebuiltRecord, ReqSpec, TroveMetadata, TroveSpec, TroveState,
};
use std::sync::Arc;

// ── Identity helpers ────────────────────────────────────────────────────────

/// `name:source=1[]` in the main context.
pub fn source(name: &str) -> TroveSpec {
    TroveSpec::new(format!("{name}:source"), "1", Flavor::empty())
}

/// `name:source=version[flavor]` in the main context.
pub fn source_with(name: &str, version: &str, flavor: &str) -> TroveSpec {
    TroveSpec::new(format!("{name}:source"), version, flavor_of(flavor))
}

pub fn flavor_of(s: &str) -> Flavor {
    Flavor::parse(s).unwrap_or_else(|e| unreachable_fixture(s, e))
}

pub fn req(s: &str) -> ReqSpec {
    ReqSpec::parse(s).unwrap_or_else(|e| unreachable_fixture(s, e))
}

pub fn artifact(s: &str) -> ArtifactId {
    ArtifactId::parse(s).unwrap_or_else(|e| unreachable_fixture(s, e))
}

#[allow(clippy::panic)]
fn unreachable_fixture<T>(input: &str, err: impl std::fmt::Display) -> T {
    panic!("bad fixture {input:?}: {err}")
}

// ── Metadata builders ───────────────────────────────────────────────────────

/// Metadata with the given build requirements.
pub fn requires(reqs: &[&str]) -> TroveMetadata {
    TroveMetadata {
        build_requirements: reqs.iter().map(|r| req(r)).collect(),
        ..TroveMetadata::default()
    }
}

/// Metadata with build and cross requirements.
pub fn requires_cross(reqs: &[&str], cross: &[&str]) -> TroveMetadata {
    TroveMetadata {
        cross_requirements: cross.iter().map(|r| req(r)).collect(),
        ..requires(reqs)
    }
}

pub fn prebuilt(artifacts: &[&str], build_requirements: &[&str], source_matches: bool) -> PrebuiltRecord {
    PrebuiltRecord {
        artifacts: artifacts.iter().map(|a| artifact(a)).collect(),
        build_requirements: build_requirements.iter().map(|a| artifact(a)).collect(),
        source_matches,
    }
}

// ── Jobs and events ─────────────────────────────────────────────────────────

/// Every event kind.
pub fn all_kinds() -> Vec<Interest> {
    EventKind::ALL.into_iter().map(Interest::Kind).collect()
}

/// Queue attached to `job` that records every event.
pub fn record_all(job: &Job) -> Arc<EventQueue> {
    let queue = Arc::new(EventQueue::new("recorder", all_kinds()));
    job.publisher().attach(queue.clone());
    queue
}

/// A job in the main context populated with `specs`.
#[allow(clippy::panic)]
pub fn job_of(specs: Vec<TroveSpec>) -> Job {
    let mut job = Job::new(JobId::new("job-1"), ContextConfig::default(), 1_000_000);
    if let Err(e) = job.set_troves(specs) {
        panic!("bad fixture job: {e}");
    }
    job
}

/// `(trove, old, new)` for every trove state change in `events`.
pub fn trove_transitions(events: &[Event]) -> Vec<(TroveSpec, TroveState, TroveState)> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::TroveStateUpdated {
                trove,
                old_state,
                state,
                ..
            } => Some((trove.clone(), *old_state, *state)),
            _ => None,
        })
        .collect()
}
