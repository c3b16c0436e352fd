// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory repository for resolution tests
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Candidate, DependencyResolver, ResolveError, ResolveRequest, ResolveResponse, ResolveSource};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tb_core::{ArtifactId, MissingDependency, ReqSpec};

/// A published artifact and its runtime requirements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeArtifact {
    pub id: ArtifactId,
    pub requires: Vec<ReqSpec>,
}

impl FakeArtifact {
    pub fn new(id: ArtifactId) -> Self {
        Self {
            id,
            requires: Vec::new(),
        }
    }

    pub fn requiring(mut self, req: ReqSpec) -> Self {
        self.requires.push(req);
        self
    }
}

#[derive(Default)]
struct FakeResolverState {
    labels: HashMap<String, Vec<FakeArtifact>>,
    requests: Vec<ResolveRequest>,
    error: Option<ResolveError>,
    hang: bool,
}

/// Fake resolver backed by per-label artifact lists
#[derive(Clone, Default)]
pub struct FakeResolver {
    inner: Arc<Mutex<FakeResolverState>>,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `artifact` on `label`.
    pub fn publish(&self, label: &str, artifact: FakeArtifact) {
        self.inner
            .lock()
            .labels
            .entry(label.to_string())
            .or_default()
            .push(artifact);
    }

    /// Fail every resolve with `error` until cleared.
    pub fn fail_with(&self, error: Option<ResolveError>) {
        self.inner.lock().error = error;
    }

    /// Never answer resolves started after this, like a wedged repository.
    pub fn hang(&self) {
        self.inner.lock().hang = true;
    }

    pub fn requests(&self) -> Vec<ResolveRequest> {
        self.inner.lock().requests.clone()
    }
}

impl FakeResolverState {
    fn requires_of(&self, id: &ArtifactId) -> Vec<ReqSpec> {
        self.labels
            .values()
            .flatten()
            .find(|a| &a.id == id)
            .map(|a| a.requires.clone())
            .unwrap_or_default()
    }

    fn candidates(&self, req: &ReqSpec, buckets: &[ResolveSource]) -> Vec<Candidate> {
        let mut found = Vec::new();
        for (bucket, source) in buckets.iter().enumerate() {
            let artifacts: Vec<ArtifactId> = match source {
                ResolveSource::Troves(list) => list.clone(),
                ResolveSource::Label(label) => self
                    .labels
                    .get(label)
                    .map(|l| l.iter().map(|a| a.id.clone()).collect())
                    .unwrap_or_default(),
            };
            found.extend(
                artifacts
                    .into_iter()
                    .filter(|a| req.matches(a))
                    .map(|artifact| Candidate { artifact, bucket }),
            );
        }
        found
    }
}

#[async_trait]
impl DependencyResolver for FakeResolver {
    async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse, ResolveError> {
        let hang = {
            let mut inner = self.inner.lock();
            inner.requests.push(request.clone());
            inner.hang
        };
        if hang {
            std::future::pending::<()>().await;
        }

        let inner = self.inner.lock();
        if let Some(err) = &inner.error {
            return Err(err.clone());
        }

        let mut response = ResolveResponse::default();
        let mut pending = Vec::new();
        for req in request.all_requirements() {
            let found = inner.candidates(req, &request.buckets);
            if let Some(first) = found.first() {
                pending.push(first.artifact.clone());
            }
            if !found.is_empty() {
                response.candidates.insert(req.clone(), found);
            }
        }

        // Runtime closure of the first candidate of each requirement
        let mut seen: BTreeSet<ArtifactId> = pending.iter().cloned().collect();
        let mut missing = Vec::new();
        while let Some(artifact) = pending.pop() {
            for dep in inner.requires_of(&artifact) {
                match inner.candidates(&dep, &request.buckets).into_iter().next() {
                    Some(c) => {
                        if seen.insert(c.artifact.clone()) {
                            response.dependencies.push(c.artifact.clone());
                            pending.push(c.artifact);
                        }
                    }
                    None => missing.push(MissingDependency {
                        artifact: artifact.clone(),
                        dependency: dep.to_string(),
                    }),
                }
            }
        }
        if !missing.is_empty() {
            return Err(ResolveError::MissingDependencies(missing));
        }
        Ok(response)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
