// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build requirement resolution against binary repositories

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeArtifact, FakeResolver};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use tb_core::{ArtifactId, Flavor, MissingDependency, ReqSpec, TroveSpec};
use thiserror::Error;

/// Errors from resolution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unresolved runtime dependencies: {}", list(.0))]
    MissingDependencies(Vec<MissingDependency>),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

fn list(deps: &[MissingDependency]) -> String {
    deps.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// One place to search for candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveSource {
    /// An explicit list of artifacts
    Troves(Vec<ArtifactId>),
    /// Everything published on a repository label
    Label(String),
}

impl fmt::Display for ResolveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveSource::Troves(troves) => write!(f, "troves({})", troves.len()),
            ResolveSource::Label(label) => write!(f, "{label}"),
        }
    }
}

/// Requirements of one trove to resolve, with buckets in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    pub trove: TroveSpec,
    pub requirements: Vec<ReqSpec>,
    pub cross_requirements: Vec<ReqSpec>,
    pub buckets: Vec<ResolveSource>,
    pub install_flavors: Vec<Flavor>,
}

impl ResolveRequest {
    pub fn all_requirements(&self) -> impl Iterator<Item = &ReqSpec> {
        self.requirements.iter().chain(&self.cross_requirements)
    }
}

/// An artifact that could satisfy a requirement, with the bucket it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub artifact: ArtifactId,
    pub bucket: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveResponse {
    /// Candidates per requirement; requirements with none may be absent
    pub candidates: BTreeMap<ReqSpec, Vec<Candidate>>,
    /// Runtime dependencies pulled in by the candidates
    pub dependencies: Vec<ArtifactId>,
}

/// Resolves build requirements to concrete artifacts
#[async_trait]
pub trait DependencyResolver: Clone + Send + Sync + 'static {
    async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse, ResolveError>;
}
