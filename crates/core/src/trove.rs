// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build unit ("trove") identity and lifecycle state.
//!
//! A [`BuildTrove`] is only mutated through the transition methods on
//! [`Job`](crate::Job), which validate the move and publish the change.

use crate::failure::FailureReason;
use crate::flavor::Flavor;
use crate::reqspec::{package_name, ArtifactId, ReqSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identity of a build unit within a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TroveSpec {
    pub name: String,
    pub version: String,
    pub flavor: Flavor,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context: String,
}

impl TroveSpec {
    pub fn new(name: impl Into<String>, version: impl Into<String>, flavor: Flavor) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            flavor,
            context: String::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Package name this trove builds (`foo` for `foo:source`).
    pub fn package(&self) -> &str {
        package_name(&self.name)
    }
}

impl fmt::Display for TroveSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}[{}]", self.name, self.version, self.flavor)?;
        if !self.context.is_empty() {
            write!(f, "{{{}}}", self.context)?;
        }
        Ok(())
    }
}

/// Lifecycle state of a build unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TroveState {
    Init,
    Resolving,
    Buildable,
    Waiting,
    Preparing,
    Building,
    Built,
    Failed,
    Unbuildable,
    Prebuilt,
    Duplicate,
    Prepared,
}

impl TroveState {
    pub fn display_name(self) -> &'static str {
        match self {
            TroveState::Init => "Initialized",
            TroveState::Resolving => "Resolving",
            TroveState::Buildable => "Buildable",
            TroveState::Waiting => "Waiting",
            TroveState::Preparing => "Preparing",
            TroveState::Building => "Building",
            TroveState::Built => "Built",
            TroveState::Failed => "Failed",
            TroveState::Unbuildable => "Unbuildable",
            TroveState::Prebuilt => "Prebuilt",
            TroveState::Duplicate => "Duplicate",
            TroveState::Prepared => "Prepared",
        }
    }

    pub fn is_finished(self) -> bool {
        self.is_success() || self.is_failure()
    }

    /// Terminal states that count as a usable result.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            TroveState::Built | TroveState::Prebuilt | TroveState::Duplicate | TroveState::Prepared
        )
    }

    pub fn is_failure(self) -> bool {
        matches!(self, TroveState::Failed | TroveState::Unbuildable)
    }

    /// Work has been handed to a collaborator and a response is outstanding.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            TroveState::Resolving | TroveState::Preparing | TroveState::Building
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_become(self, next: TroveState) -> bool {
        use TroveState::*;
        if self.is_finished() {
            return false;
        }
        if next.is_failure() {
            return true;
        }
        match self {
            Init => matches!(next, Waiting | Resolving | Buildable | Prebuilt),
            Waiting => matches!(next, Resolving | Init),
            Resolving => matches!(next, Init | Buildable | Prebuilt),
            Buildable => matches!(next, Resolving | Preparing | Building | Prebuilt | Duplicate),
            Preparing => matches!(next, Building | Built | Prepared | Duplicate),
            Building => matches!(next, Built | Prepared | Duplicate),
            Built | Failed | Unbuildable | Prebuilt | Duplicate | Prepared => false,
        }
    }
}

impl fmt::Display for TroveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Classification of what a recipe produces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeType {
    #[default]
    Package,
    Fileset,
    Group,
    Info,
    Redirect,
}

impl RecipeType {
    /// Aggregating recipes reference other troves and must build alone.
    pub fn must_build_alone(self) -> bool {
        matches!(
            self,
            RecipeType::Group | RecipeType::Redirect | RecipeType::Fileset
        )
    }
}

/// A previous build of this trove that may be reused instead of rebuilding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrebuiltRecord {
    /// Artifacts the previous build produced
    pub artifacts: Vec<ArtifactId>,
    /// Artifacts the previous build was built against
    pub build_requirements: Vec<ArtifactId>,
    /// The previous build came from exactly this source version
    #[serde(default)]
    pub source_matches: bool,
}

/// Recipe metadata discovered by loading a trove.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroveMetadata {
    #[serde(default)]
    pub build_requirements: BTreeSet<ReqSpec>,
    #[serde(default)]
    pub cross_requirements: BTreeSet<ReqSpec>,
    #[serde(default)]
    pub recipe_type: RecipeType,
    /// Packages the recipe produces; defaults to the trove's package name
    #[serde(default)]
    pub packages: BTreeSet<String>,
    #[serde(default)]
    pub prebuilt: Option<PrebuiltRecord>,
}

/// One build unit and everything known about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTrove {
    pub(crate) spec: TroveSpec,
    pub(crate) state: TroveState,
    pub(crate) status: String,
    pub(crate) failure: Option<FailureReason>,
    pub(crate) build_requirements: BTreeSet<ReqSpec>,
    pub(crate) cross_requirements: BTreeSet<ReqSpec>,
    pub(crate) built_artifacts: Vec<ArtifactId>,
    pub(crate) recipe_type: RecipeType,
    pub(crate) packages: BTreeSet<String>,
    pub(crate) resolved_requirements: Vec<ArtifactId>,
    pub(crate) pid: Option<u32>,
    pub(crate) worker: Option<String>,
    pub(crate) start_ms: Option<u64>,
    pub(crate) finish_ms: Option<u64>,
    pub(crate) prebuilt: Option<PrebuiltRecord>,
}

impl BuildTrove {
    pub(crate) fn new(spec: TroveSpec) -> Self {
        let packages = BTreeSet::from([spec.package().to_string()]);
        Self {
            spec,
            state: TroveState::Init,
            status: String::new(),
            failure: None,
            build_requirements: BTreeSet::new(),
            cross_requirements: BTreeSet::new(),
            built_artifacts: Vec::new(),
            recipe_type: RecipeType::default(),
            packages,
            resolved_requirements: Vec::new(),
            pid: None,
            worker: None,
            start_ms: None,
            finish_ms: None,
            prebuilt: None,
        }
    }

    pub(crate) fn apply_metadata(&mut self, metadata: TroveMetadata) {
        self.build_requirements = metadata.build_requirements;
        self.cross_requirements = metadata.cross_requirements;
        self.recipe_type = metadata.recipe_type;
        if !metadata.packages.is_empty() {
            self.packages = metadata.packages;
        }
        self.prebuilt = metadata.prebuilt;
    }

    pub fn spec(&self) -> &TroveSpec {
        &self.spec
    }

    pub fn state(&self) -> TroveState {
        self.state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    pub fn build_requirements(&self) -> &BTreeSet<ReqSpec> {
        &self.build_requirements
    }

    pub fn cross_requirements(&self) -> &BTreeSet<ReqSpec> {
        &self.cross_requirements
    }

    pub fn has_requirements(&self) -> bool {
        !self.build_requirements.is_empty() || !self.cross_requirements.is_empty()
    }

    pub fn built_artifacts(&self) -> &[ArtifactId] {
        &self.built_artifacts
    }

    pub fn recipe_type(&self) -> RecipeType {
        self.recipe_type
    }

    pub fn packages(&self) -> &BTreeSet<String> {
        &self.packages
    }

    pub fn produces(&self, package: &str) -> bool {
        self.packages.contains(package)
    }

    pub fn resolved_requirements(&self) -> &[ArtifactId] {
        &self.resolved_requirements
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn worker(&self) -> Option<&str> {
        self.worker.as_deref()
    }

    pub fn start_ms(&self) -> Option<u64> {
        self.start_ms
    }

    pub fn finish_ms(&self) -> Option<u64> {
        self.finish_ms
    }

    pub fn prebuilt(&self) -> Option<&PrebuiltRecord> {
        self.prebuilt.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// A failure caused by this trove itself rather than by another trove.
    pub fn is_primary_failure(&self) -> bool {
        self.state == TroveState::Failed
    }
}

#[cfg(test)]
#[path = "trove_tests.rs"]
mod tests;
