// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serializable job snapshots.
//!
//! [`FrozenJob`] is the persistence DTO for a [`Job`]. It is versioned
//! with `v` so stores can refuse snapshots written by a newer build.

use crate::config::ContextConfig;
use crate::failure::FailureReason;
use crate::job::{Job, JobId, JobState};
use crate::publisher::Publisher;
use crate::reqspec::{ArtifactId, ReqSpec};
use crate::trove::{BuildTrove, PrebuiltRecord, RecipeType, TroveSpec, TroveState};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

/// Current frozen job schema version
pub const FROZEN_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThawError {
    #[error("frozen job version {found} is newer than supported version {supported}")]
    TooNew { found: u32, supported: u32 },
    #[error("trove {0} appears more than once")]
    DuplicateTrove(String),
    #[error("trove {trove} uses unknown context {context:?}")]
    UnknownContext { trove: String, context: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenTrove {
    pub spec: TroveSpec,
    pub state: TroveState,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    #[serde(default)]
    pub build_requirements: BTreeSet<ReqSpec>,
    #[serde(default)]
    pub cross_requirements: BTreeSet<ReqSpec>,
    #[serde(default)]
    pub built_artifacts: Vec<ArtifactId>,
    #[serde(default)]
    pub recipe_type: RecipeType,
    #[serde(default)]
    pub packages: BTreeSet<String>,
    #[serde(default)]
    pub resolved_requirements: Vec<ArtifactId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prebuilt: Option<PrebuiltRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenJob {
    pub v: u32,
    pub id: JobId,
    pub state: JobState,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    pub troves: Vec<FrozenTrove>,
    pub main: ContextConfig,
    #[serde(default)]
    pub contexts: BTreeMap<String, ContextConfig>,
    #[serde(default)]
    pub dispatched_contexts: BTreeSet<String>,
    #[serde(default)]
    pub committed: Vec<ArtifactId>,
    #[serde(default)]
    pub log: Vec<String>,
    pub created_at_ms: u64,
}

impl From<&BuildTrove> for FrozenTrove {
    fn from(t: &BuildTrove) -> Self {
        Self {
            spec: t.spec.clone(),
            state: t.state,
            status: t.status.clone(),
            failure: t.failure.clone(),
            build_requirements: t.build_requirements.clone(),
            cross_requirements: t.cross_requirements.clone(),
            built_artifacts: t.built_artifacts.clone(),
            recipe_type: t.recipe_type,
            packages: t.packages.clone(),
            resolved_requirements: t.resolved_requirements.clone(),
            pid: t.pid,
            worker: t.worker.clone(),
            start_ms: t.start_ms,
            finish_ms: t.finish_ms,
            prebuilt: t.prebuilt.clone(),
        }
    }
}

impl From<FrozenTrove> for BuildTrove {
    fn from(f: FrozenTrove) -> Self {
        let mut trove = BuildTrove::new(f.spec);
        trove.state = f.state;
        trove.status = f.status;
        trove.failure = f.failure;
        trove.build_requirements = f.build_requirements;
        trove.cross_requirements = f.cross_requirements;
        trove.built_artifacts = f.built_artifacts;
        trove.recipe_type = f.recipe_type;
        if !f.packages.is_empty() {
            trove.packages = f.packages;
        }
        trove.resolved_requirements = f.resolved_requirements;
        trove.pid = f.pid;
        trove.worker = f.worker;
        trove.start_ms = f.start_ms;
        trove.finish_ms = f.finish_ms;
        trove.prebuilt = f.prebuilt;
        trove
    }
}

impl Job {
    /// Capture everything needed to rebuild this job later.
    pub fn freeze(&self) -> FrozenJob {
        FrozenJob {
            v: FROZEN_VERSION,
            id: self.id.clone(),
            state: self.state,
            status: self.status.clone(),
            failure: self.failure.clone(),
            troves: self.troves.values().map(FrozenTrove::from).collect(),
            main: self.main.clone(),
            contexts: self.contexts.clone(),
            dispatched_contexts: self.dispatched_contexts.clone(),
            committed: self.committed.clone(),
            log: self.log.clone(),
            created_at_ms: self.created_at_ms,
        }
    }

    /// Rebuild a job from a snapshot, attached to a fresh publisher.
    pub fn thaw(frozen: FrozenJob) -> Result<Job, ThawError> {
        Self::thaw_with_publisher(frozen, Arc::new(Publisher::new()))
    }

    pub fn thaw_with_publisher(frozen: FrozenJob, publisher: Arc<Publisher>) -> Result<Job, ThawError> {
        if frozen.v > FROZEN_VERSION {
            return Err(ThawError::TooNew {
                found: frozen.v,
                supported: FROZEN_VERSION,
            });
        }
        let mut troves = IndexMap::with_capacity(frozen.troves.len());
        for trove in frozen.troves {
            let context = &trove.spec.context;
            if !context.is_empty() && !frozen.contexts.contains_key(context) {
                return Err(ThawError::UnknownContext {
                    trove: trove.spec.to_string(),
                    context: context.clone(),
                });
            }
            if troves.contains_key(&trove.spec) {
                return Err(ThawError::DuplicateTrove(trove.spec.to_string()));
            }
            troves.insert(trove.spec.clone(), BuildTrove::from(trove));
        }
        Ok(Job {
            id: frozen.id,
            state: frozen.state,
            status: frozen.status,
            failure: frozen.failure,
            troves,
            main: frozen.main,
            contexts: frozen.contexts,
            dispatched_contexts: frozen.dispatched_contexts,
            committed: frozen.committed,
            log: frozen.log,
            created_at_ms: frozen.created_at_ms,
            publisher,
            publish_errors: None,
        })
    }
}

#[cfg(test)]
#[path = "frozen_tests.rs"]
mod tests;
