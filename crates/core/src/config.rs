// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build configuration, one section per build context.
//!
//! ```toml
//! target_label = "example.com@rpl:devel"
//! install_label_path = ["example.com@rpl:devel", "example.com@rpl:base"]
//! flavor = ["is: x86_64"]
//!
//! [contexts.bootstrap]
//! target_label = "example.com@rpl:bootstrap"
//! resolve_troves = [["gcc:runtime=4.1"]]
//! resolve_troves_only = true
//! ```

use crate::flavor::Flavor;
use crate::reqspec::ArtifactId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid build config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Where requirement resolution looks, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvePolicy {
    /// `resolve_troves` buckets first, then the install label path
    ResolveTrovesThenLabelPath,
    /// Only the `resolve_troves` buckets
    ResolveTrovesOnly,
}

/// How strictly a prebuilt record must match fresh resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildPolicy {
    /// Any change in resolved build requirements forces a rebuild
    Strict,
    /// Only changes produced by troves built in this job force a rebuild
    IgnoreExternal,
    /// Prebuilt records are trusted unconditionally
    IgnoreAll,
}

/// Configuration for one build context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub target_label: String,
    pub install_label_path: Vec<String>,
    pub resolve_troves: Vec<Vec<ArtifactId>>,
    pub resolve_troves_only: bool,
    pub ignore_external_rebuild_deps: bool,
    pub ignore_all_rebuild_deps: bool,
    /// Install flavors used for candidate scoring
    pub flavor: Vec<Flavor>,
    /// Preferred flavors, earliest first
    pub flavor_preferences: Vec<Flavor>,
    pub prepare_only: bool,
}

impl ContextConfig {
    pub fn resolve_policy(&self) -> ResolvePolicy {
        if self.resolve_troves_only {
            ResolvePolicy::ResolveTrovesOnly
        } else {
            ResolvePolicy::ResolveTrovesThenLabelPath
        }
    }

    pub fn rebuild_policy(&self) -> RebuildPolicy {
        if self.ignore_all_rebuild_deps {
            RebuildPolicy::IgnoreAll
        } else if self.ignore_external_rebuild_deps {
            RebuildPolicy::IgnoreExternal
        } else {
            RebuildPolicy::Strict
        }
    }
}

/// A full build configuration: the main context plus named contexts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(flatten)]
    pub main: ContextConfig,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contexts: BTreeMap<String, ContextConfig>,
}

impl BuildConfig {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Config for `name`; the empty name is the main context.
    pub fn context(&self, name: &str) -> Option<&ContextConfig> {
        if name.is_empty() {
            Some(&self.main)
        } else {
            self.contexts.get(name)
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
