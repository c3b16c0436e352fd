// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Requirement specs and built artifact identities

use crate::flavor::{Flavor, FlavorError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing a requirement spec or artifact identity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReqSpecError {
    #[error("empty name in {0:?}")]
    EmptyName(String),
    #[error("unterminated flavor in {0:?}")]
    UnterminatedFlavor(String),
    #[error("missing version in artifact {0:?}")]
    MissingVersion(String),
    #[error(transparent)]
    Flavor(#[from] FlavorError),
}

/// Text before the first `:` of a trove or component name.
pub fn package_name(name: &str) -> &str {
    name.split(':').next().unwrap_or(name)
}

/// Split `body[flavor]` into its body and parsed flavor.
fn split_flavor(s: &str) -> Result<(&str, Option<Flavor>), ReqSpecError> {
    match s.find('[') {
        None => Ok((s, None)),
        Some(open) => {
            let inner = s[open + 1..]
                .strip_suffix(']')
                .ok_or_else(|| ReqSpecError::UnterminatedFlavor(s.to_string()))?;
            Ok((&s[..open], Some(inner.parse()?)))
        }
    }
}

/// A requirement on some trove: `name[=version][[flavor]]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReqSpec {
    pub name: String,
    pub version: Option<String>,
    pub flavor: Option<Flavor>,
}

impl ReqSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            flavor: None,
        }
    }

    pub fn parse(s: &str) -> Result<Self, ReqSpecError> {
        s.parse()
    }

    pub fn package(&self) -> &str {
        package_name(&self.name)
    }

    /// Whether a version string meets this requirement's version constraint.
    ///
    /// `1` matches `1` and `1-2`; a label constraint such as `:automake`
    /// matches any version on that label.
    pub fn version_matches(&self, version: &str) -> bool {
        match &self.version {
            None => true,
            Some(v) => {
                version == v
                    || version.starts_with(&format!("{v}-"))
                    || (v.starts_with(':') && version.contains(v.as_str()))
            }
        }
    }

    /// Whether an artifact satisfies this requirement by name, version, and flavor.
    pub fn matches(&self, artifact: &ArtifactId) -> bool {
        artifact.name == self.name
            && self.version_matches(&artifact.version)
            && self
                .flavor
                .as_ref()
                .is_none_or(|f| artifact.flavor.satisfies(f))
    }
}

impl FromStr for ReqSpec {
    type Err = ReqSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (body, flavor) = split_flavor(trimmed)?;
        let (name, version) = match body.split_once('=') {
            Some((n, v)) => (n, Some(v.to_string()).filter(|v| !v.is_empty())),
            None => (body, None),
        };
        if name.is_empty() {
            return Err(ReqSpecError::EmptyName(s.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            version,
            flavor,
        })
    }
}

impl fmt::Display for ReqSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(v) = &self.version {
            write!(f, "={v}")?;
        }
        if let Some(flavor) = &self.flavor {
            write!(f, "[{flavor}]")?;
        }
        Ok(())
    }
}

impl Serialize for ReqSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ReqSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Identity of a built output: `name=version[flavor]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId {
    pub name: String,
    pub version: String,
    pub flavor: Flavor,
}

impl ArtifactId {
    pub fn new(name: impl Into<String>, version: impl Into<String>, flavor: Flavor) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            flavor,
        }
    }

    pub fn parse(s: &str) -> Result<Self, ReqSpecError> {
        s.parse()
    }

    pub fn package(&self) -> &str {
        package_name(&self.name)
    }
}

impl FromStr for ArtifactId {
    type Err = ReqSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (body, flavor) = split_flavor(s.trim())?;
        let (name, version) = body
            .split_once('=')
            .ok_or_else(|| ReqSpecError::MissingVersion(s.to_string()))?;
        if name.is_empty() {
            return Err(ReqSpecError::EmptyName(s.to_string()));
        }
        if version.is_empty() {
            return Err(ReqSpecError::MissingVersion(s.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            flavor: flavor.unwrap_or_default(),
        })
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}[{}]", self.name, self.version, self.flavor)
    }
}

impl Serialize for ArtifactId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ArtifactId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "reqspec_tests.rs"]
mod tests;
