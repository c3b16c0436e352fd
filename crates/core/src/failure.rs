// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure reasons carried by troves and jobs

use crate::reqspec::{ArtifactId, ReqSpec};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A runtime dependency of a resolved artifact that nothing satisfies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MissingDependency {
    pub artifact: ArtifactId,
    pub dependency: String,
}

impl fmt::Display for MissingDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} requires {}", self.artifact, self.dependency)
    }
}

/// Why a trove or job failed.
///
/// Every variant renders a human-readable message and has a stable
/// numeric [`tag`](FailureReason::tag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    Failed {
        message: String,
    },
    BuildFailed {
        message: String,
    },
    MissingBuildRequirements {
        requirements: Vec<ReqSpec>,
    },
    MissingDependencies {
        dependencies: Vec<MissingDependency>,
    },
    ChrootFailed {
        message: String,
    },
    LoadFailed {
        message: String,
    },
    InternalError {
        message: String,
        trace: String,
    },
    Stopped {
        message: String,
    },
}

impl FailureReason {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn build_failed(message: impl Into<String>) -> Self {
        Self::BuildFailed {
            message: message.into(),
        }
    }

    pub fn chroot_failed(message: impl Into<String>) -> Self {
        Self::ChrootFailed {
            message: message.into(),
        }
    }

    pub fn load_failed(message: impl Into<String>) -> Self {
        Self::LoadFailed {
            message: message.into(),
        }
    }

    pub fn stopped(message: impl Into<String>) -> Self {
        Self::Stopped {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
            trace: trace.into(),
        }
    }

    pub fn missing_build_requirements(requirements: Vec<ReqSpec>) -> Self {
        Self::MissingBuildRequirements { requirements }
    }

    pub fn missing_dependencies(dependencies: Vec<MissingDependency>) -> Self {
        Self::MissingDependencies { dependencies }
    }

    pub fn tag(&self) -> u8 {
        match self {
            Self::Failed { .. } => 0,
            Self::BuildFailed { .. } => 1,
            Self::MissingBuildRequirements { .. } => 2,
            Self::MissingDependencies { .. } => 3,
            Self::ChrootFailed { .. } => 4,
            Self::LoadFailed { .. } => 5,
            Self::InternalError { .. } => 6,
            Self::Stopped { .. } => 7,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "failed",
            Self::BuildFailed { .. } => "build_failed",
            Self::MissingBuildRequirements { .. } => "missing_build_requirements",
            Self::MissingDependencies { .. } => "missing_dependencies",
            Self::ChrootFailed { .. } => "chroot_failed",
            Self::LoadFailed { .. } => "load_failed",
            Self::InternalError { .. } => "internal_error",
            Self::Stopped { .. } => "stopped",
        }
    }

    /// First line of the rendered message.
    pub fn short(&self) -> String {
        let full = self.to_string();
        full.lines().next().unwrap_or_default().to_string()
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { message } => write!(f, "{message}"),
            Self::BuildFailed { message } => write!(f, "Failed while building: {message}"),
            Self::MissingBuildRequirements { requirements } => {
                let reqs: Vec<String> = requirements.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "Could not satisfy build requirements: {}",
                    reqs.join(", ")
                )
            }
            Self::MissingDependencies { dependencies } => {
                write!(f, "Could not satisfy dependencies:")?;
                for dep in dependencies {
                    write!(f, "\n    {dep}")?;
                }
                Ok(())
            }
            Self::ChrootFailed { message } => write!(f, "Failed while creating chroot: {message}"),
            Self::LoadFailed { message } => write!(f, "Failed while loading recipe: {message}"),
            Self::InternalError { message, trace } => {
                write!(f, "Internal build error: {message}\n{trace}")
            }
            Self::Stopped { message } => write!(f, "Stopped: {message}"),
        }
    }
}

#[cfg(test)]
#[path = "failure_tests.rs"]
mod tests;
