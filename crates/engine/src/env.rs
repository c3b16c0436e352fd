// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine crate.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(10);
const DEFAULT_IDLE_BACKOFF_MAX: Duration = Duration::from_millis(500);
const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// Loop timing and output locations for a [`Builder`](crate::Builder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// First sleep when an iteration made no progress
    pub idle_backoff: Duration,
    /// Cap for the doubling idle sleep
    pub idle_backoff_max: Duration,
    /// How long a stopped build may take to exit before it is killed
    pub stop_grace: Duration,
    pub log_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_backoff: DEFAULT_IDLE_BACKOFF,
            idle_backoff_max: DEFAULT_IDLE_BACKOFF_MAX,
            stop_grace: DEFAULT_STOP_GRACE,
            log_dir: log_dir(),
        }
    }
}

impl EngineConfig {
    /// Defaults with `TB_*` environment overrides applied.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            idle_backoff: millis_var("TB_IDLE_BACKOFF_MS").unwrap_or(defaults.idle_backoff),
            idle_backoff_max: millis_var("TB_IDLE_BACKOFF_MAX_MS")
                .unwrap_or(defaults.idle_backoff_max),
            stop_grace: millis_var("TB_STOP_GRACE_MS").unwrap_or(defaults.stop_grace),
            log_dir: defaults.log_dir,
        }
    }
}

fn millis_var(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Resolve log directory: TB_LOG_DIR > XDG_STATE_HOME/trovebuild/logs > ~/.local/state/trovebuild/logs
pub fn log_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TB_LOG_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("trovebuild/logs");
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".local/state/trovebuild/logs")
}

/// Install a global subscriber for host processes.
///
/// Filter comes from `RUST_LOG`, defaulting to `info`. Returns false when a
/// subscriber was already installed.
pub fn init_tracing() -> bool {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
