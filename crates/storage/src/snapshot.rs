// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compressed job snapshots.
//!
//! A snapshot is a zstd-compressed JSON document holding a [`FrozenJob`].
//! It is written to a `.tmp` sibling, fsynced, then renamed into place, so a
//! crash mid-save leaves the previous snapshot intact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tb_core::{FrozenJob, Job, JobId, ThawError, FROZEN_VERSION};
use thiserror::Error;
use tracing::warn;

/// zstd level used for saves
pub const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot version {found} is newer than supported version {supported}")]
    TooNew { found: u32, supported: u32 },
    #[error(transparent)]
    Thaw(#[from] ThawError),
}

/// A frozen job at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job: FrozenJob,
    pub saved_at: DateTime<Utc>,
}

/// `<dir>/<job_id>.snapshot`
pub fn snapshot_path(dir: &Path, job_id: &JobId) -> PathBuf {
    dir.join(format!("{}.snapshot", job_id))
}

impl JobSnapshot {
    pub fn new(job: FrozenJob) -> Self {
        Self {
            job,
            saved_at: Utc::now(),
        }
    }

    pub fn of(job: &Job) -> Self {
        Self::new(job.freeze())
    }

    /// Save atomically: write `.tmp`, fsync, rename, fsync the directory.
    pub fn save(&self, path: &Path) -> Result<u64, SnapshotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("tmp");

        let json_bytes = serde_json::to_vec(self)?;
        let compressed = zstd::encode_all(json_bytes.as_slice(), COMPRESSION_LEVEL)?;
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&compressed)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        if let Some(parent) = path.parent() {
            File::open(parent)?.sync_all()?;
        }
        Ok(compressed.len() as u64)
    }

    /// Load a snapshot if one exists.
    ///
    /// Returns `Ok(None)` when the file is missing or unreadable. Unreadable
    /// files are moved to `.bak` first. A snapshot written by a newer
    /// schema is left in place and reported as [`SnapshotError::TooNew`].
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }

        let value = match decode(path) {
            Ok(value) => value,
            Err(e) => return quarantine(path, &e).map(|_| None),
        };
        let found = value
            .pointer("/job/v")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        if found > u64::from(FROZEN_VERSION) {
            return Err(SnapshotError::TooNew {
                found: u32::try_from(found).unwrap_or(u32::MAX),
                supported: FROZEN_VERSION,
            });
        }
        match serde_json::from_value(value) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => quarantine(path, &e).map(|_| None),
        }
    }

    /// Load and thaw the job stored at `path`.
    pub fn load_job(path: &Path) -> Result<Option<Job>, SnapshotError> {
        match Self::load(path)? {
            Some(snapshot) => Ok(Some(Job::thaw(snapshot.job)?)),
            None => Ok(None),
        }
    }
}

fn decode(path: &Path) -> Result<serde_json::Value, SnapshotError> {
    let file = File::open(path)?;
    let decoder = zstd::stream::read::Decoder::new(file)?;
    Ok(serde_json::from_reader(decoder)?)
}

fn quarantine(path: &Path, error: &dyn std::fmt::Display) -> Result<(), SnapshotError> {
    let bak_path = rotate_bak_path(path);
    warn!(
        error = %error,
        path = %path.display(),
        bak = %bak_path.display(),
        "Corrupt snapshot, moving to .bak",
    );
    fs::rename(path, &bak_path)?;
    Ok(())
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
