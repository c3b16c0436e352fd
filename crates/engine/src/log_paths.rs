// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared path builders for job and trove log files.
//!
//! Used by the job logger (writer) and by hosts that tail logs (readers)
//! to construct consistent paths in the directory structure:
//!   `<logs_dir>/jobs/<job_id>.log`
//!   `<logs_dir>/jobs/<job_id>/<trove>.log`

use std::path::{Path, PathBuf};

/// Build the path to a job log file.
///
/// Structure: `{logs_dir}/jobs/{job_id}.log`
///
/// # Arguments
/// * `logs_dir` - Base logs directory (e.g., `~/.local/state/trovebuild/logs`)
/// * `job_id` - Job identifier
pub fn job_log_path(logs_dir: &Path, job_id: &str) -> PathBuf {
    logs_dir.join("jobs").join(format!("{}.log", job_id))
}

/// Build the path to the directory holding a job's per-trove logs.
///
/// Structure: `{logs_dir}/jobs/{job_id}/`
pub fn trove_log_dir(logs_dir: &Path, job_id: &str) -> PathBuf {
    logs_dir.join("jobs").join(job_id)
}

/// Build the path to one trove's log file.
///
/// Structure: `{logs_dir}/jobs/{job_id}/{trove}.log`
///
/// `trove` is the rendered trove spec. Characters that are awkward in file
/// names (`/`, `:`, `=`, brackets, braces, and whitespace) become `_`.
pub fn trove_log_path(logs_dir: &Path, job_id: &str, trove: &str) -> PathBuf {
    trove_log_dir(logs_dir, job_id).join(format!("{}.log", file_safe(trove)))
}

fn file_safe(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| match c {
            '/' | ':' | '=' | '[' | ']' | '{' | '}' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();
    while out.ends_with('_') {
        out.pop();
    }
    out
}

#[cfg(test)]
#[path = "log_paths_tests.rs"]
mod tests;
