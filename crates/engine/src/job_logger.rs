// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only writer for job and trove log files.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tb_core::{
    Event, EventKind, Interest, JobId, Subscriber, SubscriberError, TrovePayload, TroveSpec,
};

use crate::log_paths;

/// Subscriber that mirrors job activity into plain-text log files.
///
/// Writes timestamped lines to:
///   `<log_dir>/jobs/<job_id>.log` for job messages and every state change
///   `<log_dir>/jobs/<job_id>/<trove>.log` for a trove's own output
///
/// Each line opens, writes, and closes the file. Write failures are traced
/// and swallowed, so a full disk never fails a build.
pub struct JobLogger {
    log_dir: PathBuf,
}

impl JobLogger {
    pub fn new(log_dir: PathBuf) -> Self {
        Self { log_dir }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Append a line to the job log.
    ///
    /// Format: `2026-01-30T08:14:09Z [tag] message`
    pub fn append_job(&self, job_id: &JobId, tag: &str, message: &str) {
        let path = log_paths::job_log_path(&self.log_dir, job_id.as_str());
        if let Err(e) = write_lines(&path, tag, message) {
            tracing::warn!(
                job_id = %job_id,
                error = %e,
                "failed to write job log"
            );
        }
    }

    /// Append a line to one trove's log.
    pub fn append_trove(&self, job_id: &JobId, trove: &TroveSpec, message: &str) {
        let name = trove.to_string();
        let path = log_paths::trove_log_path(&self.log_dir, job_id.as_str(), &name);
        if let Err(e) = write_lines(&path, &trove.name, message) {
            tracing::warn!(
                job_id = %job_id,
                trove = %name,
                error = %e,
                "failed to write trove log"
            );
        }
    }
}

impl Subscriber for JobLogger {
    fn name(&self) -> &str {
        "job-logger"
    }

    fn interests(&self) -> Vec<Interest> {
        vec![
            Interest::Kind(EventKind::JobStateUpdated),
            Interest::Kind(EventKind::JobLogUpdated),
            Interest::Kind(EventKind::TroveStateUpdated),
            Interest::Kind(EventKind::TroveLogUpdated),
        ]
    }

    fn handle(&self, event: &Event) -> Result<(), SubscriberError> {
        match event {
            Event::JobStateUpdated {
                job_id,
                state,
                status,
                reason,
                ..
            } => {
                let line = match reason {
                    Some(reason) => format!("{state}: {reason}"),
                    None if status.is_empty() => state.to_string(),
                    None => format!("{state}: {status}"),
                };
                self.append_job(job_id, "job", &line);
            }
            Event::JobLogUpdated { job_id, message } => {
                self.append_job(job_id, "job", message);
            }
            Event::TroveStateUpdated {
                job_id,
                trove,
                state,
                status,
                payload,
                ..
            } => {
                let mut line = if status.is_empty() {
                    state.to_string()
                } else {
                    format!("{state}: {status}")
                };
                if let TrovePayload::Building {
                    pid,
                    worker: Some(worker),
                } = payload
                {
                    line.push_str(&format!(" (pid {pid} on {worker})"));
                }
                self.append_job(job_id, &trove.to_string(), &line);
                self.append_trove(job_id, trove, &line);
            }
            Event::TroveLogUpdated {
                job_id,
                trove,
                message,
            } => {
                self.append_trove(job_id, trove, message);
            }
            Event::JobTrovesSet { .. } | Event::JobCommitted { .. } => {}
        }
        Ok(())
    }
}

/// Write `message` with one timestamped line per input line.
fn write_lines(path: &Path, tag: &str, message: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let ts = format_utc_now();
    let mut lines = message.lines().peekable();
    if lines.peek().is_none() {
        writeln!(file, "{} [{}]", ts, tag)?;
    }
    for line in lines {
        writeln!(file, "{} [{}] {}", ts, tag, line)?;
    }
    Ok(())
}

/// Format the current UTC time as `YYYY-MM-DDTHH:MM:SSZ`.
fn format_utc_now() -> String {
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_utc(secs)
}

fn format_utc(secs: u64) -> String {
    let days = secs / 86400;
    let time_of_day = secs % 86400;
    let (year, month, day) = days_to_civil(days);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year,
        month,
        day,
        time_of_day / 3600,
        (time_of_day % 3600) / 60,
        time_of_day % 60
    )
}

/// Convert days since Unix epoch to (year, month, day).
///
/// Howard Hinnant's `civil_from_days`.
fn days_to_civil(days: u64) -> (i64, u32, u32) {
    let z = days as i64 + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m as u32, d as u32)
}

#[cfg(test)]
#[path = "job_logger_tests.rs"]
mod tests;
