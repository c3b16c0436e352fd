// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL event write-ahead log with group commit.
//!
//! Each entry is a single line of JSON: `{"seq":N,"event":{...}}\n`.
//! Entries are buffered and written together with one fsync.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tb_core::Event;
use thiserror::Error;
use tracing::warn;

/// Flush interval for group commit
const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Maximum entries to buffer before forcing a flush
const FLUSH_THRESHOLD: usize = 100;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct WalRecordRef<'a> {
    seq: u64,
    event: &'a Event,
}

#[derive(Deserialize)]
struct WalRecord {
    seq: u64,
    event: Event,
}

/// A single WAL entry with its sequence number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    pub seq: u64,
    pub event: Event,
}

/// Append-only event log.
///
/// Events are buffered in memory and reach disk either when
/// [`Wal::needs_flush`] says so and the caller flushes, or on an explicit
/// [`Wal::flush`].
pub struct Wal {
    file: File,
    path: PathBuf,
    /// Highest sequence number assigned
    write_seq: u64,
    /// Encoded lines waiting for the next flush, without newline
    write_buffer: Vec<Vec<u8>>,
    last_flush: Instant,
}

impl Wal {
    /// Open or create a WAL at `path`.
    ///
    /// A log with an unreadable entry is rotated to `.bak` and rewritten
    /// with the valid entries before the corruption point.
    pub fn open(path: &Path) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = open_append(path)?;
        let scan = scan(&file)?;
        let (file, write_seq) = if scan.corrupt {
            drop(file);
            let bak_path = crate::snapshot::rotate_bak_path(path);
            warn!(
                path = %path.display(),
                bak = %bak_path.display(),
                valid_entries = scan.valid_lines.len(),
                "Corrupt WAL detected, rotating to .bak and preserving valid entries",
            );
            std::fs::rename(path, &bak_path)?;
            {
                let mut clean = File::create(path)?;
                for line in &scan.valid_lines {
                    clean.write_all(line.as_bytes())?;
                    clean.write_all(b"\n")?;
                }
                clean.sync_all()?;
            }
            (open_append(path)?, scan.max_seq)
        } else {
            (file, scan.max_seq)
        };

        Ok(Self {
            file,
            path: path.to_owned(),
            write_seq,
            write_buffer: Vec::new(),
            last_flush: Instant::now(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Buffer `event` and return its sequence number.
    ///
    /// The entry is not durable until [`Wal::flush`] returns.
    pub fn append(&mut self, event: &Event) -> Result<u64, WalError> {
        let seq = self.write_seq + 1;
        let json_bytes = serde_json::to_vec(&WalRecordRef { seq, event })?;
        self.write_seq = seq;
        self.write_buffer.push(json_bytes);
        Ok(seq)
    }

    /// Interval elapsed or buffer full.
    pub fn needs_flush(&self) -> bool {
        !self.write_buffer.is_empty()
            && (self.last_flush.elapsed() >= FLUSH_INTERVAL
                || self.write_buffer.len() >= FLUSH_THRESHOLD)
    }

    /// Write all buffered entries with a single fsync.
    pub fn flush(&mut self) -> Result<(), WalError> {
        if self.write_buffer.is_empty() {
            return Ok(());
        }
        for mut json_bytes in self.write_buffer.drain(..) {
            json_bytes.push(b'\n');
            self.file.write_all(&json_bytes)?;
        }
        self.file.sync_all()?;
        self.last_flush = Instant::now();
        Ok(())
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn pending(&self) -> usize {
        self.write_buffer.len()
    }

    /// Every flushed entry with a sequence number above `seq`, in log order.
    ///
    /// Replay stops at the first unreadable entry.
    pub fn entries_after(&self, seq: u64) -> Result<Vec<WalEntry>, WalError> {
        let mut reader = BufReader::new(self.file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut entries = Vec::new();
        let mut line = String::new();
        let mut offset = 0u64;
        loop {
            line.clear();
            let bytes_read = match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            };
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                let record: WalRecord = match serde_json::from_str(trimmed) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(
                            offset,
                            error = %e,
                            "Corrupt WAL entry during replay, stopping at corruption point",
                        );
                        break;
                    }
                };
                if record.seq > seq {
                    entries.push(WalEntry {
                        seq: record.seq,
                        event: record.event,
                    });
                }
            }
            offset += bytes_read as u64;
        }
        Ok(entries)
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
}

struct Scan {
    max_seq: u64,
    valid_lines: Vec<String>,
    corrupt: bool,
}

/// Read the log front to back, keeping every line up to the first bad one.
fn scan(file: &File) -> Result<Scan, WalError> {
    let mut reader = BufReader::new(file.try_clone()?);
    reader.seek(SeekFrom::Start(0))?;

    let mut scan = Scan {
        max_seq: 0,
        valid_lines: Vec::new(),
        corrupt: false,
    };
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                scan.corrupt = true;
                break;
            }
            Err(e) => return Err(e.into()),
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<WalRecord>(trimmed) {
            Ok(record) => {
                scan.max_seq = scan.max_seq.max(record.seq);
                scan.valid_lines.push(trimmed.to_string());
            }
            Err(_) => {
                scan.corrupt = true;
                break;
            }
        }
    }
    Ok(scan)
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
