// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Persistence observers for trovebuild jobs

mod recorder;
mod snapshot;
mod state;
mod wal;

pub use recorder::{JobRecorder, RecorderError};
pub use snapshot::{snapshot_path, JobSnapshot, SnapshotError, COMPRESSION_LEVEL};
pub use state::{JobRecord, MaterializedState, TroveRecord};
pub use wal::{Wal, WalEntry, WalError};
