// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Grace timers for stopped builds

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tb_adapters::CommandHandle;

/// Deadlines after which a stopped build is killed.
#[derive(Debug, Default)]
pub struct StopTimers {
    timers: HashMap<CommandHandle, Instant>,
}

impl StopTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the kill deadline for `handle`.
    pub fn arm(&mut self, handle: CommandHandle, grace: Duration, now: Instant) {
        self.timers.insert(handle, now + grace);
    }

    /// Disarm because the build reported before its deadline.
    pub fn cancel(&mut self, handle: &CommandHandle) -> bool {
        self.timers.remove(handle).is_some()
    }

    /// Remove and return every handle whose deadline has passed, earliest first.
    pub fn fired(&mut self, now: Instant) -> Vec<CommandHandle> {
        let mut due: Vec<(Instant, CommandHandle)> = self
            .timers
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(h, at)| (*at, h.clone()))
            .collect();
        due.sort();
        for (_, handle) in &due {
            self.timers.remove(handle);
        }
        due.into_iter().map(|(_, h)| h).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().min().copied()
    }

    pub fn is_armed(&self, handle: &CommandHandle) -> bool {
        self.timers.contains_key(handle)
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
