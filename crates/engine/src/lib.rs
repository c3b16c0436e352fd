// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tb-engine: drives a build job from loaded recipes to finished troves

mod builder;
pub mod dephandler;
pub mod env;
mod error;
pub mod graph;
mod job_logger;
pub mod log_paths;
mod scheduler;
mod signal;
mod status;

pub use builder::{Builder, BuilderDeps};
pub use dephandler::{
    choose, diff_lines, provides, DependencyHandler, ReqKind, ResolveJob, ResolveJobGenerator,
    ResolveOutcome, Reuse,
};
pub use env::{init_tracing, EngineConfig};
pub use error::EngineError;
pub use graph::DependencyGraph;
pub use job_logger::JobLogger;
pub use scheduler::StopTimers;
pub use signal::{spawn_signal_watcher, StopHandle, SIGNAL_REASON};
pub use status::{describe, StatusLevel, StatusReporter};
