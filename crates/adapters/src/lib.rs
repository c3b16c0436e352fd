// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for the external collaborators of a build: workers, the
//! binary repository, and the recipe loader

pub mod loader;
pub mod resolver;
pub mod traced;
pub mod worker;

pub use loader::{LoadResults, LoaderError, MetadataLoader};
pub use resolver::{
    Candidate, DependencyResolver, ResolveError, ResolveRequest, ResolveResponse, ResolveSource,
};
pub use traced::{TracedLoader, TracedResolver, TracedWorker};
pub use worker::{
    BuildRequest, BuildResult, CommandHandle, WorkerDispatch, WorkerError, WorkerEvent,
    WorkerNotifier,
};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use loader::FakeLoader;
#[cfg(any(test, feature = "test-support"))]
pub use resolver::{FakeArtifact, FakeResolver};
#[cfg(any(test, feature = "test-support"))]
pub use worker::{default_artifacts, FakeOutcome, FakeWorker, WorkerCall};
