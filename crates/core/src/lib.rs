// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tb-core: build identities, events, and the trove/job state machines

pub mod clock;
pub mod config;
pub mod event;
pub mod failure;
pub mod flavor;
pub mod frozen;
pub mod id;
pub mod job;
pub mod publisher;
pub mod reqspec;
pub mod trove;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{BuildConfig, ConfigError, ContextConfig, RebuildPolicy, ResolvePolicy};
pub use event::{Event, EventKind, TrovePayload};
pub use failure::{FailureReason, MissingDependency};
pub use flavor::{Flavor, FlavorError, Sense};
pub use frozen::{FrozenJob, FrozenTrove, ThawError, FROZEN_VERSION};
pub use job::{Job, JobError, JobId, JobState};
pub use publisher::{EventQueue, Interest, PublishError, Publisher, Subscriber, SubscriberError};
pub use reqspec::{package_name, ArtifactId, ReqSpec, ReqSpecError};
pub use trove::{BuildTrove, PrebuiltRecord, RecipeType, TroveMetadata, TroveSpec, TroveState};
