// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recipe metadata loading

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeLoader;

use async_trait::async_trait;
use std::collections::BTreeMap;
use tb_core::{TroveMetadata, TroveSpec};
use thiserror::Error;

/// Errors that prevent loading any trove at all
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoaderError {
    #[error("recipe loader unavailable: {0}")]
    Unavailable(String),
}

/// Per-trove load outcome; the error string explains a recipe that failed to load
pub type LoadResults = BTreeMap<TroveSpec, Result<TroveMetadata, String>>;

/// Loads recipe metadata for troves
#[async_trait]
pub trait MetadataLoader: Clone + Send + Sync + 'static {
    async fn load_unit_metadata(&self, troves: &[TroveSpec]) -> Result<LoadResults, LoaderError>;
}
