// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake metadata loader
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{LoadResults, LoaderError, MetadataLoader};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tb_core::{TroveMetadata, TroveSpec};

#[derive(Default)]
struct FakeLoaderState {
    metadata: HashMap<String, Result<TroveMetadata, String>>,
    error: Option<LoaderError>,
    loads: Vec<Vec<TroveSpec>>,
}

/// Fake loader keyed by trove name; unknown troves load empty metadata
#[derive(Clone, Default)]
pub struct FakeLoader {
    inner: Arc<Mutex<FakeLoaderState>>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str, metadata: TroveMetadata) {
        self.inner
            .lock()
            .metadata
            .insert(name.to_string(), Ok(metadata));
    }

    /// Make loading `name` fail with `message`.
    pub fn fail(&self, name: &str, message: &str) {
        self.inner
            .lock()
            .metadata
            .insert(name.to_string(), Err(message.to_string()));
    }

    pub fn fail_all(&self, error: LoaderError) {
        self.inner.lock().error = Some(error);
    }

    /// Batches passed to `load_unit_metadata`, in call order.
    pub fn loads(&self) -> Vec<Vec<TroveSpec>> {
        self.inner.lock().loads.clone()
    }
}

#[async_trait]
impl MetadataLoader for FakeLoader {
    async fn load_unit_metadata(&self, troves: &[TroveSpec]) -> Result<LoadResults, LoaderError> {
        let mut inner = self.inner.lock();
        inner.loads.push(troves.to_vec());
        if let Some(err) = &inner.error {
            return Err(err.clone());
        }
        Ok(troves
            .iter()
            .map(|t| {
                let result = inner
                    .metadata
                    .get(&t.name)
                    .cloned()
                    .unwrap_or_else(|| Ok(TroveMetadata::default()));
                (t.clone(), result)
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
