// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::loader::{LoadResults, LoaderError, MetadataLoader};
use crate::resolver::{DependencyResolver, ResolveError, ResolveRequest, ResolveResponse};
use crate::worker::{BuildRequest, BuildResult, CommandHandle, WorkerDispatch, WorkerError};
use async_trait::async_trait;
use tb_core::TroveSpec;
use tracing::Instrument;

/// Wrapper that adds tracing to any WorkerDispatch
#[derive(Clone)]
pub struct TracedWorker<W> {
    inner: W,
}

impl<W> TracedWorker<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<W: WorkerDispatch> WorkerDispatch for TracedWorker<W> {
    async fn dispatch_build(&self, request: BuildRequest) -> Result<CommandHandle, WorkerError> {
        let span = tracing::info_span!("worker.dispatch", trove = %request.trove);
        async {
            tracing::info!(
                resolved = request.resolved.len(),
                target_label = %request.target_label,
                prepare_only = request.prepare_only,
                "dispatching"
            );
            let start = std::time::Instant::now();
            let result = self.inner.dispatch_build(request).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(handle) => tracing::info!(%handle, elapsed_ms, "build dispatched"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "dispatch failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn check_result(&self, handle: &CommandHandle) -> Result<Option<BuildResult>, WorkerError> {
        let result = self.inner.check_result(handle).await;
        match &result {
            Ok(Some(outcome)) => tracing::info!(%handle, ?outcome, "build finished"),
            Ok(None) => tracing::trace!(%handle, "still running"),
            Err(e) => tracing::warn!(%handle, error = %e, "check_result failed"),
        }
        result
    }

    async fn stop(&self, handle: &CommandHandle) -> Result<(), WorkerError> {
        let result = self.inner.stop(handle).await;
        tracing::info_span!("worker.stop", %handle).in_scope(|| match &result {
            Ok(()) => tracing::info!("stop requested"),
            Err(e) => tracing::warn!(error = %e, "stop failed"),
        });
        result
    }

    async fn kill(&self, handle: &CommandHandle) -> Result<(), WorkerError> {
        let result = self.inner.kill(handle).await;
        tracing::info_span!("worker.kill", %handle).in_scope(|| match &result {
            Ok(()) => tracing::info!("killed"),
            Err(e) => tracing::warn!(error = %e, "kill failed (may be expected)"),
        });
        result
    }
}

/// Wrapper that adds tracing to any DependencyResolver
#[derive(Clone)]
pub struct TracedResolver<R> {
    inner: R,
}

impl<R> TracedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: DependencyResolver> DependencyResolver for TracedResolver<R> {
    async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse, ResolveError> {
        let span = tracing::info_span!("resolver.resolve", trove = %request.trove);
        async {
            tracing::info!(
                requirements = request.requirements.len(),
                cross_requirements = request.cross_requirements.len(),
                buckets = request.buckets.len(),
                "resolving"
            );
            let start = std::time::Instant::now();
            let result = self.inner.resolve(request).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(r) => tracing::info!(
                    matched = r.candidates.len(),
                    dependencies = r.dependencies.len(),
                    elapsed_ms,
                    "resolved"
                ),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "resolve failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// Wrapper that adds tracing to any MetadataLoader
#[derive(Clone)]
pub struct TracedLoader<L> {
    inner: L,
}

impl<L> TracedLoader<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<L: MetadataLoader> MetadataLoader for TracedLoader<L> {
    async fn load_unit_metadata(&self, troves: &[TroveSpec]) -> Result<LoadResults, LoaderError> {
        let span = tracing::info_span!("loader.load", troves = troves.len());
        async {
            let start = std::time::Instant::now();
            let result = self.inner.load_unit_metadata(troves).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(results) => {
                    let failed = results.values().filter(|r| r.is_err()).count();
                    tracing::info!(loaded = results.len() - failed, failed, elapsed_ms, "loaded");
                }
                Err(e) => tracing::error!(elapsed_ms, error = %e, "load failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
