// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use tb_adapters::{
    FakeArtifact, FakeLoader, FakeOutcome, FakeResolver, FakeWorker, ResolveError, WorkerCall,
    WorkerError,
};
use tb_core::test_support::{artifact, job_of, record_all, requires, source, source_with, trove_transitions};
use tb_core::{FakeClock, RecipeType, SystemClock, TroveMetadata};

const LABEL: &str = "example.com@rpl:devel";

struct Fixture {
    worker: FakeWorker,
    resolver: FakeResolver,
    loader: FakeLoader,
}

impl Fixture {
    fn new() -> Self {
        Self {
            worker: FakeWorker::new(),
            resolver: FakeResolver::new(),
            loader: FakeLoader::new(),
        }
    }

    fn deps(&self) -> BuilderDeps<FakeWorker, FakeResolver, FakeLoader> {
        BuilderDeps {
            worker: self.worker.clone(),
            resolver: self.resolver.clone(),
            loader: self.loader.clone(),
        }
    }

    fn builder(&self, job: Job) -> Builder<FakeWorker, FakeResolver, FakeLoader, FakeClock> {
        Builder::new(job, self.deps(), FakeClock::new(), test_config())
    }

    fn realtime(&self, job: Job) -> Builder<FakeWorker, FakeResolver, FakeLoader, SystemClock> {
        Builder::new(job, self.deps(), SystemClock, test_config())
    }
}

fn test_config() -> EngineConfig {
    EngineConfig {
        idle_backoff: Duration::from_millis(1),
        idle_backoff_max: Duration::from_millis(5),
        stop_grace: Duration::from_millis(20),
        log_dir: std::env::temp_dir(),
    }
}

fn labelled_job(specs: Vec<TroveSpec>) -> Job {
    let mut job = job_of(specs);
    job.configure("", |c| c.install_label_path = vec![LABEL.into()])
        .unwrap();
    job
}

fn state_of(builder: &Builder<FakeWorker, FakeResolver, FakeLoader, impl Clock>, spec: &TroveSpec) -> TroveState {
    builder.job().trove(spec).unwrap().state()
}

fn failure_of(
    builder: &Builder<FakeWorker, FakeResolver, FakeLoader, impl Clock>,
    spec: &TroveSpec,
) -> FailureReason {
    builder.job().trove(spec).unwrap().failure().cloned().unwrap()
}

#[tokio::test]
async fn builds_providers_before_requirers() {
    let f = Fixture::new();
    f.loader.set("a:source", requires(&["b:runtime"]));
    let mut builder = f.builder(job_of(vec![source("a"), source("b")]));

    assert_eq!(builder.build().await, JobState::Built);
    assert_eq!(f.worker.dispatched(), vec![source("b"), source("a")]);
    assert_eq!(state_of(&builder, &source("a")), TroveState::Built);
    assert_eq!(
        builder.job().trove(&source("a")).unwrap().resolved_requirements(),
        &[artifact("b:runtime=1[]")]
    );
    assert!(builder.job().log().contains(&"Building b:source".to_string()));
}

#[tokio::test]
async fn trove_events_follow_the_lifecycle() {
    let f = Fixture::new();
    let job = job_of(vec![source("b")]);
    let recorder = record_all(&job);
    let mut builder = f.builder(job);

    builder.build().await;
    let states: Vec<TroveState> = trove_transitions(&recorder.drain())
        .into_iter()
        .map(|(_, _, state)| state)
        .collect();
    assert_eq!(
        states,
        vec![
            TroveState::Buildable,
            TroveState::Preparing,
            TroveState::Building,
            TroveState::Built,
        ]
    );
    let b = builder.job().trove(&source("b")).unwrap();
    assert_eq!(b.worker(), Some("fake-worker"));
    assert!(b.finish_ms().is_some());
}

#[tokio::test]
async fn external_requirements_are_resolved_against_labels() {
    let f = Fixture::new();
    f.loader.set("a:source", requires(&["zlib:runtime"]));
    f.resolver
        .publish(LABEL, FakeArtifact::new(artifact("zlib:runtime=1.2[]")));
    let mut builder = f.builder(labelled_job(vec![source("a")]));

    assert_eq!(builder.build().await, JobState::Built);
    let requests = f.resolver.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].buckets, vec![tb_adapters::ResolveSource::Label(LABEL.into())]);
    assert_eq!(
        f.worker.calls()[0],
        WorkerCall::Dispatch {
            trove: source("a"),
            resolved: vec![artifact("zlib:runtime=1.2[]")],
        }
    );
}

#[tokio::test]
async fn missing_requirement_fails_the_job() {
    let f = Fixture::new();
    f.loader.set("a:source", requires(&["zlib:runtime"]));
    let mut builder = f.builder(labelled_job(vec![source("a")]));

    assert_eq!(builder.build().await, JobState::Failed);
    assert_eq!(state_of(&builder, &source("a")), TroveState::Failed);
    assert_eq!(
        failure_of(&builder, &source("a")).to_string(),
        "Could not satisfy build requirements: zlib:runtime"
    );
    let reason = builder.job().failure().unwrap().to_string();
    assert_eq!(
        reason,
        format!(
            "Build job had failures:\n   {}: Could not satisfy build requirements: zlib:runtime",
            source("a")
        )
    );
    assert!(f.worker.dispatched().is_empty());
}

#[tokio::test]
async fn build_failure_cascades_to_requirers() {
    let f = Fixture::new();
    f.loader.set("a:source", requires(&["b:runtime"]));
    f.worker.set_outcome(
        "b:source",
        FakeOutcome::Failed(FailureReason::build_failed("compile error")),
    );
    let mut builder = f.builder(job_of(vec![source("a"), source("b")]));

    assert_eq!(builder.build().await, JobState::Failed);
    assert_eq!(state_of(&builder, &source("b")), TroveState::Failed);
    assert_eq!(state_of(&builder, &source("a")), TroveState::Unbuildable);
    assert_eq!(
        failure_of(&builder, &source("a")).to_string(),
        "Could not satisfy build requirements: b:runtime"
    );
    let reason = builder.job().failure().unwrap().to_string();
    assert!(reason.contains("Failed while building: compile error"));
    assert!(!reason.contains(&format!("{}:", source("a"))));
}

#[tokio::test]
async fn load_failures_fail_only_their_trove() {
    let f = Fixture::new();
    f.loader.fail("a:source", "syntax error");
    let mut builder = f.builder(job_of(vec![source("a"), source("b")]));

    assert_eq!(builder.build().await, JobState::Failed);
    assert_eq!(
        failure_of(&builder, &source("a")),
        FailureReason::load_failed("syntax error")
    );
    assert_eq!(state_of(&builder, &source("b")), TroveState::Built);
}

#[tokio::test]
async fn group_recipes_must_build_alone() {
    let f = Fixture::new();
    f.loader.set(
        "group-os:source",
        TroveMetadata {
            recipe_type: RecipeType::Group,
            ..TroveMetadata::default()
        },
    );
    let mut builder = f.builder(job_of(vec![source("group-os"), source("b")]));

    assert_eq!(builder.build().await, JobState::Failed);
    assert_eq!(
        builder.job().failure().unwrap().to_string(),
        "Job failed sanity check: group, redirect, and fileset packages must be alone in their own job: group-os"
    );
    assert_eq!(
        failure_of(&builder, &source("group-os")).to_string(),
        "Trove failed sanity check: group, redirect, and fileset packages must be alone in their own job"
    );
    assert_eq!(state_of(&builder, &source("b")), TroveState::Unbuildable);
    assert!(f.worker.dispatched().is_empty());
}

#[tokio::test]
async fn lone_group_recipe_builds() {
    let f = Fixture::new();
    f.loader.set(
        "group-os:source",
        TroveMetadata {
            recipe_type: RecipeType::Group,
            ..TroveMetadata::default()
        },
    );
    let mut builder = f.builder(job_of(vec![source("group-os")]));
    assert_eq!(builder.build().await, JobState::Built);
}

#[tokio::test]
async fn unresolvable_cycle_finds_nothing_buildable() {
    let f = Fixture::new();
    f.loader.set("a:source", requires(&["b:runtime"]));
    f.loader.set("b:source", requires(&["a:runtime"]));
    let mut builder = f.builder(labelled_job(vec![source("a"), source("b")]));

    assert_eq!(builder.build().await, JobState::Failed);
    assert_eq!(
        builder.job().failure().unwrap().to_string(),
        "Did not find any buildable troves"
    );
    assert_eq!(state_of(&builder, &source("a")), TroveState::Unbuildable);
    assert_eq!(f.resolver.requests().len(), 2);
}

#[tokio::test]
async fn cycle_is_broken_by_external_resolution() {
    let f = Fixture::new();
    f.loader.set("a:source", requires(&["b:runtime"]));
    f.loader.set("b:source", requires(&["a:runtime"]));
    f.resolver
        .publish(LABEL, FakeArtifact::new(artifact("a:runtime=0.9[]")));
    let mut builder = f.builder(labelled_job(vec![source("a"), source("b")]));

    assert_eq!(builder.build().await, JobState::Built);
    assert_eq!(f.worker.dispatched(), vec![source("b"), source("a")]);
    assert_eq!(
        builder.job().trove(&source("a")).unwrap().resolved_requirements(),
        &[artifact("b:runtime=1[]")]
    );
}

#[tokio::test]
async fn dispatch_errors_fail_the_trove() {
    let f = Fixture::new();
    f.worker
        .fail_dispatch("a:source", WorkerError::Environment("no space left".into()));
    let mut builder = f.builder(job_of(vec![source("a")]));

    assert_eq!(builder.build().await, JobState::Failed);
    assert_eq!(
        failure_of(&builder, &source("a")),
        FailureReason::chroot_failed("no space left")
    );
}

#[tokio::test]
async fn notified_results_are_applied() {
    let f = Fixture::new();
    f.worker.notify_results();
    f.loader.set("a:source", requires(&["b:runtime"]));
    let mut builder = f.builder(job_of(vec![source("a"), source("b")]));

    assert_eq!(builder.build().await, JobState::Built);
    assert_eq!(state_of(&builder, &source("a")), TroveState::Built);
}

#[tokio::test]
async fn identical_output_is_a_duplicate() {
    let f = Fixture::new();
    let x86 = source_with("a", "1", "is: x86");
    let x86_64 = source_with("a", "1", "is: x86_64");
    let mut builder = f.builder(job_of(vec![x86.clone(), x86_64.clone()]));

    assert_eq!(builder.build().await, JobState::Built);
    assert_eq!(state_of(&builder, &x86), TroveState::Built);
    assert_eq!(state_of(&builder, &x86_64), TroveState::Duplicate);
}

#[tokio::test]
async fn overlapping_output_is_a_conflict() {
    let f = Fixture::new();
    f.worker.set_outcome(
        "a:source",
        FakeOutcome::BuiltWith(vec![artifact("x:runtime=1[]"), artifact("y:runtime=1[]")]),
    );
    f.worker.set_outcome(
        "b:source",
        FakeOutcome::BuiltWith(vec![artifact("x:runtime=1[]"), artifact("z:runtime=1[]")]),
    );
    let mut builder = f.builder(job_of(vec![source("a"), source("b")]));

    assert_eq!(builder.build().await, JobState::Failed);
    assert_eq!(
        failure_of(&builder, &source("b")),
        FailureReason::build_failed(
            "Two versions of x:runtime were built at the same time but resulted in different components"
        )
    );
}

#[tokio::test]
async fn prepare_only_jobs_end_prepared() {
    let f = Fixture::new();
    let mut job = job_of(vec![source("a")]);
    job.configure("", |c| c.prepare_only = true).unwrap();
    let mut builder = f.builder(job);

    assert_eq!(builder.build().await, JobState::Built);
    assert_eq!(state_of(&builder, &source("a")), TroveState::Prepared);
}

#[tokio::test]
async fn resolver_outage_is_an_internal_error() {
    let f = Fixture::new();
    f.loader.set("a:source", requires(&["zlib:runtime"]));
    f.resolver
        .fail_with(Some(ResolveError::Unavailable("example.com".into())));
    let mut builder = f.builder(labelled_job(vec![source("a")]));

    assert_eq!(builder.build().await, JobState::Failed);
    let reason = builder.job().failure().unwrap().clone();
    assert!(matches!(reason, FailureReason::InternalError { .. }));
    assert!(reason.short().contains("repository unavailable: example.com"));
    assert_eq!(state_of(&builder, &source("a")), TroveState::Unbuildable);
}

#[tokio::test]
async fn loader_outage_is_an_internal_error() {
    let f = Fixture::new();
    f.loader
        .fail_all(tb_adapters::LoaderError::Unavailable("recipes offline".into()));
    let mut builder = f.builder(job_of(vec![source("a")]));

    assert_eq!(builder.build().await, JobState::Failed);
    assert!(matches!(
        builder.job().failure(),
        Some(FailureReason::InternalError { .. })
    ));
}

#[tokio::test]
async fn stop_request_fails_running_builds() {
    let f = Fixture::new();
    f.worker.set_outcome("a:source", FakeOutcome::RunUntilStopped);
    let mut builder = f.builder(job_of(vec![source("a")]));
    let stop = builder.stop_handle();

    let (state, ()) = tokio::join!(builder.build(), async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        stop.request("user asked");
    });

    assert_eq!(state, JobState::Failed);
    assert_eq!(
        builder.job().failure(),
        Some(&FailureReason::stopped("user asked"))
    );
    assert_eq!(
        failure_of(&builder, &source("a")),
        FailureReason::stopped("stop requested")
    );
    assert!(f
        .worker
        .calls()
        .iter()
        .any(|c| matches!(c, WorkerCall::Stop { .. })));
    assert!(f.worker.killed().is_empty());
}

#[tokio::test]
async fn hung_builds_are_killed_after_the_grace_period() {
    let f = Fixture::new();
    f.worker.set_outcome("a:source", FakeOutcome::Hang);
    let mut builder = f.realtime(job_of(vec![source("a")]));
    let stop = builder.stop_handle();

    let (state, ()) = tokio::join!(builder.build(), async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        stop.request("received signal");
    });

    assert_eq!(state, JobState::Failed);
    assert_eq!(f.worker.killed().len(), 1);
}

#[tokio::test]
async fn stopping_one_trove_keeps_the_job_running() {
    let f = Fixture::new();
    f.worker.set_outcome("a:source", FakeOutcome::RunUntilStopped);
    let mut builder = f.builder(job_of(vec![source("a"), source("b")]));
    let stop = builder.stop_handle();

    let (state, ()) = tokio::join!(builder.build(), async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        stop.stop_trove(source("a"));
    });

    assert_eq!(state, JobState::Failed);
    assert_eq!(
        failure_of(&builder, &source("a")),
        FailureReason::stopped("stop requested")
    );
    assert_eq!(state_of(&builder, &source("b")), TroveState::Built);
    assert!(!builder.stop_handle().is_requested());
}

#[tokio::test]
async fn stuck_cycle_after_progress_names_its_troves() {
    let f = Fixture::new();
    f.loader.set("b:source", requires(&["c:runtime"]));
    f.loader.set("c:source", requires(&["b:runtime"]));
    let mut builder = f.builder(labelled_job(vec![source("a"), source("b"), source("c")]));

    assert_eq!(builder.build().await, JobState::Failed);
    assert_eq!(state_of(&builder, &source("a")), TroveState::Built);
    let reason = builder.job().failure().unwrap().to_string();
    assert_eq!(
        reason,
        "Build job had failures:\n   \
         b:source=1[]: Trove in cycle could not resolve build requirements: c:runtime\n   \
         c:source=1[]: Trove in cycle could not resolve build requirements: b:runtime"
    );
    assert!(failure_of(&builder, &source("b"))
        .to_string()
        .contains("could not resolve build requirements: c:runtime"));
}

#[tokio::test]
async fn stop_request_is_honoured_while_a_resolve_hangs() {
    let f = Fixture::new();
    f.worker.set_outcome("b:source", FakeOutcome::RunUntilStopped);
    f.loader.set("a:source", requires(&["zlib:runtime"]));
    f.resolver.hang();
    let mut builder = f.builder(labelled_job(vec![source("b"), source("a")]));
    let stop = builder.stop_handle();

    let (state, ()) = tokio::join!(
        async {
            tokio::time::timeout(Duration::from_secs(3), builder.build())
                .await
                .unwrap()
        },
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stop.request("received signal");
        }
    );

    assert_eq!(state, JobState::Failed);
    assert_eq!(f.resolver.requests().len(), 1);
    assert!(f
        .worker
        .calls()
        .iter()
        .any(|c| matches!(c, WorkerCall::Stop { .. })));
    assert_eq!(
        failure_of(&builder, &source("b")),
        FailureReason::stopped("stop requested")
    );
    assert!(state_of(&builder, &source("a")).is_failure());
}
