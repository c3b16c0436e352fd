// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::worker::{WorkerEvent, WorkerNotifier};
use tb_core::Flavor;

fn request(name: &str, notifier: &WorkerNotifier) -> BuildRequest {
    BuildRequest {
        trove: TroveSpec::new(format!("{name}:source"), "1", Flavor::empty()),
        resolved: vec![],
        target_label: "example.com@rpl:devel".to_string(),
        prepare_only: false,
        notifier: notifier.clone(),
    }
}

#[tokio::test]
async fn default_build_reports_building_then_built() {
    let worker = FakeWorker::new();
    let (notifier, mut rx) = WorkerNotifier::channel();
    let handle = worker.dispatch_build(request("a", &notifier)).await.unwrap();

    assert!(matches!(
        rx.try_recv().unwrap(),
        WorkerEvent::Building { pid: 1001, .. }
    ));
    assert!(matches!(rx.try_recv().unwrap(), WorkerEvent::Log { .. }));

    let result = worker.check_result(&handle).await.unwrap();
    assert_eq!(
        result,
        Some(BuildResult::Built {
            artifacts: vec![ArtifactId::parse("a:runtime=1[]").unwrap()]
        })
    );
    assert_eq!(worker.check_result(&handle).await.unwrap(), None);
}

#[tokio::test]
async fn scripted_failure_and_dispatch_error() {
    let worker = FakeWorker::new();
    let (notifier, _rx) = WorkerNotifier::channel();
    worker.set_outcome("a:source", FakeOutcome::Failed(FailureReason::build_failed("exit 2")));
    worker.fail_dispatch("b:source", WorkerError::Environment("no space".into()));

    let handle = worker.dispatch_build(request("a", &notifier)).await.unwrap();
    assert_eq!(
        worker.check_result(&handle).await.unwrap(),
        Some(BuildResult::Failed(FailureReason::build_failed("exit 2")))
    );

    let err = worker.dispatch_build(request("b", &notifier)).await.unwrap_err();
    assert_eq!(err.failure_reason(), FailureReason::chroot_failed("no space"));
    assert_eq!(worker.dispatched().len(), 2);
}

#[tokio::test]
async fn run_until_stopped_reports_after_stop() {
    let worker = FakeWorker::new();
    let (notifier, _rx) = WorkerNotifier::channel();
    worker.set_outcome("a:source", FakeOutcome::RunUntilStopped);
    let handle = worker.dispatch_build(request("a", &notifier)).await.unwrap();

    assert_eq!(worker.check_result(&handle).await.unwrap(), None);
    worker.stop(&handle).await.unwrap();
    assert!(matches!(
        worker.check_result(&handle).await.unwrap(),
        Some(BuildResult::Failed(FailureReason::Stopped { .. }))
    ));
}

#[tokio::test]
async fn kill_forgets_the_handle() {
    let worker = FakeWorker::new();
    let (notifier, _rx) = WorkerNotifier::channel();
    worker.set_outcome("a:source", FakeOutcome::Hang);
    let handle = worker.dispatch_build(request("a", &notifier)).await.unwrap();
    worker.kill(&handle).await.unwrap();

    assert_eq!(worker.killed(), vec![handle.clone()]);
    assert!(matches!(
        worker.check_result(&handle).await,
        Err(WorkerError::UnknownHandle(_))
    ));
}

#[tokio::test]
async fn notified_results_skip_polling() {
    let worker = FakeWorker::new();
    worker.notify_results();
    let (notifier, mut rx) = WorkerNotifier::channel();
    let handle = worker.dispatch_build(request("a", &notifier)).await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(matches!(
        events.last(),
        Some(WorkerEvent::Finished { result: BuildResult::Built { .. }, .. })
    ));
    assert_eq!(worker.check_result(&handle).await.unwrap(), None);
}

#[tokio::test]
async fn prepare_only_requests_are_prepared() {
    let worker = FakeWorker::new();
    let (notifier, _rx) = WorkerNotifier::channel();
    let mut req = request("a", &notifier);
    req.prepare_only = true;
    let handle = worker.dispatch_build(req).await.unwrap();
    assert_eq!(
        worker.check_result(&handle).await.unwrap(),
        Some(BuildResult::Prepared)
    );
}
