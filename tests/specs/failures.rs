//! Failure propagation.

use crate::prelude::*;

#[tokio::test]
async fn missing_requirement_fails_the_trove_and_the_job() {
    let world = World::new();
    world.loader.set("app:source", requires(&["zlib:runtime"]));

    let job = world.build(vec![source("app")]).await;

    assert_eq!(job.state(), JobState::Failed);
    assert_eq!(state_of(&job, "app"), TroveState::Failed);
    assert_eq!(
        failure_of(&job, "app").to_string(),
        "Could not satisfy build requirements: zlib:runtime"
    );
    assert!(world.worker.dispatched().is_empty());
}

#[tokio::test]
async fn failed_provider_makes_requirers_unbuildable() {
    let world = World::new();
    world.loader.set("app:source", requires(&["lib:runtime"]));
    world.worker.set_outcome(
        "lib:source",
        FakeOutcome::Failed(FailureReason::build_failed("compile error")),
    );

    let job = world.build(vec![source("app"), source("lib")]).await;

    assert_eq!(job.state(), JobState::Failed);
    assert_eq!(state_of(&job, "lib"), TroveState::Failed);
    assert_eq!(state_of(&job, "app"), TroveState::Unbuildable);
    assert_eq!(
        failure_of(&job, "app"),
        FailureReason::missing_build_requirements(vec![req("lib:runtime")])
    );
    let summary = job.failure().unwrap().to_string();
    assert!(summary.starts_with("Build job had failures:"));
    assert!(summary.contains("Failed while building: compile error"));
}

#[tokio::test]
async fn independent_troves_still_build_after_a_failure() {
    let world = World::new();
    world.worker.set_outcome(
        "broken:source",
        FakeOutcome::Failed(FailureReason::build_failed("boom")),
    );

    let job = world
        .build(vec![source("broken"), source("fine")])
        .await;

    assert_eq!(job.state(), JobState::Failed);
    assert_eq!(state_of(&job, "fine"), TroveState::Built);
    assert_eq!(state_of(&job, "broken"), TroveState::Failed);
}

#[tokio::test]
async fn load_failure_is_reported_in_the_trove_log() {
    let world = World::new();
    world.loader.fail("app:source", "syntax error on line 3");

    let job = world.build(vec![source("app")]).await;

    assert_eq!(job.state(), JobState::Failed);
    assert_eq!(
        failure_of(&job, "app").to_string(),
        "Failed while loading recipe: syntax error on line 3"
    );
    let trove_log =
        std::fs::read_to_string(world.log_dir().join("jobs/job-1/app_source_1.log")).unwrap();
    assert!(trove_log.contains("Failed: Failed while loading recipe"));
}
