//! Persisted event stream and job snapshots.

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test]
async fn recorder_mirrors_the_finished_job() {
    let world = World::new();
    world.loader.set("app:source", requires(&["lib:runtime"]));
    world.worker.set_outcome(
        "lib:source",
        FakeOutcome::Failed(FailureReason::build_failed("compile error")),
    );

    let job = world.build(vec![source("app"), source("lib")]).await;

    let persisted = world.persisted();
    let record = persisted.job("job-1").unwrap();
    assert_eq!(record.state, job.state());
    assert_eq!(record.failure.as_ref(), job.failure());
    for trove in job.troves() {
        let stored = record.trove(trove.spec()).unwrap();
        assert_eq!(stored.state, trove.state());
        assert_eq!(stored.failure.as_ref(), trove.failure());
    }
}

#[tokio::test]
async fn event_log_survives_a_restart() {
    let world = World::new();
    let job = world.build(vec![source("app")]).await;
    assert_eq!(job.state(), JobState::Built);

    let reopened = JobRecorder::open(&world.state_dir().join("events.wal")).unwrap();
    let record = reopened.state().job("job-1").cloned().unwrap();
    assert_eq!(record.state, JobState::Built);
    assert_eq!(
        record.trove(&source("app")).unwrap().artifacts,
        vec![artifact("app:runtime=1[]")]
    );
    assert!(record
        .log
        .iter()
        .any(|line| line == "Build started - loading troves"));
}

#[tokio::test]
async fn finished_job_thaws_from_its_snapshot() {
    let world = World::new();
    world.loader.set("app:source", requires(&["lib:runtime"]));
    let job = world.build(vec![source("app"), source("lib")]).await;

    let path = tb_storage::snapshot_path(&world.state_dir(), job.id());
    JobSnapshot::of(&job).save(&path).unwrap();
    let thawed = JobSnapshot::load_job(&path).unwrap().unwrap();

    assert_eq!(thawed.freeze(), job.freeze());
    assert_eq!(thawed.state(), JobState::Built);
}
