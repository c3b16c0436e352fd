// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tb_core::test_support::{job_of, requires, source};
use tb_core::{JobState, TroveState};
use tempfile::tempdir;

fn building_job() -> Job {
    let mut job = job_of(vec![source("a"), source("b")]);
    job.set_metadata(&source("a"), requires(&["b:runtime"])).unwrap();
    job.job_loading().unwrap();
    job.job_building().unwrap();
    job.trove_buildable(&source("b"), vec![]).unwrap();
    job
}

#[test]
fn save_and_load_job() {
    let dir = tempdir().unwrap();
    let job = building_job();
    let path = snapshot_path(dir.path(), job.id());

    let size = JobSnapshot::of(&job).save(&path).unwrap();
    assert!(size > 0);
    assert!(!path.with_extension("tmp").exists());

    let thawed = JobSnapshot::load_job(&path).unwrap().unwrap();
    assert_eq!(thawed.state(), JobState::Building);
    assert_eq!(thawed.freeze(), job.freeze());
    assert_eq!(
        thawed.trove(&source("b")).unwrap().state(),
        TroveState::Buildable
    );
}

#[test]
fn snapshot_path_uses_job_id() {
    let path = snapshot_path(Path::new("/state"), &JobId::new("job-7"));
    assert_eq!(path, PathBuf::from("/state/job-7.snapshot"));
}

#[test]
fn saved_file_is_compressed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("job.snapshot");
    JobSnapshot::of(&building_job()).save(&path).unwrap();

    let raw = fs::read(&path).unwrap();
    assert!(serde_json::from_slice::<serde_json::Value>(&raw).is_err());
    let json = zstd::decode_all(raw.as_slice()).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(value["job"]["v"], FROZEN_VERSION);
}

#[test]
fn missing_file_loads_nothing() {
    let dir = tempdir().unwrap();
    let loaded = JobSnapshot::load(&dir.path().join("nope.snapshot")).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn corrupt_file_is_moved_to_bak() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("job.snapshot");
    fs::write(&path, b"not zstd at all").unwrap();

    assert!(JobSnapshot::load(&path).unwrap().is_none());
    assert!(!path.exists());
    assert!(path.with_extension("bak").exists());
}

#[test]
fn newer_snapshot_is_refused_and_kept() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("job.snapshot");
    let mut snapshot = JobSnapshot::of(&building_job());
    snapshot.job.v = FROZEN_VERSION + 1;
    snapshot.save(&path).unwrap();

    match JobSnapshot::load(&path) {
        Err(SnapshotError::TooNew { found, supported }) => {
            assert_eq!(found, FROZEN_VERSION + 1);
            assert_eq!(supported, FROZEN_VERSION);
        }
        other => panic!("expected TooNew, got {other:?}"),
    }
    assert!(path.exists());
}

#[test]
fn bak_rotation_keeps_three() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("job.snapshot");
    for round in 0..4 {
        fs::write(&path, format!("garbage {round}")).unwrap();
        assert!(JobSnapshot::load(&path).unwrap().is_none());
    }
    assert_eq!(
        fs::read_to_string(path.with_extension("bak")).unwrap(),
        "garbage 3"
    );
    assert_eq!(
        fs::read_to_string(path.with_extension("bak.3")).unwrap(),
        "garbage 1"
    );
    assert!(!path.with_extension("bak.4").exists());
}
