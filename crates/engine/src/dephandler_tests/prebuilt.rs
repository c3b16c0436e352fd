// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tb_core::test_support::{prebuilt, record_all};
use tb_core::Event;

fn with_record(reqs: &[&str], built_against: &[&str], source_matches: bool) -> TroveMetadata {
    let name = "a:runtime=1[]";
    TroveMetadata {
        prebuilt: Some(prebuilt(&[name], built_against, source_matches)),
        ..requires(reqs)
    }
}

fn trove_logs(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::TroveLogUpdated { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn unchanged_requirements_reuse_the_record() {
    let mut h = Harness::new(vec![(
        source("a"),
        with_record(&["zlib:runtime"], &["zlib:runtime=1[]"], false),
    )]);
    assert_eq!(h.state(&source("a")), TroveState::Waiting);

    h.resolve_externally();
    assert_eq!(h.state(&source("a")), TroveState::Prebuilt);
    assert_eq!(
        h.trove(&source("a")).built_artifacts(),
        &[artifact("a:runtime=1[]")]
    );
    assert!(h.buildable().is_empty());
    assert!(!h.handler.more_to_do());
}

#[test]
fn changed_requirements_rebuild_and_explain() {
    let mut job = job_of(vec![source("a")]);
    job.set_metadata(
        &source("a"),
        with_record(&["zlib:runtime"], &["zlib:runtime=0.9[]"], false),
    )
    .unwrap();
    let recorder = record_all(&job);
    let mut h = Harness::from_job(job);

    h.resolve_externally();
    assert_eq!(h.state(&source("a")), TroveState::Buildable);
    let logs = trove_logs(&recorder.drain());
    assert_eq!(logs.len(), 1);
    let lines: Vec<&str> = logs[0].lines().collect();
    assert_eq!(
        lines[0],
        format!(
            "Could not count {} as prebuilt - the following changes have been made in its buildreqs:",
            source("a")
        )
    );
    assert_eq!(lines[1], "Update  zlib:runtime (0.9 -> 1)");
    assert_eq!(lines[2], "...Rebuilding");
}

#[test]
fn ignore_all_skips_resolution() {
    let mut job = job_of(vec![source("a")]);
    job.configure("", |c| c.ignore_all_rebuild_deps = true).unwrap();
    job.set_metadata(
        &source("a"),
        with_record(&["zlib:runtime"], &["zlib:runtime=0.1[]"], false),
    )
    .unwrap();
    let h = Harness::from_job(job);

    assert_eq!(h.state(&source("a")), TroveState::Prebuilt);
    assert!(!h.handler.more_to_do());
}

#[test]
fn matching_source_with_prebuilt_providers_restarts_fast() {
    let b = TroveMetadata {
        prebuilt: Some(prebuilt(&["b:runtime=1[]"], &[], true)),
        ..none()
    };
    let h = Harness::new(vec![
        (source("a"), with_record(&["b:runtime"], &["b:runtime=0[]"], true)),
        (source("b"), b),
    ]);

    assert_eq!(h.state(&source("b")), TroveState::Prebuilt);
    assert_eq!(h.state(&source("a")), TroveState::Prebuilt);
    assert!(h.handler.graph().is_empty());
}

#[test]
fn matching_source_still_resolves_after_a_fresh_provider() {
    let mut h = Harness::new(vec![
        (source("a"), with_record(&["b:runtime"], &["b:runtime=0[]"], true)),
        (source("b"), none()),
    ]);
    h.build(&source("b"));
    assert_eq!(h.state(&source("a")), TroveState::Waiting);

    h.resolve_externally();
    assert_eq!(h.state(&source("a")), TroveState::Buildable);
}

#[test]
fn ignore_external_tolerates_outside_changes() {
    let mut job = job_of(vec![source("a")]);
    job.configure("", |c| c.ignore_external_rebuild_deps = true).unwrap();
    job.set_metadata(
        &source("a"),
        with_record(&["zlib:runtime"], &["zlib:runtime=0.9[]"], false),
    )
    .unwrap();
    let mut h = Harness::from_job(job);

    h.resolve_externally();
    assert_eq!(h.state(&source("a")), TroveState::Prebuilt);
}

#[test]
fn ignore_external_rebuilds_for_in_job_changes() {
    let mut job = job_of(vec![source("a"), source("b")]);
    job.configure("", |c| c.ignore_external_rebuild_deps = true).unwrap();
    job.set_metadata(
        &source("a"),
        with_record(&["b:runtime"], &["b:runtime=0[]"], false),
    )
    .unwrap();
    let mut h = Harness::from_job(job);
    h.build(&source("b"));

    h.resolve_externally();
    assert_eq!(h.state(&source("a")), TroveState::Buildable);
}
