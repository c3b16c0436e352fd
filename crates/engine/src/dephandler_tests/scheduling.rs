// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tb_core::test_support::{req, source_with};

#[test]
fn troves_without_requirements_are_buildable_at_once() {
    let h = Harness::new(vec![(source("b"), none()), (source("a"), none())]);
    assert_eq!(h.buildable(), vec![source("b"), source("a")]);
    assert_eq!(h.state(&source("a")), TroveState::Buildable);
    assert!(h.handler.more_to_do());
}

#[test]
fn requirer_waits_for_in_job_provider() {
    let mut h = Harness::new(vec![
        (source("a"), requires(&["b:runtime"])),
        (source("b"), none()),
    ]);
    assert_eq!(h.buildable(), vec![source("b")]);
    assert_eq!(h.state(&source("a")), TroveState::Init);
    assert!(h.handler.graph().has_edge(&source("a"), &source("b")));

    h.build(&source("b"));
    assert_eq!(h.state(&source("a")), TroveState::Waiting);

    let rj = h.resolve_externally();
    assert!(rj.is_local());
    assert_eq!(rj.local, vec![artifact("b:runtime=1[]")]);
    assert_eq!(h.state(&source("a")), TroveState::Buildable);
    assert_eq!(
        h.trove(&source("a")).resolved_requirements(),
        &[artifact("b:runtime=1[]")]
    );
}

#[test]
fn external_requirements_go_to_the_resolver() {
    let mut h = Harness::new(vec![(source("a"), requires(&["zlib:runtime", "b:runtime"])), (source("b"), none())]);
    h.build(&source("b"));

    let rj = h.resolve_externally();
    assert_eq!(rj.requirements, vec![req("zlib:runtime")]);
    assert_eq!(rj.local, vec![artifact("b:runtime=1[]")]);
    assert!(!rj.cycle_break);
    assert_eq!(
        h.trove(&source("a")).resolved_requirements(),
        &[artifact("b:runtime=1[]"), artifact("zlib:runtime=1[]")]
    );
}

#[test]
fn resolve_queue_prefers_most_dependents() {
    let h_troves = vec![
        (source("t1"), requires(&["ext1:runtime"])),
        (source("t2"), requires(&["ext2:runtime"])),
        (source("u"), requires(&["t2:runtime"])),
        (source("v"), requires(&["t2:runtime"])),
        (source("w"), requires(&["t1:runtime"])),
    ];
    let mut h = Harness::new(h_troves);
    assert_eq!(h.state(&source("t1")), TroveState::Waiting);
    assert_eq!(h.state(&source("t2")), TroveState::Waiting);

    assert_eq!(h.resolve_externally().trove, source("t2"));
    assert_eq!(h.resolve_externally().trove, source("t1"));
}

#[test]
fn resolve_queue_ties_break_by_insertion() {
    let mut h = Harness::new(vec![
        (source("x"), requires(&["ext:runtime"])),
        (source("y"), requires(&["ext:runtime"])),
    ]);
    assert_eq!(h.resolve_externally().trove, source("x"));
    assert_eq!(h.resolve_externally().trove, source("y"));
    assert!(h.handler.next_resolve_job(&h.job).is_none());
}

#[test]
fn buildable_set_is_independent_of_insertion_order() {
    let troves = vec![
        (source("a"), requires(&["b:runtime"])),
        (source("b"), none()),
        (source("c"), none()),
        (source("d"), requires(&["c:runtime", "b:runtime"])),
    ];
    let mut reversed = troves.clone();
    reversed.reverse();

    let sorted = |h: &Harness| {
        let mut b = h.buildable();
        b.sort();
        b
    };
    let forward = Harness::new(troves);
    let backward = Harness::new(reversed);
    assert_eq!(sorted(&forward), sorted(&backward));
    assert_eq!(sorted(&forward), vec![source("b"), source("c")]);
}

#[test]
fn missing_requirement_is_a_primary_failure() {
    let mut h = Harness::new(vec![(source("a"), requires(&["nothing:runtime"]))]);
    h.resolve(|rj| ResolveOutcome::Missing(rj.requirements.clone()));

    let a = h.trove(&source("a"));
    assert_eq!(a.state(), TroveState::Failed);
    assert_eq!(
        a.failure(),
        Some(&FailureReason::missing_build_requirements(vec![req("nothing:runtime")]))
    );
    assert!(!h.handler.more_to_do());
}

#[test]
fn delayed_trove_waits_for_blocking_troves() {
    let mut h = Harness::new(vec![
        (source("a"), requires(&["foo:runtime"])),
        (source("bar"), requires(&["ext:runtime"])),
    ]);
    let rj = h.resolve(|rj| {
        assert_eq!(rj.trove, source("a"));
        ResolveOutcome::Delayed(vec![source("bar")])
    });
    assert_eq!(rj.trove, source("a"));
    let a = h.trove(&source("a"));
    assert_eq!(a.state(), TroveState::Init);
    assert!(a.status().starts_with("Resolved buildreqs include 1 other troves"));
    assert!(h.handler.graph().has_edge(&source("a"), &source("bar")));

    h.resolve_externally();
    h.build(&source("bar"));
    assert_eq!(h.state(&source("a")), TroveState::Waiting);
}

#[test]
fn missing_dependencies_produced_in_job_wait_for_producers() {
    let mut h = Harness::new(vec![
        (source("a"), requires(&["foo:runtime"])),
        (source("lib"), requires(&["ext:runtime"])),
    ]);
    let missing = vec![MissingDependency {
        artifact: artifact("foo:runtime=1[]"),
        dependency: "lib:lib".to_string(),
    }];
    h.resolve(|_| ResolveOutcome::MissingDependencies(missing.clone()));

    let a = h.trove(&source("a"));
    assert_eq!(a.state(), TroveState::Init);
    assert!(a.status().starts_with("Trove could not resolve dependencies"));
    assert!(h.handler.graph().has_edge(&source("a"), &source("lib")));
}

#[test]
fn missing_dependencies_without_producer_fail() {
    let mut h = Harness::new(vec![(source("a"), requires(&["foo:runtime"]))]);
    let missing = vec![MissingDependency {
        artifact: artifact("foo:runtime=1[]"),
        dependency: "libc:lib".to_string(),
    }];
    h.resolve(|_| ResolveOutcome::MissingDependencies(missing.clone()));

    let a = h.trove(&source("a"));
    assert_eq!(a.state(), TroveState::Failed);
    assert_eq!(
        a.failure(),
        Some(&FailureReason::missing_dependencies(missing))
    );
}

#[test]
fn resolution_for_failed_trove_is_ignored() {
    let mut h = Harness::new(vec![(source("a"), requires(&["ext:runtime"]))]);
    let rj = h.handler.next_resolve_job(&h.job).unwrap();
    h.job.trove_resolving(&rj.trove, 0).unwrap();
    h.job
        .trove_failed(&rj.trove, FailureReason::stopped("stop requested"), true)
        .unwrap();

    h.handler
        .apply_resolution(&mut h.job, &rj, externally(&rj))
        .unwrap();
    assert_eq!(h.state(&source("a")), TroveState::Failed);
    assert!(h.buildable().is_empty());
}

#[test]
fn requirement_version_must_match_provider() {
    let h = Harness::new(vec![
        (source("a"), requires(&["b:runtime=2"])),
        (source_with("b", "1", ""), none()),
    ]);
    // b=1 cannot satisfy b:runtime=2, so a resolves externally right away
    assert_eq!(h.state(&source("a")), TroveState::Waiting);
    assert_eq!(h.handler.graph().out_degree(&source("a")), 0);
}

#[test]
fn pop_buildable_skips_troves_that_moved_on() {
    let mut h = Harness::new(vec![(source("a"), none()), (source("b"), none())]);
    h.job
        .trove_failed(&source("a"), FailureReason::stopped("stop requested"), true)
        .unwrap();
    assert_eq!(h.handler.pop_buildable(&h.job), Some(source("b")));
    assert_eq!(h.handler.pop_buildable(&h.job), None);
}
