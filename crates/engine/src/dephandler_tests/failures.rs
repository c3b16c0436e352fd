// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tb_core::test_support::{record_all, req, source_with, trove_transitions};

#[test]
fn provider_failure_makes_requirer_unbuildable() {
    let mut h = Harness::new(vec![
        (source("a"), requires(&["b:runtime"])),
        (source("b"), none()),
    ]);
    h.handler.pop_buildable(&h.job);
    h.fail(&source("b"), FailureReason::build_failed("make: *** [all] Error 2"));

    let a = h.trove(&source("a"));
    assert_eq!(a.state(), TroveState::Unbuildable);
    assert!(!a.is_primary_failure());
    assert_eq!(
        a.failure(),
        Some(&FailureReason::missing_build_requirements(vec![req("b:runtime")]))
    );
    assert!(!h.handler.more_to_do());
}

#[test]
fn cascade_follows_the_requirement_chain() {
    let mut h = Harness::new(vec![
        (source("top"), requires(&["mid:runtime"])),
        (source("mid"), requires(&["base:runtime"])),
        (source("base"), none()),
        (source("other"), none()),
    ]);
    h.fail(&source("base"), FailureReason::build_failed("boom"));

    assert_eq!(h.state(&source("mid")), TroveState::Unbuildable);
    assert_eq!(h.state(&source("top")), TroveState::Unbuildable);
    assert_eq!(
        h.trove(&source("top")).failure(),
        Some(&FailureReason::missing_build_requirements(vec![req("mid:runtime")]))
    );
    assert_eq!(h.state(&source("other")), TroveState::Buildable);
}

#[test]
fn remaining_provider_keeps_requirer_alive() {
    let mut h = Harness::new(vec![
        (source("a"), requires(&["foo:runtime"])),
        (source_with("foo", "1", ""), none()),
        (source_with("foo", "2", ""), none()),
    ]);
    assert_eq!(h.handler.graph().out_degree(&source("a")), 2);

    assert_eq!(h.handler.pop_buildable(&h.job), Some(source_with("foo", "1", "")));
    h.fail(&source_with("foo", "1", ""), FailureReason::build_failed("boom"));
    assert_eq!(h.state(&source("a")), TroveState::Init);

    h.build(&source_with("foo", "2", ""));
    let rj = h.resolve_externally();
    assert_eq!(rj.local, vec![artifact("foo:runtime=2[]")]);
    assert_eq!(h.state(&source("a")), TroveState::Buildable);
}

#[test]
fn load_failures_cascade_when_scheduling_starts() {
    let mut job = job_of(vec![source("a"), source("b")]);
    job.set_metadata(&source("a"), requires(&["b:runtime"])).unwrap();
    job.trove_failed(&source("b"), FailureReason::load_failed("syntax error"), true)
        .unwrap();

    let h = Harness::from_job(job);
    assert_eq!(h.state(&source("a")), TroveState::Unbuildable);
    assert!(!h.handler.graph().contains(&source("a")));
    assert!(!h.handler.more_to_do());
}

#[test]
fn cascade_events_follow_the_failure() {
    let mut h = Harness::new(vec![
        (source("a"), requires(&["c:runtime"])),
        (source("b"), requires(&["c:runtime"])),
        (source("c"), none()),
    ]);
    let events = record_all(&h.job);
    h.fail(&source("c"), FailureReason::build_failed("boom"));

    let transitions = trove_transitions(&events.drain());
    assert_eq!(
        transitions,
        vec![
            (source("c"), TroveState::Buildable, TroveState::Failed),
            (source("a"), TroveState::Init, TroveState::Unbuildable),
            (source("b"), TroveState::Init, TroveState::Unbuildable),
        ]
    );
    assert!(!h.job.publisher().is_corked());
}

#[test]
fn dropping_the_handler_detaches_it() {
    let h = Harness::new(vec![(source("a"), none())]);
    let Harness { job, handler } = h;
    assert_eq!(job.publisher().listener_count(), 1);
    drop(handler);
    assert_eq!(job.publisher().listener_count(), 0);
}
