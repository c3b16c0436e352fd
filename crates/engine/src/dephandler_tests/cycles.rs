// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn two_cycle() -> Harness {
    Harness::new(vec![
        (source("a"), requires(&["b:runtime"])),
        (source("b"), requires(&["a:runtime"])),
    ])
}

#[test]
fn two_node_cycle_is_broken_by_external_resolution() {
    let mut h = two_cycle();
    assert!(h.buildable().is_empty());
    assert!(h.handler.more_to_do());

    let rj = h.resolve_externally();
    assert_eq!(rj.trove, source("a"));
    assert!(rj.cycle_break);
    assert_eq!(rj.requirements, vec![tb_core::test_support::req("b:runtime")]);
    assert_eq!(h.state(&source("a")), TroveState::Buildable);
    assert_eq!(h.handler.graph().out_degree(&source("a")), 0);

    h.build(&source("a"));
    let rj = h.resolve_externally();
    assert_eq!(rj.trove, source("b"));
    assert!(!rj.cycle_break);
    assert_eq!(rj.local, vec![artifact("a:runtime=1[]")]);
    h.build(&source("b"));
    assert!(!h.handler.more_to_do());
}

#[test]
fn unresolvable_cycle_terminates_in_init() {
    let mut h = two_cycle();
    h.resolve(|rj| ResolveOutcome::Missing(rj.requirements.clone()));
    let a = h.trove(&source("a"));
    assert_eq!(a.state(), TroveState::Init);
    assert!(a.status().starts_with("Trove in cycle could not resolve build requirements"));
    assert!(h.handler.cycle_attempts().contains(&source("a")));

    let rj = h.resolve(|rj| ResolveOutcome::Missing(rj.requirements.clone()));
    assert_eq!(rj.trove, source("b"));

    assert!(!h.handler.more_to_do());
    assert!(h.handler.next_resolve_job(&h.job).is_none());
    assert_eq!(h.state(&source("a")), TroveState::Init);
    assert_eq!(h.state(&source("b")), TroveState::Init);
}

#[test]
fn self_requiring_trove_without_candidate_stays_in_init() {
    let mut h = Harness::new(vec![(source("gcc"), requires(&["gcc:runtime"]))]);
    assert!(h.handler.graph().has_edge(&source("gcc"), &source("gcc")));

    let rj = h.resolve(|rj| ResolveOutcome::Missing(rj.requirements.clone()));
    assert!(rj.cycle_break);
    assert_eq!(h.state(&source("gcc")), TroveState::Init);
    assert!(!h.handler.more_to_do());
}

#[test]
fn self_requiring_trove_bootstraps_from_repository() {
    let mut h = Harness::new(vec![(source("gcc"), requires(&["gcc:runtime"]))]);
    h.resolve_externally();
    assert_eq!(h.state(&source("gcc")), TroveState::Buildable);
    assert_eq!(
        h.trove(&source("gcc")).resolved_requirements(),
        &[artifact("gcc:runtime=1[]")]
    );
}

#[test]
fn cycle_break_starts_at_lowest_requirer_out_degree() {
    // a needs b and c; b and c each need a. a's requirers have out-degree 1,
    // b's and c's requirer (a) has out-degree 2.
    let mut h = Harness::new(vec![
        (source("b"), requires(&["a:runtime"])),
        (source("c"), requires(&["a:runtime"])),
        (source("a"), requires(&["b:runtime", "c:runtime"])),
    ]);
    let rj = h.resolve_externally();
    assert_eq!(rj.trove, source("a"));
    assert!(rj.cycle_break);
}

#[test]
fn cycles_wait_until_other_work_is_done() {
    let mut h = Harness::new(vec![
        (source("a"), requires(&["b:runtime"])),
        (source("b"), requires(&["a:runtime"])),
        (source("x"), none()),
    ]);
    assert_eq!(h.buildable(), vec![source("x")]);
    assert!(h.handler.next_resolve_job(&h.job).is_none());

    h.build(&source("x"));
    let rj = h.resolve_externally();
    assert!(rj.cycle_break);
}

#[test]
fn finishing_a_trove_clears_cycle_attempts() {
    let mut h = two_cycle();
    h.resolve(|rj| ResolveOutcome::Missing(rj.requirements.clone()));

    let rj = h.resolve_externally();
    assert_eq!(rj.trove, source("b"));
    assert!(rj.cycle_break);
    assert!(h.handler.cycle_attempts().contains(&source("a")));

    h.build(&source("b"));
    assert!(h.handler.cycle_attempts().is_empty());
    assert_eq!(h.state(&source("a")), TroveState::Waiting);
}
