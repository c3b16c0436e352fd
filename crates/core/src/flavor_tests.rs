// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

fn f(s: &str) -> Flavor {
    Flavor::parse(s).unwrap()
}

#[yare::parameterized(
    empty = { "", "" },
    flags_sorted = { "ssl,readline", "readline,ssl" },
    senses = { "~!bootstrap ~readline !ssl cross", "~!bootstrap,cross,~readline,!ssl" },
    arch_only = { "is:x86", "is: x86" },
    multi_arch = { "is: x86_64 x86", "is: x86 x86_64" },
    cross = { "cross is: x86 target: x86_64", "cross is: x86 target: x86_64" },
    packed_sections = { "!cross is:x86 target:arm", "!cross is: x86 target: arm" },
)]
fn parse_and_display(input: &str, expected: &str) {
    assert_eq!(f(input).to_string(), expected);
}

#[test]
fn parse_rejects_bad_flag() {
    let err = Flavor::parse("read$line").unwrap_err();
    assert!(matches!(err, FlavorError::InvalidFlag { .. }));
}

#[test]
fn parse_rejects_duplicate_arch_section() {
    let err = Flavor::parse("is: x86 is: x86_64").unwrap_err();
    assert!(matches!(err, FlavorError::DuplicateSection { section: "is:", .. }));
}

#[yare::parameterized(
    required_present = { "readline,ssl", "readline", true },
    required_missing = { "ssl", "readline", false },
    preferred_counts_as_on = { "~readline", "readline", true },
    disallowed_ok_when_absent = { "ssl", "!readline", true },
    disallowed_fails_when_required = { "readline", "!readline", false },
    preference_never_fails = { "", "~readline", true },
    arch_contained = { "is: x86 x86_64", "is: x86_64", true },
    arch_missing = { "is: x86", "is: x86_64", false },
    target_missing = { "is: x86", "target: x86_64", false },
    cross_flag = { "cross is: x86 target: x86", "cross", true },
)]
fn satisfies(have: &str, req: &str, expected: bool) {
    assert_eq!(f(have).satisfies(&f(req)), expected);
}

#[yare::parameterized(
    preferred_on = { "ssl", "~ssl", true },
    preferred_missing = { "", "~ssl", false },
    prefer_not_absent = { "", "~!ssl", true },
    prefer_not_present = { "ssl", "~!ssl", false },
    disallowed_present = { "ssl", "!ssl", false },
    arch_named = { "ssl is: x86", "is: x86", true },
    arch_other = { "ssl is: x86_64", "is: x86", false },
)]
fn matches_preference(have: &str, pref: &str, expected: bool) {
    assert_eq!(f(have).matches_preference(&f(pref)), expected);
}

#[yare::parameterized(
    plain = { "is: x86", false, false },
    cross_tool = { "cross is: x86 target: x86_64", true, false },
    cross_compiled = { "!cross is: x86 target: x86_64", false, true },
    target_without_flag = { "is: x86 target: arm", false, true },
)]
fn cross_classification(flavor: &str, tool: bool, compiled: bool) {
    let flavor = f(flavor);
    assert_eq!(flavor.is_cross_tool(), tool);
    assert_eq!(flavor.is_cross_compiled(), compiled);
}

#[test]
fn covers_arch_treats_unspecified_as_compatible() {
    assert!(f("").covers_arch(&f("is: x86")));
    assert!(f("is: x86").covers_arch(&f("")));
    assert!(f("is: x86 x86_64").covers_arch(&f("is: x86")));
    assert!(!f("is: x86").covers_arch(&f("is: x86 x86_64")));
}

#[test]
fn score_prefers_preferred_flag_over_extra_requirements() {
    let install = f("readline");
    let both = f("readline,ssl").score(&install);
    let preferred = f("~readline").score(&install);
    let disallowed = f("!readline").score(&install);
    assert!(preferred > both);
    assert!(both > disallowed);
}

#[test]
fn serde_uses_display_form() {
    let flavor = f("~readline is: x86");
    let json = serde_json::to_string(&flavor).unwrap();
    assert_eq!(json, r#""~readline is: x86""#);
    let parsed: Flavor = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, flavor);
}

fn arb_flavor() -> impl Strategy<Value = String> {
    let flag = prop::sample::select(vec!["readline", "ssl", "cross", "bootstrap"]);
    let sense = prop::sample::select(vec!["", "!", "~", "~!"]);
    let arch = prop::sample::select(vec!["x86", "x86_64", "arm"]);
    (
        prop::collection::vec((sense, flag), 0..4),
        prop::collection::vec(arch, 0..3),
    )
        .prop_map(|(flags, arches)| {
            let mut s: Vec<String> = flags.iter().map(|(p, n)| format!("{p}{n}")).collect();
            if !arches.is_empty() {
                s.push(format!("is: {}", arches.join(" ")));
            }
            s.join(" ")
        })
}

proptest! {
    #[test]
    fn display_is_a_parse_fixpoint(input in arb_flavor()) {
        let once = Flavor::parse(&input).unwrap();
        let twice = Flavor::parse(&once.to_string()).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn every_flavor_satisfies_itself(input in arb_flavor()) {
        let flavor = Flavor::parse(&input).unwrap();
        prop_assert!(flavor.satisfies(&flavor));
    }
}
