// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    bare = { "foo:runtime", "foo:runtime", None, None },
    versioned = { "foo:runtime=1.2", "foo:runtime", Some("1.2"), None },
    label = { "a=:automake", "a", Some(":automake"), None },
    flavored = { "gcc:runtime[cross]", "gcc:runtime", None, Some("cross") },
    everything = { "gcc=4.1[cross is: x86]", "gcc", Some("4.1"), Some("cross is: x86") },
)]
fn parse_req(input: &str, name: &str, version: Option<&str>, flavor: Option<&str>) {
    let req = ReqSpec::parse(input).unwrap();
    assert_eq!(req.name, name);
    assert_eq!(req.version.as_deref(), version);
    assert_eq!(req.flavor, flavor.map(|f| Flavor::parse(f).unwrap()));
}

#[yare::parameterized(
    empty = { "" },
    only_version = { "=1" },
    unterminated = { "gcc[cross" },
)]
fn parse_req_rejects(input: &str) {
    assert!(ReqSpec::parse(input).is_err());
}

#[test]
fn req_display_round_trips_through_parse() {
    let req = ReqSpec::parse("gcc:runtime=4[cross]").unwrap();
    assert_eq!(req.to_string(), "gcc:runtime=4[cross]");
}

#[test]
fn package_strips_component() {
    assert_eq!(ReqSpec::new("foo:runtime").package(), "foo");
    assert_eq!(ReqSpec::new("foo").package(), "foo");
    assert_eq!(package_name("foo:source"), "foo");
}

#[yare::parameterized(
    unversioned = { "a:runtime", "a:runtime=1-1[]", true },
    wrong_name = { "a:runtime", "a:devel=1-1[]", false },
    version_prefix = { "a:runtime=1", "a:runtime=1-1[]", true },
    version_not_prefix = { "a:runtime=1", "a:runtime=10-1[]", false },
    label = { "a=:automake", "a=/localhost@rpl:automake/1-1-1[]", true },
    flavor_ok = { "a:runtime[cross]", "a:runtime=1[cross is: x86]", true },
    flavor_mismatch = { "a:runtime[cross]", "a:runtime=1[is: x86]", false },
)]
fn req_matches_artifact(req: &str, artifact: &str, expected: bool) {
    let req = ReqSpec::parse(req).unwrap();
    let artifact = ArtifactId::parse(artifact).unwrap();
    assert_eq!(req.matches(&artifact), expected);
}

#[test]
fn artifact_requires_version() {
    assert!(matches!(
        ArtifactId::parse("a:runtime"),
        Err(ReqSpecError::MissingVersion(_))
    ));
}

#[test]
fn artifact_serde_uses_display_form() {
    let artifact = ArtifactId::parse("a:runtime=1-1[is: x86]").unwrap();
    let json = serde_json::to_string(&artifact).unwrap();
    assert_eq!(json, r#""a:runtime=1-1[is: x86]""#);
    let parsed: ArtifactId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, artifact);
}
