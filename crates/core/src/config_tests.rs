// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;

const SAMPLE: &str = r#"
target_label = "example.com@rpl:devel"
install_label_path = ["example.com@rpl:devel", "example.com@rpl:base"]
flavor = ["is: x86_64"]
flavor_preferences = ["~ssl", "!ssl"]

[contexts.bootstrap]
target_label = "example.com@rpl:bootstrap"
resolve_troves = [["gcc:runtime=4.1[]"], ["glibc:runtime=2.5[is: x86_64]"]]
resolve_troves_only = true
ignore_external_rebuild_deps = true
ignore_all_rebuild_deps = true
"#;

#[test]
fn parses_main_and_named_contexts() {
    let config = BuildConfig::parse(SAMPLE).unwrap();
    assert_eq!(config.main.target_label, "example.com@rpl:devel");
    assert_eq!(config.main.install_label_path.len(), 2);
    assert_eq!(config.main.flavor, vec![Flavor::parse("is: x86_64").unwrap()]);
    assert_eq!(config.main.flavor_preferences.len(), 2);

    let bootstrap = config.context("bootstrap").unwrap();
    assert_eq!(bootstrap.resolve_troves.len(), 2);
    assert_eq!(bootstrap.resolve_troves[0][0].name, "gcc:runtime");
    assert!(config.context("missing").is_none());
    assert_eq!(config.context(""), Some(&config.main));
}

#[test]
fn policies_follow_flags() {
    let config = BuildConfig::parse(SAMPLE).unwrap();
    assert_eq!(
        config.main.resolve_policy(),
        ResolvePolicy::ResolveTrovesThenLabelPath
    );
    assert_eq!(config.main.rebuild_policy(), RebuildPolicy::Strict);

    let bootstrap = config.context("bootstrap").unwrap();
    assert_eq!(bootstrap.resolve_policy(), ResolvePolicy::ResolveTrovesOnly);
    assert_eq!(bootstrap.rebuild_policy(), RebuildPolicy::IgnoreAll);
}

#[yare::parameterized(
    strict = { false, false, RebuildPolicy::Strict },
    external = { true, false, RebuildPolicy::IgnoreExternal },
    all = { false, true, RebuildPolicy::IgnoreAll },
    all_wins = { true, true, RebuildPolicy::IgnoreAll },
)]
fn rebuild_policy_precedence(external: bool, all: bool, expected: RebuildPolicy) {
    let config = ContextConfig {
        ignore_external_rebuild_deps: external,
        ignore_all_rebuild_deps: all,
        ..ContextConfig::default()
    };
    assert_eq!(config.rebuild_policy(), expected);
}

#[test]
fn rejects_bad_flavor() {
    let err = BuildConfig::parse(r#"flavor = ["ssl@"]"#).unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
}

#[test]
fn load_reads_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SAMPLE.as_bytes()).unwrap();
    let config = BuildConfig::load(file.path()).unwrap();
    assert_eq!(config.contexts.len(), 1);
}

#[test]
fn load_reports_missing_path() {
    let dir = tempfile::tempdir().unwrap();
    let err = BuildConfig::load(&dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
