// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    failed = { FailureReason::failed("build job had failures"), 0, "build job had failures" },
    build = { FailureReason::build_failed("exit 1"), 1, "Failed while building: exit 1" },
    chroot = { FailureReason::chroot_failed("no space"), 4, "Failed while creating chroot: no space" },
    load = { FailureReason::load_failed("syntax"), 5, "Failed while loading recipe: syntax" },
    stopped = { FailureReason::stopped("received signal"), 7, "Stopped: received signal" },
)]
fn tag_and_display(reason: FailureReason, tag: u8, text: &str) {
    assert_eq!(reason.tag(), tag);
    assert_eq!(reason.to_string(), text);
}

#[test]
fn missing_build_requirements_lists_specs() {
    let reason = FailureReason::missing_build_requirements(vec![
        ReqSpec::parse("foo:runtime").unwrap(),
        ReqSpec::parse("bar:devel=1").unwrap(),
    ]);
    assert_eq!(reason.tag(), 2);
    assert_eq!(
        reason.to_string(),
        "Could not satisfy build requirements: foo:runtime, bar:devel=1"
    );
}

#[test]
fn missing_dependencies_is_multiline() {
    let reason = FailureReason::missing_dependencies(vec![MissingDependency {
        artifact: ArtifactId::parse("a:runtime=1[]").unwrap(),
        dependency: "trove: foo".to_string(),
    }]);
    assert_eq!(reason.tag(), 3);
    assert_eq!(
        reason.to_string(),
        "Could not satisfy dependencies:\n    a:runtime=1[] requires trove: foo"
    );
    assert_eq!(reason.short(), "Could not satisfy dependencies:");
}

#[test]
fn internal_error_carries_trace() {
    let reason = FailureReason::internal("worker went away", "caused by: broken pipe");
    assert_eq!(reason.tag(), 6);
    assert_eq!(reason.short(), "Internal build error: worker went away");
    assert!(reason.to_string().ends_with("caused by: broken pipe"));
}

#[test]
fn serializes_with_kind_tag() {
    let reason = FailureReason::stopped("stop requested");
    let json = serde_json::to_value(&reason).unwrap();
    assert_eq!(json["kind"], "stopped");
    assert_eq!(json["message"], "stop requested");
    let back: FailureReason = serde_json::from_value(json).unwrap();
    assert_eq!(back, reason);
}
