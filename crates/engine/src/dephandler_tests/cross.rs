// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tb_core::test_support::{req, requires_cross, source_with};

fn check(provider_flavor: &str, requirer_flavor: &str, requirement: &str, kind: ReqKind) -> bool {
    let provider = source_with("gcc", "4.1", provider_flavor);
    let job = job_of(vec![provider.clone()]);
    let requirer = source_with("app", "1", requirer_flavor);
    provides(job.trove(&provider).unwrap(), &requirer, &req(requirement), kind)
}

#[yare::parameterized(
    plain_build = { "is: x86", "is: x86", "gcc:runtime", ReqKind::Build, true },
    unspecified_arch = { "", "is: x86", "gcc:runtime", ReqKind::Build, true },
    other_arch = { "is: x86_64", "is: x86", "gcc:runtime", ReqKind::Build, false },
    other_package = { "is: x86", "is: x86", "glibc:runtime", ReqKind::Build, false },
    version_matches = { "is: x86", "is: x86", "gcc:runtime=4.1", ReqKind::Build, true },
    version_differs = { "is: x86", "is: x86", "gcc:runtime=3.4", ReqKind::Build, false },
    flavor_required = { "is: x86", "is: x86", "gcc:runtime[ssl]", ReqKind::Build, false },
    cross_compiled_never_builds = { "!cross is: x86 target: arm", "is: x86", "gcc:runtime", ReqKind::Build, false },
    cross_tool_builds = { "cross is: x86 target: arm", "!cross is: x86 target: arm", "gcc:runtime", ReqKind::Build, true },
    cross_same_target = { "!cross is: x86 target: arm", "!cross is: x86 target: arm", "gcc:runtime", ReqKind::Cross, true },
    cross_other_target = { "!cross is: x86 target: mips", "!cross is: x86 target: arm", "gcc:runtime", ReqKind::Cross, false },
    cross_needs_cross_provider = { "is: x86", "!cross is: x86 target: arm", "gcc:runtime", ReqKind::Cross, false },
    cross_tool_not_in_sysroot = { "cross is: x86 target: arm", "!cross is: x86 target: arm", "gcc:runtime", ReqKind::Cross, false },
    native_cross_req_is_build_rule = { "is: x86", "is: x86", "gcc:runtime", ReqKind::Cross, true },
)]
fn provider_rules(provider: &str, requirer: &str, requirement: &str, kind: ReqKind, expected: bool) {
    assert_eq!(check(provider, requirer, requirement, kind), expected);
}

#[test]
fn cross_requirements_wire_to_matching_target() {
    let arm = "!cross is: x86 target: arm";
    let h = Harness::new(vec![
        (source_with("app", "1", arm), requires_cross(&[], &["zlib:runtime"])),
        (source_with("zlib", "1", arm), none()),
        (source_with("zlib", "1", "is: x86"), none()),
    ]);
    let app = source_with("app", "1", arm);
    assert!(h.handler.graph().has_edge(&app, &source_with("zlib", "1", arm)));
    assert!(!h.handler.graph().has_edge(&app, &source_with("zlib", "1", "is: x86")));
}

#[test]
fn cross_requirements_resolve_separately() {
    let mut h = Harness::new(vec![(
        source("app"),
        requires_cross(&["make:runtime"], &["zlib:devel"]),
    )]);
    let rj = h.resolve_externally();
    assert_eq!(rj.requirements, vec![req("make:runtime")]);
    assert_eq!(rj.cross_requirements, vec![req("zlib:devel")]);
}
