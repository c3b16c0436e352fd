// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rebuild avoidance for troves that carry a prebuilt record

use std::collections::{BTreeMap, BTreeSet, HashSet};
use tb_core::{ArtifactId, PrebuiltRecord, RebuildPolicy, TroveSpec};

/// Whether a prebuilt record can stand in for a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reuse {
    Prebuilt,
    /// Rebuild, explaining what changed (empty when nothing is worth saying)
    Rebuild(Vec<String>),
}

/// Compare what `spec` would be built against now with what its prebuilt
/// record was built against.
///
/// `fresh` holds artifacts built (not prebuilt) earlier in this job.
pub fn decide(
    spec: &TroveSpec,
    policy: RebuildPolicy,
    record: &PrebuiltRecord,
    resolved: &[ArtifactId],
    fresh: &HashSet<ArtifactId>,
) -> Reuse {
    let before: BTreeSet<&ArtifactId> = record.build_requirements.iter().collect();
    let after: BTreeSet<&ArtifactId> = resolved.iter().collect();
    let rebuild = match policy {
        RebuildPolicy::IgnoreAll => false,
        RebuildPolicy::Strict => before != after,
        RebuildPolicy::IgnoreExternal => after
            .difference(&before)
            .any(|artifact| fresh.contains(*artifact)),
    };
    if !rebuild {
        return Reuse::Prebuilt;
    }

    let changes = diff_lines(&record.build_requirements, resolved);
    if changes.is_empty() {
        return Reuse::Rebuild(Vec::new());
    }
    let mut lines = Vec::with_capacity(changes.len() + 2);
    lines.push(format!(
        "Could not count {spec} as prebuilt - the following changes have been made in its buildreqs:"
    ));
    lines.extend(changes);
    lines.push("...Rebuilding".to_string());
    Reuse::Rebuild(lines)
}

fn version_of(artifact: &ArtifactId) -> String {
    if artifact.flavor.is_empty() {
        artifact.version.clone()
    } else {
        format!("{}[{}]", artifact.version, artifact.flavor)
    }
}

/// `Update`/`Erase`/`Install` lines per artifact name, sorted by name.
pub fn diff_lines(before: &[ArtifactId], after: &[ArtifactId]) -> Vec<String> {
    let mut names: BTreeMap<&str, (BTreeSet<String>, BTreeSet<String>)> = BTreeMap::new();
    for artifact in before {
        names.entry(artifact.name.as_str()).or_default().0.insert(version_of(artifact));
    }
    for artifact in after {
        names.entry(artifact.name.as_str()).or_default().1.insert(version_of(artifact));
    }

    let mut lines = Vec::new();
    for (name, (old, new)) in names {
        let erased: Vec<&String> = old.difference(&new).collect();
        let installed: Vec<&String> = new.difference(&old).collect();
        match (erased.as_slice(), installed.as_slice()) {
            ([], []) => {}
            ([from], [to]) => lines.push(format!("Update  {name} ({from} -> {to})")),
            _ => {
                lines.extend(erased.iter().map(|v| format!("Erase   {name}={v}")));
                lines.extend(installed.iter().map(|v| format!("Install {name}={v}")));
            }
        }
    }
    lines
}

#[cfg(test)]
#[path = "prebuilt_tests.rs"]
mod tests;
