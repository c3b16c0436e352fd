// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build flavors: use flags plus architecture markers.
//!
//! A flavor is written as comma- or space-separated flags followed by
//! optional `is:` (build architecture) and `target:` (cross-compile
//! target) sections:
//!
//! ```text
//! cross,~readline,!ssl is: x86 target: x86_64
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing a flavor string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlavorError {
    #[error("invalid flag {flag:?} in flavor {flavor:?}")]
    InvalidFlag { flavor: String, flag: String },
    #[error("invalid architecture {arch:?} in flavor {flavor:?}")]
    InvalidArch { flavor: String, arch: String },
    #[error("duplicate {section} section in flavor {flavor:?}")]
    DuplicateSection {
        flavor: String,
        section: &'static str,
    },
}

/// How strongly a flag is asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sense {
    /// `flag`
    Required,
    /// `!flag`
    Disallowed,
    /// `~flag`
    Preferred,
    /// `~!flag`
    PreferNot,
}

impl Sense {
    fn prefix(self) -> &'static str {
        match self {
            Sense::Required => "",
            Sense::Disallowed => "!",
            Sense::Preferred => "~",
            Sense::PreferNot => "~!",
        }
    }

    /// True when the flag is switched on (required or preferred).
    pub fn is_on(self) -> bool {
        matches!(self, Sense::Required | Sense::Preferred)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Flags,
    Arch,
    Target,
}

/// A structured set of build-configuration flags and architecture markers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Flavor {
    flags: BTreeMap<String, Sense>,
    arch: Vec<String>,
    target: Vec<String>,
}

impl Flavor {
    /// The empty flavor, which satisfies and is satisfied by nothing in particular.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn parse(s: &str) -> Result<Self, FlavorError> {
        s.parse()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty() && self.arch.is_empty() && self.target.is_empty()
    }

    /// Build (host) architectures from the `is:` section.
    pub fn arch(&self) -> &[String] {
        &self.arch
    }

    /// Cross-compile target architectures from the `target:` section.
    pub fn target(&self) -> &[String] {
        &self.target
    }

    pub fn flag(&self, name: &str) -> Option<Sense> {
        self.flags.get(name).copied()
    }

    /// True when this trove builds a cross toolchain. Its binaries run on
    /// the build architecture even though it names a target.
    pub fn is_cross_tool(&self) -> bool {
        self.flag("cross").is_some_and(Sense::is_on)
    }

    /// True when this trove is being cross-compiled. Its binaries run on
    /// the target architecture, not on the build host.
    pub fn is_cross_compiled(&self) -> bool {
        !self.target.is_empty() && !self.is_cross_tool()
    }

    /// Whether `self` meets every hard constraint in `req`.
    ///
    /// Preference flags (`~flag`, `~!flag`) never cause a mismatch.
    pub fn satisfies(&self, req: &Flavor) -> bool {
        let flags_ok = req.flags.iter().all(|(name, sense)| {
            let mine = self.flags.get(name).copied();
            match sense {
                Sense::Required => mine.is_some_and(Sense::is_on),
                Sense::Disallowed => mine != Some(Sense::Required),
                Sense::Preferred | Sense::PreferNot => true,
            }
        });
        flags_ok
            && req.arch.iter().all(|a| self.arch.contains(a))
            && req.target.iter().all(|t| self.target.contains(t))
    }

    /// Whether `self` agrees with every flag and architecture `pref` names.
    ///
    /// Unlike [`satisfies`](Self::satisfies), soft senses count here: `~ssl`
    /// needs `ssl` on and `~!ssl` needs it off.
    pub fn matches_preference(&self, pref: &Flavor) -> bool {
        pref.flags.iter().all(|(name, sense)| {
            self.flags.get(name).copied().is_some_and(Sense::is_on) == sense.is_on()
        }) && pref.arch.iter().all(|a| self.arch.contains(a))
            && pref.target.iter().all(|t| self.target.contains(t))
    }

    /// Whether binaries of this flavor can run where `host` builds.
    ///
    /// An unspecified architecture on either side is compatible.
    pub fn covers_arch(&self, host: &Flavor) -> bool {
        self.arch.is_empty()
            || host.arch.is_empty()
            || host.arch.iter().all(|a| self.arch.contains(a))
    }

    /// How well this flavor fits an install flavor. Higher is better.
    pub fn score(&self, install: &Flavor) -> i32 {
        let mut score = 0;
        for (name, sense) in &self.flags {
            let wanted = install.flags.get(name).copied();
            match (sense, wanted) {
                (s, Some(w)) if s.is_on() && w.is_on() => score += 1,
                (Sense::Required, _) => score -= 1,
                (Sense::Disallowed, Some(w)) if w.is_on() => score -= 1,
                _ => {}
            }
        }
        for arch in &self.arch {
            if install.arch.contains(arch) {
                score += 1;
            } else if !install.arch.is_empty() {
                score -= 2;
            }
        }
        score
    }
}

fn valid_word(word: &str) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

impl FromStr for Flavor {
    type Err = FlavorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flavor = Flavor::default();
        let mut section = Section::Flags;
        let mut seen_arch = false;
        let mut seen_target = false;

        let normalized = s.replace(',', " ");
        for token in normalized.split_whitespace() {
            let rest = if let Some(rest) = token.strip_prefix("is:") {
                if seen_arch {
                    return Err(FlavorError::DuplicateSection {
                        flavor: s.to_string(),
                        section: "is:",
                    });
                }
                seen_arch = true;
                section = Section::Arch;
                rest
            } else if let Some(rest) = token.strip_prefix("target:") {
                if seen_target {
                    return Err(FlavorError::DuplicateSection {
                        flavor: s.to_string(),
                        section: "target:",
                    });
                }
                seen_target = true;
                section = Section::Target;
                rest
            } else {
                token
            };
            if rest.is_empty() {
                continue;
            }

            match section {
                Section::Flags => {
                    let (sense, name) = if let Some(n) = rest.strip_prefix("~!") {
                        (Sense::PreferNot, n)
                    } else if let Some(n) = rest.strip_prefix('~') {
                        (Sense::Preferred, n)
                    } else if let Some(n) = rest.strip_prefix('!') {
                        (Sense::Disallowed, n)
                    } else {
                        (Sense::Required, rest)
                    };
                    if !valid_word(name) {
                        return Err(FlavorError::InvalidFlag {
                            flavor: s.to_string(),
                            flag: rest.to_string(),
                        });
                    }
                    flavor.flags.insert(name.to_string(), sense);
                }
                Section::Arch | Section::Target => {
                    if !valid_word(rest) {
                        return Err(FlavorError::InvalidArch {
                            flavor: s.to_string(),
                            arch: rest.to_string(),
                        });
                    }
                    let list = if section == Section::Arch {
                        &mut flavor.arch
                    } else {
                        &mut flavor.target
                    };
                    list.push(rest.to_string());
                }
            }
        }

        flavor.arch.sort();
        flavor.arch.dedup();
        flavor.target.sort();
        flavor.target.dedup();
        Ok(flavor)
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags: Vec<String> = self
            .flags
            .iter()
            .map(|(name, sense)| format!("{}{}", sense.prefix(), name))
            .collect();
        let mut parts = Vec::new();
        if !flags.is_empty() {
            parts.push(flags.join(","));
        }
        if !self.arch.is_empty() {
            parts.push(format!("is: {}", self.arch.join(" ")));
        }
        if !self.target.is_empty() {
            parts.push(format!("target: {}", self.target.join(" ")));
        }
        write!(f, "{}", parts.join(" "))
    }
}

impl Serialize for Flavor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Flavor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "flavor_tests.rs"]
mod tests;
