// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Target constraints limiting which URNs a run may operate on.

use crate::urn::Urn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single target: a literal URN or a glob pattern over URNs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetSpec(pub String);

impl TargetSpec {
    pub fn is_glob(&self) -> bool {
        self.0.contains('*')
    }
}

/// User-specified constraint on the URNs a phase may touch.
///
/// An unconstrained policy matches everything. A constrained policy is a
/// set of literal URNs plus glob patterns; globs expand eagerly against
/// the old-state URN set when the policy is resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    specs: Option<Vec<TargetSpec>>,
}

impl TargetPolicy {
    pub fn unconstrained() -> Self {
        Self { specs: None }
    }

    pub fn from_specs<I, S>(specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { specs: Some(specs.into_iter().map(|s| TargetSpec(s.into())).collect()) }
    }

    pub fn is_constrained(&self) -> bool {
        self.specs.is_some()
    }

    /// Expand the policy against a universe of known URNs.
    pub fn resolve<'a>(&self, universe: impl IntoIterator<Item = &'a Urn>) -> ResolvedTargets {
        let Some(specs) = &self.specs else {
            return ResolvedTargets { set: None, literals: Vec::new() };
        };
        let universe: Vec<&Urn> = universe.into_iter().collect();
        let mut set = BTreeSet::new();
        let mut literals = Vec::new();
        for spec in specs {
            if spec.is_glob() {
                for urn in &universe {
                    if glob_match(&spec.0, urn.as_str()) {
                        set.insert((*urn).clone());
                    }
                }
            } else {
                let urn = Urn::new(spec.0.clone());
                set.insert(urn.clone());
                literals.push(urn);
            }
        }
        ResolvedTargets { set: Some(set), literals }
    }
}

/// An eagerly expanded target set.
#[derive(Debug, Clone, Default)]
pub struct ResolvedTargets {
    /// `None` means unconstrained.
    set: Option<BTreeSet<Urn>>,
    /// The literal (non-glob) targets, each of which must resolve to a
    /// known URN or the run fails target validation.
    literals: Vec<Urn>,
}

impl ResolvedTargets {
    pub fn unconstrained() -> Self {
        Self::default()
    }

    pub fn is_constrained(&self) -> bool {
        self.set.is_some()
    }

    pub fn contains(&self, urn: &Urn) -> bool {
        match &self.set {
            None => true,
            Some(set) => set.contains(urn),
        }
    }

    pub fn literals(&self) -> &[Urn] {
        &self.literals
    }

    pub fn iter(&self) -> impl Iterator<Item = &Urn> {
        self.set.iter().flatten()
    }

    /// Add a URN to a constrained set (used for dependent-closure expansion).
    pub fn insert(&mut self, urn: Urn) {
        if let Some(set) = &mut self.set {
            set.insert(urn);
        }
    }
}

/// Match `pattern` against `text` where `*` matches any run of characters.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();
    // Iterative wildcard matcher with backtracking over the last star.
    let (mut p, mut t) = (0usize, 0usize);
    let (mut star, mut mark) = (None::<usize>, 0usize);
    while t < txt.len() {
        if p < pat.len() && (pat[p] == txt[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}

#[cfg(test)]
#[path = "targets_tests.rs"]
mod tests;
