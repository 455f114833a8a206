// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deployment run options.

use gw_core::{Plan, ProviderRef, TargetPolicy, Urn};
use serde::{Deserialize, Serialize};

/// Options for one deployment run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOptions {
    /// Stack the deployment targets; part of every generated URN.
    pub stack: String,
    /// Project the program belongs to; part of every generated URN.
    pub project: String,

    /// Reconcile recorded state with the provider before updating.
    #[serde(default)]
    pub refresh: bool,
    /// Stop after the refresh phase.
    #[serde(default)]
    pub refresh_only: bool,

    /// Constrain updates to these URNs.
    #[serde(default)]
    pub targets: TargetPolicy,
    /// Force replacement of these URNs even without a diff.
    #[serde(default)]
    pub replace_targets: TargetPolicy,
    /// Constrain deletions to these URNs.
    #[serde(default)]
    pub destroy_targets: TargetPolicy,
    /// Extend target constraints to transitive dependents.
    #[serde(default)]
    pub target_dependents: bool,

    /// Maximum concurrently executing chains. Zero selects the default
    /// of four chains per logical CPU.
    #[serde(default)]
    pub parallel: usize,
    /// Keep independent chains running after a step fails. The run is
    /// still reported as failed.
    #[serde(default)]
    pub continue_on_error: bool,

    /// Record a plan of operations during preview.
    #[serde(default)]
    pub generate_plan: bool,
    /// Constraint plan from a prior preview; applied steps must consume it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,

    /// Diff by comparing recorded inputs instead of asking the provider.
    #[serde(default)]
    pub use_legacy_diff: bool,
    /// Trust recorded dependency information for parallel scheduling.
    /// When false, chains are serialized.
    #[serde(default = "default_true")]
    pub trust_dependencies: bool,

    /// Resources to import instead of running the program.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub import_resources: Vec<ImportSpec>,
}

fn default_true() -> bool {
    true
}

impl UpdateOptions {
    pub fn new(stack: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            project: project.into(),
            trust_dependencies: true,
            ..Self::default()
        }
    }

    /// The effective worker bound for this run.
    pub fn degree_of_parallelism(&self) -> usize {
        if !self.trust_dependencies {
            return 1;
        }
        if self.parallel > 0 {
            return self.parallel;
        }
        std::thread::available_parallelism().map(|n| n.get() * 4).unwrap_or(16)
    }

    /// Whether this run is an import run.
    pub fn is_import(&self) -> bool {
        !self.import_resources.is_empty()
    }
}

/// One resource to adopt into the snapshot without creating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSpec {
    /// Package-qualified type token.
    pub ty: String,
    pub name: String,
    /// The existing physical identifier to adopt.
    pub id: gw_core::ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Urn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderRef>,
    #[serde(default)]
    pub protect: bool,
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
