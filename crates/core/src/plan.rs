// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation plans recorded during preview and enforced during update.

use crate::goal::Goal;
use crate::property::PropertyMap;
use crate::urn::Urn;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// The kind of operation a step performs against one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpKind {
    Same,
    Create,
    CreateReplacement,
    Update,
    Delete,
    DeleteReplaced,
    Replace,
    Read,
    Refresh,
    Import,
    RemovePendingReplace,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Same => "same",
            OpKind::Create => "create",
            OpKind::CreateReplacement => "create-replacement",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
            OpKind::DeleteReplaced => "delete-replaced",
            OpKind::Replace => "replace",
            OpKind::Read => "read",
            OpKind::Refresh => "refresh",
            OpKind::Import => "import",
            OpKind::RemovePendingReplace => "remove-pending-replace",
        }
    }

    /// Whether this op removes the resource from the live set.
    pub fn is_deletion(&self) -> bool {
        matches!(self, OpKind::Delete | OpKind::DeleteReplaced)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The operations a preview predicted for one resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcePlan {
    pub expected_ops: Vec<OpKind>,
    #[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
    pub inputs: PropertyMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<Goal>,
}

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("{urn} performed {actual}, but the plan expected {expected}")]
    UnexpectedOp { urn: Urn, expected: OpKind, actual: OpKind },
    #[error("{urn} performed {actual}, but the plan predicted no further operations")]
    UnplannedOp { urn: Urn, actual: OpKind },
    #[error("{urn} did not perform these planned operations: {}", missing.iter().map(OpKind::as_str).collect::<Vec<_>>().join(", "))]
    IncompletePlan { urn: Urn, missing: Vec<OpKind> },
}

/// A recorded prediction of operations per URN.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub resources: IndexMap<Urn, ResourcePlan>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Record an operation during preview.
    pub fn record(&mut self, urn: &Urn, op: OpKind, inputs: &PropertyMap, goal: Option<&Goal>) {
        let entry = self.resources.entry(urn.clone()).or_default();
        entry.expected_ops.push(op);
        entry.inputs = inputs.clone();
        if entry.goal.is_none() {
            entry.goal = goal.cloned();
        }
    }

    /// Consume the next expected operation for `urn` during update.
    ///
    /// The first unconsumed entry must match the applied op.
    pub fn consume(&mut self, urn: &Urn, op: OpKind) -> Result<(), PlanError> {
        match self.resources.get_mut(urn) {
            Some(plan) if plan.expected_ops.is_empty() => {
                Err(PlanError::UnplannedOp { urn: urn.clone(), actual: op })
            }
            Some(plan) if plan.expected_ops[0] == op => {
                plan.expected_ops.remove(0);
                Ok(())
            }
            Some(plan) => Err(PlanError::UnexpectedOp {
                urn: urn.clone(),
                expected: plan.expected_ops[0],
                actual: op,
            }),
            None => Err(PlanError::UnplannedOp { urn: urn.clone(), actual: op }),
        }
    }

    /// Verify every resource plan was fully consumed.
    ///
    /// A remaining `Delete` for a URN absent from the prior snapshot was
    /// legitimately skipped (nothing existed to delete) and is exempt.
    pub fn verify_complete(&self, prior_urns: &HashSet<Urn>) -> Vec<PlanError> {
        let mut errors = Vec::new();
        for (urn, plan) in &self.resources {
            if plan.expected_ops.is_empty() {
                continue;
            }
            let vacuous_delete = plan.expected_ops.iter().all(OpKind::is_deletion)
                && !prior_urns.contains(urn);
            if vacuous_delete {
                continue;
            }
            errors.push(PlanError::IncompletePlan {
                urn: urn.clone(),
                missing: plan.expected_ops.clone(),
            });
        }
        errors
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
