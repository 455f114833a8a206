// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Base-state rebuild.
//!
//! After phases that delete resources (refresh, targeted deletes) the old
//! snapshot must be repaired so later readers see a consistent view: a
//! surviving resource may only reference URNs materialized before it, and
//! a resource whose parent vanished is re-parented onto the nearest
//! surviving ancestor.
//!
//! No other component may read `olds` while a rebuild runs; the executor
//! only calls this at phase boundaries with all workers drained.

use crate::deployment::DeploymentState;
use crate::error::EngineError;
use gw_core::{ResourceState, SnapshotError, Urn};
use gw_graph::DependencyGraph;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Repair the prior snapshot in one pass over its topological order.
///
/// With `refresh` set, step results come from the refresh-observation map
/// and a vanished resource must be a custom non-provider resource; without
/// it, the deleted-position set names what targeted deletes removed.
pub(crate) fn rebuild_base_state(
    state: &Arc<DeploymentState>,
    refresh: bool,
) -> Result<(), EngineError> {
    let prior = state.prior.read().clone();

    let produced: HashMap<usize, Option<Arc<ResourceState>>> = if refresh {
        std::mem::take(&mut *state.refresh_results.lock())
    } else {
        state.deleted_indices.lock().drain().map(|i| (i, None)).collect()
    };

    let mut referenceable: HashSet<Urn> = HashSet::new();
    let mut olds: HashMap<Urn, Arc<ResourceState>> = HashMap::new();
    let mut available_parents: HashMap<Urn, Option<Urn>> = HashMap::new();
    let mut resources: Vec<Arc<ResourceState>> = Vec::with_capacity(prior.len());

    for (i, res) in prior.iter().enumerate() {
        let new = match produced.get(&i) {
            Some(step_result) => step_result.clone(),
            None => Some(Arc::clone(res)),
        };

        let Some(new) = new else {
            if refresh && !(res.custom && !res.is_provider()) {
                return Err(EngineError::Snapshot(SnapshotError::IllegalRefreshDelete(
                    res.urn.clone(),
                )));
            }
            // Children of the deleted resource re-parent through it.
            let repaired = repair_parent(res.parent.as_ref(), &olds, &available_parents);
            available_parents.insert(res.urn.clone(), repaired);
            continue;
        };

        let mut repaired = (*new).clone();
        repaired.dependencies.retain(|d| referenceable.contains(d));
        for deps in repaired.property_dependencies.values_mut() {
            deps.retain(|d| referenceable.contains(d));
        }
        if let Some(holder) = &repaired.deleted_with {
            if !referenceable.contains(holder) {
                repaired.deleted_with = None;
            }
        }
        if let Some(parent) = repaired.parent.clone() {
            if !olds.contains_key(&parent) {
                repaired.parent =
                    repair_parent(Some(&parent), &olds, &available_parents);
            }
        }

        let repaired = Arc::new(repaired);
        referenceable.insert(repaired.urn.clone());
        if !repaired.delete {
            olds.insert(repaired.urn.clone(), Arc::clone(&repaired));
        }
        available_parents.insert(repaired.urn.clone(), repaired.parent.clone());
        resources.push(repaired);
    }

    let mut positions = HashMap::new();
    for (i, res) in resources.iter().enumerate() {
        if !res.delete {
            positions.insert(res.urn.clone(), i);
        }
    }

    *state.graph.write() = DependencyGraph::new(resources.clone());
    *state.olds.write() = olds;
    *state.prior_positions.write() = positions;
    *state.prior.write() = resources;
    Ok(())
}

/// The nearest surviving ancestor for `parent`, given everything processed
/// so far: a live parent keeps itself, a removed parent forwards to the
/// ancestor recorded when it was processed.
fn repair_parent(
    parent: Option<&Urn>,
    olds: &HashMap<Urn, Arc<ResourceState>>,
    available: &HashMap<Urn, Option<Urn>>,
) -> Option<Urn> {
    let parent = parent?;
    if olds.contains_key(parent) {
        Some(parent.clone())
    } else {
        available.get(parent).cloned().flatten()
    }
}

#[cfg(test)]
#[path = "rebuild_tests.rs"]
mod tests;
