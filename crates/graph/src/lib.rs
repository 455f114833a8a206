// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gw-graph: dependency graph over a snapshot's resource list.
//!
//! The graph is always derived from a topologically ordered resource list
//! and rebuilt whenever that list changes; it never becomes a second
//! source of truth.

use gw_core::{ResourceState, Urn};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Dependency graph over one snapshot.
///
/// Vertices are positions in the resource list (several entries may share
/// a URN when pending replacements or deletes are present). Edges point
/// from a resource to the resources it depends on; the reverse adjacency
/// is precomputed so dependent walks are O(edges).
#[derive(Debug, Default)]
pub struct DependencyGraph {
    resources: Vec<Arc<ResourceState>>,
    /// All positions registered for a URN, in list order.
    by_urn: HashMap<Urn, Vec<usize>>,
    /// dependents[i] lists positions that depend on position i.
    dependents: Vec<Vec<usize>>,
    /// dependencies[i] lists positions that position i depends on.
    dependencies: Vec<Vec<usize>>,
    /// child_edges[i] is true for entries of dependents[i] that exist only
    /// because of a parent edge, keyed by (i, dependent).
    child_edges: HashSet<(usize, usize)>,
}

impl DependencyGraph {
    /// Build the graph from a topologically ordered resource list.
    pub fn new(resources: Vec<Arc<ResourceState>>) -> Self {
        let mut by_urn: HashMap<Urn, Vec<usize>> = HashMap::new();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); resources.len()];
        let mut dependencies: Vec<Vec<usize>> = vec![Vec::new(); resources.len()];
        let mut child_edges = HashSet::new();

        for (i, res) in resources.iter().enumerate() {
            let mut add_edge = |targets: &HashMap<Urn, Vec<usize>>, dep: &Urn, child: bool| {
                let Some(positions) = targets.get(dep) else { return };
                for &j in positions {
                    if !dependencies[i].contains(&j) {
                        dependencies[i].push(j);
                        dependents[j].push(i);
                        if child {
                            child_edges.insert((j, i));
                        }
                    } else if !child {
                        // A non-parent edge upgrades a parent-only edge.
                        child_edges.remove(&(j, i));
                    }
                }
            };

            for dep in res
                .dependencies
                .iter()
                .chain(res.property_dependencies.values().flatten())
                .chain(res.provider.iter().map(|p| &p.urn))
                .chain(res.deleted_with.iter())
            {
                add_edge(&by_urn, dep, false);
            }
            if let Some(parent) = &res.parent {
                add_edge(&by_urn, parent, true);
            }

            by_urn.entry(res.urn.clone()).or_default().push(i);
        }

        Self { resources, by_urn, dependents, dependencies, child_edges }
    }

    pub fn resources(&self) -> &[Arc<ResourceState>] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Transitive dependents of `urn`, in topological order.
    ///
    /// When `include_children` is false, edges that exist only because of
    /// component parenthood are ignored.
    pub fn depending_on(&self, urn: &Urn, include_children: bool) -> Vec<Arc<ResourceState>> {
        let mut reached = vec![false; self.resources.len()];
        let mut queue: VecDeque<usize> = VecDeque::new();
        for &i in self.by_urn.get(urn).into_iter().flatten() {
            queue.push_back(i);
        }
        while let Some(i) = queue.pop_front() {
            for &dep in &self.dependents[i] {
                if !include_children && self.child_edges.contains(&(i, dep)) {
                    continue;
                }
                if !reached[dep] {
                    reached[dep] = true;
                    queue.push_back(dep);
                }
            }
        }
        reached
            .iter()
            .enumerate()
            .filter(|(_, r)| **r)
            .map(|(i, _)| Arc::clone(&self.resources[i]))
            .collect()
    }

    /// The URNs `urn` directly depends on.
    pub fn dependencies_of(&self, urn: &Urn) -> HashSet<Urn> {
        let mut out = HashSet::new();
        for &i in self.by_urn.get(urn).into_iter().flatten() {
            for &dep in &self.dependencies[i] {
                out.insert(self.resources[dep].urn.clone());
            }
        }
        out.remove(urn);
        out
    }

    /// The URNs in `urn`'s transitive dependency closure (not including itself).
    pub fn transitive_dependencies_of(&self, urn: &Urn) -> HashSet<Urn> {
        let mut reached = vec![false; self.resources.len()];
        let mut queue: VecDeque<usize> = VecDeque::new();
        for &i in self.by_urn.get(urn).into_iter().flatten() {
            queue.push_back(i);
        }
        let mut out = HashSet::new();
        while let Some(i) = queue.pop_front() {
            for &dep in &self.dependencies[i] {
                if !reached[dep] {
                    reached[dep] = true;
                    out.insert(self.resources[dep].urn.clone());
                    queue.push_back(dep);
                }
            }
        }
        out.remove(urn);
        out
    }

    /// Whether `a` transitively depends on `b`.
    pub fn depends_on(&self, a: &Urn, b: &Urn) -> bool {
        a != b && self.transitive_dependencies_of(a).contains(b)
    }

    /// Whether the graph knows `urn` at all.
    pub fn contains(&self, urn: &Urn) -> bool {
        self.by_urn.contains_key(urn)
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
