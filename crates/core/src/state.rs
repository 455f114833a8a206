// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recorded state of managed resources.

use crate::property::PropertyMap;
use crate::urn::{ResourceId, Urn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Reference to the provider plugin that manages a resource.
///
/// Serializes to/from `"<urn>::<id>"`. An absent reference means the
/// resource uses the default provider for its package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderRef {
    pub urn: Urn,
    pub id: ResourceId,
}

impl ProviderRef {
    pub fn new(urn: Urn, id: ResourceId) -> Self {
        Self { urn, id }
    }
}

impl fmt::Display for ProviderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.urn, self.id)
    }
}

#[derive(Debug, Error)]
#[error("malformed provider reference: {0:?}")]
pub struct ProviderRefParseError(String);

impl FromStr for ProviderRef {
    type Err = ProviderRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The URN itself contains "::" separators; the id is the final segment.
        let (urn, id) = s.rsplit_once("::").ok_or_else(|| ProviderRefParseError(s.to_string()))?;
        if urn.is_empty() {
            return Err(ProviderRefParseError(s.to_string()));
        }
        Ok(Self { urn: Urn::new(urn), id: ResourceId::new(id) })
    }
}

impl TryFrom<String> for ProviderRef {
    type Error = ProviderRefParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ProviderRef> for String {
    fn from(r: ProviderRef) -> String {
        r.to_string()
    }
}

/// One managed resource as recorded in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub urn: Urn,
    /// Package-qualified type token.
    pub ty: String,
    /// Provider-assigned physical identifier; empty until created.
    #[serde(default, skip_serializing_if = "ResourceId::is_empty")]
    pub id: ResourceId,
    /// Plugin-managed resource, as opposed to a logical component aggregate.
    pub custom: bool,
    #[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
    pub inputs: PropertyMap,
    #[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
    pub outputs: PropertyMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Urn>,
    /// URNs whose outputs this resource's inputs transitively reference,
    /// in registration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Urn>,
    /// Per-property dependency lists, keyed by input property.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub property_dependencies: BTreeMap<String, Vec<Urn>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderRef>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub protect: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retain_on_delete: bool,
    /// Read from the provider rather than created by this program.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
    /// Awaiting replacement; a successor create has been planned or applied.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending_replacement: bool,
    /// Marked for deletion by an interrupted or in-progress replacement.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub delete: bool,
    /// Deleting this URN implicitly deletes the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_with: Option<Urn>,
    /// Non-fatal provider errors carried across runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_errors: Vec<String>,
}

impl ResourceState {
    /// Minimal state record for a resource of the given coordinates.
    pub fn new(urn: Urn, ty: impl Into<String>, custom: bool) -> Self {
        Self {
            urn,
            ty: ty.into(),
            id: ResourceId::empty(),
            custom,
            inputs: PropertyMap::new(),
            outputs: PropertyMap::new(),
            parent: None,
            dependencies: Vec::new(),
            property_dependencies: BTreeMap::new(),
            provider: None,
            protect: false,
            retain_on_delete: false,
            external: false,
            pending_replacement: false,
            delete: false,
            deleted_with: None,
            init_errors: Vec::new(),
        }
    }

    /// Whether this record is a provider resource.
    pub fn is_provider(&self) -> bool {
        self.ty.starts_with(crate::urn::PROVIDER_TYPE_PREFIX)
    }

    /// Every URN this resource references: dependencies, per-property
    /// dependencies, parent, provider, and deleted-with.
    pub fn all_dependencies(&self) -> impl Iterator<Item = &Urn> {
        self.dependencies
            .iter()
            .chain(self.property_dependencies.values().flatten())
            .chain(self.parent.iter())
            .chain(self.provider.iter().map(|p| &p.urn))
            .chain(self.deleted_with.iter())
    }
}

/// A pending operation recorded by an interrupted run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub resource: Urn,
    pub kind: PendingOperationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingOperationKind {
    Creating,
    Updating,
    Deleting,
    Reading,
    Importing,
    Refreshing,
}

impl fmt::Display for PendingOperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PendingOperationKind::Creating => "creating",
            PendingOperationKind::Updating => "updating",
            PendingOperationKind::Deleting => "deleting",
            PendingOperationKind::Reading => "reading",
            PendingOperationKind::Importing => "importing",
            PendingOperationKind::Refreshing => "refreshing",
        };
        write!(f, "{s}")
    }
}

/// Integrity violations detected in a prior snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("resource {urn} appears before its dependency {dependency}")]
    OutOfOrder { urn: Urn, dependency: Urn },
    #[error("duplicate live resource for {0}")]
    DuplicateUrn(Urn),
    #[error("resource {urn} has parent {parent} that is not materialized earlier in the snapshot")]
    MissingParent { urn: Urn, parent: Urn },
    #[error("snapshot contains a resource with an empty URN")]
    EmptyUrn,
    #[error("refresh deleted {0}, which is not a custom non-provider resource")]
    IllegalRefreshDelete(Urn),
}

/// A prior deployment's recorded resources, in topological order, plus any
/// operations that were in flight when the recording run was interrupted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub resources: Vec<Arc<ResourceState>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_operations: Vec<PendingOperation>,
}

impl Snapshot {
    pub fn new(resources: Vec<Arc<ResourceState>>) -> Self {
        Self { resources, pending_operations: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Verify the snapshot invariants: topological order, at most one live
    /// state per URN, parents materialized before children, no empty URNs.
    pub fn verify_integrity(&self) -> Result<(), SnapshotError> {
        let mut seen: HashSet<&Urn> = HashSet::new();
        let mut live: HashSet<&Urn> = HashSet::new();
        for res in &self.resources {
            if res.urn.is_empty() {
                return Err(SnapshotError::EmptyUrn);
            }
            for dep in &res.dependencies {
                if !seen.contains(dep) {
                    return Err(SnapshotError::OutOfOrder {
                        urn: res.urn.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
            if let Some(parent) = &res.parent {
                if !seen.contains(parent) {
                    return Err(SnapshotError::MissingParent {
                        urn: res.urn.clone(),
                        parent: parent.clone(),
                    });
                }
            }
            if !res.delete && !res.pending_replacement && !live.insert(&res.urn) {
                return Err(SnapshotError::DuplicateUrn(res.urn.clone()));
            }
            seen.insert(&res.urn);
        }
        Ok(())
    }

    /// Lookup map over the live (non-pending) states, keyed by URN.
    ///
    /// When a URN has both a pending-replacement entry and a live entry,
    /// the live one wins.
    pub fn olds(&self) -> HashMap<Urn, Arc<ResourceState>> {
        let mut map: HashMap<Urn, Arc<ResourceState>> = HashMap::with_capacity(self.resources.len());
        for res in &self.resources {
            if res.delete {
                continue;
            }
            match map.entry(res.urn.clone()) {
                std::collections::hash_map::Entry::Occupied(mut slot) => {
                    if slot.get().pending_replacement && !res.pending_replacement {
                        slot.insert(Arc::clone(res));
                    }
                }
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(res));
                }
            }
        }
        map
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
