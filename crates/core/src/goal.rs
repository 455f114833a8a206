// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource intent as submitted by the user program.

use crate::property::PropertyMap;
use crate::state::ProviderRef;
use crate::urn::{ResourceId, Urn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Desired state for one resource, carried by a register event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    /// Package-qualified type token.
    pub ty: String,
    pub name: String,
    /// Plugin-managed resource, as opposed to a component aggregate.
    pub custom: bool,
    #[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
    pub inputs: PropertyMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Urn>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Urn>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub property_dependencies: BTreeMap<String, Vec<Urn>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderRef>,
    /// Physical id for reads and imports of resources that already exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<Alias>,
    /// Tri-state options: `None` inherits from the parent where the
    /// engine defines inheritance, otherwise defaults to false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protect: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retain_on_delete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_with: Option<Urn>,
    #[serde(default, skip_serializing_if = "CustomTimeouts::is_empty")]
    pub custom_timeouts: CustomTimeouts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_before_replace: Option<bool>,
    /// Input property paths whose changes the engine must not act on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_changes: Vec<String>,
    /// Input property paths whose changes force a replacement.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replace_on_changes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_secret_outputs: Vec<String>,
}

impl Goal {
    pub fn new(ty: impl Into<String>, name: impl Into<String>, custom: bool) -> Self {
        Self {
            ty: ty.into(),
            name: name.into(),
            custom,
            inputs: PropertyMap::new(),
            parent: None,
            dependencies: Vec::new(),
            property_dependencies: BTreeMap::new(),
            provider: None,
            id: None,
            aliases: Vec::new(),
            protect: None,
            retain_on_delete: None,
            deleted_with: None,
            custom_timeouts: CustomTimeouts::default(),
            delete_before_replace: None,
            ignore_changes: Vec::new(),
            replace_on_changes: Vec::new(),
            additional_secret_outputs: Vec::new(),
        }
    }
}

/// A prior identity this resource may have been registered under.
///
/// Serializes as either a bare URN string or a spec object with any of
/// `name`/`type`/`parent` overriding the goal's own coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Alias {
    Urn(Urn),
    Spec {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
        ty: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<Urn>,
    },
}

impl Alias {
    /// Resolve this alias to a concrete URN given the goal's coordinates.
    pub fn resolve(&self, stack: &str, project: &str, goal: &Goal) -> Urn {
        match self {
            Alias::Urn(urn) => urn.clone(),
            Alias::Spec { name, ty, .. } => Urn::from_parts(
                stack,
                project,
                ty.as_deref().unwrap_or(&goal.ty),
                name.as_deref().unwrap_or(&goal.name),
            ),
        }
    }
}

/// Per-resource operation timeouts, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomTimeouts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<f64>,
}

impl CustomTimeouts {
    pub fn is_empty(&self) -> bool {
        self.create.is_none() && self.update.is_none() && self.delete.is_none()
    }

    pub fn create_duration(&self) -> Option<Duration> {
        self.create.map(Duration::from_secs_f64)
    }

    pub fn update_duration(&self) -> Option<Duration> {
        self.update.map(Duration::from_secs_f64)
    }

    pub fn delete_duration(&self) -> Option<Duration> {
        self.delete.map(Duration::from_secs_f64)
    }
}

#[cfg(test)]
#[path = "goal_tests.rs"]
mod tests;
