// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events emitted by a running user program.

use crate::goal::Goal;
use crate::property::PropertyMap;
use crate::state::ProviderRef;
use crate::urn::{ResourceId, Urn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One intent event from the program source.
///
/// Serializes with `{"type": "resource:verb", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceEvent {
    /// The program declared desired state for a resource.
    #[serde(rename = "resource:register")]
    RegisterResource { goal: Goal },

    /// The program asked to read an existing resource without managing it.
    #[serde(rename = "resource:read")]
    ReadResource { read: ReadRequest },

    /// The program finished computing a registered resource's outputs.
    #[serde(rename = "resource:outputs")]
    RegisterResourceOutputs { urn: Urn, outputs: PropertyMap },
}

impl SourceEvent {
    /// Event name for log spans.
    pub fn name(&self) -> &'static str {
        match self {
            SourceEvent::RegisterResource { .. } => "register",
            SourceEvent::ReadResource { .. } => "read",
            SourceEvent::RegisterResourceOutputs { .. } => "outputs",
        }
    }

    /// Key-value pairs for structured logging.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            SourceEvent::RegisterResource { goal } => {
                vec![("type", goal.ty.clone()), ("name", goal.name.clone())]
            }
            SourceEvent::ReadResource { read } => {
                vec![
                    ("type", read.ty.clone()),
                    ("name", read.name.clone()),
                    ("id", read.id.to_string()),
                ]
            }
            SourceEvent::RegisterResourceOutputs { urn, outputs } => {
                vec![("urn", urn.to_string()), ("outputs", outputs.len().to_string())]
            }
        }
    }
}

/// A request to read an existing resource's state from its provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {
    /// Package-qualified type token.
    pub ty: String,
    pub name: String,
    /// The physical identifier to read.
    pub id: ResourceId,
    #[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
    pub properties: PropertyMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Urn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Urn>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub property_dependencies: BTreeMap<String, Vec<Urn>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_secret_outputs: Vec<String>,
}

impl ReadRequest {
    pub fn new(ty: impl Into<String>, name: impl Into<String>, id: ResourceId) -> Self {
        Self {
            ty: ty.into(),
            name: name.into(),
            id,
            properties: PropertyMap::new(),
            parent: None,
            provider: None,
            dependencies: Vec::new(),
            property_dependencies: BTreeMap::new(),
            additional_secret_outputs: Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
