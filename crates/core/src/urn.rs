// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource naming.
//!
//! A URN is the stable logical identifier of a resource across runs.
//! Its canonical text form is `urn:gw:<stack>::<project>::<type>::<name>`.
//! The physical identifier a provider assigns at create time is a
//! [`ResourceId`] and carries no structure at all.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Scheme prefix every well-formed URN starts with.
pub const URN_PREFIX: &str = "urn:gw:";

/// Separator between URN components.
pub const URN_SEPARATOR: &str = "::";

/// Type-token prefix reserved for provider resources themselves.
pub const PROVIDER_TYPE_PREFIX: &str = "gw:providers:";

/// Stable logical name of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Urn(pub String);

impl Urn {
    /// Create a new Urn from any string-like value.
    pub fn new(urn: impl Into<String>) -> Self {
        Self(urn.into())
    }

    /// Build the canonical URN for a resource from its coordinates.
    pub fn from_parts(stack: &str, project: &str, ty: &str, name: &str) -> Self {
        Self(format!(
            "{URN_PREFIX}{stack}{URN_SEPARATOR}{project}{URN_SEPARATOR}{ty}{URN_SEPARATOR}{name}"
        ))
    }

    /// Get the string value of this Urn.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The package-qualified type token, when the URN is well formed.
    pub fn type_token(&self) -> Option<&str> {
        self.component(2)
    }

    /// The resource name, when the URN is well formed.
    pub fn name(&self) -> Option<&str> {
        self.component(3)
    }

    /// Whether this URN carries the canonical scheme and all four components.
    pub fn quasi_valid(&self) -> bool {
        self.0.strip_prefix(URN_PREFIX)
            .map(|rest| rest.split(URN_SEPARATOR).count() == 4)
            .unwrap_or(false)
    }

    /// Whether this URN names a provider resource.
    pub fn is_provider(&self) -> bool {
        self.type_token()
            .map(|t| t.starts_with(PROVIDER_TYPE_PREFIX))
            .unwrap_or(false)
    }

    fn component(&self, index: usize) -> Option<&str> {
        let rest = self.0.strip_prefix(URN_PREFIX)?;
        rest.split(URN_SEPARATOR).nth(index)
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Urn {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Urn {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for Urn {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Urn {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for Urn {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Urn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Provider-assigned physical identifier. Empty until the resource is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for ResourceId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ResourceId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
#[path = "urn_tests.rs"]
mod tests;
