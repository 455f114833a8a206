// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property values carried in resource inputs and outputs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key for the tagged secret wrapper in the serialized form.
const SECRET_SIGIL: &str = "gw:secret";

/// An ordered property bag. Ordering keeps diffs and serialized
/// snapshots deterministic.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// A single property value.
///
/// Secrets wrap another value and serialize as `{"gw:secret": <inner>}`
/// so they survive round trips without leaking into plain fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<PropertyValue>),
    Secret(SecretValue),
    Object(PropertyMap),
}

/// Tagged wrapper distinguishing secret values from plain objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretValue {
    #[serde(rename = "gw:secret")]
    pub element: Box<PropertyValue>,
}

impl PropertyValue {
    pub fn string(s: impl Into<String>) -> Self {
        PropertyValue::String(s.into())
    }

    pub fn number(n: impl Into<f64>) -> Self {
        PropertyValue::Number(n.into())
    }

    pub fn secret(inner: PropertyValue) -> Self {
        PropertyValue::Secret(SecretValue { element: Box::new(inner) })
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, PropertyValue::Secret(_))
    }

    /// The value with any secret wrapping removed, recursively at the top level.
    pub fn unwrap_secrets(&self) -> &PropertyValue {
        match self {
            PropertyValue::Secret(s) => s.element.unwrap_secrets(),
            other => other,
        }
    }

    /// Equality that ignores secret wrapping, used for no-diff detection.
    pub fn same_value(&self, other: &PropertyValue) -> bool {
        match (self.unwrap_secrets(), other.unwrap_secrets()) {
            (PropertyValue::Array(a), PropertyValue::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_value(y))
            }
            (PropertyValue::Object(a), PropertyValue::Object(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|((ka, va), (kb, vb))| ka == kb && va.same_value(vb))
            }
            (a, b) => a == b,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Number(n)
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        PropertyValue::Number(n as f64)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

/// The property keys whose values differ between two maps, including
/// keys present on only one side. Secret wrapping is ignored.
pub fn changed_keys(olds: &PropertyMap, news: &PropertyMap) -> Vec<String> {
    let mut keys = Vec::new();
    for (k, old) in olds {
        match news.get(k) {
            Some(new) if old.same_value(new) => {}
            _ => keys.push(k.clone()),
        }
    }
    for k in news.keys() {
        if !olds.contains_key(k) {
            keys.push(k.clone());
        }
    }
    keys.sort();
    keys.dedup();
    keys
}

/// Wire sigil accessor for codecs that need to recognize secrets
/// without deserializing the full value.
pub fn secret_sigil() -> &'static str {
    SECRET_SIGIL
}

#[cfg(test)]
#[path = "property_tests.rs"]
mod tests;
