// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider plugin interface.

use async_trait::async_trait;
use gw_core::{PropertyMap, ResourceId, Urn};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by provider operations.
///
/// The classification matters to callers: transient errors may be retried
/// by the embedding tool, structural errors are fatal, and initialization
/// errors mean the resource was partially created and its state must
/// still be recorded.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transient provider failure: {0}")]
    Transient(String),
    #[error("{0}")]
    Structural(String),
    #[error("resource initialization failed: {}", reasons.join("; "))]
    Init {
        /// Physical id, when the provider got far enough to assign one.
        id: Option<ResourceId>,
        /// Whatever outputs the partial creation produced.
        outputs: PropertyMap,
        reasons: Vec<String>,
    },
    #[error("operation canceled")]
    Cancelled,
}

/// Whether a diff found changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffChanges {
    #[default]
    None,
    Some,
}

/// Result of asking a provider to diff old inputs against new inputs.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    pub changes: DiffChanges,
    /// Property keys whose change forces a replacement.
    pub replace_keys: Vec<String>,
    /// All changed property keys.
    pub changed_keys: Vec<String>,
    /// Provider's preference for delete-before-replace ordering.
    pub delete_before_replace: bool,
}

impl DiffResult {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn changed(changed_keys: Vec<String>) -> Self {
        Self { changes: DiffChanges::Some, changed_keys, ..Self::default() }
    }

    pub fn replace(changed_keys: Vec<String>, replace_keys: Vec<String>) -> Self {
        Self {
            changes: DiffChanges::Some,
            changed_keys,
            replace_keys,
            delete_before_replace: false,
        }
    }

    pub fn has_changes(&self) -> bool {
        self.changes == DiffChanges::Some
    }

    pub fn requires_replace(&self) -> bool {
        self.has_changes() && !self.replace_keys.is_empty()
    }
}

/// Validated inputs plus any per-property check failures.
#[derive(Debug, Clone, Default)]
pub struct CheckResult {
    pub inputs: PropertyMap,
    pub failures: Vec<CheckFailure>,
}

#[derive(Debug, Clone)]
pub struct CheckFailure {
    pub property: String,
    pub reason: String,
}

/// Outcome of a successful create.
#[derive(Debug, Clone)]
pub struct CreateResult {
    pub id: ResourceId,
    pub outputs: PropertyMap,
}

/// Provider-reported live state of an existing resource.
#[derive(Debug, Clone)]
pub struct ReadResult {
    pub id: ResourceId,
    pub inputs: PropertyMap,
    pub outputs: PropertyMap,
}

/// Outcome of constructing a component aggregate.
#[derive(Debug, Clone)]
pub struct ConstructResult {
    pub urn: Urn,
    pub outputs: PropertyMap,
}

/// A resource provider plugin.
///
/// Custom resources go through `check`/`diff`/`create`/`read`/`update`/
/// `delete`; component aggregates go through `construct`. Create, update,
/// and delete accept the per-resource timeout from the goal's custom
/// timeouts; `preview` asks for computed outputs without mutation.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn check(
        &self,
        urn: &Urn,
        olds: &PropertyMap,
        news: &PropertyMap,
    ) -> Result<CheckResult, ProviderError>;

    async fn diff(
        &self,
        urn: &Urn,
        id: &ResourceId,
        olds: &PropertyMap,
        news: &PropertyMap,
        ignore_changes: &[String],
    ) -> Result<DiffResult, ProviderError>;

    async fn create(
        &self,
        urn: &Urn,
        inputs: &PropertyMap,
        timeout: Option<Duration>,
        preview: bool,
    ) -> Result<CreateResult, ProviderError>;

    /// Read the live state of `id`. `Ok(None)` means the resource no
    /// longer exists.
    async fn read(
        &self,
        urn: &Urn,
        id: &ResourceId,
        inputs: &PropertyMap,
        state: &PropertyMap,
    ) -> Result<Option<ReadResult>, ProviderError>;

    async fn update(
        &self,
        urn: &Urn,
        id: &ResourceId,
        olds: &PropertyMap,
        news: &PropertyMap,
        timeout: Option<Duration>,
        preview: bool,
    ) -> Result<PropertyMap, ProviderError>;

    async fn delete(
        &self,
        urn: &Urn,
        id: &ResourceId,
        outputs: &PropertyMap,
        timeout: Option<Duration>,
    ) -> Result<(), ProviderError>;

    async fn construct(
        &self,
        urn: &Urn,
        inputs: &PropertyMap,
    ) -> Result<ConstructResult, ProviderError>;

    /// Best-effort request to abort in-flight operations. Must not block.
    async fn signal_cancellation(&self) -> Result<(), ProviderError>;
}
