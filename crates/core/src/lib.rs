// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gw-core: domain types for the Groundwork deployment engine

pub mod diag;
pub mod event;
pub mod goal;
pub mod plan;
pub mod property;
pub mod state;
pub mod targets;
pub mod urn;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use diag::{DiagSink, Severity, TracingSink};
#[cfg(any(test, feature = "test-support"))]
pub use diag::MemorySink;
pub use event::{ReadRequest, SourceEvent};
pub use goal::{Alias, CustomTimeouts, Goal};
pub use plan::{OpKind, Plan, PlanError, ResourcePlan};
pub use property::{changed_keys, PropertyMap, PropertyValue};
pub use state::{
    PendingOperation, PendingOperationKind, ProviderRef, ResourceState, Snapshot, SnapshotError,
};
pub use targets::{ResolvedTargets, TargetPolicy, TargetSpec};
#[cfg(any(test, feature = "test-support"))]
pub use test_support::{GoalBuilder, StateBuilder};
pub use urn::{ResourceId, Urn, PROVIDER_TYPE_PREFIX};
