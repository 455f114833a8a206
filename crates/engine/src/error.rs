// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.
//!
//! The bail/report distinction is load-bearing: a `Bail` has already been
//! surfaced to the user as a diagnostic, so callers propagate it without
//! reporting again. Every site that emits a diagnostic converts to `Bail`
//! immediately afterward.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Already reported to the user; propagate silently.
    #[error("error already reported")]
    Bail,

    /// The run was canceled, internally or by the caller.
    #[error("deployment canceled")]
    Canceled,

    /// The user program failed.
    #[error("source error: {0}")]
    Source(String),

    /// One or more step operations failed.
    #[error("step execution failed")]
    StepFailed,

    /// Step generation hit a fatal condition (duplicate URN, protection
    /// violation, bad target).
    #[error("step generation failed: {0}")]
    Generation(String),

    /// The run diverged from its constraint plan.
    #[error("plan verification failed: {0}")]
    Plan(String),

    #[error(transparent)]
    Snapshot(#[from] gw_core::SnapshotError),

    #[error(transparent)]
    Registry(#[from] gw_providers::RegistryError),
}

impl EngineError {
    /// Whether this error was already surfaced as a diagnostic.
    pub fn is_bail(&self) -> bool {
        matches!(self, EngineError::Bail | EngineError::StepFailed)
    }

    /// Whether the run ended due to cancellation rather than failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, EngineError::Canceled)
    }
}
