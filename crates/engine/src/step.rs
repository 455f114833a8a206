// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Steps: pending operations against one resource.
//!
//! A step is a tagged variant with shared accessors; `apply` dispatches on
//! the kind. Chains of steps are ordered; independent chains run in
//! parallel on the step executor.

use gw_core::{OpKind, ProviderRef, ResourceState, Urn};
use gw_providers::{Provider, ProviderError, RegistryError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// An ordered list of steps that must execute strictly in sequence.
pub type Chain = Vec<Step>;

/// A pending operation against one resource.
#[derive(Debug, Clone)]
pub enum Step {
    /// No change. `skipped_create` marks a create suppressed by targeting;
    /// it records the intent without performing or persisting anything.
    Same {
        old: Option<Arc<ResourceState>>,
        new: Arc<ResourceState>,
        skipped_create: bool,
    },
    Create {
        old: Option<Arc<ResourceState>>,
        new: Arc<ResourceState>,
        replacing: bool,
        /// The old state stays behind marked for deletion until the
        /// paired delete runs.
        pending_delete: bool,
        timeout: Option<Duration>,
    },
    Update {
        old: Arc<ResourceState>,
        new: Arc<ResourceState>,
        diffs: Vec<String>,
        timeout: Option<Duration>,
    },
    /// Logical marker joining a replacement's create/delete pair.
    Replace {
        old: Arc<ResourceState>,
        new: Arc<ResourceState>,
        pending_delete: bool,
    },
    Delete {
        old: Arc<ResourceState>,
        replacing: bool,
        /// Leave the old state marked pending-replacement instead of
        /// removing it outright.
        pending_replace: bool,
        /// Position in the prior snapshot, when the step deletes a prior
        /// resource (used by base-state rebuild).
        prior_index: Option<usize>,
        timeout: Option<Duration>,
    },
    /// Drop a leftover pending-replacement entry that is no longer needed.
    RemovePendingReplace {
        old: Arc<ResourceState>,
        prior_index: usize,
    },
    Read {
        old: Option<Arc<ResourceState>>,
        new: Arc<ResourceState>,
    },
    Refresh {
        old: Arc<ResourceState>,
        prior_index: usize,
    },
    Import { new: Arc<ResourceState> },
}

/// What applying a step produced.
#[derive(Debug)]
pub enum StepOutcome {
    /// A live state to record under the step's URN.
    Recorded(Arc<ResourceState>),
    /// The resource is gone.
    Deleted { prior_index: Option<usize> },
    /// Refresh observed this state (`None` means the resource vanished).
    Refreshed {
        prior_index: usize,
        state: Option<Arc<ResourceState>>,
    },
    /// Nothing to record.
    Skipped,
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error("{op} failed for {urn}: {source}")]
    Provider {
        urn: Urn,
        op: OpKind,
        source: ProviderError,
        /// Partially created state that must still be recorded.
        partial: Option<Arc<ResourceState>>,
    },
    #[error("provider for {urn} unavailable: {source}")]
    Registry { urn: Urn, source: RegistryError },
    #[error("resource {urn} with id {id} does not exist")]
    ReadMissing { urn: Urn, id: String },
}

impl StepError {
    pub fn urn(&self) -> &Urn {
        match self {
            StepError::Provider { urn, .. }
            | StepError::Registry { urn, .. }
            | StepError::ReadMissing { urn, .. } => urn,
        }
    }
}

impl Step {
    pub fn urn(&self) -> &Urn {
        match self {
            Step::Same { new, .. }
            | Step::Create { new, .. }
            | Step::Update { new, .. }
            | Step::Replace { new, .. }
            | Step::Read { new, .. }
            | Step::Import { new } => &new.urn,
            Step::Delete { old, .. }
            | Step::RemovePendingReplace { old, .. }
            | Step::Refresh { old, .. } => &old.urn,
        }
    }

    pub fn op(&self) -> OpKind {
        match self {
            Step::Same { .. } => OpKind::Same,
            Step::Create { replacing: false, .. } => OpKind::Create,
            Step::Create { replacing: true, .. } => OpKind::CreateReplacement,
            Step::Update { .. } => OpKind::Update,
            Step::Replace { .. } => OpKind::Replace,
            Step::Delete { replacing: false, .. } => OpKind::Delete,
            Step::Delete { replacing: true, .. } => OpKind::DeleteReplaced,
            Step::RemovePendingReplace { .. } => OpKind::RemovePendingReplace,
            Step::Read { .. } => OpKind::Read,
            Step::Refresh { .. } => OpKind::Refresh,
            Step::Import { .. } => OpKind::Import,
        }
    }

    pub fn old(&self) -> Option<&Arc<ResourceState>> {
        match self {
            Step::Same { old, .. } | Step::Create { old, .. } | Step::Read { old, .. } => {
                old.as_ref()
            }
            Step::Update { old, .. } | Step::Replace { old, .. } => Some(old),
            Step::Delete { old, .. }
            | Step::RemovePendingReplace { old, .. }
            | Step::Refresh { old, .. } => Some(old),
            Step::Import { .. } => None,
        }
    }

    pub fn new(&self) -> Option<&Arc<ResourceState>> {
        match self {
            Step::Same { new, .. }
            | Step::Create { new, .. }
            | Step::Update { new, .. }
            | Step::Replace { new, .. }
            | Step::Read { new, .. }
            | Step::Import { new } => Some(new),
            Step::Delete { .. } | Step::RemovePendingReplace { .. } | Step::Refresh { .. } => None,
        }
    }

    /// The provider reference the step operates through.
    pub fn provider_ref(&self) -> Option<&ProviderRef> {
        self.new()
            .or_else(|| self.old())
            .and_then(|state| state.provider.as_ref())
    }

    /// Whether applying this step requires a provider at all.
    pub fn needs_provider(&self) -> bool {
        let custom = self
            .new()
            .or_else(|| self.old())
            .map(|s| s.custom)
            .unwrap_or(false);
        if !custom {
            return false;
        }
        match self {
            Step::Same { .. } | Step::Replace { .. } | Step::RemovePendingReplace { .. } => false,
            Step::Delete { old, .. } => {
                !old.retain_on_delete && !old.external && !old.id.is_empty()
            }
            _ => true,
        }
    }

    /// Key-value pairs for structured logging.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("urn", self.urn().to_string()), ("op", self.op().to_string())];
        if let Some(old) = self.old() {
            if !old.id.is_empty() {
                fields.push(("id", old.id.to_string()));
            }
        }
        fields
    }

    /// Whether to log start and completion separately. Frequent no-ops
    /// only log once.
    pub fn verbose(&self) -> bool {
        !matches!(self, Step::Same { .. } | Step::Replace { .. } | Step::RemovePendingReplace { .. })
    }

    /// Apply this step against its provider and return the post-step state.
    pub async fn apply(
        &self,
        provider: Option<&Arc<dyn Provider>>,
        preview: bool,
    ) -> Result<StepOutcome, StepError> {
        match self {
            Step::Same { new, skipped_create, .. } => {
                if *skipped_create {
                    Ok(StepOutcome::Skipped)
                } else {
                    Ok(StepOutcome::Recorded(Arc::clone(new)))
                }
            }

            Step::Create { new, timeout, .. } => {
                if !new.custom {
                    return Ok(StepOutcome::Recorded(Arc::clone(new)));
                }
                let provider = self.require_provider(provider)?;
                match provider.create(&new.urn, &new.inputs, *timeout, preview).await {
                    Ok(created) => {
                        let mut state = (**new).clone();
                        state.id = created.id;
                        state.outputs = created.outputs;
                        Ok(StepOutcome::Recorded(Arc::new(state)))
                    }
                    Err(ProviderError::Init { id, outputs, reasons }) => {
                        // Partially created: the state must still be recorded.
                        let mut state = (**new).clone();
                        if let Some(id) = id {
                            state.id = id;
                        }
                        state.outputs = outputs.clone();
                        state.init_errors = reasons.clone();
                        let partial = Arc::new(state);
                        Err(StepError::Provider {
                            urn: new.urn.clone(),
                            op: self.op(),
                            source: ProviderError::Init { id: None, outputs, reasons },
                            partial: Some(partial),
                        })
                    }
                    Err(source) => Err(StepError::Provider {
                        urn: new.urn.clone(),
                        op: self.op(),
                        source,
                        partial: None,
                    }),
                }
            }

            Step::Update { old, new, timeout, .. } => {
                if !new.custom {
                    return Ok(StepOutcome::Recorded(Arc::clone(new)));
                }
                let provider = self.require_provider(provider)?;
                let outputs = provider
                    .update(&new.urn, &old.id, &old.inputs, &new.inputs, *timeout, preview)
                    .await
                    .map_err(|source| StepError::Provider {
                        urn: new.urn.clone(),
                        op: self.op(),
                        source,
                        partial: None,
                    })?;
                let mut state = (**new).clone();
                state.id = old.id.clone();
                state.outputs = outputs;
                Ok(StepOutcome::Recorded(Arc::new(state)))
            }

            Step::Replace { .. } => Ok(StepOutcome::Skipped),

            // The pending entry is dropped from the snapshot; no provider
            // operation is involved.
            Step::RemovePendingReplace { prior_index, .. } => {
                Ok(StepOutcome::Deleted { prior_index: Some(*prior_index) })
            }

            Step::Delete { old, prior_index, timeout, .. } => {
                if old.custom && !old.retain_on_delete && !old.external && !old.id.is_empty() {
                    if !preview {
                        let provider = self.require_provider(provider)?;
                        provider
                            .delete(&old.urn, &old.id, &old.outputs, *timeout)
                            .await
                            .map_err(|source| StepError::Provider {
                                urn: old.urn.clone(),
                                op: self.op(),
                                source,
                                partial: None,
                            })?;
                    }
                } else if old.retain_on_delete || old.external {
                    tracing::info!(urn = %old.urn, "resource removed from state but retained");
                }
                Ok(StepOutcome::Deleted { prior_index: *prior_index })
            }

            Step::Read { new, .. } => {
                let provider = self.require_provider(provider)?;
                let result = provider
                    .read(&new.urn, &new.id, &new.inputs, &new.outputs)
                    .await
                    .map_err(|source| StepError::Provider {
                        urn: new.urn.clone(),
                        op: self.op(),
                        source,
                        partial: None,
                    })?;
                match result {
                    Some(read) => {
                        let mut state = (**new).clone();
                        state.id = read.id;
                        state.inputs = read.inputs;
                        state.outputs = read.outputs;
                        state.external = true;
                        Ok(StepOutcome::Recorded(Arc::new(state)))
                    }
                    None => Err(StepError::ReadMissing {
                        urn: new.urn.clone(),
                        id: new.id.to_string(),
                    }),
                }
            }

            Step::Refresh { old, prior_index } => {
                let provider = self.require_provider(provider)?;
                let result = provider
                    .read(&old.urn, &old.id, &old.inputs, &old.outputs)
                    .await
                    .map_err(|source| StepError::Provider {
                        urn: old.urn.clone(),
                        op: self.op(),
                        source,
                        partial: None,
                    })?;
                let state = result.map(|read| {
                    let mut state = (**old).clone();
                    state.id = read.id;
                    state.inputs = read.inputs;
                    state.outputs = read.outputs;
                    // The provider answered, so earlier init failures no
                    // longer describe the live resource.
                    state.init_errors.clear();
                    Arc::new(state)
                });
                Ok(StepOutcome::Refreshed { prior_index: *prior_index, state })
            }

            Step::Import { new } => {
                let provider = self.require_provider(provider)?;
                let result = provider
                    .read(&new.urn, &new.id, &new.inputs, &new.outputs)
                    .await
                    .map_err(|source| StepError::Provider {
                        urn: new.urn.clone(),
                        op: self.op(),
                        source,
                        partial: None,
                    })?;
                match result {
                    Some(read) => {
                        let mut state = (**new).clone();
                        state.id = read.id;
                        state.inputs = read.inputs;
                        state.outputs = read.outputs;
                        Ok(StepOutcome::Recorded(Arc::new(state)))
                    }
                    None => Err(StepError::ReadMissing {
                        urn: new.urn.clone(),
                        id: new.id.to_string(),
                    }),
                }
            }
        }
    }

    fn require_provider<'a>(
        &self,
        provider: Option<&'a Arc<dyn Provider>>,
    ) -> Result<&'a Arc<dyn Provider>, StepError> {
        provider.ok_or_else(|| StepError::Registry {
            urn: self.urn().clone(),
            source: RegistryError::Missing(
                self.provider_ref().map(|r| r.to_string()).unwrap_or_else(|| "default".to_string()),
            ),
        })
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
