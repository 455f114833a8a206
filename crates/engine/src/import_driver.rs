// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Import subdriver.
//!
//! Adopts existing resources into the snapshot without creating them,
//! independently of the step generator: each import spec becomes an
//! import step driven through a dedicated step executor.

use crate::deployment::DeploymentState;
use crate::error::EngineError;
use crate::step::Step;
use crate::step_executor::StepExecutor;
use gw_core::{ResourceState, Urn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub(crate) async fn run(
    state: &Arc<DeploymentState>,
    caller: &CancellationToken,
) -> Result<(), EngineError> {
    let mut steps = Vec::new();
    for spec in &state.opts.import_resources {
        let urn =
            Urn::from_parts(&state.opts.stack, &state.opts.project, &spec.ty, &spec.name);
        if state.olds.read().contains_key(&urn) {
            state.diag.warning(Some(&urn), "resource already exists in the stack; skipping import");
            continue;
        }
        if let Err(e) = state.providers.ensure(spec.provider.as_ref()).await {
            state.diag.error(Some(&urn), &format!("provider unavailable: {e}"));
            return Err(EngineError::Bail);
        }
        let mut new = ResourceState::new(urn, spec.ty.clone(), true);
        new.id = spec.id.clone();
        new.parent = spec.parent.clone();
        new.provider = spec.provider.clone();
        new.protect = spec.protect;
        steps.push(Step::Import { new: Arc::new(new) });
    }

    if steps.is_empty() {
        return Ok(());
    }

    tracing::info!(count = steps.len(), "importing resources");
    let internal = caller.child_token();
    let executor = StepExecutor::new(Arc::clone(state), internal);
    let token = executor.execute_parallel(steps);
    token.wait().await;
    executor.signal_completion();
    executor.wait_for_completion().await;

    if executor.errored() {
        return Err(EngineError::Bail);
    }
    Ok(())
}

#[cfg(test)]
#[path = "import_driver_tests.rs"]
mod tests;
