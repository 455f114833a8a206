// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh subdriver.
//!
//! Reconciles recorded state with the provider without mutating
//! infrastructure: every prior custom resource (or each target, when
//! constrained) gets a refresh step, all steps run in parallel with one
//! worker each, and the base snapshot is rebuilt from the observations.

use crate::deployment::DeploymentState;
use crate::error::EngineError;
use crate::rebuild;
use crate::step::Step;
use crate::step_executor::StepExecutor;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub(crate) async fn run(
    state: &Arc<DeploymentState>,
    caller: &CancellationToken,
) -> Result<(), EngineError> {
    let prior = state.prior.read().clone();
    let targets = state.opts.targets.resolve(prior.iter().map(|r| &r.urn));

    let mut steps = Vec::new();
    for (i, res) in prior.iter().enumerate() {
        if !res.custom || res.is_provider() || res.id.is_empty() {
            continue;
        }
        if !targets.contains(&res.urn) {
            continue;
        }
        if let Err(e) = state.providers.ensure(res.provider.as_ref()).await {
            state.diag.error(Some(&res.urn), &format!("provider unavailable: {e}"));
            return Err(EngineError::Bail);
        }
        steps.push(Step::Refresh { old: Arc::clone(res), prior_index: i });
    }

    if steps.is_empty() {
        return rebuild::rebuild_base_state(state, true);
    }

    tracing::info!(count = steps.len(), "refreshing recorded state");
    let internal = caller.child_token();
    let executor = StepExecutor::with_parallelism(Arc::clone(state), internal, steps.len());
    let token = executor.execute_parallel(steps);
    token.wait().await;
    executor.signal_completion();
    executor.wait_for_completion().await;

    if executor.errored() {
        return Err(EngineError::Bail);
    }
    rebuild::rebuild_base_state(state, true)
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
