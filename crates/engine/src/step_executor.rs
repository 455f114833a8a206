// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrent step execution.
//!
//! Work arrives as chains: ordered step sequences that claim one worker
//! for their whole duration. Independent chains run in parallel up to the
//! worker bound. A parallel batch fans each step out as its own
//! single-step chain and hands back a token to await the batch.

use crate::deployment::DeploymentState;
use crate::step::{Chain, Step, StepError, StepOutcome};
use crate::worker_pool::WorkerPool;
use gw_core::{PropertyMap, Urn};
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Completion token for one parallel batch.
pub struct BatchToken {
    remaining: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl BatchToken {
    /// Block until every step in the batch has finished or been dropped.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.remaining.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Decrements the batch counter when its chain finishes, even if the
/// chain was dropped by cancellation before running.
struct BatchGuard {
    remaining: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.notify.notify_waiters();
        }
    }
}

/// Executes chains of steps against providers.
pub struct StepExecutor {
    state: Arc<DeploymentState>,
    pool: WorkerPool,
    internal: CancellationToken,
    /// Sticky failure flag, covering both step errors and bookkeeping
    /// errors like outputs for an unknown URN.
    failed: Arc<AtomicBool>,
    /// Mutual exclusion between delete generation and workers recording
    /// step results.
    sched_lock: Arc<Mutex<()>>,
    done: AtomicBool,
}

impl StepExecutor {
    pub fn new(state: Arc<DeploymentState>, internal: CancellationToken) -> Self {
        let parallel = state.opts.degree_of_parallelism();
        Self::with_parallelism(state, internal, parallel)
    }

    /// Executor with an explicit worker bound (refresh uses one worker
    /// per step).
    pub fn with_parallelism(
        state: Arc<DeploymentState>,
        internal: CancellationToken,
        parallel: usize,
    ) -> Self {
        let pool = if state.opts.continue_on_error {
            WorkerPool::continue_on_error(parallel, internal.clone())
        } else {
            WorkerPool::new(parallel, internal.clone())
        };
        Self {
            state,
            pool,
            internal,
            failed: Arc::new(AtomicBool::new(false)),
            sched_lock: Arc::new(Mutex::new(())),
            done: AtomicBool::new(false),
        }
    }

    /// Enqueue one chain; its steps run strictly in order on one worker.
    pub fn execute_serial(&self, chain: Chain) {
        self.enqueue(chain, None);
    }

    /// Enqueue each step of `batch` as its own chain. The returned token's
    /// `wait` blocks until every step in the batch finishes.
    pub fn execute_parallel(&self, batch: Vec<Step>) -> BatchToken {
        let remaining = Arc::new(AtomicUsize::new(batch.len()));
        let notify = Arc::new(Notify::new());
        for step in batch {
            let guard = BatchGuard {
                remaining: Arc::clone(&remaining),
                notify: Arc::clone(&notify),
            };
            self.enqueue(vec![step], Some(guard));
        }
        BatchToken { remaining, notify }
    }

    /// Apply output completion to the already-registered resource keyed
    /// by URN. Synchronous.
    pub fn execute_register_resource_outputs(&self, urn: &Urn, outputs: PropertyMap) {
        let _guard = self.sched_lock.lock();
        if !self.state.complete_outputs(urn, outputs) {
            self.state.diag.error(Some(urn), "outputs registered for unknown resource");
            self.failed.store(true, Ordering::SeqCst);
            if !self.state.opts.continue_on_error {
                self.internal.cancel();
            }
        }
    }

    /// No more chains are coming.
    pub fn signal_completion(&self) {
        self.done.store(true, Ordering::SeqCst);
    }

    /// Block until all in-flight work is done.
    pub async fn wait_for_completion(&self) {
        if self.pool.wait().await.is_err() {
            self.failed.store(true, Ordering::SeqCst);
        }
    }

    /// Whether any step has failed. Sticky.
    pub fn errored(&self) -> bool {
        self.failed.load(Ordering::SeqCst) || self.pool.has_errors()
    }

    /// Exclude delete generation from concurrent result recording.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.sched_lock.lock()
    }

    fn enqueue(&self, chain: Chain, batch_guard: Option<BatchGuard>) {
        if self.done.load(Ordering::SeqCst) {
            tracing::warn!("chain enqueued after completion signal; dropping");
            return;
        }
        let state = Arc::clone(&self.state);
        let internal = self.internal.clone();
        let failed = Arc::clone(&self.failed);
        let sched_lock = Arc::clone(&self.sched_lock);
        let continue_on_error = state.opts.continue_on_error;
        self.pool.spawn(move || async move {
            let _batch_guard = batch_guard;
            let mut result = Ok(());
            for step in chain {
                if internal.is_cancelled() && !continue_on_error {
                    break;
                }
                match apply_step(&state, &sched_lock, &step).await {
                    Ok(()) => {}
                    Err(message) => {
                        failed.store(true, Ordering::SeqCst);
                        result = Err(message);
                        // Abort the rest of the chain; the pool cancels
                        // peers unless the run continues on error.
                        break;
                    }
                }
            }
            result
        });
    }
}

/// Run one step: resolve its provider, apply it, and record the result.
async fn apply_step(
    state: &Arc<DeploymentState>,
    sched_lock: &Arc<Mutex<()>>,
    step: &Step,
) -> Result<(), String> {
    let provider = if step.needs_provider() {
        match state.providers.ensure(step.provider_ref()).await {
            Ok(provider) => Some(provider),
            Err(e) => {
                let message = format!("provider unavailable: {e}");
                state.diag.error(Some(step.urn()), &message);
                return Err(message);
            }
        }
    } else {
        None
    };

    let info = {
        let fields = step.fields();
        let mut fmt = String::new();
        for (key, val) in fields {
            if !fmt.is_empty() {
                fmt.push(' ');
            }
            fmt.push_str(key);
            fmt.push('=');
            fmt.push_str(&val);
        }
        fmt
    };
    let verbose = step.verbose();
    if verbose {
        tracing::info!("executing step {}", info);
    }

    let start = std::time::Instant::now();
    let result = step.apply(provider.as_ref(), state.preview).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(outcome) => {
            if verbose {
                tracing::info!(elapsed_ms, "completed step {}", info);
            } else {
                tracing::debug!(elapsed_ms, "executed step {}", info);
            }
            let _guard = sched_lock.lock();
            state.record_outcome(step, outcome);
            state.account_plan(step);
            Ok(())
        }
        Err(error) => {
            tracing::error!(error = %error, elapsed_ms, "failed step {}", info);
            let message = error.to_string();
            state.diag.error(Some(step.urn()), &message);
            if let StepError::Provider { partial: Some(partial), .. } = &error {
                // Partially created resources still enter the new state.
                let _guard = sched_lock.lock();
                state.record_outcome(step, StepOutcome::Recorded(Arc::clone(partial)));
            }
            Err(message)
        }
    }
}

#[cfg(test)]
#[path = "step_executor_tests.rs"]
mod tests;
