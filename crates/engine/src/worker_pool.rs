// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded-parallelism task pool with cancel-on-first-error.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
#[error("{}", errors.join("; "))]
pub struct PoolError {
    pub errors: Vec<String>,
}

/// A pool of at most `parallel` concurrently running tasks.
///
/// The first task error cancels the associated token so peers can bail
/// early; queued tasks that have not acquired a worker when the token
/// fires are dropped. `wait` joins everything and returns the aggregated
/// error list.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    errors: Arc<Mutex<Vec<String>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    /// When false, a task error is recorded but does not cancel peers.
    cancel_on_error: bool,
}

impl WorkerPool {
    pub fn new(parallel: usize, cancel: CancellationToken) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(parallel.max(1))),
            cancel,
            errors: Arc::new(Mutex::new(Vec::new())),
            handles: Mutex::new(Vec::new()),
            cancel_on_error: true,
        }
    }

    pub fn continue_on_error(parallel: usize, cancel: CancellationToken) -> Self {
        Self { cancel_on_error: false, ..Self::new(parallel, cancel) }
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.lock().is_empty()
    }

    /// Submit a task. It waits for a free worker; if cancellation fires
    /// first, the task never runs.
    pub fn spawn<F, Fut>(&self, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let cancel = self.cancel.clone();
        let errors = Arc::clone(&self.errors);
        let cancel_on_error = self.cancel_on_error;
        let handle = tokio::spawn(async move {
            let permit = tokio::select! {
                _ = cancel.cancelled() => return,
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };
            let _permit = permit;
            if cancel.is_cancelled() {
                return;
            }
            if let Err(message) = task().await {
                errors.lock().push(message);
                if cancel_on_error {
                    cancel.cancel();
                }
            }
        });
        self.handles.lock().push(handle);
    }

    /// Wait for every submitted task and return the aggregated error.
    pub async fn wait(&self) -> Result<(), PoolError> {
        loop {
            let drained: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
            if drained.is_empty() {
                break;
            }
            for handle in drained {
                if let Err(e) = handle.await {
                    self.errors.lock().push(format!("worker panicked: {e}"));
                }
            }
        }
        let errors = std::mem::take(&mut *self.errors.lock());
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PoolError { errors })
        }
    }
}

#[cfg(test)]
#[path = "worker_pool_tests.rs"]
mod tests;
