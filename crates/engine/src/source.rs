// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event source consumed by the executor.

use async_trait::async_trait;
use gw_core::SourceEvent;
use parking_lot::Mutex;
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
#[error("program failed: {0}")]
pub struct SourceError(pub String);

/// Iterator over the events a running user program emits.
///
/// `next` yields `Ok(None)` when the program has finished emitting work
/// and an error when the program failed.
#[async_trait]
pub trait Source: Send + Sync {
    async fn next(&self) -> Result<Option<SourceEvent>, SourceError>;

    /// Ask the program to stop emitting events. Best effort.
    fn cancel(&self);
}

/// Source fed through a bounded channel by the embedding program.
pub struct ChannelSource {
    rx: tokio::sync::Mutex<mpsc::Receiver<Result<SourceEvent, SourceError>>>,
    cancel: CancellationToken,
}

impl ChannelSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<Result<SourceEvent, SourceError>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx: tokio::sync::Mutex::new(rx), cancel: CancellationToken::new() })
    }

    /// Token the feeding side can watch to stop early.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[async_trait]
impl Source for ChannelSource {
    async fn next(&self) -> Result<Option<SourceEvent>, SourceError> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            _ = self.cancel.cancelled() => Ok(None),
            event = rx.recv() => match event {
                Some(Ok(event)) => Ok(Some(event)),
                Some(Err(e)) => Err(e),
                // Sender dropped: the program is done.
                None => Ok(None),
            },
        }
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Source that replays a pre-scripted event list, then ends.
pub struct FixedSource {
    events: Mutex<VecDeque<Result<SourceEvent, SourceError>>>,
}

impl FixedSource {
    pub fn new(events: Vec<SourceEvent>) -> Self {
        Self { events: Mutex::new(events.into_iter().map(Ok).collect()) }
    }

    /// A source that fails after emitting the given events.
    pub fn failing_after(events: Vec<SourceEvent>, error: impl Into<String>) -> Self {
        let mut queue: VecDeque<Result<SourceEvent, SourceError>> =
            events.into_iter().map(Ok).collect();
        queue.push_back(Err(SourceError(error.into())));
        Self { events: Mutex::new(queue) }
    }

    /// A source that ends immediately, as a destroy run's program does.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Source for FixedSource {
    async fn next(&self) -> Result<Option<SourceEvent>, SourceError> {
        match self.events.lock().pop_front() {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    fn cancel(&self) {
        self.events.lock().clear();
    }
}

#[cfg(test)]
#[path = "source_tests.rs"]
mod tests;
