// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Programmable in-memory provider for tests.

use crate::provider::{
    CheckResult, ConstructResult, CreateResult, DiffResult, Provider, ProviderError, ReadResult,
};
use async_trait::async_trait;
use gw_core::{PropertyMap, ResourceId, Urn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCall {
    pub op: &'static str,
    pub urn: Urn,
}

/// Scripted behavior for one URN.
#[derive(Default)]
struct UrnBehavior {
    diff: Option<DiffResult>,
    create_outputs: Option<PropertyMap>,
    read: Option<Option<ReadResult>>,
    fail: HashMap<&'static str, String>,
    init_failure: Option<Vec<String>>,
}

struct FakeProviderState {
    behaviors: HashMap<Urn, UrnBehavior>,
    calls: Vec<ProviderCall>,
    op_delay: Option<Duration>,
    delay_by_op: HashMap<&'static str, Duration>,
    active_by_op: HashMap<&'static str, usize>,
    max_by_op: HashMap<&'static str, usize>,
}

/// Fake provider adapter for testing.
///
/// Unscripted operations succeed: diffs compare inputs directly, creates
/// assign sequential ids and echo inputs as outputs, reads report the
/// recorded state. Tests can script per-URN diff results, read results,
/// failures, and a uniform per-operation delay. A concurrency gauge
/// records the peak number of simultaneously running operations.
#[derive(Clone)]
pub struct FakeProvider {
    inner: Arc<Mutex<FakeProviderState>>,
    next_id: Arc<AtomicU64>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeProviderState {
                behaviors: HashMap::new(),
                calls: Vec::new(),
                op_delay: None,
                delay_by_op: HashMap::new(),
                active_by_op: HashMap::new(),
                max_by_op: HashMap::new(),
            })),
            next_id: Arc::new(AtomicU64::new(1)),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
            cancelled: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the diff result for a URN.
    pub fn set_diff(&self, urn: &Urn, diff: DiffResult) {
        self.inner.lock().behaviors.entry(urn.clone()).or_default().diff = Some(diff);
    }

    /// Script the outputs a create returns for a URN.
    pub fn set_create_outputs(&self, urn: &Urn, outputs: PropertyMap) {
        self.inner.lock().behaviors.entry(urn.clone()).or_default().create_outputs =
            Some(outputs);
    }

    /// Script a read result; `None` inside the outer `Some` means "gone".
    pub fn set_read(&self, urn: &Urn, result: Option<ReadResult>) {
        self.inner.lock().behaviors.entry(urn.clone()).or_default().read = Some(result);
    }

    /// Script a structural failure for one operation on one URN.
    pub fn fail_op(&self, urn: &Urn, op: &'static str, message: impl Into<String>) {
        self.inner
            .lock()
            .behaviors
            .entry(urn.clone())
            .or_default()
            .fail
            .insert(op, message.into());
    }

    /// Script a partial-creation failure for a URN's create.
    pub fn fail_create_init(&self, urn: &Urn, reasons: Vec<String>) {
        self.inner.lock().behaviors.entry(urn.clone()).or_default().init_failure = Some(reasons);
    }

    /// Delay every operation, to make concurrency observable.
    pub fn set_op_delay(&self, delay: Duration) {
        self.inner.lock().op_delay = Some(delay);
    }

    /// Delay one kind of operation only.
    pub fn set_op_delay_for(&self, op: &'static str, delay: Duration) {
        self.inner.lock().delay_by_op.insert(op, delay);
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.inner.lock().calls.clone()
    }

    pub fn calls_for(&self, op: &str) -> Vec<ProviderCall> {
        self.inner.lock().calls.iter().filter(|c| c.op == op).cloned().collect()
    }

    /// Peak number of simultaneously running operations, any kind.
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Peak number of simultaneously running operations of one kind.
    pub fn max_concurrency_for(&self, op: &str) -> usize {
        self.inner.lock().max_by_op.get(op).copied().unwrap_or(0)
    }

    /// How many times cancellation was signaled.
    pub fn cancellation_signals(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn enter(&self, op: &'static str, urn: &Urn) -> OpGuard {
        let delay = {
            let mut state = self.inner.lock();
            state.calls.push(ProviderCall { op, urn: urn.clone() });
            let active = state.active_by_op.entry(op).or_insert(0);
            *active += 1;
            let active = *active;
            let max = state.max_by_op.entry(op).or_insert(0);
            *max = (*max).max(active);
            state.delay_by_op.get(op).copied().or(state.op_delay)
        };
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        OpGuard { active: Arc::clone(&self.active), inner: Arc::clone(&self.inner), op }
    }

    fn scripted_failure(&self, urn: &Urn, op: &'static str) -> Option<ProviderError> {
        let state = self.inner.lock();
        let behavior = state.behaviors.get(urn)?;
        behavior.fail.get(op).map(|m| ProviderError::Structural(m.clone()))
    }
}

struct OpGuard {
    active: Arc<AtomicUsize>,
    inner: Arc<Mutex<FakeProviderState>>,
    op: &'static str,
}

impl Drop for OpGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        if let Some(active) = self.inner.lock().active_by_op.get_mut(self.op) {
            *active = active.saturating_sub(1);
        }
    }
}

#[async_trait]
impl Provider for FakeProvider {
    async fn check(
        &self,
        urn: &Urn,
        _olds: &PropertyMap,
        news: &PropertyMap,
    ) -> Result<CheckResult, ProviderError> {
        let _guard = self.enter("check", urn).await;
        if let Some(err) = self.scripted_failure(urn, "check") {
            return Err(err);
        }
        Ok(CheckResult { inputs: news.clone(), failures: Vec::new() })
    }

    async fn diff(
        &self,
        urn: &Urn,
        _id: &ResourceId,
        olds: &PropertyMap,
        news: &PropertyMap,
        ignore_changes: &[String],
    ) -> Result<DiffResult, ProviderError> {
        let _guard = self.enter("diff", urn).await;
        if let Some(err) = self.scripted_failure(urn, "diff") {
            return Err(err);
        }
        if let Some(diff) = self.inner.lock().behaviors.get(urn).and_then(|b| b.diff.clone()) {
            return Ok(diff);
        }
        let changed: Vec<String> = gw_core::changed_keys(olds, news)
            .into_iter()
            .filter(|k| !ignore_changes.contains(k))
            .collect();
        if changed.is_empty() {
            Ok(DiffResult::unchanged())
        } else {
            Ok(DiffResult::changed(changed))
        }
    }

    async fn create(
        &self,
        urn: &Urn,
        inputs: &PropertyMap,
        _timeout: Option<Duration>,
        preview: bool,
    ) -> Result<CreateResult, ProviderError> {
        let _guard = self.enter("create", urn).await;
        if let Some(err) = self.scripted_failure(urn, "create") {
            return Err(err);
        }
        let scripted = {
            let state = self.inner.lock();
            let behavior = state.behaviors.get(urn);
            if let Some(reasons) = behavior.and_then(|b| b.init_failure.clone()) {
                let id = ResourceId::new(format!("partial-{}", self.next_id.fetch_add(1, Ordering::SeqCst)));
                return Err(ProviderError::Init {
                    id: Some(id),
                    outputs: inputs.clone(),
                    reasons,
                });
            }
            behavior.and_then(|b| b.create_outputs.clone())
        };
        let outputs = scripted.unwrap_or_else(|| inputs.clone());
        let id = if preview {
            ResourceId::empty()
        } else {
            ResourceId::new(format!("id-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
        };
        Ok(CreateResult { id, outputs })
    }

    async fn read(
        &self,
        urn: &Urn,
        id: &ResourceId,
        inputs: &PropertyMap,
        state: &PropertyMap,
    ) -> Result<Option<ReadResult>, ProviderError> {
        let _guard = self.enter("read", urn).await;
        if let Some(err) = self.scripted_failure(urn, "read") {
            return Err(err);
        }
        if let Some(result) = self.inner.lock().behaviors.get(urn).and_then(|b| b.read.clone()) {
            return Ok(result);
        }
        Ok(Some(ReadResult { id: id.clone(), inputs: inputs.clone(), outputs: state.clone() }))
    }

    async fn update(
        &self,
        urn: &Urn,
        _id: &ResourceId,
        _olds: &PropertyMap,
        news: &PropertyMap,
        _timeout: Option<Duration>,
        _preview: bool,
    ) -> Result<PropertyMap, ProviderError> {
        let _guard = self.enter("update", urn).await;
        if let Some(err) = self.scripted_failure(urn, "update") {
            return Err(err);
        }
        Ok(news.clone())
    }

    async fn delete(
        &self,
        urn: &Urn,
        _id: &ResourceId,
        _outputs: &PropertyMap,
        _timeout: Option<Duration>,
    ) -> Result<(), ProviderError> {
        let _guard = self.enter("delete", urn).await;
        if let Some(err) = self.scripted_failure(urn, "delete") {
            return Err(err);
        }
        Ok(())
    }

    async fn construct(
        &self,
        urn: &Urn,
        inputs: &PropertyMap,
    ) -> Result<ConstructResult, ProviderError> {
        let _guard = self.enter("construct", urn).await;
        if let Some(err) = self.scripted_failure(urn, "construct") {
            return Err(err);
        }
        Ok(ConstructResult { urn: urn.clone(), outputs: inputs.clone() })
    }

    async fn signal_cancellation(&self) -> Result<(), ProviderError> {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
