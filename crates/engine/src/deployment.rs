// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deployment driver.
//!
//! A [`Deployment`] binds a prior snapshot, a provider registry, and run
//! options; [`Executor::execute`] drives the live infrastructure to match
//! the intent stream, phase by phase.

use crate::error::EngineError;
use crate::options::UpdateOptions;
use crate::source::Source;
use crate::step::{Step, StepOutcome};
use crate::step_executor::StepExecutor;
use crate::step_generator::StepGenerator;
use crate::{import_driver, rebuild, refresh};
use gw_core::{
    DiagSink, Goal, OpKind, Plan, PlanError, PendingOperation, PropertyMap, ResourceState,
    Snapshot, SourceEvent, Urn,
};
use gw_graph::DependencyGraph;
use gw_providers::ProviderRegistry;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Post-run analysis hook invoked over the set of seen resources.
pub trait Analyzer: Send + Sync {
    /// Returns policy violation messages; any violation fails the run.
    fn analyze(&self, resources: &[Arc<ResourceState>]) -> Vec<(Option<Urn>, String)>;
}

/// Insertion-ordered registry of post-step resource states.
///
/// Multiple physical entries may share a URN (a delete-marked old next to
/// its replacement), so the registry keeps a list plus an index of the
/// live entry per URN.
#[derive(Debug, Default)]
pub(crate) struct NewStates {
    list: Vec<Arc<ResourceState>>,
    live: HashMap<Urn, usize>,
}

impl NewStates {
    pub(crate) fn record(&mut self, state: Arc<ResourceState>) {
        match self.live.get(&state.urn) {
            Some(&i) => self.list[i] = Arc::clone(&state),
            None => {
                self.live.insert(state.urn.clone(), self.list.len());
                self.list.push(Arc::clone(&state));
            }
        }
    }

    pub(crate) fn get_live(&self, urn: &Urn) -> Option<&Arc<ResourceState>> {
        self.live.get(urn).map(|&i| &self.list[i])
    }

    pub(crate) fn set_outputs(&mut self, urn: &Urn, outputs: PropertyMap) -> bool {
        let Some(&i) = self.live.get(urn) else { return false };
        let mut state = (*self.list[i]).clone();
        state.outputs = outputs;
        self.list[i] = Arc::new(state);
        true
    }

    pub(crate) fn contains(&self, urn: &Urn) -> bool {
        self.live.contains_key(urn)
    }

    pub(crate) fn list(&self) -> &[Arc<ResourceState>] {
        &self.list
    }
}

/// State shared between the executor loop, the step generator, and the
/// step executor's workers.
pub(crate) struct DeploymentState {
    pub(crate) opts: UpdateOptions,
    pub(crate) preview: bool,
    pub(crate) providers: Arc<dyn ProviderRegistry>,
    pub(crate) diag: Arc<dyn DiagSink>,

    /// Prior snapshot resources in topological order. Replaced wholesale
    /// by base-state rebuild after refresh and targeted deletes.
    pub(crate) prior: RwLock<Vec<Arc<ResourceState>>>,
    /// Live prior state per URN.
    pub(crate) olds: RwLock<HashMap<Urn, Arc<ResourceState>>>,
    /// Position of each live prior entry in `prior`.
    pub(crate) prior_positions: RwLock<HashMap<Urn, usize>>,
    /// Derived from `prior`; rebuilt whenever `prior` changes.
    pub(crate) graph: RwLock<DependencyGraph>,
    /// URNs present in the prior snapshot at construction, for target
    /// validation after phases that shrink `olds`.
    pub(crate) initial_urns: HashSet<Urn>,
    pub(crate) pending_operations: Vec<PendingOperation>,

    /// Post-step states, written by workers under the scheduling lock.
    pub(crate) news: Mutex<NewStates>,
    /// Prior positions removed by delete steps.
    pub(crate) deleted_indices: Mutex<HashSet<usize>>,
    /// Refresh observations per prior position (`None` = gone).
    pub(crate) refresh_results: Mutex<HashMap<usize, Option<Arc<ResourceState>>>>,

    /// Goals seen this run, for plan recording.
    pub(crate) goals: Mutex<HashMap<Urn, Goal>>,
    /// Constraint plan being consumed during update.
    pub(crate) constraint_plan: Mutex<Option<Plan>>,
    /// Plan being generated during preview.
    pub(crate) generated_plan: Mutex<Option<Plan>>,
    pub(crate) plan_violations: Mutex<Vec<PlanError>>,
}

impl DeploymentState {
    /// Fold a step outcome into the shared state. Callers hold the step
    /// executor's scheduling lock.
    pub(crate) fn record_outcome(&self, step: &Step, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Recorded(state) => {
                self.news.lock().record(state);
            }
            StepOutcome::Deleted { prior_index } => {
                if let Some(i) = prior_index {
                    self.deleted_indices.lock().insert(i);
                } else if let Some(old) = step.old() {
                    // Replacement deletes target the live prior entry.
                    if let Some(&i) = self.prior_positions.read().get(&old.urn) {
                        self.deleted_indices.lock().insert(i);
                    }
                }
            }
            StepOutcome::Refreshed { prior_index, state } => {
                self.refresh_results.lock().insert(prior_index, state);
            }
            StepOutcome::Skipped => {}
        }
    }

    /// Plan bookkeeping for an applied step: record during preview,
    /// consume during update.
    pub(crate) fn account_plan(&self, step: &Step) {
        let op = step.op();
        if op == OpKind::Refresh {
            return;
        }
        let urn = step.urn();
        if self.preview {
            if self.opts.generate_plan {
                let inputs =
                    step.new().map(|s| s.inputs.clone()).unwrap_or_default();
                let goals = self.goals.lock();
                let mut plan = self.generated_plan.lock();
                plan.get_or_insert_with(Plan::new).record(urn, op, &inputs, goals.get(urn));
            }
            return;
        }
        if let Some(plan) = self.constraint_plan.lock().as_mut() {
            if let Err(violation) = plan.consume(urn, op) {
                self.plan_violations.lock().push(violation);
            }
        }
    }

    /// Apply output completion for an already-registered resource.
    pub(crate) fn complete_outputs(&self, urn: &Urn, outputs: PropertyMap) -> bool {
        self.news.lock().set_outputs(urn, outputs)
    }

    /// Final snapshot: every recorded new state, followed by prior
    /// resources this run neither touched nor deleted (targeted runs
    /// leave them in place).
    pub(crate) fn build_snapshot(&self) -> Snapshot {
        let news = self.news.lock();
        let deleted = self.deleted_indices.lock();
        let prior = self.prior.read();
        let mut resources: Vec<Arc<ResourceState>> = news.list().to_vec();
        for (i, res) in prior.iter().enumerate() {
            if deleted.contains(&i) || news.contains(&res.urn) {
                continue;
            }
            resources.push(Arc::clone(res));
        }
        Snapshot::new(resources)
    }
}

/// A deployment: prior snapshot plus everything needed to reconcile it
/// against a program's intent stream.
pub struct Deployment {
    state: Arc<DeploymentState>,
}

impl Deployment {
    pub fn new(
        snapshot: Snapshot,
        providers: Arc<dyn ProviderRegistry>,
        diag: Arc<dyn DiagSink>,
        opts: UpdateOptions,
        preview: bool,
    ) -> Result<Self, EngineError> {
        snapshot.verify_integrity()?;
        let olds = snapshot.olds();
        let mut prior_positions = HashMap::new();
        for (i, res) in snapshot.resources.iter().enumerate() {
            if olds.get(&res.urn).map(|o| Arc::ptr_eq(o, res)).unwrap_or(false) {
                prior_positions.insert(res.urn.clone(), i);
            }
        }
        let graph = DependencyGraph::new(snapshot.resources.clone());
        let constraint_plan = opts.plan.clone();
        let initial_urns: HashSet<Urn> =
            snapshot.resources.iter().map(|r| r.urn.clone()).collect();
        let state = Arc::new(DeploymentState {
            opts,
            preview,
            providers,
            diag,
            prior: RwLock::new(snapshot.resources),
            olds: RwLock::new(olds),
            initial_urns,
            prior_positions: RwLock::new(prior_positions),
            graph: RwLock::new(graph),
            pending_operations: snapshot.pending_operations,
            news: Mutex::new(NewStates::default()),
            deleted_indices: Mutex::new(HashSet::new()),
            refresh_results: Mutex::new(HashMap::new()),
            goals: Mutex::new(HashMap::new()),
            constraint_plan: Mutex::new(constraint_plan),
            generated_plan: Mutex::new(None),
            plan_violations: Mutex::new(Vec::new()),
        });
        Ok(Self { state })
    }

    pub(crate) fn state(&self) -> &Arc<DeploymentState> {
        &self.state
    }
}

/// Result of a successful run.
#[derive(Debug)]
pub struct ExecOutcome {
    pub snapshot: Snapshot,
    pub plan: Option<Plan>,
}

/// One-shot driver for a deployment run. Not reentrant.
pub struct Executor {
    deployment: Deployment,
    source: Arc<dyn Source>,
    analyzer: Option<Arc<dyn Analyzer>>,
}

impl Executor {
    pub fn new(deployment: Deployment, source: Arc<dyn Source>) -> Self {
        Self { deployment, source, analyzer: None }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Run the deployment to completion.
    pub async fn execute(self, caller: CancellationToken) -> Result<ExecOutcome, EngineError> {
        let state = Arc::clone(self.deployment.state());

        // Cancellation watchdog: fan caller cancellation out to every
        // provider, best effort. It shares nothing with the internal
        // token that aborts steps after a failure.
        let watchdog_stop = CancellationToken::new();
        let watchdog = {
            let caller = caller.clone();
            let stop = watchdog_stop.clone();
            let providers = Arc::clone(&state.providers);
            tokio::spawn(async move {
                tokio::select! {
                    _ = stop.cancelled() => {}
                    _ = caller.cancelled() => {
                        for provider in providers.all() {
                            tokio::spawn(async move {
                                if let Err(e) = provider.signal_cancellation().await {
                                    tracing::warn!(error = %e, "provider cancellation signal failed");
                                }
                            });
                        }
                    }
                }
            })
        };

        let result = self.execute_inner(&state, &caller).await;

        watchdog_stop.cancel();
        let _ = watchdog.await;
        result
    }

    async fn execute_inner(
        &self,
        state: &Arc<DeploymentState>,
        caller: &CancellationToken,
    ) -> Result<ExecOutcome, EngineError> {
        // Import runs bypass the step generator entirely.
        if state.opts.is_import() {
            import_driver::run(state, caller).await?;
            return Ok(ExecOutcome { snapshot: state.build_snapshot(), plan: None });
        }

        if state.opts.refresh {
            refresh::run(state, caller).await?;
            if state.opts.refresh_only {
                return Ok(ExecOutcome { snapshot: state.build_snapshot(), plan: None });
            }
        } else if !state.pending_operations.is_empty() {
            for op in &state.pending_operations {
                state.diag.warning(
                    Some(&op.resource),
                    &format!(
                        "operation '{}' was interrupted by a previous run and may not have completed",
                        op.kind
                    ),
                );
            }
        }

        // The internal token aborts steps after the first failure; it is
        // a child of the caller token so caller cancellation fans in.
        let internal = caller.child_token();
        let step_exec = StepExecutor::new(Arc::clone(state), internal.clone());
        let mut generator = StepGenerator::new(Arc::clone(state));

        // Source iteration runs in its own task so iteration never blocks
        // the loop on cancellation.
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let source_task = {
            let source = Arc::clone(&self.source);
            tokio::spawn(async move {
                loop {
                    let next = source.next().await;
                    let end = matches!(next, Ok(None) | Err(_));
                    if event_tx.send(next).await.is_err() || end {
                        break;
                    }
                }
            })
        };

        let mut loop_err: Option<EngineError> = None;
        let mut end_of_stream = false;
        loop {
            tokio::select! {
                _ = internal.cancelled() => break,
                event = event_rx.recv() => match event {
                    None | Some(Ok(None)) => {
                        end_of_stream = true;
                        break;
                    }
                    Some(Ok(Some(event))) => {
                        tracing::debug!(event = event.name(), "handling source event");
                        if self.handle_event(state, &mut generator, &step_exec, event).await.is_err() {
                            // Diagnostics already emitted; stop issuing
                            // new chains and let in-flight ones finish.
                            internal.cancel();
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        state.diag.error(None, &e.to_string());
                        loop_err = Some(EngineError::Source(e.to_string()));
                        internal.cancel();
                        break;
                    }
                }
            }
        }

        // Drain: once the source is exhausted, generate deletes under the
        // step executor's lock, then run them in reverse-topological
        // antichains.
        let mut deletes_ran = false;
        if end_of_stream
            && loop_err.is_none()
            && !generator.errored()
            && !step_exec.errored()
            && !internal.is_cancelled()
        {
            let antichains = {
                let _guard = step_exec.lock();
                match generator.generate_deletes() {
                    Ok(steps) => Some(generator.schedule_deletes(steps)),
                    Err(_) => {
                        internal.cancel();
                        None
                    }
                }
            };
            if let Some(antichains) = antichains {
                for batch in antichains {
                    deletes_ran = deletes_ran || !batch.is_empty();
                    let token = step_exec.execute_parallel(batch);
                    token.wait().await;
                    if step_exec.errored() && !state.opts.continue_on_error {
                        break;
                    }
                }
            }
        }

        step_exec.signal_completion();
        step_exec.wait_for_completion().await;

        // Unblock and retire the source task.
        drop(event_rx);
        self.source.cancel();
        let _ = source_task.await;

        // Repair the base snapshot after targeted deletes so later
        // readers see consistent dependency lists.
        if deletes_ran && generator.delete_targets_constrained() {
            rebuild::rebuild_base_state(state, false)?;
        }

        let target_failed = self.validate_targets(state, &generator);

        // Plan verification.
        let mut plan_failures: Vec<String> =
            state.plan_violations.lock().iter().map(|e| e.to_string()).collect();
        if let Some(plan) = state.constraint_plan.lock().as_ref() {
            let prior_urns: HashSet<Urn> =
                state.prior.read().iter().map(|r| r.urn.clone()).collect();
            for violation in plan.verify_complete(&prior_urns) {
                plan_failures.push(violation.to_string());
            }
        }
        for failure in &plan_failures {
            state.diag.error(None, failure);
        }

        let clean = !generator.errored()
            && !step_exec.errored()
            && loop_err.is_none()
            && !target_failed
            && plan_failures.is_empty();

        // Post-analysis over the set of seen resources.
        let mut analysis_failed = false;
        if clean {
            if let Some(analyzer) = &self.analyzer {
                let resources: Vec<Arc<ResourceState>> = state.news.lock().list().to_vec();
                for (urn, message) in analyzer.analyze(&resources) {
                    state.diag.error(urn.as_ref(), &message);
                    analysis_failed = true;
                }
            }
        }

        // Terminal result precedence: generator > step executor > loop >
        // cancellation.
        if let Some(message) = generator.first_error() {
            return Err(EngineError::Generation(message));
        }
        if step_exec.errored() {
            return Err(EngineError::StepFailed);
        }
        if let Some(err) = loop_err {
            return Err(err);
        }
        if target_failed || analysis_failed {
            return Err(EngineError::Bail);
        }
        if !plan_failures.is_empty() {
            return Err(EngineError::Plan(plan_failures.join("; ")));
        }
        if caller.is_cancelled() || internal.is_cancelled() {
            return Err(EngineError::Canceled);
        }

        Ok(ExecOutcome {
            snapshot: state.build_snapshot(),
            plan: state.generated_plan.lock().take(),
        })
    }

    async fn handle_event(
        &self,
        state: &Arc<DeploymentState>,
        generator: &mut StepGenerator,
        step_exec: &StepExecutor,
        event: SourceEvent,
    ) -> Result<(), EngineError> {
        match event {
            SourceEvent::RegisterResource { goal } => {
                let chain = generator.generate_steps(goal).await.map_err(|_| EngineError::Bail)?;
                if !chain.is_empty() {
                    step_exec.execute_serial(chain);
                }
            }
            SourceEvent::ReadResource { read } => {
                let chain =
                    generator.generate_read_steps(read).await.map_err(|_| EngineError::Bail)?;
                if !chain.is_empty() {
                    step_exec.execute_serial(chain);
                }
            }
            SourceEvent::RegisterResourceOutputs { urn, outputs } => {
                // The resource's chain may still be in flight; let it land
                // before applying output completion.
                let recorded = state.news.lock().contains(&urn);
                if generator.has_seen(&urn) && !recorded {
                    step_exec.wait_for_completion().await;
                }
                step_exec.execute_register_resource_outputs(&urn, outputs);
            }
        }
        Ok(())
    }

    /// Every literal target must name a resource in the prior snapshot or
    /// one seen during generation. Destroy targets are validated by the
    /// generator before any delete runs.
    fn validate_targets(&self, state: &Arc<DeploymentState>, generator: &StepGenerator) -> bool {
        let mut failed = false;
        for policy in [&state.opts.targets, &state.opts.replace_targets] {
            let resolved = policy.resolve(&state.initial_urns);
            for literal in resolved.literals() {
                if !state.initial_urns.contains(literal) && !generator.has_seen(literal) {
                    state
                        .diag
                        .error(Some(literal), "no resource with this URN exists in the stack");
                    failed = true;
                }
            }
        }
        failed
    }
}

#[cfg(test)]
#[path = "deployment_tests.rs"]
mod tests;
