// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step generation.
//!
//! The generator diffs each incoming goal against prior state and emits
//! the chain of steps that reconciles them, honoring targeting,
//! replacement, and dependency rules. After the source closes it produces
//! the delete set and groups it into reverse-topological antichains.
//!
//! Fatal generation errors (duplicate URN, protection violation, bad
//! target) are reported as diagnostics and held on a sticky errored flag
//! so the executor observes them at end of run with the right precedence.

use crate::deployment::DeploymentState;
use crate::step::{Chain, Step};
use gw_core::{
    changed_keys, Goal, PropertyMap, ReadRequest, ResolvedTargets, ResourceId, ResourceState, Urn,
};
use gw_providers::{DiffResult, ProviderError, RegistryError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("duplicate resource {0}: registered twice in one run")]
    DuplicateUrn(Urn),
    #[error("resource {0} is protected and cannot be deleted; unprotect it before replacing or destroying")]
    Protected(Urn),
    #[error("{dependent} depends on {target}, which cannot be deleted without also deleting its dependents; pass targetDependents or include them in the targets")]
    UntargetedDependent { dependent: Urn, target: Urn },
    #[error("resource {urn} depends on {dependency}, which was not created because it is not a target")]
    SkippedDependency { urn: Urn, dependency: Urn },
    #[error("delete target {0} does not exist in the stack")]
    MissingDeleteTarget(Urn),
    #[error("inputs for {urn} failed validation: {reasons}")]
    CheckFailed { urn: Urn, reasons: String },
    #[error("check failed for {urn}: {source}")]
    Check { urn: Urn, source: ProviderError },
    #[error("provider for {urn} unavailable: {source}")]
    Registry { urn: Urn, source: RegistryError },
    #[error("diff failed for {urn}: {source}")]
    Diff { urn: Urn, source: ProviderError },
}

/// Decision engine turning source events into step chains.
pub struct StepGenerator {
    state: Arc<DeploymentState>,
    update_targets: ResolvedTargets,
    replace_targets: ResolvedTargets,

    urns: HashSet<Urn>,
    reads: HashSet<Urn>,
    deletes: HashSet<Urn>,
    replaces: HashSet<Urn>,
    updates: HashSet<Urn>,
    creates: HashSet<Urn>,
    sames: HashSet<Urn>,
    skipped_creates: HashSet<Urn>,
    /// Old states awaiting their replacement delete.
    pending_deletes: HashSet<Urn>,
    /// Property keys of downstream resources that triggered their
    /// dependent replacement.
    dependent_replace_keys: HashMap<Urn, Vec<String>>,
    /// Replacement states already spliced into an upstream chain, keyed
    /// by URN; the resource's own register event consumes the entry.
    dependent_replaced: HashMap<Urn, Arc<ResourceState>>,
    /// New state per seen URN, for parent-default inheritance.
    resolved_news: HashMap<Urn, Arc<ResourceState>>,

    errors: Vec<String>,
}

impl StepGenerator {
    pub fn new(state: Arc<DeploymentState>) -> Self {
        let update_targets = state.opts.targets.resolve(&state.initial_urns);
        let replace_targets = state.opts.replace_targets.resolve(&state.initial_urns);
        Self {
            state,
            update_targets,
            replace_targets,
            urns: HashSet::new(),
            reads: HashSet::new(),
            deletes: HashSet::new(),
            replaces: HashSet::new(),
            updates: HashSet::new(),
            creates: HashSet::new(),
            sames: HashSet::new(),
            skipped_creates: HashSet::new(),
            pending_deletes: HashSet::new(),
            dependent_replace_keys: HashMap::new(),
            dependent_replaced: HashMap::new(),
            resolved_news: HashMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn errored(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn first_error(&self) -> Option<String> {
        self.errors.first().cloned()
    }

    pub fn has_seen(&self, urn: &Urn) -> bool {
        self.urns.contains(urn) || self.reads.contains(urn)
    }

    pub fn sames(&self) -> &HashSet<Urn> {
        &self.sames
    }

    pub fn reads(&self) -> &HashSet<Urn> {
        &self.reads
    }

    pub fn creates(&self) -> &HashSet<Urn> {
        &self.creates
    }

    pub fn updates(&self) -> &HashSet<Urn> {
        &self.updates
    }

    pub fn replaces(&self) -> &HashSet<Urn> {
        &self.replaces
    }

    pub fn deletes(&self) -> &HashSet<Urn> {
        &self.deletes
    }

    pub fn skipped_creates(&self) -> &HashSet<Urn> {
        &self.skipped_creates
    }

    pub fn dependent_replace_keys(&self) -> &HashMap<Urn, Vec<String>> {
        &self.dependent_replace_keys
    }

    /// Whether this run's delete phase is target-constrained, requiring a
    /// base-state rebuild afterwards.
    pub fn delete_targets_constrained(&self) -> bool {
        self.state.opts.destroy_targets.is_constrained() || self.state.opts.targets.is_constrained()
    }

    fn fatal(&mut self, urn: Option<&Urn>, error: GenerateError) -> GenerateError {
        let message = error.to_string();
        self.state.diag.error(urn, &message);
        self.errors.push(message);
        error
    }

    /// Produce the chain of steps for one register event.
    pub async fn generate_steps(&mut self, goal: Goal) -> Result<Chain, GenerateError> {
        let stack = self.state.opts.stack.clone();
        let project = self.state.opts.project.clone();
        let urn = Urn::from_parts(&stack, &project, &goal.ty, &goal.name);

        if self.has_seen(&urn) {
            let error = GenerateError::DuplicateUrn(urn.clone());
            return Err(self.fatal(Some(&urn), error));
        }

        // An upstream replacement already spliced this resource's steps
        // into its own chain; the register event is satisfied.
        if self.dependent_replaced.remove(&urn).is_some() {
            self.urns.insert(urn.clone());
            self.state.goals.lock().insert(urn, goal);
            return Ok(Vec::new());
        }
        self.urns.insert(urn.clone());

        // Alias resolution: the effective old is the first match.
        let old = {
            let olds = self.state.olds.read();
            let mut found = olds.get(&urn).cloned();
            if found.is_none() {
                for alias in &goal.aliases {
                    let alias_urn = alias.resolve(&stack, &project, &goal);
                    if let Some(hit) = olds.get(&alias_urn) {
                        found = Some(Arc::clone(hit));
                        break;
                    }
                }
            }
            found
        };

        let mut new = self.new_state_from_goal(&urn, &goal);

        // A dependency on a create suppressed by targeting cannot be
        // satisfied by real work.
        let skipped_dep =
            new.all_dependencies().find(|d| self.skipped_creates.contains(*d)).cloned();
        if let Some(dependency) = skipped_dep {
            let error = GenerateError::SkippedDependency { urn: urn.clone(), dependency };
            return Err(self.fatal(Some(&urn), error));
        }

        self.state.goals.lock().insert(urn.clone(), goal.clone());
        let targeted = self.update_targets.contains(&urn);

        let Some(old) = old else {
            return self.generate_create(urn, new, &goal, targeted).await;
        };

        // Ignore-changes normalization: ignored keys keep their old value.
        for key in &goal.ignore_changes {
            match old.inputs.get(key) {
                Some(value) => {
                    new.inputs.insert(key.clone(), value.clone());
                }
                None => {
                    new.inputs.remove(key);
                }
            }
        }

        if !targeted {
            // Out-of-target resources are carried through untouched.
            self.sames.insert(urn.clone());
            self.resolved_news.insert(urn.clone(), Arc::clone(&old));
            return Ok(vec![Step::Same {
                old: Some(Arc::clone(&old)),
                new: old,
                skipped_create: false,
            }]);
        }

        if !new.custom {
            // Component aggregates carry no provider operations; their
            // outputs arrive via a later outputs event.
            new.id = old.id.clone();
            new.outputs = old.outputs.clone();
            self.sames.insert(urn.clone());
            let arc = Arc::new(new);
            self.resolved_news.insert(urn.clone(), Arc::clone(&arc));
            return Ok(vec![Step::Same { old: Some(old), new: arc, skipped_create: false }]);
        }

        self.check_inputs(&urn, &goal, Some(&old), &mut new).await?;

        let force_replace = self.replace_targets.contains(&urn);
        let diff = self.diff(&urn, &goal, &old, &new).await?;

        if !diff.has_changes() && !force_replace {
            self.sames.insert(urn.clone());
            new.id = old.id.clone();
            new.outputs = old.outputs.clone();
            let arc = Arc::new(new);
            self.resolved_news.insert(urn.clone(), Arc::clone(&arc));
            return Ok(vec![Step::Same { old: Some(old), new: arc, skipped_create: false }]);
        }

        // A replacement triggers on provider-reported replace keys or on
        // user-listed replace-on-changes paths that actually changed.
        let mut replace_keys: Vec<String> = diff.replace_keys.clone();
        for key in &goal.replace_on_changes {
            if diff.changed_keys.contains(key) && !replace_keys.contains(key) {
                replace_keys.push(key.clone());
            }
        }

        if !force_replace && replace_keys.is_empty() {
            self.updates.insert(urn.clone());
            let arc = Arc::new(new);
            self.resolved_news.insert(urn.clone(), Arc::clone(&arc));
            return Ok(vec![Step::Update {
                old,
                new: arc,
                diffs: diff.changed_keys,
                timeout: goal.custom_timeouts.update_duration(),
            }]);
        }

        self.generate_replacement(urn, old, new, &goal, &diff, replace_keys)
    }

    async fn generate_create(
        &mut self,
        urn: Urn,
        mut new: ResourceState,
        goal: &Goal,
        targeted: bool,
    ) -> Result<Chain, GenerateError> {
        if !targeted {
            // Record the intended create without performing it.
            self.skipped_creates.insert(urn.clone());
            let arc = Arc::new(new);
            self.resolved_news.insert(urn, Arc::clone(&arc));
            return Ok(vec![Step::Same { old: None, new: arc, skipped_create: true }]);
        }
        if new.custom {
            self.check_inputs(&urn, goal, None, &mut new).await?;
        }
        self.creates.insert(urn.clone());
        let arc = Arc::new(new);
        self.resolved_news.insert(urn, Arc::clone(&arc));
        Ok(vec![Step::Create {
            old: None,
            new: arc,
            replacing: false,
            pending_delete: false,
            timeout: goal.custom_timeouts.create_duration(),
        }])
    }

    fn generate_replacement(
        &mut self,
        urn: Urn,
        old: Arc<ResourceState>,
        new: ResourceState,
        goal: &Goal,
        diff: &DiffResult,
        replace_keys: Vec<String>,
    ) -> Result<Chain, GenerateError> {
        if old.protect {
            let error = GenerateError::Protected(urn.clone());
            return Err(self.fatal(Some(&urn), error));
        }

        let dependents = self.dependent_replacements(&old.urn, &replace_keys)?;

        self.replaces.insert(urn.clone());
        self.pending_deletes.insert(urn.clone());

        let new_arc = Arc::new(new);
        self.resolved_news.insert(urn.clone(), Arc::clone(&new_arc));

        // Replacement states for dependents are built from their old
        // states; their own register events are satisfied by the splice.
        let positions = self.state.prior_positions.read().clone();
        let dep_pairs: Vec<(Arc<ResourceState>, Arc<ResourceState>)> = dependents
            .iter()
            .map(|d| {
                let mut n = (**d).clone();
                n.id = ResourceId::empty();
                n.outputs = PropertyMap::new();
                n.pending_replacement = false;
                n.delete = false;
                (Arc::clone(d), Arc::new(n))
            })
            .collect();
        for (d_old, d_new) in &dep_pairs {
            self.replaces.insert(d_old.urn.clone());
            self.pending_deletes.insert(d_old.urn.clone());
            self.dependent_replaced.insert(d_old.urn.clone(), Arc::clone(d_new));
            self.resolved_news.insert(d_old.urn.clone(), Arc::clone(d_new));
        }

        let delete_before =
            goal.delete_before_replace.unwrap_or(diff.delete_before_replace);
        let create_timeout = goal.custom_timeouts.create_duration();
        let delete_timeout = goal.custom_timeouts.delete_duration();

        let mut chain = Vec::new();
        if delete_before {
            // Old states go first: dependents in reverse topological
            // order, then the resource itself, then the recreations.
            for (d_old, _) in dep_pairs.iter().rev() {
                chain.push(Step::Delete {
                    old: Arc::clone(d_old),
                    replacing: true,
                    pending_replace: true,
                    prior_index: positions.get(&d_old.urn).copied(),
                    timeout: None,
                });
            }
            chain.push(Step::Delete {
                old: Arc::clone(&old),
                replacing: true,
                pending_replace: true,
                prior_index: positions.get(&old.urn).copied(),
                timeout: delete_timeout,
            });
            chain.push(Step::Create {
                old: Some(Arc::clone(&old)),
                new: Arc::clone(&new_arc),
                replacing: true,
                pending_delete: false,
                timeout: create_timeout,
            });
            chain.push(Step::Replace {
                old: Arc::clone(&old),
                new: new_arc,
                pending_delete: false,
            });
            for (d_old, d_new) in dep_pairs {
                chain.push(Step::Create {
                    old: Some(Arc::clone(&d_old)),
                    new: Arc::clone(&d_new),
                    replacing: true,
                    pending_delete: false,
                    timeout: None,
                });
                chain.push(Step::Replace { old: d_old, new: d_new, pending_delete: false });
            }
        } else {
            // Create-before-delete: new states first so dependents can
            // reference the replacement, old deletes last.
            chain.push(Step::Create {
                old: Some(Arc::clone(&old)),
                new: Arc::clone(&new_arc),
                replacing: true,
                pending_delete: true,
                timeout: create_timeout,
            });
            chain.push(Step::Replace {
                old: Arc::clone(&old),
                new: Arc::clone(&new_arc),
                pending_delete: true,
            });
            for (d_old, d_new) in &dep_pairs {
                chain.push(Step::Create {
                    old: Some(Arc::clone(d_old)),
                    new: Arc::clone(d_new),
                    replacing: true,
                    pending_delete: true,
                    timeout: None,
                });
                chain.push(Step::Replace {
                    old: Arc::clone(d_old),
                    new: Arc::clone(d_new),
                    pending_delete: true,
                });
            }
            for (d_old, _) in dep_pairs.iter().rev() {
                chain.push(Step::Delete {
                    old: Arc::clone(d_old),
                    replacing: true,
                    pending_replace: false,
                    prior_index: positions.get(&d_old.urn).copied(),
                    timeout: None,
                });
            }
            let old_index = positions.get(&old.urn).copied();
            chain.push(Step::Delete {
                old,
                replacing: true,
                pending_replace: false,
                prior_index: old_index,
                timeout: delete_timeout,
            });
        }
        Ok(chain)
    }

    /// Downstream resources whose property dependencies consume a
    /// replaced property must also be replaced. Walks the graph once in
    /// topological order so transitive forcing chains compose.
    fn dependent_replacements(
        &mut self,
        urn: &Urn,
        replace_keys: &[String],
    ) -> Result<Vec<Arc<ResourceState>>, GenerateError> {
        if replace_keys.is_empty() {
            return Ok(Vec::new());
        }
        let dependents = self.state.graph.read().depending_on(urn, false);
        let mut replaced: HashSet<Urn> = HashSet::from([urn.clone()]);
        let mut forced = Vec::new();
        for dependent in dependents {
            let keys: Vec<String> = dependent
                .property_dependencies
                .iter()
                .filter(|(_, deps)| deps.iter().any(|d| replaced.contains(d)))
                .map(|(k, _)| k.clone())
                .collect();
            if keys.is_empty() {
                continue;
            }
            if self.urns.contains(&dependent.urn) || !dependent.custom {
                continue;
            }
            if dependent.protect {
                let error = GenerateError::Protected(dependent.urn.clone());
                return Err(self.fatal(Some(&dependent.urn), error));
            }
            replaced.insert(dependent.urn.clone());
            self.dependent_replace_keys.insert(dependent.urn.clone(), keys);
            forced.push(dependent);
        }
        Ok(forced)
    }

    async fn check_inputs(
        &mut self,
        urn: &Urn,
        goal: &Goal,
        old: Option<&Arc<ResourceState>>,
        new: &mut ResourceState,
    ) -> Result<(), GenerateError> {
        let provider = match self.state.providers.ensure(goal.provider.as_ref()).await {
            Ok(provider) => provider,
            Err(source) => {
                let error = GenerateError::Registry { urn: urn.clone(), source };
                return Err(self.fatal(Some(urn), error));
            }
        };
        let empty = PropertyMap::new();
        let olds = old.map(|o| &o.inputs).unwrap_or(&empty);
        match provider.check(urn, olds, &new.inputs).await {
            Ok(check) => {
                if !check.failures.is_empty() {
                    let reasons: Vec<String> = check
                        .failures
                        .iter()
                        .map(|f| format!("{}: {}", f.property, f.reason))
                        .collect();
                    let error =
                        GenerateError::CheckFailed { urn: urn.clone(), reasons: reasons.join("; ") };
                    return Err(self.fatal(Some(urn), error));
                }
                new.inputs = check.inputs;
                Ok(())
            }
            Err(source) => {
                let error = GenerateError::Check { urn: urn.clone(), source };
                Err(self.fatal(Some(urn), error))
            }
        }
    }

    async fn diff(
        &mut self,
        urn: &Urn,
        goal: &Goal,
        old: &Arc<ResourceState>,
        new: &ResourceState,
    ) -> Result<DiffResult, GenerateError> {
        if self.state.opts.use_legacy_diff {
            let changed: Vec<String> = changed_keys(&old.inputs, &new.inputs)
                .into_iter()
                .filter(|k| !goal.ignore_changes.contains(k))
                .collect();
            return Ok(if changed.is_empty() {
                DiffResult::unchanged()
            } else {
                DiffResult::changed(changed)
            });
        }
        let provider = match self.state.providers.ensure(goal.provider.as_ref()).await {
            Ok(provider) => provider,
            Err(source) => {
                let error = GenerateError::Registry { urn: urn.clone(), source };
                return Err(self.fatal(Some(urn), error));
            }
        };
        provider
            .diff(urn, &old.id, &old.inputs, &new.inputs, &goal.ignore_changes)
            .await
            .map_err(|source| {
                let error = GenerateError::Diff { urn: urn.clone(), source };
                self.fatal(Some(urn), error)
            })
    }

    /// Produce the chain for one read event.
    pub async fn generate_read_steps(
        &mut self,
        read: ReadRequest,
    ) -> Result<Chain, GenerateError> {
        let urn = Urn::from_parts(
            &self.state.opts.stack,
            &self.state.opts.project,
            &read.ty,
            &read.name,
        );
        if self.has_seen(&urn) {
            let error = GenerateError::DuplicateUrn(urn.clone());
            return Err(self.fatal(Some(&urn), error));
        }
        self.reads.insert(urn.clone());

        if let Err(source) = self.state.providers.ensure(read.provider.as_ref()).await {
            let error = GenerateError::Registry { urn: urn.clone(), source };
            return Err(self.fatal(Some(&urn), error));
        }

        let old = self.state.olds.read().get(&urn).cloned();
        let mut new = ResourceState::new(urn, read.ty.clone(), true);
        new.external = true;
        new.id = read.id;
        new.inputs = read.properties;
        new.parent = read.parent;
        new.provider = read.provider;
        new.dependencies = read.dependencies;
        new.property_dependencies = read.property_dependencies;
        Ok(vec![Step::Read { old, new: Arc::new(new) }])
    }

    /// After the source closes: every prior URN this run did not see is a
    /// delete candidate, narrowed by targeting. Callers hold the step
    /// executor's lock.
    pub fn generate_deletes(&mut self) -> Result<Vec<Step>, GenerateError> {
        let prior = self.state.prior.read().clone();
        let destroy_constrained = self.state.opts.destroy_targets.is_constrained();
        let target_dependents = self.state.opts.target_dependents;
        let policy = if destroy_constrained {
            &self.state.opts.destroy_targets
        } else {
            &self.state.opts.targets
        };
        let mut targets = policy.resolve(prior.iter().map(|r| &r.urn));

        if destroy_constrained {
            let missing: Option<Urn> = {
                let olds = self.state.olds.read();
                targets.literals().iter().find(|l| !olds.contains_key(*l)).cloned()
            };
            if let Some(missing) = missing {
                let error = GenerateError::MissingDeleteTarget(missing.clone());
                return Err(self.fatal(Some(&missing), error));
            }
        }

        let mut steps = Vec::new();
        let mut candidates: Vec<(usize, Arc<ResourceState>)> = Vec::new();
        for (i, res) in prior.iter().enumerate().rev() {
            if res.delete {
                // Leftover from an interrupted replacement; finish it.
                steps.push(Step::Delete {
                    old: Arc::clone(res),
                    replacing: true,
                    pending_replace: false,
                    prior_index: Some(i),
                    timeout: None,
                });
                continue;
            }
            let seen = self.has_seen(&res.urn);
            if res.pending_replacement && seen {
                if !self.replaces.contains(&res.urn) {
                    // The resource came back without a replacement; the
                    // marker is stale.
                    steps.push(Step::RemovePendingReplace {
                        old: Arc::clone(res),
                        prior_index: i,
                    });
                }
                continue;
            }
            if seen || self.pending_deletes.contains(&res.urn) {
                continue;
            }
            candidates.push((i, Arc::clone(res)));
        }

        if targets.is_constrained() {
            let blocked: Option<(Urn, Urn)> = {
                let graph = self.state.graph.read();
                if target_dependents {
                    let initial: Vec<Urn> = targets.iter().cloned().collect();
                    for target in initial {
                        for dependent in graph.depending_on(&target, true) {
                            targets.insert(dependent.urn.clone());
                        }
                    }
                }
                let deleting: HashSet<Urn> = candidates
                    .iter()
                    .filter(|(_, r)| targets.contains(&r.urn))
                    .map(|(_, r)| r.urn.clone())
                    .collect();
                // A delete whose dependent survives would leave a dangling
                // reference; fail before anything runs.
                let mut found = None;
                for (_, res) in &candidates {
                    if !deleting.contains(&res.urn) {
                        continue;
                    }
                    if let Some(blocker) = graph
                        .depending_on(&res.urn, true)
                        .into_iter()
                        .find(|d| !d.delete && !deleting.contains(&d.urn))
                    {
                        found = Some((blocker.urn.clone(), res.urn.clone()));
                        break;
                    }
                }
                if found.is_none() {
                    candidates.retain(|(_, r)| deleting.contains(&r.urn));
                }
                found
            };
            if let Some((dependent, target)) = blocked {
                let error = GenerateError::UntargetedDependent {
                    dependent,
                    target: target.clone(),
                };
                return Err(self.fatal(Some(&target), error));
            }
        }

        let protected: Option<Urn> =
            candidates.iter().find(|(_, r)| r.protect).map(|(_, r)| r.urn.clone());
        if let Some(protected) = protected {
            let error = GenerateError::Protected(protected.clone());
            return Err(self.fatal(Some(&protected), error));
        }

        for (i, res) in candidates {
            self.deletes.insert(res.urn.clone());
            steps.push(Step::Delete {
                old: res,
                replacing: false,
                pending_replace: false,
                prior_index: Some(i),
                timeout: None,
            });
        }
        Ok(steps)
    }

    /// Group delete steps into antichains: steps in one group are
    /// pairwise independent and may run concurrently; groups run in
    /// series, dependents strictly before their dependencies.
    pub fn schedule_deletes(&self, steps: Vec<Step>) -> Vec<Vec<Step>> {
        let graph = self.state.graph.read();
        let urns: Vec<Urn> = steps.iter().map(|s| s.urn().clone()).collect();
        let closures: Vec<HashSet<Urn>> =
            urns.iter().map(|u| graph.transitive_dependencies_of(u)).collect();

        let mut slots: Vec<Option<Step>> = steps.into_iter().map(Some).collect();
        let mut remaining: Vec<usize> = (0..slots.len()).collect();
        let mut antichains = Vec::new();
        while !remaining.is_empty() {
            let blocked: HashSet<usize> = remaining
                .iter()
                .copied()
                .filter(|&j| {
                    remaining.iter().any(|&i| i != j && closures[i].contains(&urns[j]))
                })
                .collect();
            let mut layer: Vec<usize> =
                remaining.iter().copied().filter(|j| !blocked.contains(j)).collect();
            if layer.is_empty() {
                // A reference cycle would wedge the loop; flush the rest
                // as one group rather than hang.
                layer = std::mem::take(&mut remaining);
            } else {
                remaining.retain(|i| !layer.contains(i));
            }
            antichains.push(layer.into_iter().filter_map(|i| slots[i].take()).collect());
        }
        antichains
    }

    /// Build the goal's new state, inheriting `protect`, `retain_on_delete`,
    /// and `deleted_with` defaults from the parent when the goal leaves
    /// them unset.
    fn new_state_from_goal(&self, urn: &Urn, goal: &Goal) -> ResourceState {
        let parent_state =
            goal.parent.as_ref().and_then(|p| self.resolved_news.get(p));
        let mut state = ResourceState::new(urn.clone(), goal.ty.clone(), goal.custom);
        state.inputs = goal.inputs.clone();
        state.parent = goal.parent.clone();
        state.dependencies = goal.dependencies.clone();
        state.property_dependencies = goal.property_dependencies.clone();
        state.provider = goal.provider.clone();
        state.protect = goal
            .protect
            .unwrap_or_else(|| parent_state.map(|p| p.protect).unwrap_or(false));
        state.retain_on_delete = goal
            .retain_on_delete
            .unwrap_or_else(|| parent_state.map(|p| p.retain_on_delete).unwrap_or(false));
        state.deleted_with = goal
            .deleted_with
            .clone()
            .or_else(|| parent_state.and_then(|p| p.deleted_with.clone()));
        state
    }
}

#[cfg(test)]
#[path = "step_generator_tests.rs"]
mod tests;
