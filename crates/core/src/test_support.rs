// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders and helpers shared by this crate's tests and, via the
//! `test-support` feature, by other crates' tests.

use crate::goal::Goal;
use crate::property::{PropertyMap, PropertyValue};
use crate::state::{ProviderRef, ResourceState};
use crate::urn::{ResourceId, Urn};
use std::sync::Arc;

/// Fluent builder for [`ResourceState`] records.
pub struct StateBuilder {
    state: ResourceState,
}

impl StateBuilder {
    pub fn new(urn: Urn, ty: impl Into<String>, custom: bool) -> Self {
        Self { state: ResourceState::new(urn, ty, custom) }
    }

    /// A custom resource whose type token is taken from the URN.
    pub fn custom(urn: Urn) -> Self {
        let ty = urn.type_token().unwrap_or("test:mod:Thing").to_string();
        Self::new(urn, ty, true)
    }

    /// A component aggregate whose type token is taken from the URN.
    pub fn component(urn: Urn) -> Self {
        let ty = urn.type_token().unwrap_or("test:mod:Component").to_string();
        Self::new(urn, ty, false)
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.state.id = ResourceId::new(id);
        self
    }

    pub fn input(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.state.inputs.insert(key.into(), value.into());
        self
    }

    pub fn inputs(mut self, inputs: PropertyMap) -> Self {
        self.state.inputs = inputs;
        self
    }

    pub fn output(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.state.outputs.insert(key.into(), value.into());
        self
    }

    pub fn parent(mut self, parent: Urn) -> Self {
        self.state.parent = Some(parent);
        self
    }

    pub fn dependency(mut self, dep: Urn) -> Self {
        self.state.dependencies.push(dep);
        self
    }

    pub fn property_dependency(mut self, key: impl Into<String>, deps: Vec<Urn>) -> Self {
        self.state.property_dependencies.insert(key.into(), deps);
        self
    }

    pub fn provider(mut self, provider: ProviderRef) -> Self {
        self.state.provider = Some(provider);
        self
    }

    pub fn protect(mut self) -> Self {
        self.state.protect = true;
        self
    }

    pub fn retain_on_delete(mut self) -> Self {
        self.state.retain_on_delete = true;
        self
    }

    pub fn external(mut self) -> Self {
        self.state.external = true;
        self
    }

    pub fn pending_replacement(mut self) -> Self {
        self.state.pending_replacement = true;
        self
    }

    pub fn delete_marked(mut self) -> Self {
        self.state.delete = true;
        self
    }

    pub fn deleted_with(mut self, urn: Urn) -> Self {
        self.state.deleted_with = Some(urn);
        self
    }

    pub fn init_error(mut self, message: impl Into<String>) -> Self {
        self.state.init_errors.push(message.into());
        self
    }

    pub fn build(self) -> Arc<ResourceState> {
        Arc::new(self.state)
    }
}

/// Fluent builder for [`Goal`] records.
pub struct GoalBuilder {
    goal: Goal,
}

impl GoalBuilder {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self { goal: Goal::new(ty, name, true) }
    }

    pub fn component(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self { goal: Goal::new(ty, name, false) }
    }

    pub fn input(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.goal.inputs.insert(key.into(), value.into());
        self
    }

    pub fn parent(mut self, parent: Urn) -> Self {
        self.goal.parent = Some(parent);
        self
    }

    pub fn dependency(mut self, dep: Urn) -> Self {
        self.goal.dependencies.push(dep);
        self
    }

    pub fn property_dependency(mut self, key: impl Into<String>, deps: Vec<Urn>) -> Self {
        self.goal.property_dependencies.insert(key.into(), deps);
        self
    }

    pub fn provider(mut self, provider: ProviderRef) -> Self {
        self.goal.provider = Some(provider);
        self
    }

    pub fn protect(mut self, protect: bool) -> Self {
        self.goal.protect = Some(protect);
        self
    }

    pub fn retain_on_delete(mut self, retain: bool) -> Self {
        self.goal.retain_on_delete = Some(retain);
        self
    }

    pub fn deleted_with(mut self, urn: Urn) -> Self {
        self.goal.deleted_with = Some(urn);
        self
    }

    pub fn delete_before_replace(mut self, dbr: bool) -> Self {
        self.goal.delete_before_replace = Some(dbr);
        self
    }

    pub fn ignore_changes<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.goal.ignore_changes = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn replace_on_changes<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.goal.replace_on_changes = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn alias(mut self, alias: crate::goal::Alias) -> Self {
        self.goal.aliases.push(alias);
        self
    }

    pub fn build(self) -> Goal {
        self.goal
    }
}
