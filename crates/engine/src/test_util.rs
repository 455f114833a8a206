// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for this crate's unit tests.

use crate::deployment::{Deployment, DeploymentState};
use crate::options::UpdateOptions;
use gw_core::{MemorySink, ResourceState, Snapshot, Urn};
use gw_providers::{DefaultRegistry, FakeProvider, Provider};
use std::sync::Arc;

pub(crate) fn urn(name: &str) -> Urn {
    Urn::from_parts("dev", "proj", "test:mod:Thing", name)
}

pub(crate) struct Harness {
    pub deployment: Deployment,
    pub fake: FakeProvider,
    pub sink: MemorySink,
}

impl Harness {
    pub fn state(&self) -> Arc<DeploymentState> {
        Arc::clone(self.deployment.state())
    }
}

/// Deployment over the given prior resources, backed by a fake default
/// provider and an in-memory diagnostics sink.
pub(crate) fn harness(
    prior: Vec<Arc<ResourceState>>,
    configure: impl FnOnce(&mut UpdateOptions),
) -> Harness {
    harness_with_preview(prior, configure, false)
}

pub(crate) fn harness_with_preview(
    prior: Vec<Arc<ResourceState>>,
    configure: impl FnOnce(&mut UpdateOptions),
    preview: bool,
) -> Harness {
    let fake = FakeProvider::new();
    let provider: Arc<dyn Provider> = Arc::new(fake.clone());
    let registry = Arc::new(DefaultRegistry::with_default(provider));
    let sink = MemorySink::new();
    let mut opts = UpdateOptions::new("dev", "proj");
    configure(&mut opts);
    let deployment = match Deployment::new(
        Snapshot::new(prior),
        registry,
        Arc::new(sink.clone()),
        opts,
        preview,
    ) {
        Ok(deployment) => deployment,
        Err(e) => panic!("harness snapshot rejected: {e}"),
    };
    Harness { deployment, fake, sink }
}
