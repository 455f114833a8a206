// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider registry consumed by the engine.

use crate::provider::Provider;
use async_trait::async_trait;
use gw_core::ProviderRef;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no provider registered for {0}")]
    Missing(String),
    #[error("no default provider configured")]
    NoDefault,
}

/// Lookup and lifecycle of provider plugins.
///
/// `get` answers from already-loaded plugins; `ensure` loads on demand.
/// A `None` reference selects the default provider.
#[async_trait]
pub trait ProviderRegistry: Send + Sync {
    fn get(&self, reference: Option<&ProviderRef>) -> Option<Arc<dyn Provider>>;

    async fn ensure(&self, reference: Option<&ProviderRef>)
        -> Result<Arc<dyn Provider>, RegistryError>;

    /// Every loaded provider, for cancellation fan-out.
    fn all(&self) -> Vec<Arc<dyn Provider>>;
}

/// Registry backed by an in-memory table.
///
/// All providers are registered up front; `ensure` only validates
/// presence. Dynamic plugin loading lives outside the executor core.
#[derive(Default)]
pub struct DefaultRegistry {
    default: RwLock<Option<Arc<dyn Provider>>>,
    by_ref: RwLock<HashMap<String, Arc<dyn Provider>>>,
}

impl DefaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(provider: Arc<dyn Provider>) -> Self {
        let registry = Self::new();
        *registry.default.write() = Some(provider);
        registry
    }

    pub fn register(&self, reference: ProviderRef, provider: Arc<dyn Provider>) {
        tracing::debug!(provider = %reference, "registering provider");
        self.by_ref.write().insert(reference.to_string(), provider);
    }

    pub fn set_default(&self, provider: Arc<dyn Provider>) {
        *self.default.write() = Some(provider);
    }
}

#[async_trait]
impl ProviderRegistry for DefaultRegistry {
    fn get(&self, reference: Option<&ProviderRef>) -> Option<Arc<dyn Provider>> {
        match reference {
            None => self.default.read().clone(),
            Some(r) => self.by_ref.read().get(&r.to_string()).cloned(),
        }
    }

    async fn ensure(
        &self,
        reference: Option<&ProviderRef>,
    ) -> Result<Arc<dyn Provider>, RegistryError> {
        match reference {
            None => self.default.read().clone().ok_or(RegistryError::NoDefault),
            Some(r) => self
                .by_ref
                .read()
                .get(&r.to_string())
                .cloned()
                .ok_or_else(|| RegistryError::Missing(r.to_string())),
        }
    }

    fn all(&self) -> Vec<Arc<dyn Provider>> {
        let mut out: Vec<Arc<dyn Provider>> = self.by_ref.read().values().cloned().collect();
        if let Some(default) = self.default.read().clone() {
            out.push(default);
        }
        out
    }
}
