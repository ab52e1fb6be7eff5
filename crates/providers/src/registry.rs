//! Provider registry.
//!
//! Holds all instantiated provider adapters keyed by id, preserving
//! registration order. Registration happens at startup; lookups after that
//! are read-mostly.

use std::collections::HashMap;
use std::sync::Arc;

use ar_domain::error::{Error, ProviderErrorCode, Result};

use crate::traits::ProviderAdapter;

#[derive(Default)]
pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    order: Vec<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter. Re-registering an id overwrites the adapter and
    /// keeps its original position.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        let id = adapter.provider_id().to_owned();
        if self.adapters.insert(id.clone(), adapter).is_none() {
            self.order.push(id.clone());
        }
        tracing::info!(provider_id = %id, "registered provider adapter");
    }

    /// Look up an adapter by id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider_id).cloned()
    }

    /// Look up an adapter, failing with a non-retryable `INTERNAL` error
    /// when absent. Absence is a wiring bug, not a provider fault.
    pub fn get_or_throw(&self, provider_id: &str) -> Result<Arc<dyn ProviderAdapter>> {
        self.get(provider_id).ok_or_else(|| {
            Error::provider(
                provider_id,
                ProviderErrorCode::Internal,
                format!("provider {provider_id} is not registered"),
            )
        })
    }

    /// Registered ids, in registration order.
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
