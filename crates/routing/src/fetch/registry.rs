//! Registered provider adapters, their pacing and their health records.

use std::collections::HashMap;
use std::sync::Arc;

use log::{info, warn};

use super::{HealthConfig, ProviderHealth, RequestPacer};
use crate::models::ProviderKind;
use crate::provider::ProviderAdapter;

/// One adapter per provider, plus the pacer and health records that
/// outlive any single request.
pub struct ProviderRegistry {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
    health: ProviderHealth,
    pacer: RequestPacer,
}

impl ProviderRegistry {
    /// Register adapters and pace each provider by the adapter's declared
    /// limit. A later adapter for the same provider replaces an earlier one.
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>, health: HealthConfig) -> Self {
        let mut by_kind: HashMap<ProviderKind, Arc<dyn ProviderAdapter>> = HashMap::new();
        for adapter in adapters {
            let kind = adapter.kind();
            if by_kind.insert(kind, adapter).is_some() {
                warn!("Replacing previously registered adapter for {}", kind);
            }
        }
        let limits = by_kind
            .iter()
            .map(|(kind, adapter)| (*kind, adapter.rate_limit()))
            .collect();
        info!("Registered {} provider adapter(s)", by_kind.len());
        Self {
            adapters: by_kind,
            health: ProviderHealth::new(health),
            pacer: RequestPacer::new(limits),
        }
    }

    pub fn adapter(&self, provider: ProviderKind) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider)
    }

    pub fn providers(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.adapters.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn health(&self) -> &ProviderHealth {
        &self.health
    }

    pub fn pacer(&self) -> &RequestPacer {
        &self.pacer
    }
}
