//! Snapshot holder for hot-reloading the indicator catalog.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{info, warn};

use super::IndicatorCatalog;
use crate::errors::RoutingError;

/// Holds the current catalog snapshot.
///
/// Readers take an `Arc` once per request and keep using it even if a reload
/// happens mid-request. Reloads build a complete new catalog first and then
/// swap the pointer, so no reader ever sees a half-updated catalog.
pub struct CatalogStore {
    current: RwLock<Arc<IndicatorCatalog>>,
}

impl CatalogStore {
    pub fn new(catalog: IndicatorCatalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Arc<IndicatorCatalog>> {
        self.current.read().unwrap_or_else(|poisoned| {
            warn!("Catalog store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arc<IndicatorCatalog>> {
        self.current.write().unwrap_or_else(|poisoned| {
            warn!("Catalog store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<IndicatorCatalog> {
        Arc::clone(&self.read())
    }

    /// Swap in a new catalog. Readers holding the old snapshot keep it.
    pub fn replace(&self, catalog: IndicatorCatalog) {
        let next = Arc::new(catalog);
        let count = next.len();
        let previous = std::mem::replace(&mut *self.write(), next);
        info!(
            "Indicator catalog replaced ({} -> {} concepts)",
            previous.len(),
            count
        );
    }

    /// Parse, validate and swap in a catalog from JSON, keeping the current
    /// priority and fuzzy settings. On error the current snapshot stays.
    pub fn reload_from_json(&self, json: &str) -> Result<(), RoutingError> {
        let current = self.snapshot();
        let catalog = IndicatorCatalog::from_json(json)?
            .with_priority(current.priority().to_vec())
            .with_fuzzy(current.fuzzy().clone());
        self.replace(catalog);
        Ok(())
    }
}
