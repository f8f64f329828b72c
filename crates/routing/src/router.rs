//! The crate facade: plan a request, fetch it, report per member.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::info;
use serde::Serialize;

use crate::catalog::{CatalogStore, IndicatorCatalog};
use crate::config::RoutingConfig;
use crate::errors::RoutingError;
use crate::fetch::{FetchDiagnostics, FetchOrchestrator, ProviderRegistry, ProviderStatus};
use crate::geography::GeographyResolver;
use crate::models::{
    Country, DataRequest, FetchResult, FetchedSeries, ProviderKind, RequestStatus,
    RoutingDecision,
};
use crate::provider::{ProviderAdapter, SemanticIndex};
use crate::routing::{RoutingEngine, RoutingPlan};

/// Everything `resolve_and_fetch` learned about one request.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingResponse {
    /// One entry per requested member, keyed by country.
    pub results: BTreeMap<Country, FetchResult>,
    pub decision: RoutingDecision,
    /// Attempt log per member.
    pub diagnostics: BTreeMap<Country, FetchDiagnostics>,
    pub status: RequestStatus,
}

impl RoutingResponse {
    pub fn series(&self) -> impl Iterator<Item = &FetchedSeries> {
        self.results.values().filter_map(FetchResult::series)
    }

    /// Members with no accepted series.
    pub fn failed_members(&self) -> Vec<Country> {
        self.results
            .iter()
            .filter(|(_, result)| !result.is_success())
            .map(|(country, _)| *country)
            .collect()
    }
}

/// Routes abstract data requests to providers and fetches them.
///
/// Holds the catalog snapshot store, the registered adapters and their
/// provider pacing and health records. Cheap to share behind an `Arc`.
pub struct DataRouter {
    config: RoutingConfig,
    catalog: CatalogStore,
    geography: GeographyResolver,
    registry: ProviderRegistry,
    semantic: Option<Arc<dyn SemanticIndex>>,
}

impl DataRouter {
    pub fn builder() -> DataRouterBuilder {
        DataRouterBuilder::default()
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn geography(&self) -> GeographyResolver {
        self.geography
    }

    /// The current catalog snapshot.
    pub fn catalog(&self) -> Arc<IndicatorCatalog> {
        self.catalog.snapshot()
    }

    /// Swap in a catalog parsed from JSON. Requests already in flight keep
    /// the snapshot they started with.
    pub fn reload_catalog(&self, json: &str) -> Result<(), RoutingError> {
        self.catalog.reload_from_json(json)
    }

    pub fn providers(&self) -> Vec<ProviderKind> {
        self.registry.providers()
    }

    /// Health of every provider that has been called so far.
    pub fn provider_health(&self) -> Vec<ProviderStatus> {
        self.registry.health().statuses()
    }

    /// Forget a provider's failures and end any cooldown.
    pub fn reset_provider_health(&self, provider: ProviderKind) {
        self.registry.health().reset(provider);
    }

    /// Routing only: resolve geography and concept and rank candidates
    /// without calling any provider.
    pub async fn plan(&self, request: &DataRequest) -> Result<RoutingPlan, RoutingError> {
        let catalog = self.catalog.snapshot();
        self.plan_with(&catalog, request).await
    }

    async fn plan_with(
        &self,
        catalog: &IndicatorCatalog,
        request: &DataRequest,
    ) -> Result<RoutingPlan, RoutingError> {
        let mut engine = RoutingEngine::new(&self.config, catalog, self.geography);
        if let Some(index) = &self.semantic {
            engine = engine.with_semantic_index(index.as_ref());
        }
        engine.plan(request).await
    }

    /// Plan the request, then fetch every requested member.
    ///
    /// Returns `Err` only for resolution failures (unknown geography or
    /// provider, ambiguous concept, nothing routable). Per-member failures,
    /// including timeouts, are reported in the response.
    pub async fn resolve_and_fetch(&self, request: &DataRequest) -> Result<RoutingResponse, RoutingError> {
        let catalog = self.catalog.snapshot();
        let plan = self.plan_with(&catalog, request).await?;
        let timeout = request.timeout().unwrap_or(self.config.request_timeout);

        let orchestrator = FetchOrchestrator::new(&self.config, &catalog, self.geography, &self.registry);
        let outcomes = orchestrator
            .fetch_all(
                plan.decision(),
                &plan.geography().members,
                request.date_range.as_ref(),
                timeout,
            )
            .await;

        let mut results = BTreeMap::new();
        let mut diagnostics = BTreeMap::new();
        for (member, outcome) in outcomes {
            results.insert(member, outcome.result);
            diagnostics.insert(member, outcome.diagnostics);
        }
        let succeeded = results.values().filter(|r| r.is_success()).count();
        let status = RequestStatus::from_counts(succeeded, results.len());
        info!(
            "'{}' for {}: {}/{} member(s) fetched ({:?})",
            request.indicator_concept,
            plan.geography(),
            succeeded,
            results.len(),
            status
        );

        Ok(RoutingResponse {
            results,
            decision: plan.into_decision(),
            diagnostics,
            status,
        })
    }
}

#[derive(Default)]
pub struct DataRouterBuilder {
    config: Option<RoutingConfig>,
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    semantic: Option<Arc<dyn SemanticIndex>>,
    catalog: Option<IndicatorCatalog>,
}

impl DataRouterBuilder {
    pub fn config(mut self, config: RoutingConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn adapters(mut self, adapters: impl IntoIterator<Item = Arc<dyn ProviderAdapter>>) -> Self {
        self.adapters.extend(adapters);
        self
    }

    pub fn semantic_index(mut self, index: Arc<dyn SemanticIndex>) -> Self {
        self.semantic = Some(index);
        self
    }

    /// Use this catalog instead of the embedded one.
    pub fn catalog(mut self, catalog: IndicatorCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn build(self) -> DataRouter {
        let config = self.config.unwrap_or_default();
        let catalog = self
            .catalog
            .unwrap_or_else(IndicatorCatalog::embedded)
            .with_priority(config.provider_priority.clone())
            .with_fuzzy(config.fuzzy.clone());
        let registry = ProviderRegistry::new(self.adapters, config.provider_health.clone());
        info!(
            "Data router ready: {} concept(s), providers [{}], semantic index {}",
            catalog.len(),
            registry
                .providers()
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            if self.semantic.is_some() { "on" } else { "off" }
        );
        DataRouter {
            config,
            catalog: CatalogStore::new(catalog),
            geography: GeographyResolver::new(),
            registry,
            semantic: self.semantic,
        }
    }
}
