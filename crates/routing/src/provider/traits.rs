//! Provider adapter trait definition.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::errors::RoutingError;
use crate::models::{ProviderKind, ProviderSeries};

use super::capabilities::RateLimit;

/// Parameters passed to an adapter.
///
/// Always carries `country` in the provider's own code format; `start` and
/// `end` (ISO dates) are present when the request had a date range.
pub type FetchParams = BTreeMap<String, String>;

/// One external data provider.
///
/// Adapters do a single fetch per call. Retrying a flaky endpoint is the
/// adapter's own business; the orchestrator never calls the same candidate
/// twice for one member.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use econroute_routing::provider::{FetchParams, ProviderAdapter};
///
/// struct WorldBankClient { http: reqwest::Client }
///
/// #[async_trait]
/// impl ProviderAdapter for WorldBankClient {
///     fn kind(&self) -> ProviderKind {
///         ProviderKind::WorldBank
///     }
///
///     async fn fetch(&self, code: &str, params: &FetchParams) -> Result<ProviderSeries, RoutingError> {
///         // GET /v2/country/{country}/indicator/{code}
///     }
/// }
/// ```
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which provider this adapter talks to.
    fn kind(&self) -> ProviderKind;

    /// Rate limits to apply when calling this provider.
    fn rate_limit(&self) -> RateLimit {
        RateLimit::default()
    }

    /// Fetch one series.
    ///
    /// Return `RoutingError::NotAvailable` when the provider has no data for
    /// this code and country, and a transport-class error (`Transport`,
    /// `Timeout`, `RateLimited`) when the call itself failed.
    async fn fetch(&self, code: &str, params: &FetchParams) -> Result<ProviderSeries, RoutingError>;
}
