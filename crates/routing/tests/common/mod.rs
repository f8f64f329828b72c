//! In-memory provider adapters and semantic index shared by the
//! integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use econroute_routing::{
    Country, FetchParams, ProviderAdapter, ProviderKind, ProviderSeries, RateLimit,
    RawObservation, RoutingError, SemanticHit, SemanticIndex, SeriesMetadata,
};

/// What a mock adapter answers for one country code.
#[derive(Clone, Debug)]
pub enum Reply {
    /// Annual observations (one of them null), metadata naming the requested country.
    Data,
    /// Data whose metadata names another country.
    ClaimsCountry(String),
    /// Data with a custom series description.
    Describe(String),
    /// A series with no observations.
    Empty,
    /// The adapter's "no data" signal.
    Missing,
    /// "No data", but only after a delay.
    MissingAfter(Duration),
    /// Data whose metadata does not name any country.
    Unlabelled,
    Transport,
    /// Never answers within any reasonable deadline.
    Hang,
}

pub struct MockAdapter {
    kind: ProviderKind,
    default: Reply,
    per_country: HashMap<String, Reply>,
    calls: AtomicUsize,
    countries: Mutex<Vec<String>>,
}

impl MockAdapter {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            default: Reply::Data,
            per_country: HashMap::new(),
            calls: AtomicUsize::new(0),
            countries: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(mut self, reply: Reply) -> Self {
        self.default = reply;
        self
    }

    /// Override the reply for one country code, in the provider's format.
    pub fn reply_for(mut self, code: &str, reply: Reply) -> Self {
        self.per_country.insert(code.to_string(), reply);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Country codes this adapter was asked for, in call order.
    pub fn countries(&self) -> Vec<String> {
        self.countries.lock().unwrap().clone()
    }

    fn series(country_text: &str, description: &str) -> ProviderSeries {
        ProviderSeries {
            observations: vec![
                RawObservation::new("2019", Some(1.5)),
                RawObservation::new("2020", Some(2.5)),
                RawObservation::new("2021", None),
                RawObservation::new("2022", Some(3.5)),
            ],
            metadata: SeriesMetadata {
                country_text: Some(country_text.to_string()),
                description: description.to_string(),
            },
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(60_000, 1_000)
    }

    async fn fetch(&self, code: &str, params: &FetchParams) -> Result<ProviderSeries, RoutingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let country = params.get("country").cloned().unwrap_or_default();
        self.countries.lock().unwrap().push(country.clone());

        let reply = self.per_country.get(&country).unwrap_or(&self.default).clone();
        match reply {
            Reply::Data => Ok(Self::series(&country, "Mock series")),
            Reply::ClaimsCountry(other) => Ok(Self::series(&other, "Mock series")),
            Reply::Describe(description) => Ok(Self::series(&country, &description)),
            Reply::Unlabelled => {
                let mut series = Self::series(&country, "Mock series");
                series.metadata.country_text = None;
                Ok(series)
            }
            Reply::Empty => Ok(ProviderSeries::default()),
            Reply::Missing => Err(RoutingError::NotAvailable {
                provider: self.kind,
                message: format!("no {} for {}", code, country),
            }),
            Reply::MissingAfter(delay) => {
                tokio::time::sleep(delay).await;
                Err(RoutingError::NotAvailable {
                    provider: self.kind,
                    message: format!("no {} for {}", code, country),
                })
            }
            Reply::Transport => Err(RoutingError::Transport {
                provider: self.kind,
                message: "connection reset by peer".to_string(),
            }),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(ProviderSeries::default())
            }
        }
    }
}

pub struct MockIndex {
    hits: Vec<SemanticHit>,
    calls: AtomicUsize,
}

impl MockIndex {
    pub fn new(hits: &[(&str, &str, &str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            hits: hits
                .iter()
                .map(|(provider, code, description, score)| SemanticHit {
                    provider: provider.to_string(),
                    code: code.to_string(),
                    description: description.to_string(),
                    score: *score,
                })
                .collect(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SemanticIndex for MockIndex {
    async fn search(
        &self,
        _text: &str,
        provider_filter: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SemanticHit>, RoutingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .hits
            .iter()
            .filter(|h| provider_filter.map_or(true, |p| h.provider == p))
            .take(limit)
            .cloned()
            .collect())
    }
}

pub fn country(code: &str) -> Country {
    Country::from_alpha2(code).unwrap()
}
