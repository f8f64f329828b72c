//! Econroute Routing Crate
//!
//! Routes provider-agnostic economic data requests ("unemployment rate for
//! the G7") to concrete provider series and fetches them with per-country
//! fallback.
//!
//! # Overview
//!
//! The routing crate supports:
//! - Geography resolution: countries, aliases, code systems and named groups
//! - An indicator catalog with alias and fuzzy concept matching
//! - Tiered routing: override, geography rules, catalog, semantic index, default
//! - Per-member fallback walks with country and indicator validation
//! - Request pacing and cooldowns for unreachable providers
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +---------------------+
//! |   DataRequest    | --> |  GeographyResolver  |  (tokens -> member countries)
//! +------------------+     +---------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          | IndicatorCatalog |  (text -> concept -> series)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |  RoutingEngine   |  (tiers -> RoutingDecision)
//!                          +------------------+
//!                                  |
//!                                  v
//!                         +-------------------+
//!                         | FetchOrchestrator |  (one walk per member)
//!                         +-------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          | ProviderAdapter  |  (World Bank, IMF, OECD, ...)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |   FetchResult    |  (per country)
//!                          +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`DataRouter`] - Entry point: plan and fetch a request
//! - [`DataRequest`] - Concept text, geography tokens, optional override
//! - [`RoutingDecision`] - Primary candidate plus ordered fallbacks
//! - [`FetchResult`] - Accepted series or the reason a member failed
//! - [`ProviderAdapter`] - Implemented once per external provider
//! - [`SemanticIndex`] - Optional vector search over series descriptions

pub mod catalog;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod geography;
pub mod models;
pub mod provider;
pub mod router;
pub mod routing;

// Re-export all public types from models
pub use models::{
    CodeFormat, Country, Coverage, DataRequest, DateRange, DetectedGeography, FetchFailure,
    FetchResult, FetchedSeries, GeographyScope, Observation, ProviderKind, ProviderSeries,
    RawObservation, RequestGeography, RequestStatus, ResolvedGeography, RoutingCandidate,
    RoutingDecision, RoutingTier, SeriesMetadata,
};

// Re-export catalog and geography types
pub use catalog::{
    CatalogEntry, CatalogStore, ConceptMatch, IndicatorCatalog, IndicatorConcept, IndicatorGate,
    MatchKind,
};
pub use geography::GeographyResolver;

// Re-export provider types
pub use provider::{FetchParams, ProviderAdapter, RateLimit, SemanticHit, SemanticIndex};

// Re-export routing and fetch types
pub use fetch::{
    FetchDiagnostics, HealthConfig, HealthState, ProviderAttempt, ProviderStatus, SkipReason,
};
pub use routing::{RoutingEngine, RoutingPlan};

pub use config::{FuzzyConfig, RoutingConfig};
pub use errors::{RetryClass, RoutingError};
pub use router::{DataRouter, DataRouterBuilder, RoutingResponse};
