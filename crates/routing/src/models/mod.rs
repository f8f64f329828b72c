//! Routing data models
//!
//! - `country` - Canonical countries and code systems (Country, CodeFormat)
//! - `provider` - The closed provider set and its coverage (ProviderKind, Coverage)
//! - `geography` - Resolved tokens, detections and candidate scopes
//! - `request` - Inbound request shape (DataRequest, DateRange)
//! - `routing` - Candidates and decisions (RoutingCandidate, RoutingDecision)
//! - `series` - Raw and normalized observations
//! - `fetch` - Per-member outcomes (FetchResult, FetchFailure)

mod country;
mod fetch;
mod geography;
mod provider;
mod request;
mod routing;
mod series;

pub use country::{CodeFormat, Country, CountryRecord};
pub use fetch::{FetchFailure, FetchResult, RequestStatus};
pub use geography::{
    DetectedGeography, GeographyScope, RequestGeography, ResolvedGeography,
};
pub use provider::{Coverage, ProviderKind};
pub use request::{DataRequest, DateRange};
pub use routing::{RoutingCandidate, RoutingDecision, RoutingTier};
pub use series::{FetchedSeries, Observation, ProviderSeries, RawObservation, SeriesMetadata};
