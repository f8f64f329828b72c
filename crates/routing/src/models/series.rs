use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::country::Country;
use super::provider::ProviderKind;
use super::routing::RoutingTier;

/// One observation as an adapter returns it: a provider period label and
/// an optional value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub date: String,
    pub value: Option<f64>,
}

impl RawObservation {
    pub fn new(date: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            date: date.into(),
            value,
        }
    }
}

/// Descriptive metadata attached to a fetched series.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesMetadata {
    /// Country name or code embedded in the provider's metadata, if any.
    #[serde(default)]
    pub country_text: Option<String>,
    /// Series title / description.
    #[serde(default)]
    pub description: String,
}

/// What a provider adapter hands back for one fetch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSeries {
    pub observations: Vec<RawObservation>,
    pub metadata: SeriesMetadata,
}

/// A normalized observation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

/// An accepted series, tagged with the country it was validated against.
#[derive(Clone, Debug, Serialize)]
pub struct FetchedSeries {
    pub country: Country,
    pub provider: ProviderKind,
    pub code: String,
    pub tier: RoutingTier,
    pub description: String,
    pub observations: Vec<Observation>,
    /// False when the provider sent no country metadata to check against.
    pub country_verified: bool,
}
