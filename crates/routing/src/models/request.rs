use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A structured data request as emitted by the intent-extraction layer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DataRequest {
    /// Concept id or free text ("unemployment_rate", "jobless rate").
    pub indicator_concept: String,
    /// Countries, aliases or group names ("G7", "UK", "DEU").
    pub geography_tokens: Vec<String>,
    /// Provider name forcing tier 1 routing.
    #[serde(default)]
    pub provider_override: Option<String>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    /// Bound for the whole fetch; the router's configured timeout applies if unset.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl DataRequest {
    pub fn new<I, S>(indicator_concept: impl Into<String>, geography_tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            indicator_concept: indicator_concept.into(),
            geography_tokens: geography_tokens.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_provider_override(mut self, provider: impl Into<String>) -> Self {
        self.provider_override = Some(provider.into());
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Inclusive date bounds. Either side may be open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s > e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserializes_with_defaults() {
        let json = r#"{"indicator_concept": "gdp", "geography_tokens": ["G7"]}"#;
        let request: DataRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.indicator_concept, "gdp");
        assert_eq!(request.geography_tokens, vec!["G7"]);
        assert!(request.provider_override.is_none());
        assert!(request.timeout().is_none());
    }

    #[test]
    fn test_date_range_contains() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        let range = DateRange::new(Some(d(2010, 1, 1)), Some(d(2020, 12, 31)));
        assert!(range.contains(d(2015, 6, 1)));
        assert!(range.contains(d(2020, 12, 31)));
        assert!(!range.contains(d(2009, 12, 31)));
        assert!(DateRange::default().contains(d(1900, 1, 1)));
        assert!(DateRange::new(Some(d(2020, 1, 1)), Some(d(2010, 1, 1))).is_inverted());
    }
}
