//! Router configuration.
//!
//! Everything here is a tuning knob. The fuzzy thresholds in particular were
//! picked against a handful of known-bad queries and should be re-tuned
//! against real traffic rather than treated as fixed.

use std::collections::BTreeMap;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::fetch::HealthConfig;
use crate::models::ProviderKind;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.5;
const DEFAULT_SEMANTIC_LIMIT: usize = 10;
const DEFAULT_SEMANTIC_SCORE_FLOOR: f64 = 0.6;

/// Length-adjusted fuzzy matching thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    /// `(max_len, threshold)` pairs, ascending by `max_len`. A query whose
    /// normalized length is at most `max_len` needs at least `threshold`.
    pub bands: Vec<(usize, f64)>,
    /// Threshold for queries longer than every band.
    pub long_threshold: f64,
    /// Two different concepts scoring within this margin are ambiguous.
    pub ambiguity_margin: f64,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            bands: vec![(4, 0.95), (8, 0.88), (15, 0.8)],
            long_threshold: 0.75,
            ambiguity_margin: 0.03,
        }
    }
}

impl FuzzyConfig {
    /// Minimum similarity for a query of `len` characters.
    pub fn threshold_for(&self, len: usize) -> f64 {
        self.bands
            .iter()
            .find(|(max_len, _)| len <= *max_len)
            .map(|(_, threshold)| *threshold)
            .unwrap_or(self.long_threshold)
    }
}

/// Configuration for a [`DataRouter`](crate::DataRouter).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Tie-break order for equal confidences. Providers not listed rank last.
    pub provider_priority: Vec<ProviderKind>,
    /// Tier 5 provider, used only when nothing else matched.
    pub default_provider: Option<ProviderKind>,
    /// Catalog candidates below this do not stop escalation to the semantic index.
    pub confidence_floor: f64,
    pub semantic_limit: usize,
    /// Semantic hits scoring below this are dropped.
    pub semantic_score_floor: f64,
    pub fuzzy: FuzzyConfig,
    /// Alpha-2 code → provider that owns that country's statistics.
    pub geography_rules: BTreeMap<String, ProviderKind>,
    /// Bound on a whole fetch, including every group member.
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,
    /// Reject series whose metadata carries no country text.
    pub require_country_metadata: bool,
    pub provider_health: HealthConfig,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            provider_priority: vec![
                ProviderKind::WorldBank,
                ProviderKind::Imf,
                ProviderKind::Oecd,
                ProviderKind::Eurostat,
                ProviderKind::Bis,
                ProviderKind::Comtrade,
                ProviderKind::StatCan,
                ProviderKind::Fred,
            ],
            default_provider: Some(ProviderKind::WorldBank),
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            semantic_limit: DEFAULT_SEMANTIC_LIMIT,
            semantic_score_floor: DEFAULT_SEMANTIC_SCORE_FLOOR,
            fuzzy: FuzzyConfig::default(),
            geography_rules: BTreeMap::from([
                ("US".to_string(), ProviderKind::Fred),
                ("CA".to_string(), ProviderKind::StatCan),
            ]),
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            require_country_metadata: false,
            provider_health: HealthConfig::default(),
        }
    }
}

impl RoutingConfig {
    /// Defaults overridden by `ECONROUTE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("ECONROUTE_DEFAULT_PROVIDER") {
            match raw.trim() {
                "" | "none" | "NONE" => config.default_provider = None,
                name => match name.parse::<ProviderKind>() {
                    Ok(provider) => config.default_provider = Some(provider),
                    Err(e) => warn!("Ignoring ECONROUTE_DEFAULT_PROVIDER: {}", e),
                },
            }
        }

        if let Some(raw) = lookup("ECONROUTE_TIMEOUT_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.request_timeout = Duration::from_millis(ms),
                _ => warn!("Ignoring ECONROUTE_TIMEOUT_MS='{}'", raw),
            }
        }

        if let Some(raw) = lookup("ECONROUTE_CONFIDENCE_FLOOR") {
            match raw.trim().parse::<f64>() {
                Ok(floor) if (0.0..=1.0).contains(&floor) => config.confidence_floor = floor,
                _ => warn!("Ignoring ECONROUTE_CONFIDENCE_FLOOR='{}'", raw),
            }
        }

        if let Some(raw) = lookup("ECONROUTE_PROVIDER_PRIORITY") {
            let parsed = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse::<ProviderKind>)
                .collect::<Result<Vec<_>, _>>();
            match parsed {
                Ok(priority) if !priority.is_empty() => config.provider_priority = priority,
                Ok(_) => warn!("Ignoring empty ECONROUTE_PROVIDER_PRIORITY"),
                Err(e) => warn!("Ignoring ECONROUTE_PROVIDER_PRIORITY: {}", e),
            }
        }

        config
    }

    /// Geography rule for a country, if one is configured.
    pub fn rule_for(&self, alpha2: &str) -> Option<ProviderKind> {
        self.geography_rules.get(alpha2).copied()
    }
}

/// Serde adapter storing a `Duration` as integer milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_threshold_is_stricter_for_short_queries() {
        let fuzzy = FuzzyConfig::default();
        assert!(fuzzy.threshold_for(3) > fuzzy.threshold_for(12));
        assert!(fuzzy.threshold_for(12) > fuzzy.threshold_for(40));
        assert_eq!(fuzzy.threshold_for(40), fuzzy.long_threshold);
    }

    #[test]
    fn test_from_env_overrides() {
        let config = RoutingConfig::from_lookup(lookup(&[
            ("ECONROUTE_DEFAULT_PROVIDER", "imf"),
            ("ECONROUTE_TIMEOUT_MS", "1500"),
            ("ECONROUTE_CONFIDENCE_FLOOR", "0.7"),
            ("ECONROUTE_PROVIDER_PRIORITY", "oecd, world bank"),
        ]));
        assert_eq!(config.default_provider, Some(ProviderKind::Imf));
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.confidence_floor, 0.7);
        assert_eq!(
            config.provider_priority,
            vec![ProviderKind::Oecd, ProviderKind::WorldBank]
        );
    }

    #[test]
    fn test_from_env_ignores_malformed_values() {
        let config = RoutingConfig::from_lookup(lookup(&[
            ("ECONROUTE_DEFAULT_PROVIDER", "bloomberg"),
            ("ECONROUTE_TIMEOUT_MS", "soon"),
            ("ECONROUTE_CONFIDENCE_FLOOR", "2.5"),
            ("ECONROUTE_PROVIDER_PRIORITY", "oecd,nope"),
        ]));
        let defaults = RoutingConfig::default();
        assert_eq!(config.default_provider, defaults.default_provider);
        assert_eq!(config.request_timeout, defaults.request_timeout);
        assert_eq!(config.confidence_floor, defaults.confidence_floor);
        assert_eq!(config.provider_priority, defaults.provider_priority);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let json = r#"{"request_timeout": 250, "geography_rules": {"DE": "EUROSTAT"}}"#;
        let config: RoutingConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert_eq!(config.rule_for("DE"), Some(ProviderKind::Eurostat));
        assert_eq!(config.rule_for("US"), None);
        assert_eq!(config.confidence_floor, DEFAULT_CONFIDENCE_FLOOR);
    }
}
