use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::country::{CodeFormat, Country};
use crate::errors::RoutingError;

/// The closed set of data providers the engine can route to.
///
/// Adding a provider means adding a variant here, an adapter implementing
/// [`ProviderAdapter`](crate::provider::ProviderAdapter), and catalog entries.
/// The routing logic itself does not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderKind {
    WorldBank,
    Imf,
    Oecd,
    Eurostat,
    Fred,
    #[serde(rename = "STATCAN")]
    StatCan,
    Comtrade,
    Bis,
}

const OECD_AND_PARTNERS: &[&str] = &[
    "AU", "AT", "BE", "CA", "CL", "CO", "CR", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU",
    "IS", "IE", "IL", "IT", "JP", "KR", "LV", "LT", "LU", "MX", "NL", "NZ", "NO", "PL", "PT",
    "SK", "SI", "ES", "SE", "CH", "TR", "GB", "US", "AR", "BR", "CN", "IN", "ID", "RU", "SA",
    "ZA",
];

const EUROSTAT_REPORTERS: &[&str] = &[
    "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE", "IT",
    "LV", "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE", "IS", "LI", "NO",
    "CH", "TR",
];

impl ProviderKind {
    pub const ALL: [Self; 8] = [
        Self::WorldBank,
        Self::Imf,
        Self::Oecd,
        Self::Eurostat,
        Self::Fred,
        Self::StatCan,
        Self::Comtrade,
        Self::Bis,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WorldBank => "WORLD_BANK",
            Self::Imf => "IMF",
            Self::Oecd => "OECD",
            Self::Eurostat => "EUROSTAT",
            Self::Fred => "FRED",
            Self::StatCan => "STATCAN",
            Self::Comtrade => "COMTRADE",
            Self::Bis => "BIS",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::WorldBank => "World Bank",
            Self::Imf => "International Monetary Fund",
            Self::Oecd => "OECD",
            Self::Eurostat => "Eurostat",
            Self::Fred => "FRED (St. Louis Fed)",
            Self::StatCan => "Statistics Canada",
            Self::Comtrade => "UN Comtrade",
            Self::Bis => "Bank for International Settlements",
        }
    }

    /// Country code system expected in the `country` fetch parameter.
    pub const fn code_format(self) -> CodeFormat {
        match self {
            Self::WorldBank | Self::Imf | Self::Eurostat | Self::Bis => CodeFormat::Alpha2,
            Self::Oecd => CodeFormat::Alpha3,
            Self::Fred | Self::StatCan => CodeFormat::Alpha2,
            Self::Comtrade => CodeFormat::ComtradeReporter,
        }
    }

    /// Default geographic coverage. Catalog entries may narrow it per series.
    pub const fn coverage(self) -> Coverage {
        match self {
            Self::WorldBank | Self::Imf | Self::Comtrade | Self::Bis => Coverage::global(),
            Self::Oecd => Coverage::only(OECD_AND_PARTNERS),
            Self::Eurostat => Coverage::only(EUROSTAT_REPORTERS),
            Self::Fred => Coverage::only(&["US"]),
            Self::StatCan => Coverage::only(&["CA"]),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = RoutingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key: String = value
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match key.as_str() {
            "worldbank" | "wb" | "wdi" => Ok(Self::WorldBank),
            "imf" | "internationalmonetaryfund" => Ok(Self::Imf),
            "oecd" => Ok(Self::Oecd),
            "eurostat" | "estat" => Ok(Self::Eurostat),
            "fred" | "stlouisfed" => Ok(Self::Fred),
            "statcan" | "statisticscanada" => Ok(Self::StatCan),
            "comtrade" | "uncomtrade" => Ok(Self::Comtrade),
            "bis" | "bankforinternationalsettlements" => Ok(Self::Bis),
            _ => Err(RoutingError::UnknownProvider(value.trim().to_string())),
        }
    }
}

/// Which countries a provider (or a single catalog series) can answer for.
///
/// Uses static slices so `ProviderKind::coverage()` stays allocation free.
#[derive(Clone, Copy, Debug)]
pub struct Coverage {
    /// If Some, only these alpha-2 codes are covered.
    allow: Option<&'static [&'static str]>,
}

impl Coverage {
    pub const fn global() -> Self {
        Self { allow: None }
    }

    pub const fn only(countries: &'static [&'static str]) -> Self {
        Self {
            allow: Some(countries),
        }
    }

    pub fn is_global(&self) -> bool {
        self.allow.is_none()
    }

    pub fn covers(&self, country: &Country) -> bool {
        match self.allow {
            None => true,
            Some(list) => list.iter().any(|&code| code == country.alpha2()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_aliases() {
        assert_eq!("World Bank".parse::<ProviderKind>().unwrap(), ProviderKind::WorldBank);
        assert_eq!("world_bank".parse::<ProviderKind>().unwrap(), ProviderKind::WorldBank);
        assert_eq!(" FRED ".parse::<ProviderKind>().unwrap(), ProviderKind::Fred);
        assert_eq!("UN Comtrade".parse::<ProviderKind>().unwrap(), ProviderKind::Comtrade);
    }

    #[test]
    fn test_parse_unknown_provider() {
        let err = "Bloomberg".parse::<ProviderKind>().unwrap_err();
        assert!(matches!(err, RoutingError::UnknownProvider(name) if name == "Bloomberg"));
    }

    #[test]
    fn test_fred_covers_only_us() {
        let us = Country::from_alpha2("US").unwrap();
        let ca = Country::from_alpha2("CA").unwrap();
        assert!(ProviderKind::Fred.coverage().covers(&us));
        assert!(!ProviderKind::Fred.coverage().covers(&ca));
        assert!(ProviderKind::WorldBank.coverage().covers(&ca));
    }

    #[test]
    fn test_serde_ids_match_as_str() {
        for provider in ProviderKind::ALL {
            let json = serde_json::to_string(&provider).unwrap();
            assert_eq!(json, format!("\"{}\"", provider.as_str()));
        }
    }

    #[test]
    fn test_coverage_is_const() {
        const _: Coverage = ProviderKind::Eurostat.coverage();
        const _: Coverage = Coverage::global();
    }
}
