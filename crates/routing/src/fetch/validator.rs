//! Checks applied to every fetched series before it is accepted.
//!
//! - Country match: the country named in the series metadata must resolve
//!   to the requested member. A series with no country metadata passes
//!   unverified unless strict mode is on.
//! - Semantic sanity: the series description must not trip the
//!   false-positive rules, whatever tier produced the candidate. Without a
//!   resolved concept the rules implied by the query text apply.

use std::collections::BTreeSet;

use log::{debug, warn};

use crate::catalog::{IndicatorCatalog, IndicatorGate};
use crate::geography::GeographyResolver;
use crate::models::{Country, FetchFailure, ResolvedGeography, SeriesMetadata};

pub struct SeriesValidator<'a> {
    geography: GeographyResolver,
    catalog: &'a IndicatorCatalog,
    require_country_metadata: bool,
}

impl<'a> SeriesValidator<'a> {
    pub fn new(
        geography: GeographyResolver,
        catalog: &'a IndicatorCatalog,
        require_country_metadata: bool,
    ) -> Self {
        Self {
            geography,
            catalog,
            require_country_metadata,
        }
    }

    /// Run every check against the metadata of a series fetched for
    /// `requested`. `Ok(true)` means the metadata confirmed the country,
    /// `Ok(false)` that there was no country metadata to check.
    pub fn validate(
        &self,
        requested: &Country,
        gate: IndicatorGate<'_>,
        metadata: &SeriesMetadata,
    ) -> Result<bool, FetchFailure> {
        let verified = self.check_country(requested, metadata)?;
        self.check_indicator(gate, metadata)?;
        Ok(verified)
    }

    pub fn check_country(&self, requested: &Country, metadata: &SeriesMetadata) -> Result<bool, FetchFailure> {
        let text = metadata.country_text.as_deref().map(str::trim).unwrap_or("");
        if text.is_empty() {
            if self.require_country_metadata {
                return Err(FetchFailure::Ambiguous {
                    country_text: String::new(),
                });
            }
            warn!("No country metadata, accepting series for {} unverified", requested);
            return Ok(false);
        }

        let mismatch = || FetchFailure::CountryMismatch {
            expected: requested.alpha2().to_string(),
            found: text.to_string(),
        };

        // The whole text is a code, name or alias.
        if let Ok(country) = self.geography.normalize(text) {
            return if country == *requested { Ok(true) } else { Err(mismatch()) };
        }
        // An aggregate such as "Euro area" is not the member's own data.
        if self.geography.expand_group(text).is_some() {
            return Err(mismatch());
        }

        let mut countries = BTreeSet::new();
        let mut groups = 0;
        for detected in self.geography.detect_in_text(text) {
            match detected.geography {
                ResolvedGeography::Country { country } => {
                    countries.insert(country);
                }
                ResolvedGeography::Group { .. } => groups += 1,
            }
        }

        if countries.len() == 1 && countries.contains(requested) {
            return Ok(true);
        }
        if (countries.is_empty() && groups == 0) || countries.contains(requested) {
            return Err(FetchFailure::Ambiguous {
                country_text: text.to_string(),
            });
        }
        Err(mismatch())
    }

    pub fn check_indicator(&self, gate: IndicatorGate<'_>, metadata: &SeriesMetadata) -> Result<(), FetchFailure> {
        if metadata.description.trim().is_empty() {
            return Ok(());
        }
        if gate.rejects(self.catalog, &metadata.description) {
            debug!("'{}' fails the indicator check for {}", metadata.description, gate);
            return Err(FetchFailure::IndicatorMismatch {
                description: metadata.description.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(country_text: Option<&str>, description: &str) -> SeriesMetadata {
        SeriesMetadata {
            country_text: country_text.map(str::to_string),
            description: description.to_string(),
        }
    }

    fn country(code: &str) -> Country {
        Country::from_alpha2(code).unwrap()
    }

    fn check(text: Option<&str>, requested: &str) -> Result<bool, FetchFailure> {
        let catalog = IndicatorCatalog::embedded();
        SeriesValidator::new(GeographyResolver::new(), &catalog, false)
            .check_country(&country(requested), &metadata(text, ""))
    }

    #[test]
    fn test_exact_country_accepted() {
        assert_eq!(check(Some("Canada"), "CA"), Ok(true));
        assert_eq!(check(Some("CAN"), "CA"), Ok(true));
        assert_eq!(check(Some("Unemployment rate, Canada, monthly"), "CA"), Ok(true));
    }

    #[test]
    fn test_other_country_rejected() {
        assert_eq!(
            check(Some("United States"), "CA"),
            Err(FetchFailure::CountryMismatch {
                expected: "CA".into(),
                found: "United States".into(),
            })
        );
        assert!(matches!(
            check(Some("Civilian unemployment rate, United States"), "CA"),
            Err(FetchFailure::CountryMismatch { .. })
        ));
    }

    #[test]
    fn test_group_aggregate_rejected() {
        assert!(matches!(
            check(Some("European Union"), "DE"),
            Err(FetchFailure::CountryMismatch { .. })
        ));
    }

    #[test]
    fn test_unrecognised_or_mixed_is_ambiguous() {
        assert!(matches!(
            check(Some("Region 42"), "DE"),
            Err(FetchFailure::Ambiguous { .. })
        ));
        assert!(matches!(
            check(Some("Canada and United States combined"), "CA"),
            Err(FetchFailure::Ambiguous { .. })
        ));
    }

    #[test]
    fn test_missing_metadata_policy() {
        let catalog = IndicatorCatalog::embedded();
        let lenient = SeriesValidator::new(GeographyResolver::new(), &catalog, false);
        let strict = SeriesValidator::new(GeographyResolver::new(), &catalog, true);
        assert_eq!(lenient.check_country(&country("FR"), &metadata(None, "")), Ok(false));
        assert_eq!(lenient.check_country(&country("FR"), &metadata(Some("  "), "")), Ok(false));
        assert!(strict.check_country(&country("FR"), &metadata(None, "")).is_err());
    }

    #[test]
    fn test_indicator_sanity_check() {
        let catalog = IndicatorCatalog::embedded();
        let validator = SeriesValidator::new(GeographyResolver::new(), &catalog, false);
        let m2_concept = IndicatorGate::Concept("m2_money_supply");
        let cm2 = metadata(Some("China"), "Pupils enrolled in CM2, total");
        assert!(matches!(
            validator.validate(&country("CN"), m2_concept, &cm2),
            Err(FetchFailure::IndicatorMismatch { .. })
        ));
        let m2 = metadata(Some("China"), "Broad money (M2)");
        assert_eq!(validator.validate(&country("CN"), m2_concept, &m2), Ok(true));
    }

    #[test]
    fn test_indicator_check_without_concept_uses_query() {
        let catalog = IndicatorCatalog::embedded();
        let validator = SeriesValidator::new(GeographyResolver::new(), &catalog, false);
        let cm2 = metadata(Some("China"), "Pupils enrolled in CM2, total");
        assert!(matches!(
            validator.check_indicator(IndicatorGate::Query("M2 monetary aggregate"), &cm2),
            Err(FetchFailure::IndicatorMismatch { .. })
        ));
        assert!(validator
            .check_indicator(IndicatorGate::Query("primary school pupils"), &cm2)
            .is_ok());
    }
}
