//! Property-based integration tests for geography, catalog and fetch
//! invariants.
//!
//! These tests verify that universal properties hold across the embedded
//! tables and randomised provider behaviour, using the `proptest` crate for
//! random test case generation.

mod common;

use std::collections::BTreeSet;

use common::{MockAdapter, Reply};
use econroute_routing::{
    CodeFormat, Country, DataRequest, DataRouter, GeographyResolver, IndicatorCatalog, MatchKind,
    ProviderKind, RequestStatus,
};
use proptest::prelude::*;

// =============================================================================
// Generators
// =============================================================================

fn all_countries() -> Vec<Country> {
    GeographyResolver::new().countries().collect()
}

/// Generates a country from the embedded tables.
fn arb_country() -> impl Strategy<Value = Country> {
    proptest::sample::select(all_countries())
}

/// Generates a group token in a random spelling: id, alias or name, with
/// random case.
fn arb_group_token() -> impl Strategy<Value = (String, String)> {
    let ids: Vec<String> = GeographyResolver::new()
        .group_ids()
        .into_iter()
        .map(str::to_string)
        .collect();
    (proptest::sample::select(ids), any::<bool>()).prop_map(|(id, lower)| {
        let token = if lower { id.to_lowercase() } else { id.clone() };
        (id, token)
    })
}

/// Generates a (concept id, alias) pair from the embedded catalog.
fn arb_concept_alias() -> impl Strategy<Value = (String, String)> {
    let catalog = IndicatorCatalog::embedded();
    let pairs: Vec<(String, String)> = catalog
        .concept_ids()
        .flat_map(|id| {
            let concept = catalog.concept(id).unwrap();
            concept
                .aliases
                .iter()
                .map(|alias| (id.to_string(), alias.clone()))
                .collect::<Vec<_>>()
        })
        .collect();
    proptest::sample::select(pairs)
}

/// Random upper/lower casing plus surrounding whitespace.
fn respell(text: &str, mask: &[bool]) -> String {
    let body: String = text
        .chars()
        .zip(mask.iter().cycle())
        .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c })
        .collect();
    format!("  {} ", body)
}

/// A subset of the G20 members.
fn arb_g20_subset() -> impl Strategy<Value = BTreeSet<Country>> {
    let members: Vec<Country> = GeographyResolver::new()
        .expand_group("G20")
        .unwrap()
        .into_iter()
        .collect();
    proptest::sample::subsequence(members.clone(), 0..=members.len())
        .prop_map(|subset| subset.into_iter().collect())
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every group expands to a non-empty set, whatever the spelling, and
    /// expanding again yields the same set.
    #[test]
    fn prop_group_expansion_is_non_empty_and_idempotent((id, token) in arb_group_token()) {
        let geo = GeographyResolver::new();
        let first = geo.expand_group(&token).unwrap();
        let again = geo.expand_group(&token).unwrap();
        let canonical = geo.expand_group(&id).unwrap();

        prop_assert!(!first.is_empty());
        prop_assert_eq!(&first, &again);
        prop_assert_eq!(&first, &canonical);
        let codes: BTreeSet<&str> = first.iter().map(|c| c.alpha2()).collect();
        prop_assert_eq!(codes.len(), first.len());
    }

    /// alpha-2 -> alpha-3 -> alpha-2 and alpha-2 -> numeric -> alpha-2
    /// return the original code.
    #[test]
    fn prop_code_conversions_round_trip(country in arb_country()) {
        let geo = GeographyResolver::new();
        let alpha2 = country.alpha2();

        let alpha3 = geo.convert(alpha2, CodeFormat::Alpha3).unwrap();
        prop_assert_eq!(geo.convert(&alpha3, CodeFormat::Alpha2).unwrap(), alpha2);

        match geo.convert(alpha2, CodeFormat::UnNumeric) {
            Ok(numeric) => {
                prop_assert_eq!(geo.convert(&numeric, CodeFormat::Alpha2).unwrap(), alpha2);
            }
            Err(_) => prop_assert!(country.numeric().is_none()),
        }
    }

    /// A literal alias resolves to its own concept at confidence 1.0 and is
    /// never a false positive for it.
    #[test]
    fn prop_alias_resolves_to_own_concept(
        (id, alias) in arb_concept_alias(),
        mask in proptest::collection::vec(any::<bool>(), 1..8),
    ) {
        let catalog = IndicatorCatalog::embedded();
        let text = respell(&alias, &mask);

        let matched = catalog.resolve_concept(&text).unwrap();
        prop_assert_eq!(&matched.concept, &id);
        prop_assert_eq!(matched.kind, MatchKind::Alias);
        prop_assert_eq!(matched.confidence, 1.0);
        prop_assert!(!catalog.is_false_positive(&text, &id));
    }

    /// Whatever providers claim, an accepted series always belongs to the
    /// member it was fetched for, and members whose every provider lies
    /// come back as explicit failures.
    #[test]
    fn prop_results_belong_to_requested_member(
        members in arb_g20_subset().prop_filter("need a member", |s| !s.is_empty()),
        liars in arb_g20_subset(),
    ) {
        let mut wb = MockAdapter::new(ProviderKind::WorldBank);
        let mut imf = MockAdapter::new(ProviderKind::Imf);
        for liar in &liars {
            // Claim to be a different G20 member.
            let other = if liar.alpha2() == "JP" { "Brazil" } else { "Japan" };
            wb = wb.reply_for(liar.alpha2(), Reply::ClaimsCountry(other.to_string()));
            imf = imf.reply_for(liar.alpha2(), Reply::ClaimsCountry(other.to_string()));
        }
        let router = DataRouter::builder()
            .adapter(wb.build())
            .adapter(imf.build())
            .build();

        let tokens: Vec<&str> = members.iter().map(|c| c.alpha2()).collect();
        let response = runtime()
            .block_on(router.resolve_and_fetch(&DataRequest::new("gdp_per_capita", tokens)))
            .unwrap();

        prop_assert_eq!(response.results.len(), members.len());
        for (member, result) in &response.results {
            prop_assert!(members.contains(member));
            match result.series() {
                Some(series) => {
                    prop_assert_eq!(series.country, *member);
                    prop_assert!(!liars.contains(member));
                }
                None => prop_assert!(liars.contains(member)),
            }
        }

        let failed = members.intersection(&liars).count();
        let expected = RequestStatus::from_counts(members.len() - failed, members.len());
        prop_assert_eq!(response.status, expected);
        prop_assert_eq!(response.failed_members().len(), failed);
    }
}

/// Every literal exclusion phrase is a false positive for its concept.
#[test]
fn test_exclusion_phrases_are_false_positives() {
    let catalog = IndicatorCatalog::embedded();
    for id in catalog.concept_ids() {
        for exclusion in &catalog.concept(id).unwrap().exclusions {
            assert!(
                catalog.is_false_positive(exclusion, id),
                "'{}' should be excluded for {}",
                exclusion,
                id
            );
        }
    }
}
