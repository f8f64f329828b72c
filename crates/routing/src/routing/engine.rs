//! Tiered routing.
//!
//! Tiers, in priority order:
//!
//! 1. Explicit provider override from the request.
//! 2. Geography rule (a country's own statistics agency). Single-country
//!    requests only; group members get theirs at fetch time.
//! 3. Catalog lookup, filtered by coverage of the requested members.
//! 4. Semantic index, only when no catalog candidate reaches the
//!    confidence floor.
//! 5. Configured default provider, only when nothing else matched.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use log::{debug, info};

use crate::catalog::{ConceptMatch, IndicatorCatalog, IndicatorGate, MatchKind};
use crate::config::RoutingConfig;
use crate::errors::RoutingError;
use crate::geography::GeographyResolver;
use crate::models::{
    Country, DataRequest, GeographyScope, ProviderKind, RequestGeography, RoutingCandidate,
    RoutingDecision, RoutingTier,
};
use crate::provider::SemanticIndex;

use super::rules;
use super::semantic::{search_candidates, HitFilter};
use super::RoutingPlan;

// Sort groups. Weak catalog candidates rank after semantic hits: they only
// serve as late fallbacks once the index has been consulted.
const RANK_OVERRIDE: u8 = 0;
const RANK_RULE: u8 = 1;
const RANK_CATALOG: u8 = 2;
const RANK_SEMANTIC: u8 = 3;
const RANK_WEAK_CATALOG: u8 = 4;
const RANK_DEFAULT: u8 = 5;

/// Scope for a candidate covering `covered` out of the requested members.
pub(crate) fn scope_for(
    covered: BTreeSet<Country>,
    geography: &RequestGeography,
    global: bool,
) -> Option<GeographyScope> {
    if covered.is_empty() {
        return None;
    }
    if global {
        return Some(GeographyScope::All);
    }
    if covered == geography.members {
        return Some(geography.full_scope());
    }
    match covered.iter().next() {
        Some(country) if covered.len() == 1 => Some(GeographyScope::Country { country: *country }),
        _ => Some(GeographyScope::Countries { countries: covered }),
    }
}

/// Builds a [`RoutingDecision`] for a request against one catalog snapshot.
pub struct RoutingEngine<'a> {
    config: &'a RoutingConfig,
    catalog: &'a IndicatorCatalog,
    geography: GeographyResolver,
    semantic: Option<&'a dyn SemanticIndex>,
}

impl<'a> RoutingEngine<'a> {
    pub fn new(
        config: &'a RoutingConfig,
        catalog: &'a IndicatorCatalog,
        geography: GeographyResolver,
    ) -> Self {
        Self {
            config,
            catalog,
            geography,
            semantic: None,
        }
    }

    pub fn with_semantic_index(mut self, index: &'a dyn SemanticIndex) -> Self {
        self.semantic = Some(index);
        self
    }

    /// Resolve the request's geography and concept and rank candidates.
    ///
    /// Fails on unknown geography, unknown override provider, an override
    /// that covers none of the requested countries, an ambiguous concept,
    /// or when no tier produced any candidate.
    pub async fn plan(&self, request: &DataRequest) -> Result<RoutingPlan, RoutingError> {
        let geography = self.geography.resolve_all(&request.geography_tokens)?;
        if request.date_range.is_some_and(|r| r.is_inverted()) {
            return Err(RoutingError::InvalidRequest(
                "date range starts after it ends".to_string(),
            ));
        }
        let text = request.indicator_concept.trim();
        if text.is_empty() {
            return Err(RoutingError::InvalidRequest("empty indicator".to_string()));
        }

        let mut reasoning = vec![format!(
            "geography: {} ({} member(s))",
            geography,
            geography.members.len()
        )];

        let concept_match = match self.catalog.resolve_concept(text) {
            Ok(hit) => {
                let how = match hit.kind {
                    MatchKind::Alias => "alias".to_string(),
                    MatchKind::Fuzzy => format!("fuzzy {:.2}", hit.confidence),
                };
                reasoning.push(format!("concept: '{}' -> {} ({})", text, hit.concept, how));
                Some(hit)
            }
            Err(RoutingError::NoConceptMatch(_)) => {
                reasoning.push(format!("concept: no catalog concept matches '{}'", text));
                None
            }
            Err(e) => return Err(e),
        };
        let concept = concept_match.as_ref().map(|m| m.concept.as_str());

        let mut ranked: Vec<(u8, RoutingCandidate)> = Vec::new();

        // Tier 1
        let override_provider = request
            .provider_override
            .as_deref()
            .map(str::parse::<ProviderKind>)
            .transpose()?;
        if let Some(provider) = override_provider {
            let candidate = self
                .override_candidate(provider, text, concept, &geography, &mut reasoning)
                .await?;
            reasoning.push(format!("override: {}", candidate));
            ranked.push((RANK_OVERRIDE, candidate));
        }

        // Tier 2
        if override_provider.is_some() {
            reasoning.push("geography rules: skipped, explicit override".to_string());
        } else if let Some(country) = geography.single_country() {
            if let Some(rule) = rules::rule_candidate(self.config, self.catalog, concept, &country) {
                reasoning.push(format!("geography rule: {}", rule));
                ranked.push((RANK_RULE, rule));
            }
        } else if !self.config.geography_rules.is_empty() {
            reasoning.push("geography rules: resolved per member at fetch time".to_string());
        }

        // Tier 3
        let mut confident = false;
        if let Some(concept) = concept {
            for (provider, confidence) in self.catalog.best_providers(concept, usize::MAX) {
                let Some(entry) = self.catalog.lookup(concept, provider) else {
                    continue;
                };
                let covered = geography
                    .members
                    .iter()
                    .filter(|c| entry.covers(provider, c))
                    .copied()
                    .collect();
                let Some(scope) = scope_for(covered, &geography, entry.is_global(provider)) else {
                    reasoning.push(format!(
                        "catalog: skip {}:{} (covers none of {})",
                        provider, entry.code, geography
                    ));
                    continue;
                };
                let above_floor = confidence >= self.config.confidence_floor;
                confident |= above_floor;
                let candidate = RoutingCandidate {
                    provider,
                    code: entry.code.clone(),
                    confidence,
                    geography_scope: scope,
                    tier: RoutingTier::Catalog,
                };
                reasoning.push(format!(
                    "catalog: {}{}",
                    candidate,
                    if above_floor { "" } else { " below floor" }
                ));
                let rank = if above_floor { RANK_CATALOG } else { RANK_WEAK_CATALOG };
                ranked.push((rank, candidate));
            }
        }

        // Tier 4
        if !confident {
            match self.semantic {
                Some(index) => {
                    reasoning.push("semantic: no confident catalog candidate, searching index".to_string());
                    let filter = HitFilter {
                        catalog: self.catalog,
                        gate: IndicatorGate::new(concept, text),
                        score_floor: self.config.semantic_score_floor,
                    };
                    let found = search_candidates(
                        index,
                        text,
                        None,
                        self.config.semantic_limit,
                        &filter,
                        &geography,
                        &mut reasoning,
                    )
                    .await;
                    ranked.extend(found.into_iter().map(|c| (RANK_SEMANTIC, c)));
                }
                None => reasoning.push("semantic: no index configured".to_string()),
            }
        }

        // Tier 5
        if ranked.is_empty() {
            if let Some(provider) = self.config.default_provider {
                if let Some(candidate) = default_candidate(self.catalog, provider, text, concept, &geography) {
                    reasoning.push(format!("default: {}", candidate));
                    ranked.push((RANK_DEFAULT, candidate));
                }
            }
        }

        self.decide(text, concept_match, geography, ranked, reasoning)
    }

    async fn override_candidate(
        &self,
        provider: ProviderKind,
        text: &str,
        concept: Option<&str>,
        geography: &RequestGeography,
        reasoning: &mut Vec<String>,
    ) -> Result<RoutingCandidate, RoutingError> {
        let uncovered = || RoutingError::UncoveredGeography {
            provider,
            geography: geography.to_string(),
        };

        if let Some(entry) = concept.and_then(|c| self.catalog.lookup(c, provider)) {
            let covered = geography
                .members
                .iter()
                .filter(|c| entry.covers(provider, c))
                .copied()
                .collect();
            let scope = scope_for(covered, geography, entry.is_global(provider)).ok_or_else(uncovered)?;
            return Ok(RoutingCandidate {
                provider,
                code: entry.code.clone(),
                confidence: entry.confidence,
                geography_scope: scope,
                tier: RoutingTier::Override,
            });
        }

        if !geography.members.iter().any(|c| provider.coverage().covers(c)) {
            return Err(uncovered());
        }
        let no_series = || {
            RoutingError::InvalidRequest(format!("{} has no series for '{}'", provider, text))
        };
        let index = self.semantic.ok_or_else(no_series)?;
        let filter = HitFilter {
            catalog: self.catalog,
            gate: IndicatorGate::new(concept, text),
            score_floor: self.config.semantic_score_floor,
        };
        let mut found = search_candidates(
            index,
            text,
            Some(provider),
            self.config.semantic_limit,
            &filter,
            geography,
            reasoning,
        )
        .await;
        if found.is_empty() {
            return Err(no_series());
        }
        let mut candidate = found.remove(0);
        candidate.tier = RoutingTier::Override;
        Ok(candidate)
    }

    /// Order candidates and pick the primary.
    ///
    /// Candidates sort by tier group first (override, rule, confident
    /// catalog, semantic, weak catalog, default) and by confidence within a
    /// group, so a weak catalog entry follows a semantic hit even when its
    /// confidence is higher. Ties go to provider priority.
    fn decide(
        &self,
        text: &str,
        concept_match: Option<ConceptMatch>,
        geography: RequestGeography,
        mut ranked: Vec<(u8, RoutingCandidate)>,
        mut reasoning: Vec<String>,
    ) -> Result<RoutingPlan, RoutingError> {
        ranked.sort_by(|(rank_a, a), (rank_b, b)| {
            rank_a
                .cmp(rank_b)
                .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
                .then_with(|| {
                    self.catalog
                        .priority_rank(a.provider)
                        .cmp(&self.catalog.priority_rank(b.provider))
                })
        });

        let mut ordered: Vec<RoutingCandidate> = Vec::with_capacity(ranked.len());
        for (_, candidate) in ranked {
            if ordered.iter().any(|o| o.same_target(&candidate)) {
                debug!("Dropping duplicate candidate {}", candidate);
                continue;
            }
            ordered.push(candidate);
        }
        if ordered.is_empty() {
            return Err(RoutingError::NoConceptMatch(text.to_string()));
        }

        // Overrides and rules lead as ranked. Otherwise the primary is the
        // best candidate that can answer for every requested member.
        let primary_idx = match ordered.first() {
            Some(first) if first.tier <= RoutingTier::GeographyRule => 0,
            _ => ordered
                .iter()
                .position(|c| c.geography_scope.covers_all(&geography.members))
                .unwrap_or(0),
        };
        if primary_idx > 0 {
            reasoning.push(format!(
                "{} higher-confidence candidate(s) cover only part of {}",
                primary_idx, geography
            ));
        }
        let primary = ordered.remove(primary_idx);
        reasoning.push(format!("primary: {}", primary));
        reasoning.push(format!("fallbacks: {}", ordered.len()));

        info!(
            "Routed '{}' for {}: primary {}:{} ({}), {} fallback(s)",
            text,
            geography,
            primary.provider,
            primary.code,
            primary.tier,
            ordered.len()
        );

        let decision = RoutingDecision::new(
            text.to_string(),
            concept_match.as_ref().map(|m| m.concept.clone()),
            primary,
            ordered,
            reasoning,
        );
        Ok(RoutingPlan::new(decision, geography, concept_match))
    }
}

fn default_candidate(
    catalog: &IndicatorCatalog,
    provider: ProviderKind,
    text: &str,
    concept: Option<&str>,
    geography: &RequestGeography,
) -> Option<RoutingCandidate> {
    let coverage = provider.coverage();
    let covered = geography
        .members
        .iter()
        .filter(|c| coverage.covers(c))
        .copied()
        .collect();
    let scope = scope_for(covered, geography, coverage.is_global())?;
    // Without a catalog code, hand the adapter the concept itself and let its
    // own search decide.
    let code = concept
        .and_then(|c| catalog.lookup(c, provider).map(|e| e.code.clone()))
        .or_else(|| concept.map(str::to_string))
        .unwrap_or_else(|| text.to_string());
    Some(RoutingCandidate {
        provider,
        code,
        confidence: 0.0,
        geography_scope: scope,
        tier: RoutingTier::DefaultProvider,
    })
}
