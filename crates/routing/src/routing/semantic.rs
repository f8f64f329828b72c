//! Semantic index glue for the routing engine.
//!
//! Turns raw index hits into routing candidates: unknown providers, weak
//! scores and exclusion-list hits are dropped, and coverage is checked
//! against the requested members.

use log::{debug, warn};

use crate::catalog::{IndicatorCatalog, IndicatorGate};
use crate::models::{ProviderKind, RequestGeography, RoutingCandidate, RoutingTier};
use crate::provider::{SemanticHit, SemanticIndex};

use super::engine::scope_for;

/// Filters applied to every hit.
pub(crate) struct HitFilter<'a> {
    pub catalog: &'a IndicatorCatalog,
    pub gate: IndicatorGate<'a>,
    pub score_floor: f64,
}

impl HitFilter<'_> {
    /// Why a hit is rejected, or `None` if it is acceptable.
    fn rejection(&self, hit: &SemanticHit) -> Option<String> {
        if hit.score < self.score_floor {
            return Some(format!("score {:.2} below floor {:.2}", hit.score, self.score_floor));
        }
        if self.gate.rejects(self.catalog, &hit.description) {
            return Some(format!("'{}' is a false positive for {}", hit.description, self.gate));
        }
        None
    }
}

/// Query the index and convert accepted hits into candidates.
///
/// Index failures are logged and yield no candidates; the index is an
/// optional source and must not fail routing.
pub(crate) async fn search_candidates(
    index: &dyn SemanticIndex,
    text: &str,
    provider_filter: Option<ProviderKind>,
    limit: usize,
    filter: &HitFilter<'_>,
    geography: &RequestGeography,
    reasoning: &mut Vec<String>,
) -> Vec<RoutingCandidate> {
    let hits = match index
        .search(text, provider_filter.map(ProviderKind::as_str), limit)
        .await
    {
        Ok(hits) => hits,
        Err(e) => {
            warn!("Semantic index search for '{}' failed: {}", text, e);
            reasoning.push(format!("semantic index unavailable: {}", e));
            return Vec::new();
        }
    };
    debug!("Semantic index returned {} hit(s) for '{}'", hits.len(), text);

    let mut candidates = Vec::new();
    for hit in hits {
        let provider = match hit.provider.parse::<ProviderKind>() {
            Ok(provider) => provider,
            Err(_) => {
                reasoning.push(format!("semantic: skip {}:{} (unknown provider)", hit.provider, hit.code));
                continue;
            }
        };
        if provider_filter.is_some_and(|wanted| wanted != provider) {
            continue;
        }
        if let Some(reason) = filter.rejection(&hit) {
            reasoning.push(format!("semantic: reject {}:{} ({})", provider, hit.code, reason));
            continue;
        }
        let coverage = provider.coverage();
        let covered = geography
            .members
            .iter()
            .filter(|c| coverage.covers(c))
            .copied()
            .collect();
        let Some(scope) = scope_for(covered, geography, coverage.is_global()) else {
            reasoning.push(format!("semantic: skip {}:{} (no requested country covered)", provider, hit.code));
            continue;
        };
        let candidate = RoutingCandidate {
            provider,
            code: hit.code,
            confidence: hit.score.clamp(0.0, 1.0),
            geography_scope: scope,
            tier: RoutingTier::SemanticIndex,
        };
        if candidates.iter().any(|c: &RoutingCandidate| c.same_target(&candidate)) {
            continue;
        }
        reasoning.push(format!("semantic: accept {}", candidate));
        candidates.push(candidate);
    }
    candidates
}
