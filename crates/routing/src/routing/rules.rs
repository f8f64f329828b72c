//! Geography rules: a country's own statistics agency goes first for that
//! country.

use crate::catalog::IndicatorCatalog;
use crate::config::RoutingConfig;
use crate::models::{Country, GeographyScope, RoutingCandidate, RoutingDecision, RoutingTier};

/// Rule candidate for `country`, if a rule names a provider that the
/// catalog has a covering series for.
pub(crate) fn rule_candidate(
    config: &RoutingConfig,
    catalog: &IndicatorCatalog,
    concept: Option<&str>,
    country: &Country,
) -> Option<RoutingCandidate> {
    let provider = config.rule_for(country.alpha2())?;
    let entry = catalog.lookup(concept?, provider)?;
    if !entry.covers(provider, country) {
        return None;
    }
    Some(RoutingCandidate {
        provider,
        code: entry.code.clone(),
        confidence: entry.confidence,
        geography_scope: GeographyScope::Country { country: *country },
        tier: RoutingTier::GeographyRule,
    })
}

/// Every candidate for one member in walk order, flagged with whether its
/// scope includes the member.
///
/// The member's geography rule leads (unless the request carried an
/// override), followed by the decision candidates in decision order.
pub(crate) fn member_walk(
    config: &RoutingConfig,
    catalog: &IndicatorCatalog,
    decision: &RoutingDecision,
    member: &Country,
) -> Vec<(RoutingCandidate, bool)> {
    let mut walk: Vec<(RoutingCandidate, bool)> = Vec::new();
    let overridden = decision.candidates().any(|c| c.tier == RoutingTier::Override);
    let has_rule = decision
        .candidates()
        .any(|c| c.tier == RoutingTier::GeographyRule);
    if !overridden && !has_rule {
        if let Some(rule) = rule_candidate(config, catalog, decision.concept(), member) {
            walk.push((rule, true));
        }
    }
    for candidate in decision.candidates() {
        if walk.iter().any(|(c, _)| c.same_target(candidate)) {
            continue;
        }
        let in_scope = candidate.geography_scope.includes(member);
        walk.push((candidate.clone(), in_scope));
    }
    walk
}

/// Candidates to try for one member of a request, in attempt order.
pub fn member_candidates(
    config: &RoutingConfig,
    catalog: &IndicatorCatalog,
    decision: &RoutingDecision,
    member: &Country,
) -> Vec<RoutingCandidate> {
    member_walk(config, catalog, decision, member)
        .into_iter()
        .filter_map(|(candidate, in_scope)| in_scope.then_some(candidate))
        .collect()
}
