use std::fmt;

use serde::Serialize;

use super::geography::GeographyScope;
use super::provider::ProviderKind;

/// Which routing tier produced a candidate. Declaration order is priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingTier {
    Override,
    GeographyRule,
    Catalog,
    SemanticIndex,
    DefaultProvider,
}

impl fmt::Display for RoutingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Override => "override",
            Self::GeographyRule => "geography-rule",
            Self::Catalog => "catalog",
            Self::SemanticIndex => "semantic-index",
            Self::DefaultProvider => "default",
        };
        f.write_str(label)
    }
}

/// One concrete (provider, code) choice for a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingCandidate {
    pub provider: ProviderKind,
    pub code: String,
    /// Ordering key within one concept; not comparable across concepts.
    pub confidence: f64,
    pub geography_scope: GeographyScope,
    pub tier: RoutingTier,
}

impl RoutingCandidate {
    /// Same provider and code, regardless of tier.
    pub fn same_target(&self, other: &Self) -> bool {
        self.provider == other.provider && self.code == other.code
    }
}

impl fmt::Display for RoutingCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} ({:.2}, {}, scope {})",
            self.provider, self.code, self.confidence, self.tier, self.geography_scope
        )
    }
}

/// The routing outcome for one request.
///
/// Built once by the [`RoutingEngine`](crate::routing::RoutingEngine) and only
/// read afterwards; there are no mutating methods.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    /// Indicator text as requested.
    query: String,
    concept: Option<String>,
    primary: RoutingCandidate,
    fallbacks: Vec<RoutingCandidate>,
    reasoning: Vec<String>,
}

impl RoutingDecision {
    pub(crate) fn new(
        query: String,
        concept: Option<String>,
        primary: RoutingCandidate,
        fallbacks: Vec<RoutingCandidate>,
        reasoning: Vec<String>,
    ) -> Self {
        Self {
            query,
            concept,
            primary,
            fallbacks,
            reasoning,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Catalog concept id the request resolved to, if any.
    pub fn concept(&self) -> Option<&str> {
        self.concept.as_deref()
    }

    pub fn primary(&self) -> &RoutingCandidate {
        &self.primary
    }

    pub fn fallbacks(&self) -> &[RoutingCandidate] {
        &self.fallbacks
    }

    /// Primary followed by fallbacks, in attempt order.
    pub fn candidates(&self) -> impl Iterator<Item = &RoutingCandidate> {
        std::iter::once(&self.primary).chain(self.fallbacks.iter())
    }

    pub fn reasoning(&self) -> &[String] {
        &self.reasoning
    }
}
