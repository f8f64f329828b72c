//! Request routing: from a [`DataRequest`](crate::models::DataRequest) to a
//! ranked [`RoutingDecision`].

mod engine;
mod rules;
mod semantic;

pub use engine::RoutingEngine;
pub use rules::member_candidates;
pub(crate) use rules::member_walk;

use crate::catalog::ConceptMatch;
use crate::models::{RequestGeography, RoutingDecision};

/// A routing decision together with the resolved inputs it was built from.
#[derive(Debug, Clone)]
pub struct RoutingPlan {
    decision: RoutingDecision,
    geography: RequestGeography,
    concept_match: Option<ConceptMatch>,
}

impl RoutingPlan {
    pub(crate) fn new(
        decision: RoutingDecision,
        geography: RequestGeography,
        concept_match: Option<ConceptMatch>,
    ) -> Self {
        Self {
            decision,
            geography,
            concept_match,
        }
    }

    pub fn decision(&self) -> &RoutingDecision {
        &self.decision
    }

    pub fn geography(&self) -> &RequestGeography {
        &self.geography
    }

    /// How the indicator text matched the catalog. `None` when routing fell
    /// through to the semantic index or the default provider.
    pub fn concept_match(&self) -> Option<&ConceptMatch> {
        self.concept_match.as_ref()
    }

    pub fn into_decision(self) -> RoutingDecision {
        self.decision
    }
}
