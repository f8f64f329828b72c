//! Per-member attempt log.

use std::fmt;

use serde::Serialize;

use crate::models::{FetchFailure, ProviderKind, RoutingCandidate, RoutingTier};

/// Why a candidate was passed over without calling its provider.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// No adapter registered for the provider.
    NoAdapter,
    /// The candidate's geography scope does not include this member.
    OutOfScope,
    /// The member has no code in the provider's code system.
    UnsupportedConversion { format: String },
    /// The provider was cooling down when the request started.
    CoolingDown,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAdapter => f.write_str("no adapter"),
            Self::OutOfScope => f.write_str("out of scope"),
            Self::UnsupportedConversion { format } => write!(f, "no {} code", format),
            Self::CoolingDown => f.write_str("cooling down"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failed(FetchFailure),
    Skipped(SkipReason),
}

#[derive(Clone, Debug, Serialize)]
pub struct ProviderAttempt {
    pub provider: ProviderKind,
    pub code: String,
    pub tier: RoutingTier,
    pub outcome: AttemptOutcome,
}

/// Ordered record of every candidate considered for one member.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, candidate: &RoutingCandidate, outcome: AttemptOutcome) {
        self.attempts.push(ProviderAttempt {
            provider: candidate.provider,
            code: candidate.code.clone(),
            tier: candidate.tier,
            outcome,
        });
    }

    pub fn record_skip(&mut self, candidate: &RoutingCandidate, reason: SkipReason) {
        self.push(candidate, AttemptOutcome::Skipped(reason));
    }

    pub fn record_failure(&mut self, candidate: &RoutingCandidate, failure: FetchFailure) {
        self.push(candidate, AttemptOutcome::Failed(failure));
    }

    pub fn record_success(&mut self, candidate: &RoutingCandidate) {
        self.push(candidate, AttemptOutcome::Success);
    }

    /// One line, attempts joined with `->`.
    pub fn summary(&self) -> String {
        if self.attempts.is_empty() {
            return "no candidates".to_string();
        }
        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Success => format!("{}:{} OK", a.provider, a.code),
                AttemptOutcome::Failed(failure) => {
                    format!("{}:{} FAILED ({})", a.provider, a.code, failure)
                }
                AttemptOutcome::Skipped(reason) => {
                    format!("{}:{} SKIPPED ({})", a.provider, a.code, reason)
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn has_success(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| a.outcome == AttemptOutcome::Success)
    }

    /// Providers actually called, in order.
    pub fn attempted(&self) -> Vec<ProviderKind> {
        self.attempts
            .iter()
            .filter(|a| !matches!(a.outcome, AttemptOutcome::Skipped(_)))
            .map(|a| a.provider)
            .collect()
    }

    pub fn skip_reasons(&self) -> Vec<(ProviderKind, &SkipReason)> {
        self.attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                AttemptOutcome::Skipped(reason) => Some((a.provider, reason)),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<(ProviderKind, &FetchFailure)> {
        self.attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                AttemptOutcome::Failed(failure) => Some((a.provider, failure)),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeographyScope;

    fn candidate(provider: ProviderKind, code: &str) -> RoutingCandidate {
        RoutingCandidate {
            provider,
            code: code.to_string(),
            confidence: 0.8,
            geography_scope: GeographyScope::All,
            tier: RoutingTier::Catalog,
        }
    }

    #[test]
    fn test_summary_and_attempted() {
        let mut diag = FetchDiagnostics::new();
        diag.record_skip(&candidate(ProviderKind::Fred, "UNRATE"), SkipReason::CoolingDown);
        diag.record_failure(
            &candidate(ProviderKind::WorldBank, "SL.UEM.TOTL.ZS"),
            FetchFailure::NotAvailable {
                message: "empty".into(),
            },
        );
        diag.record_success(&candidate(ProviderKind::Imf, "LUR"));

        assert_eq!(
            diag.summary(),
            "FRED:UNRATE SKIPPED (cooling down) -> WORLD_BANK:SL.UEM.TOTL.ZS FAILED (not available: empty) -> IMF:LUR OK"
        );
        assert_eq!(diag.attempted(), vec![ProviderKind::WorldBank, ProviderKind::Imf]);
        assert!(diag.has_success());
        assert_eq!(diag.skip_reasons().len(), 1);
        assert_eq!(diag.failures().len(), 1);
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(FetchDiagnostics::new().summary(), "no candidates");
        assert!(!FetchDiagnostics::new().has_success());
    }
}
