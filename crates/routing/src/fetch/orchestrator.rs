//! Executes a routing decision.
//!
//! Each requested member runs its own fallback walk:
//!
//! 1. Skip candidates whose scope excludes the member
//! 2. Skip providers with no adapter or cooling down at request start
//! 3. Convert the member to the provider's country code (skip if impossible)
//! 4. Wait for the provider's next send slot
//! 5. Fetch, normalise observations, validate country and indicator
//! 6. On any failure move to the next distinct candidate
//!
//! Members run concurrently under one deadline. Members still running when
//! it passes are dropped and reported as `TimedOut`. Walks share nothing
//! mutable: provider health is read once before fan-out and updated once
//! after every member is done.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};

use super::normalize::normalize_observations;
use super::{
    CallOutcome, FetchDiagnostics, HealthReport, HealthSnapshot, ProviderRegistry,
    SeriesValidator, SkipReason,
};
use crate::catalog::{IndicatorCatalog, IndicatorGate};
use crate::config::RoutingConfig;
use crate::errors::{RetryClass, RoutingError};
use crate::geography::GeographyResolver;
use crate::models::{
    Country, DateRange, FetchFailure, FetchResult, FetchedSeries, ProviderKind, ProviderSeries,
    RoutingCandidate, RoutingDecision,
};
use crate::provider::FetchParams;
use crate::routing::member_walk;

/// Final result and attempt log for one member.
#[derive(Clone, Debug)]
pub struct MemberOutcome {
    pub result: FetchResult,
    pub diagnostics: FetchDiagnostics,
}

/// Everything one member's walk records. Kept outside the walk's future so
/// a member cut off by the deadline still reports what it tried.
#[derive(Default)]
struct MemberLog {
    diagnostics: FetchDiagnostics,
    health: HealthReport,
}

pub struct FetchOrchestrator<'a> {
    config: &'a RoutingConfig,
    catalog: &'a IndicatorCatalog,
    geography: GeographyResolver,
    registry: &'a ProviderRegistry,
}

fn lock(log: &Mutex<MemberLog>) -> MutexGuard<'_, MemberLog> {
    log.lock().unwrap_or_else(|poisoned| {
        warn!("Member log mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

impl<'a> FetchOrchestrator<'a> {
    pub fn new(
        config: &'a RoutingConfig,
        catalog: &'a IndicatorCatalog,
        geography: GeographyResolver,
        registry: &'a ProviderRegistry,
    ) -> Self {
        Self {
            config,
            catalog,
            geography,
            registry,
        }
    }

    /// Fetch every member concurrently, bounded by `timeout`.
    ///
    /// Always returns one outcome per member.
    pub async fn fetch_all(
        &self,
        decision: &RoutingDecision,
        members: &BTreeSet<Country>,
        range: Option<&DateRange>,
        timeout: Duration,
    ) -> BTreeMap<Country, MemberOutcome> {
        let health = self.registry.health().snapshot();
        let logs: BTreeMap<Country, Mutex<MemberLog>> = members
            .iter()
            .map(|m| (*m, Mutex::new(MemberLog::default())))
            .collect();

        let deadline = tokio::time::Instant::now() + timeout;
        let mut results: BTreeMap<Country, FetchResult> = BTreeMap::new();
        {
            let health = &health;
            let mut pending: FuturesUnordered<_> = logs
                .iter()
                .map(|(member, log)| async move {
                    let result = self.walk_member(decision, *member, range, health, log).await;
                    (*member, result)
                })
                .collect();

            loop {
                match tokio::time::timeout_at(deadline, pending.next()).await {
                    Ok(Some((member, result))) => {
                        results.insert(member, result);
                    }
                    Ok(None) => break,
                    Err(_) => {
                        warn!(
                            "Fetch deadline of {:?} passed with {} member(s) unfinished",
                            timeout,
                            pending.len()
                        );
                        break;
                    }
                }
            }
            // Dropping `pending` here cancels whatever is still in flight.
        }

        let mut report = HealthReport::new();
        let outcomes = logs
            .into_iter()
            .map(|(member, log)| {
                let log = log.into_inner().unwrap_or_else(|p| p.into_inner());
                report.merge(&log.health);
                let result = results.remove(&member).unwrap_or_else(|| FetchResult::TimedOut {
                    attempted: log.diagnostics.attempted(),
                });
                (
                    member,
                    MemberOutcome {
                        result,
                        diagnostics: log.diagnostics,
                    },
                )
            })
            .collect();
        if !report.is_empty() {
            self.registry.health().apply(&report);
        }
        outcomes
    }

    async fn walk_member(
        &self,
        decision: &RoutingDecision,
        member: Country,
        range: Option<&DateRange>,
        health: &HealthSnapshot,
        log: &Mutex<MemberLog>,
    ) -> FetchResult {
        let validator = SeriesValidator::new(
            self.geography,
            self.catalog,
            self.config.require_country_metadata,
        );

        for (candidate, in_scope) in member_walk(self.config, self.catalog, decision, &member) {
            if !in_scope {
                lock(log).diagnostics.record_skip(&candidate, SkipReason::OutOfScope);
                continue;
            }
            let provider = candidate.provider;
            let Some(adapter) = self.registry.adapter(provider) else {
                lock(log).diagnostics.record_skip(&candidate, SkipReason::NoAdapter);
                continue;
            };
            if health.is_cooling(provider) {
                debug!("{} is cooling down, skipping for {}", provider, member);
                lock(log).diagnostics.record_skip(&candidate, SkipReason::CoolingDown);
                continue;
            }
            let format = provider.code_format();
            let country_code = match self.geography.code_for(&member, format) {
                Ok(code) => code,
                Err(_) => {
                    debug!("{} has no {} code, skipping {}", member, format, provider);
                    lock(log).diagnostics.record_skip(
                        &candidate,
                        SkipReason::UnsupportedConversion {
                            format: format.to_string(),
                        },
                    );
                    continue;
                }
            };

            let params = fetch_params(country_code, range);
            self.registry.pacer().pace(provider).await;
            debug!("Fetching {}:{} for {}", provider, candidate.code, member);

            let (failure, outcome) = match adapter.fetch(&candidate.code, &params).await {
                Ok(series) => match self.accept(&validator, decision, member, &candidate, series, range) {
                    Ok(fetched) => {
                        let mut log = lock(log);
                        log.health.record(provider, CallOutcome::Answered);
                        log.diagnostics.record_success(&candidate);
                        info!(
                            "{}: accepted {}:{} ({} observations)",
                            member,
                            provider,
                            candidate.code,
                            fetched.observations.len()
                        );
                        return FetchResult::Fetched(fetched);
                    }
                    Err(failure) => {
                        warn!("{}: rejected {}:{}: {}", member, provider, candidate.code, failure);
                        (failure, CallOutcome::Answered)
                    }
                },
                Err(e) => classify(provider, member, e),
            };
            let mut log = lock(log);
            log.health.record(provider, outcome);
            log.diagnostics.record_failure(&candidate, failure);
        }

        let log = lock(log);
        warn!("{}: all providers exhausted ({})", member, log.diagnostics.summary());
        FetchResult::AllProvidersExhausted {
            attempted: log.diagnostics.attempted(),
        }
    }

    fn accept(
        &self,
        validator: &SeriesValidator<'_>,
        decision: &RoutingDecision,
        member: Country,
        candidate: &RoutingCandidate,
        series: ProviderSeries,
        range: Option<&DateRange>,
    ) -> Result<FetchedSeries, FetchFailure> {
        let observations = normalize_observations(&series.observations, range);
        if observations.is_empty() {
            return Err(FetchFailure::NotAvailable {
                message: format!(
                    "no usable observations ({} returned)",
                    series.observations.len()
                ),
            });
        }
        let gate = IndicatorGate::new(decision.concept(), decision.query());
        let country_verified = validator.validate(&member, gate, &series.metadata)?;
        Ok(FetchedSeries {
            country: member,
            provider: candidate.provider,
            code: candidate.code.clone(),
            tier: candidate.tier,
            description: series.metadata.description,
            observations,
            country_verified,
        })
    }
}

/// Turn an adapter error into a fallback step, and say whether the
/// provider was reachable at all.
fn classify(provider: ProviderKind, member: Country, error: RoutingError) -> (FetchFailure, CallOutcome) {
    let outcome = match error.retry_class() {
        RetryClass::NextCandidateWithPenalty => {
            warn!("{}: {} unreachable: {}", member, provider, error);
            CallOutcome::Unreachable
        }
        RetryClass::NextCandidate => {
            debug!("{}: {} has nothing: {}", member, provider, error);
            CallOutcome::Answered
        }
        RetryClass::Terminal => {
            // Nothing an adapter says is terminal for the whole request.
            warn!("{}: {} returned {}, moving on", member, provider, error);
            CallOutcome::Answered
        }
    };

    let failure = match error {
        RoutingError::NotAvailable { message, .. } => FetchFailure::NotAvailable { message },
        RoutingError::CountryMismatch { expected, found } => {
            FetchFailure::CountryMismatch { expected, found }
        }
        other @ RoutingError::UnsupportedConversion { .. } => FetchFailure::NotAvailable {
            message: other.to_string(),
        },
        other => FetchFailure::Transport {
            message: other.to_string(),
        },
    };
    (failure, outcome)
}

fn fetch_params(country_code: String, range: Option<&DateRange>) -> FetchParams {
    let mut params = FetchParams::new();
    params.insert("country".to_string(), country_code);
    if let Some(range) = range {
        if let Some(start) = range.start {
            params.insert("start".to_string(), start.format("%Y-%m-%d").to_string());
        }
        if let Some(end) = range.end {
            params.insert("end".to_string(), end.format("%Y-%m-%d").to_string());
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::fetch::{AttemptOutcome, HealthConfig, HealthState};
    use crate::models::{DataRequest, ProviderKind, RawObservation, SeriesMetadata};
    use crate::provider::ProviderAdapter;
    use crate::routing::RoutingEngine;

    enum Behaviour {
        Ok,
        Empty,
        Fail,
        /// Never answers for this country code, answers normally otherwise.
        HangFor(&'static str),
        /// Transport error for this country code, answers normally otherwise.
        FailFor(&'static str),
    }

    struct StubAdapter {
        kind: ProviderKind,
        behaviour: Behaviour,
        calls: AtomicUsize,
        seen: Mutex<Vec<FetchParams>>,
    }

    impl StubAdapter {
        fn new(kind: ProviderKind, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                kind,
                behaviour,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ProviderAdapter for StubAdapter {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn fetch(&self, _code: &str, params: &FetchParams) -> Result<ProviderSeries, RoutingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(params.clone());
            match self.behaviour {
                Behaviour::HangFor(code) if params["country"] == code => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(ProviderSeries::default())
                }
                Behaviour::FailFor(code) if params["country"] == code => Err(RoutingError::Transport {
                    provider: self.kind,
                    message: "connection reset".into(),
                }),
                Behaviour::Ok | Behaviour::HangFor(_) | Behaviour::FailFor(_) => Ok(ProviderSeries {
                    observations: vec![
                        RawObservation::new("2019", Some(1.0)),
                        RawObservation::new("2020", Some(2.0)),
                    ],
                    metadata: SeriesMetadata::default(),
                }),
                Behaviour::Empty => Ok(ProviderSeries::default()),
                Behaviour::Fail => Err(RoutingError::Transport {
                    provider: self.kind,
                    message: "connection reset".into(),
                }),
            }
        }
    }

    async fn decision_for(
        config: &RoutingConfig,
        catalog: &IndicatorCatalog,
        request: DataRequest,
    ) -> (RoutingDecision, BTreeSet<Country>) {
        let plan = RoutingEngine::new(config, catalog, GeographyResolver::new())
            .plan(&request)
            .await
            .unwrap();
        let members = plan.geography().members.clone();
        (plan.into_decision(), members)
    }

    fn country(code: &str) -> Country {
        Country::from_alpha2(code).unwrap()
    }

    #[tokio::test]
    async fn test_empty_series_advances_to_next_candidate() {
        let config = RoutingConfig::default();
        let catalog = IndicatorCatalog::embedded().with_priority(config.provider_priority.clone());
        let wb = StubAdapter::new(ProviderKind::WorldBank, Behaviour::Empty);
        let oecd = StubAdapter::new(ProviderKind::Oecd, Behaviour::Ok);
        let registry = ProviderRegistry::new(
            vec![wb.clone(), oecd.clone()],
            HealthConfig::default(),
        );
        let (decision, members) = decision_for(&config, &catalog, DataRequest::new("gdp", ["JP"])).await;

        let orchestrator = FetchOrchestrator::new(&config, &catalog, GeographyResolver::new(), &registry);
        let outcomes = orchestrator
            .fetch_all(&decision, &members, None, Duration::from_secs(5))
            .await;

        let outcome = &outcomes[&country("JP")];
        let series = outcome.result.series().unwrap();
        assert_eq!(series.provider, ProviderKind::Oecd);
        assert_eq!(series.country, country("JP"));
        assert_eq!(wb.calls.load(Ordering::SeqCst), 1);
        // OECD gets alpha-3 codes.
        assert_eq!(oecd.seen.lock().unwrap()[0]["country"], "JPN");
        assert!(outcome.diagnostics.summary().contains("WORLD_BANK:NY.GDP.MKTP.CD FAILED"));
    }

    #[tokio::test]
    async fn test_failed_requests_cool_provider_for_later_requests() {
        let config = RoutingConfig::default();
        let catalog = IndicatorCatalog::embedded().with_priority(config.provider_priority.clone());
        let wb = StubAdapter::new(ProviderKind::WorldBank, Behaviour::Fail);
        let imf = StubAdapter::new(ProviderKind::Imf, Behaviour::Ok);
        let registry = ProviderRegistry::new(
            vec![wb.clone(), imf.clone()],
            HealthConfig {
                failure_threshold: 1,
                ..HealthConfig::default()
            },
        );
        let orchestrator = FetchOrchestrator::new(&config, &catalog, GeographyResolver::new(), &registry);

        let (decision, members) = decision_for(&config, &catalog, DataRequest::new("gdp", ["BR"])).await;
        let first = orchestrator
            .fetch_all(&decision, &members, None, Duration::from_secs(5))
            .await;
        assert_eq!(first[&country("BR")].result.series().unwrap().provider, ProviderKind::Imf);
        assert_eq!(registry.health().state(ProviderKind::WorldBank), HealthState::CoolingDown);
        assert_eq!(registry.health().state(ProviderKind::Imf), HealthState::Healthy);

        let second = orchestrator
            .fetch_all(&decision, &members, None, Duration::from_secs(5))
            .await;
        assert_eq!(wb.calls.load(Ordering::SeqCst), 1);
        let skipped = &second[&country("BR")].diagnostics.attempts[0];
        assert_eq!(skipped.provider, ProviderKind::WorldBank);
        assert_eq!(skipped.outcome, AttemptOutcome::Skipped(SkipReason::CoolingDown));
    }

    #[tokio::test]
    async fn test_one_member_failing_does_not_skip_provider_for_others() {
        let config = RoutingConfig::default();
        let json = r#"[{"id": "gdp", "aliases": ["gdp"], "providers": {
            "WORLD_BANK": {"code": "NY.GDP.MKTP.CD", "confidence": 0.8}}}]"#;
        let catalog = IndicatorCatalog::from_json(json).unwrap();
        let wb = StubAdapter::new(ProviderKind::WorldBank, Behaviour::FailFor("BR"));
        let registry = ProviderRegistry::new(
            vec![wb.clone()],
            HealthConfig {
                failure_threshold: 1,
                ..HealthConfig::default()
            },
        );
        let orchestrator = FetchOrchestrator::new(&config, &catalog, GeographyResolver::new(), &registry);
        let (decision, members) =
            decision_for(&config, &catalog, DataRequest::new("gdp", ["BR", "AR", "CL", "PE"])).await;

        let outcomes = orchestrator
            .fetch_all(&decision, &members, None, Duration::from_secs(5))
            .await;
        assert_eq!(wb.calls.load(Ordering::SeqCst), 4);
        assert!(!outcomes[&country("BR")].result.is_success());
        for code in ["AR", "CL", "PE"] {
            assert!(outcomes[&country(code)].result.is_success(), "{}", code);
        }
        // The provider answered other members, so the request does not count against it.
        assert_eq!(registry.health().state(ProviderKind::WorldBank), HealthState::Healthy);
    }

    #[tokio::test]
    async fn test_unsupported_conversion_is_skipped() {
        let config = RoutingConfig::default();
        let json = r#"[{"id": "exports", "aliases": ["exports"], "providers": {
            "COMTRADE": {"code": "TOTAL_X", "confidence": 0.9},
            "WORLD_BANK": {"code": "NE.EXP.GNFS.CD", "confidence": 0.8}}}]"#;
        let catalog = IndicatorCatalog::from_json(json).unwrap();
        let comtrade = StubAdapter::new(ProviderKind::Comtrade, Behaviour::Ok);
        let wb = StubAdapter::new(ProviderKind::WorldBank, Behaviour::Ok);
        let registry = ProviderRegistry::new(
            vec![comtrade.clone(), wb.clone()],
            HealthConfig::default(),
        );
        let orchestrator = FetchOrchestrator::new(&config, &catalog, GeographyResolver::new(), &registry);
        let (decision, members) = decision_for(&config, &catalog, DataRequest::new("exports", ["Kosovo"])).await;

        let outcomes = orchestrator
            .fetch_all(&decision, &members, None, Duration::from_secs(5))
            .await;
        let outcome = &outcomes[&country("XK")];
        assert_eq!(outcome.result.series().unwrap().provider, ProviderKind::WorldBank);
        assert_eq!(comtrade.calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            outcome.diagnostics.skip_reasons()[0],
            (ProviderKind::Comtrade, SkipReason::UnsupportedConversion { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_adapters_exhaust_member() {
        let config = RoutingConfig::default();
        let catalog = IndicatorCatalog::embedded();
        let registry = ProviderRegistry::new(Vec::new(), HealthConfig::default());
        let orchestrator = FetchOrchestrator::new(&config, &catalog, GeographyResolver::new(), &registry);
        let (decision, members) = decision_for(&config, &catalog, DataRequest::new("gdp", ["FR"])).await;

        let outcomes = orchestrator
            .fetch_all(&decision, &members, None, Duration::from_secs(5))
            .await;
        let outcome = &outcomes[&country("FR")];
        assert!(matches!(
            &outcome.result,
            FetchResult::AllProvidersExhausted { attempted } if attempted.is_empty()
        ));
        assert!(outcome
            .diagnostics
            .skip_reasons()
            .iter()
            .all(|(_, reason)| matches!(reason, SkipReason::NoAdapter | SkipReason::OutOfScope)));
    }

    #[tokio::test]
    async fn test_deadline_reports_unfinished_members() {
        let config = RoutingConfig::default();
        let json = r#"[{"id": "gdp", "aliases": ["gdp"], "providers": {
            "WORLD_BANK": {"code": "NY.GDP.MKTP.CD", "confidence": 0.8}}}]"#;
        let catalog = IndicatorCatalog::from_json(json).unwrap();
        let wb = StubAdapter::new(ProviderKind::WorldBank, Behaviour::HangFor("US"));
        let registry = ProviderRegistry::new(vec![wb], HealthConfig::default());
        let orchestrator = FetchOrchestrator::new(&config, &catalog, GeographyResolver::new(), &registry);
        let (decision, members) = decision_for(&config, &catalog, DataRequest::new("gdp", ["US", "DE"])).await;

        let outcomes = orchestrator
            .fetch_all(&decision, &members, None, Duration::from_millis(100))
            .await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[&country("DE")].result.is_success());
        assert!(matches!(
            &outcomes[&country("US")].result,
            FetchResult::TimedOut { attempted } if attempted.is_empty()
        ));
    }

    #[test]
    fn test_fetch_params_include_range() {
        let start = chrono::NaiveDate::from_ymd_opt(2010, 1, 1);
        let params = fetch_params("DE".into(), Some(&DateRange::new(start, None)));
        assert_eq!(params["country"], "DE");
        assert_eq!(params["start"], "2010-01-01");
        assert!(!params.contains_key("end"));
    }
}
