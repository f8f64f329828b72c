//! Provider health across requests.
//!
//! Health is judged once per request, not per call. When a fetch has
//! finished, every provider it called gets a single verdict:
//!
//! - it answered at least one call (whatever the answer was): healthy again
//! - every call to it failed at the transport level: one failed request
//!
//! After `failure_threshold` failed requests in a row the provider cools
//! down, and requests started during the cooldown skip it. The first request
//! after the cooldown is a trial; if that request fails too the provider goes
//! straight back to cooling down.
//!
//! Member walks only see a [`HealthSnapshot`] taken before fan-out, so what
//! one member runs into never changes what another member tries.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::models::ProviderKind;

const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Consecutive failed requests before a provider cools down.
    pub failure_threshold: u32,
    /// How long later requests skip a cooling provider.
    #[serde(with = "crate::config::duration_ms")]
    pub cooldown: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    /// Failed recently, still called.
    Degraded,
    /// Skipped until the cooldown ends.
    CoolingDown,
    /// Cooldown over; the next failed request sends it back.
    OnTrial,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::CoolingDown => "cooling down",
            Self::OnTrial => "on trial",
        };
        f.write_str(label)
    }
}

/// What happened to one adapter call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallOutcome {
    /// The adapter returned something, data or a "not available".
    Answered,
    /// Transport, rate limit or adapter timeout.
    Unreachable,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct Tally {
    answered: u32,
    unreachable: u32,
}

/// Adapter call outcomes gathered while a request runs. Each member keeps
/// its own; they are merged once every member is done.
#[derive(Clone, Debug, Default)]
pub struct HealthReport {
    tallies: BTreeMap<ProviderKind, Tally>,
}

impl HealthReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, provider: ProviderKind, outcome: CallOutcome) {
        let tally = self.tallies.entry(provider).or_default();
        match outcome {
            CallOutcome::Answered => tally.answered += 1,
            CallOutcome::Unreachable => tally.unreachable += 1,
        }
    }

    pub fn merge(&mut self, other: &HealthReport) {
        for (provider, theirs) in &other.tallies {
            let ours = self.tallies.entry(*provider).or_default();
            ours.answered += theirs.answered;
            ours.unreachable += theirs.unreachable;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }
}

/// Providers a request must skip, fixed when the request starts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HealthSnapshot {
    cooling: BTreeSet<ProviderKind>,
}

impl HealthSnapshot {
    pub fn is_cooling(&self, provider: ProviderKind) -> bool {
        self.cooling.contains(&provider)
    }
}

#[derive(Debug, Default)]
struct Record {
    failed_requests: u32,
    cooling_until: Option<Instant>,
    on_trial: bool,
    last_failure: Option<Instant>,
}

impl Record {
    fn state(&self, now: Instant) -> HealthState {
        match self.cooling_until {
            Some(until) if until > now => HealthState::CoolingDown,
            Some(_) => HealthState::OnTrial,
            None if self.on_trial => HealthState::OnTrial,
            None if self.failed_requests > 0 => HealthState::Degraded,
            None => HealthState::Healthy,
        }
    }
}

/// Status of one provider for monitoring.
#[derive(Clone, Debug, Serialize)]
pub struct ProviderStatus {
    pub provider: ProviderKind,
    pub state: HealthState,
    /// Consecutive failed requests.
    pub failed_requests: u32,
    #[serde(skip)]
    pub last_failure: Option<Instant>,
}

/// Long-lived health records, one per provider seen so far.
pub struct ProviderHealth {
    records: Mutex<HashMap<ProviderKind, Record>>,
    config: HealthConfig,
}

impl ProviderHealth {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProviderKind, Record>> {
        self.records.lock().unwrap_or_else(|poisoned| {
            warn!("Provider health mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Providers to skip for a request starting now. Providers whose
    /// cooldown has ended are let through on trial.
    pub fn snapshot(&self) -> HealthSnapshot {
        let now = Instant::now();
        let mut cooling = BTreeSet::new();
        for (provider, record) in self.lock().iter_mut() {
            match record.cooling_until {
                Some(until) if until > now => {
                    cooling.insert(*provider);
                }
                Some(_) => {
                    info!("{} cooldown over, next request is a trial", provider);
                    record.cooling_until = None;
                    record.on_trial = true;
                }
                None => {}
            }
        }
        HealthSnapshot { cooling }
    }

    /// Apply the verdicts of one finished request.
    pub fn apply(&self, report: &HealthReport) {
        let now = Instant::now();
        let mut records = self.lock();
        for (provider, tally) in &report.tallies {
            let record = records.entry(*provider).or_default();
            if tally.answered > 0 {
                if record.failed_requests > 0 || record.on_trial {
                    info!("{} is answering again", provider);
                }
                *record = Record::default();
                continue;
            }
            if tally.unreachable == 0 {
                continue;
            }

            record.failed_requests += 1;
            record.last_failure = Some(now);
            if record.on_trial || record.failed_requests >= self.config.failure_threshold {
                info!(
                    "{} cooling down for {:?} after {} failed request(s)",
                    provider, self.config.cooldown, record.failed_requests
                );
                record.cooling_until = Some(now + self.config.cooldown);
                record.on_trial = false;
            } else {
                debug!(
                    "{}: failed request {}/{}",
                    provider, record.failed_requests, self.config.failure_threshold
                );
            }
        }
    }

    pub fn state(&self, provider: ProviderKind) -> HealthState {
        self.lock()
            .get(&provider)
            .map(|r| r.state(Instant::now()))
            .unwrap_or(HealthState::Healthy)
    }

    pub fn reset(&self, provider: ProviderKind) {
        if self.lock().remove(&provider).is_some() {
            info!("{} health reset", provider);
        }
    }

    /// Every provider with a record, ordered by provider.
    pub fn statuses(&self) -> Vec<ProviderStatus> {
        let now = Instant::now();
        let mut statuses: Vec<ProviderStatus> = self
            .lock()
            .iter()
            .map(|(provider, record)| ProviderStatus {
                provider: *provider,
                state: record.state(now),
                failed_requests: record.failed_requests,
                last_failure: record.last_failure,
            })
            .collect();
        statuses.sort_by_key(|s| s.provider);
        statuses
    }
}
