//! Request pacing per provider.
//!
//! Each provider has a schedule of send slots spaced
//! `60s / requests_per_minute` apart, of which up to `burst` may be used
//! ahead of time. A caller reserves the next slot under the lock and then
//! sleeps until it comes round, so concurrent members queue in reservation
//! order. Pacing only delays calls; it never changes which candidate a
//! member tries next.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::models::ProviderKind;
use crate::provider::RateLimit;

#[derive(Debug)]
struct Schedule {
    spacing: Duration,
    /// How far ahead of its slot a call may go out.
    tolerance: Duration,
    next_slot: Instant,
}

impl Schedule {
    fn new(limit: &RateLimit, now: Instant) -> Self {
        let spacing = Duration::from_secs(60) / limit.requests_per_minute.max(1);
        Self {
            spacing,
            tolerance: spacing * limit.burst.max(1).saturating_sub(1),
            next_slot: now,
        }
    }

    /// Reserve the next slot; returns when the call may go out.
    fn reserve(&mut self, now: Instant) -> Instant {
        let slot = self.next_slot.max(now);
        self.next_slot = slot + self.spacing;
        slot.checked_sub(self.tolerance)
            .map_or(now, |earliest| earliest.max(now))
    }
}

pub struct RequestPacer {
    limits: HashMap<ProviderKind, RateLimit>,
    schedules: Mutex<HashMap<ProviderKind, Schedule>>,
}

impl RequestPacer {
    /// Providers missing from `limits` get [`RateLimit::default`].
    pub fn new(limits: HashMap<ProviderKind, RateLimit>) -> Self {
        Self {
            limits,
            schedules: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProviderKind, Schedule>> {
        self.schedules.lock().unwrap_or_else(|poisoned| {
            warn!("Request pacer mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Wait for this caller's slot with `provider`.
    pub async fn pace(&self, provider: ProviderKind) {
        let at = {
            let now = Instant::now();
            let mut schedules = self.lock();
            schedules
                .entry(provider)
                .or_insert_with(|| {
                    let default = RateLimit::default();
                    Schedule::new(self.limits.get(&provider).unwrap_or(&default), now)
                })
                .reserve(now)
        };
        let wait = at.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            debug!("Pacing {}: waiting {:?}", provider, wait);
            tokio::time::sleep_until(at).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_spacing() {
        let now = Instant::now();
        // One slot per second, three up front.
        let mut schedule = Schedule::new(&RateLimit::per_minute(60, 3), now);

        for _ in 0..3 {
            assert_eq!(schedule.reserve(now), now);
        }
        assert_eq!(schedule.reserve(now), now + Duration::from_secs(1));
        assert_eq!(schedule.reserve(now), now + Duration::from_secs(2));
    }

    #[test]
    fn test_idle_time_restores_burst() {
        let start = Instant::now();
        let mut schedule = Schedule::new(&RateLimit::per_minute(60, 2), start);
        schedule.reserve(start);
        schedule.reserve(start);

        let later = start + Duration::from_secs(10);
        assert_eq!(schedule.reserve(later), later);
        assert_eq!(schedule.reserve(later), later);
        assert_eq!(schedule.reserve(later), later + Duration::from_secs(1));
    }

    #[test]
    fn test_zero_limits_are_clamped() {
        let now = Instant::now();
        let mut schedule = Schedule::new(&RateLimit::per_minute(0, 0), now);
        assert_eq!(schedule.reserve(now), now);
        assert_eq!(schedule.reserve(now), now + Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_pace_waits_for_reserved_slot() {
        let pacer = RequestPacer::new(HashMap::from([(
            ProviderKind::Oecd,
            RateLimit::per_minute(600, 1),
        )]));

        let start = Instant::now();
        pacer.pace(ProviderKind::Oecd).await;
        pacer.pace(ProviderKind::Oecd).await;
        assert!(start.elapsed() >= Duration::from_millis(90));

        // Unconfigured providers keep the default burst.
        let before = Instant::now();
        pacer.pace(ProviderKind::Imf).await;
        pacer.pace(ProviderKind::Imf).await;
        assert!(before.elapsed() < Duration::from_millis(50));
    }
}
