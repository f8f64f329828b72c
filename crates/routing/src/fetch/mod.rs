//! Fetch execution.
//!
//! This module provides:
//! - [`FetchOrchestrator`]: per-member fallback walks, fanned out per group
//! - [`ProviderRegistry`]: registered adapters with pacing and health records
//! - [`ProviderHealth`]: request-level provider health and cooldowns
//! - [`RequestPacer`]: per-provider send slots
//! - [`SeriesValidator`]: country and indicator checks on fetched series
//! - [`FetchDiagnostics`]: what was tried for each member and why it failed

mod diagnostics;
mod health;
mod normalize;
mod orchestrator;
mod pacer;
mod registry;
mod validator;

pub use diagnostics::{AttemptOutcome, FetchDiagnostics, ProviderAttempt, SkipReason};
pub use health::{
    CallOutcome, HealthConfig, HealthReport, HealthSnapshot, HealthState, ProviderHealth,
    ProviderStatus,
};
pub use normalize::{normalize_observations, parse_period};
pub use orchestrator::{FetchOrchestrator, MemberOutcome};
pub use pacer::RequestPacer;
pub use registry::ProviderRegistry;
pub use validator::SeriesValidator;
