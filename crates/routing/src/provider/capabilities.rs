//! Rate limiting configuration for provider adapters.

/// How aggressively a provider may be called.
///
/// The request pacer spaces calls to each provider according to this, so a
/// wide group fan-out cannot burst a provider's quota.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimit {
    /// Maximum requests allowed per minute.
    pub requests_per_minute: u32,

    /// Requests that may go out back to back before throttling starts.
    pub burst: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst: 10,
        }
    }
}

impl RateLimit {
    pub fn per_minute(requests_per_minute: u32, burst: u32) -> Self {
        Self {
            requests_per_minute,
            burst,
        }
    }
}
