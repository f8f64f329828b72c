//! Error types and retry classification for the routing crate.
//!
//! This module provides:
//! - [`RoutingError`]: The main error enum for resolution, routing and fetching
//! - [`RetryClass`]: Classification for deciding how a fallback walk proceeds

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

use crate::models::{CodeFormat, ProviderKind};

/// Errors that can occur while resolving, routing or fetching a data request.
///
/// Resolution-time variants (`UnknownGeography`, `Ambiguous`, ...) are
/// returned to the caller. Fetch-time variants are produced by provider
/// adapters and converted into fallback advancement by the orchestrator;
/// see [`retry_class`](Self::retry_class).
#[derive(Error, Debug)]
pub enum RoutingError {
    /// The geography token is not a known country, alias or group.
    #[error("Unknown geography: {0}")]
    UnknownGeography(String),

    /// The country has no code in the requested code system.
    #[error("No {format} code for country {code}")]
    UnsupportedConversion {
        /// The code that was being converted
        code: String,
        /// The target code system
        format: CodeFormat,
    },

    /// No indicator concept matched the request text.
    #[error("No indicator concept matches '{0}'")]
    NoConceptMatch(String),

    /// Several concepts matched equally well; the caller should clarify.
    #[error("Ambiguous indicator '{query}': could be any of {}", .candidates.join(", "))]
    Ambiguous {
        /// The request text
        query: String,
        /// Concept ids that tied
        candidates: Vec<String>,
    },

    /// The provider name in an override is not a known provider.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// The explicitly requested provider covers none of the requested countries.
    #[error("Provider {provider} does not cover {geography}")]
    UncoveredGeography {
        /// The overriding provider
        provider: ProviderKind,
        /// Display form of the requested geography
        geography: String,
    },

    /// The request itself is malformed (e.g. no geography tokens).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provider has no data for this code/parameter set.
    #[error("Not available from {provider}: {message}")]
    NotAvailable {
        /// The provider that had nothing
        provider: ProviderKind,
        /// Provider-supplied detail
        message: String,
    },

    /// The provider answered with another country's data.
    #[error("Country mismatch: expected {expected}, got {found}")]
    CountryMismatch {
        /// Requested alpha-2 code
        expected: String,
        /// Country text found in the returned metadata
        found: String,
    },

    /// The provider rate limited the request.
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: ProviderKind,
    },

    /// The provider call timed out inside the adapter.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: ProviderKind,
    },

    /// A transport or protocol error from the adapter.
    #[error("Transport error: {provider} - {message}")]
    Transport {
        /// The provider that failed
        provider: ProviderKind,
        /// Error detail
        message: String,
    },

    /// An embedded or reloaded data table failed to parse or validate.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// JSON parsing error while loading a data table.
    #[error("Catalog parse error: {0}")]
    CatalogParse(#[from] serde_json::Error),
}

impl RoutingError {
    /// Returns the retry classification for this error.
    ///
    /// ```
    /// use econroute_routing::errors::{RetryClass, RoutingError};
    /// use econroute_routing::models::ProviderKind;
    ///
    /// let error = RoutingError::Timeout { provider: ProviderKind::Imf };
    /// assert_eq!(error.retry_class(), RetryClass::NextCandidateWithPenalty);
    ///
    /// let error = RoutingError::UnknownGeography("Atlantis".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Terminal);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::UnknownGeography(_)
            | Self::NoConceptMatch(_)
            | Self::Ambiguous { .. }
            | Self::UnknownProvider(_)
            | Self::UncoveredGeography { .. }
            | Self::InvalidRequest(_)
            | Self::Catalog(_)
            | Self::CatalogParse(_) => RetryClass::Terminal,

            // Coverage gaps and bad answers: someone else may have it
            Self::UnsupportedConversion { .. }
            | Self::NotAvailable { .. }
            | Self::CountryMismatch { .. } => RetryClass::NextCandidate,

            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Transport { .. } => {
                RetryClass::NextCandidateWithPenalty
            }

        }
    }
}
