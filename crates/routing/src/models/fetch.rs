use std::fmt;

use serde::Serialize;

use super::provider::ProviderKind;
use super::series::FetchedSeries;

/// Why one candidate's answer was not accepted for a member.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchFailure {
    /// Empty series, or the adapter signalled no data.
    NotAvailable { message: String },
    /// Metadata names a different country than the one requested.
    CountryMismatch { expected: String, found: String },
    /// Metadata names several countries (or none recognisable) and
    /// cannot be tied to the requested one.
    Ambiguous { country_text: String },
    /// The series description trips the concept's exclusion list.
    IndicatorMismatch { description: String },
    /// Transport, rate limit or adapter timeout.
    Transport { message: String },
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAvailable { message } => write!(f, "not available: {}", message),
            Self::CountryMismatch { expected, found } => {
                write!(f, "country mismatch: expected {}, got '{}'", expected, found)
            }
            Self::Ambiguous { country_text } => {
                write!(f, "ambiguous country metadata '{}'", country_text)
            }
            Self::IndicatorMismatch { description } => {
                write!(f, "indicator mismatch: '{}'", description)
            }
            Self::Transport { message } => write!(f, "transport: {}", message),
        }
    }
}

/// Final outcome for one requested country.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchResult {
    Fetched(FetchedSeries),
    /// Every candidate was tried or skipped without an accepted series.
    AllProvidersExhausted { attempted: Vec<ProviderKind> },
    /// The request deadline passed before this member finished.
    TimedOut { attempted: Vec<ProviderKind> },
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Fetched(_))
    }

    pub fn series(&self) -> Option<&FetchedSeries> {
        match self {
            Self::Fetched(series) => Some(series),
            _ => None,
        }
    }

    pub fn attempted(&self) -> Vec<ProviderKind> {
        match self {
            Self::Fetched(series) => vec![series.provider],
            Self::AllProvidersExhausted { attempted } | Self::TimedOut { attempted } => {
                attempted.clone()
            }
        }
    }
}

/// Aggregate status over every requested member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Complete,
    Partial,
    Failed,
}

impl RequestStatus {
    pub fn from_counts(succeeded: usize, total: usize) -> Self {
        match succeeded {
            0 => Self::Failed,
            n if n == total => Self::Complete,
            _ => Self::Partial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_counts() {
        assert_eq!(RequestStatus::from_counts(7, 7), RequestStatus::Complete);
        assert_eq!(RequestStatus::from_counts(5, 7), RequestStatus::Partial);
        assert_eq!(RequestStatus::from_counts(0, 7), RequestStatus::Failed);
    }

    #[test]
    fn test_failure_display() {
        let failure = FetchFailure::CountryMismatch {
            expected: "CA".into(),
            found: "United States".into(),
        };
        assert_eq!(
            failure.to_string(),
            "country mismatch: expected CA, got 'United States'"
        );
    }
}
