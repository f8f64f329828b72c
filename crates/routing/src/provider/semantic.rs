//! Semantic search index trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::RoutingError;

/// One search result from the semantic index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemanticHit {
    /// Provider name as the index stores it; parsed leniently.
    pub provider: String,
    pub code: String,
    pub description: String,
    /// Similarity score, higher is better.
    pub score: f64,
}

/// Vector search over provider series descriptions.
///
/// Only consulted when the catalog has nothing confident for a request.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    async fn search(
        &self,
        text: &str,
        provider_filter: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SemanticHit>, RoutingError>;
}
