//! Web search collaborator.
//!
//! The pipeline's first stage asks a search provider for the ranked results of
//! a keyword, restricted to a single search-engine host. [`SearchProvider`] is
//! the seam the pipeline depends on; [`TavilyClient`] is the production
//! implementation.

mod tavily;

use async_trait::async_trait;
use serde::Serialize;
use serpwatch_shared::{Result, SearchResults};

pub use tavily::TavilyClient;

/// How hard the provider should dig for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    Basic,
    Advanced,
}

/// A single search query.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub search_depth: SearchDepth,
    /// Hosts results must come from. Empty means unrestricted.
    pub include_domains: Vec<String>,
}

impl SearchRequest {
    /// An advanced-depth query restricted to one host.
    pub fn advanced(query: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            search_depth: SearchDepth::Advanced,
            include_domains: vec![domain.into()],
        }
    }
}

/// Anything that can turn a query into a ranked result list.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run the query. Results come back in rank order.
    async fn search(&self, request: &SearchRequest) -> Result<SearchResults>;
}
