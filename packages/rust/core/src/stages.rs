//! The four pipeline stages.
//!
//! Each stage reads the current [`AnalysisState`] and returns a
//! [`StateUpdate`]. Stage bodies are written as
//! `Result<StateUpdate, StageError>` and folded into an update by
//! [`settle`], so a failed precondition or collaborator call becomes an
//! `error` field rather than an early exit from the pipeline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, instrument};

use serpwatch_llm::Recommender;
use serpwatch_search::{SearchProvider, SearchRequest};
use serpwatch_shared::{RankingSnapshot, RunId, SearchResult, SerpwatchError};
use serpwatch_storage::RankingSink;

use crate::position::{self, NOT_RANKED};
use crate::prompt;
use crate::state::{AnalysisState, StateUpdate};

pub const SEARCH: &str = "search";
pub const ANALYZE_POSITION: &str = "analyze_position";
pub const GENERATE_RECOMMENDATIONS: &str = "generate_recommendations";
pub const PERSIST_RESULTS: &str = "persist_results";

// ---------------------------------------------------------------------------
// Stage contract
// ---------------------------------------------------------------------------

/// One step of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Unique name, used for progress and logging.
    fn name(&self) -> &'static str;

    /// Produce this stage's update from a state with no error set.
    async fn run(&self, state: &AnalysisState) -> StateUpdate;

    /// Called instead of [`Stage::run`] once an earlier stage has failed.
    async fn skip(&self, _state: &AnalysisState, error: &str) -> StateUpdate {
        StateUpdate::failed(error)
    }
}

/// Why a stage produced an error instead of its output.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// A required input field is missing. Reported verbatim.
    #[error("{0}")]
    Precondition(&'static str),

    /// A collaborator call failed.
    #[error("{context}: {}", .source.detail())]
    Failed {
        context: &'static str,
        source: SerpwatchError,
    },
}

impl StageError {
    fn failed(context: &'static str) -> impl FnOnce(SerpwatchError) -> Self {
        move |source| Self::Failed { context, source }
    }
}

/// Fold a stage body's outcome into the update it contributes.
pub fn settle(outcome: Result<StateUpdate, StageError>) -> StateUpdate {
    outcome.unwrap_or_else(|e| StateUpdate::failed(e.to_string()))
}

/// Run a collaborator call under a deadline.
async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = serpwatch_shared::Result<T>>,
) -> serpwatch_shared::Result<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| SerpwatchError::Timeout(limit))?
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Queries the search collaborator for the keyword, restricted to the
/// configured engine domain.
pub struct SearchStage {
    provider: Arc<dyn SearchProvider>,
    engine_domain: String,
    timeout: Duration,
}

impl SearchStage {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        engine_domain: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            engine_domain: engine_domain.into(),
            timeout,
        }
    }

    async fn execute(&self, state: &AnalysisState) -> Result<StateUpdate, StageError> {
        let keyword = state
            .keyword()
            .ok_or(StageError::Precondition("Keyword is required"))?;

        let request = SearchRequest::advanced(keyword, self.engine_domain.as_str());
        let results = bounded(self.timeout, self.provider.search(&request))
            .await
            .map_err(StageError::failed("Search failed"))?;

        info!(count = results.len(), "search results received");
        Ok(StateUpdate::search_results(results))
    }
}

#[async_trait]
impl Stage for SearchStage {
    fn name(&self) -> &'static str {
        SEARCH
    }

    #[instrument(skip_all, fields(stage = SEARCH))]
    async fn run(&self, state: &AnalysisState) -> StateUpdate {
        settle(self.execute(state).await)
    }
}

// ---------------------------------------------------------------------------
// AnalyzePosition
// ---------------------------------------------------------------------------

/// Finds where the domain ranks in the search results.
pub struct AnalyzePositionStage;

impl AnalyzePositionStage {
    fn execute(state: &AnalysisState) -> Result<StateUpdate, StageError> {
        let results = state
            .ranked_results()
            .ok_or(StageError::Precondition("No search results"))?;
        let domain = state
            .domain()
            .ok_or(StageError::Precondition("domain is required"))?;

        let position = position::find_domain_position(results, domain);
        debug!(domain, position, "domain position computed");
        Ok(StateUpdate::our_position(position))
    }
}

#[async_trait]
impl Stage for AnalyzePositionStage {
    fn name(&self) -> &'static str {
        ANALYZE_POSITION
    }

    async fn run(&self, state: &AnalysisState) -> StateUpdate {
        settle(Self::execute(state))
    }
}

// ---------------------------------------------------------------------------
// GenerateRecommendations
// ---------------------------------------------------------------------------

/// Asks the language model for ranking advice.
pub struct GenerateRecommendationsStage {
    recommender: Arc<dyn Recommender>,
    top_results: usize,
    timeout: Duration,
}

impl GenerateRecommendationsStage {
    pub fn new(recommender: Arc<dyn Recommender>, top_results: usize, timeout: Duration) -> Self {
        Self {
            recommender,
            top_results,
            timeout,
        }
    }

    async fn execute(&self, state: &AnalysisState) -> Result<StateUpdate, StageError> {
        let position = state
            .our_position
            .ok_or(StageError::Precondition("Position not calculated"))?;
        let results = state
            .ranked_results()
            .ok_or(StageError::Precondition("No search results"))?;

        let prompt = prompt::build_prompt(
            state.domain().unwrap_or_default(),
            state.keyword().unwrap_or_default(),
            position,
            results,
            self.top_results,
        );

        let recommendation = bounded(self.timeout, self.recommender.recommend(&prompt))
            .await
            .map_err(StageError::failed("GigaChat failed"))?;

        Ok(StateUpdate::analysis(recommendation.text))
    }
}

#[async_trait]
impl Stage for GenerateRecommendationsStage {
    fn name(&self) -> &'static str {
        GENERATE_RECOMMENDATIONS
    }

    #[instrument(skip_all, fields(stage = GENERATE_RECOMMENDATIONS))]
    async fn run(&self, state: &AnalysisState) -> StateUpdate {
        settle(self.execute(state).await)
    }
}

// ---------------------------------------------------------------------------
// PersistResults
// ---------------------------------------------------------------------------

/// Hands the finished run to the ranking sink, if one is configured.
pub struct PersistResultsStage {
    sink: Option<Arc<dyn RankingSink>>,
    timeout: Duration,
}

impl PersistResultsStage {
    pub fn new(sink: Option<Arc<dyn RankingSink>>, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    async fn execute(&self, state: &AnalysisState) -> Result<StateUpdate, StageError> {
        let Some(sink) = &self.sink else {
            debug!("no ranking sink configured, nothing persisted");
            return Ok(StateUpdate::empty());
        };

        let snapshot = snapshot_of(state);
        bounded(self.timeout, sink.save(&snapshot))
            .await
            .map_err(StageError::failed("Save failed"))?;

        info!(run_id = %snapshot.run_id, "ranking snapshot saved");
        Ok(StateUpdate::empty())
    }
}

#[async_trait]
impl Stage for PersistResultsStage {
    fn name(&self) -> &'static str {
        PERSIST_RESULTS
    }

    #[instrument(skip_all, fields(stage = PERSIST_RESULTS))]
    async fn run(&self, state: &AnalysisState) -> StateUpdate {
        settle(self.execute(state).await)
    }

    async fn skip(&self, state: &AnalysisState, error: &str) -> StateUpdate {
        error!(
            keyword = state.keyword.as_deref().unwrap_or_default(),
            error, "pipeline finished with an error"
        );
        StateUpdate::empty()
    }
}

/// Build the record a sink stores for a completed run.
pub fn snapshot_of(state: &AnalysisState) -> RankingSnapshot {
    let domain = state.domain().unwrap_or_default();
    let results = state.ranked_results().unwrap_or_default();

    RankingSnapshot {
        run_id: RunId::new(),
        keyword_ref: state.keyword.clone().unwrap_or_default(),
        domain: domain.to_string(),
        checked_at: Utc::now(),
        positions: position::rank_entries(results, domain),
        our_position: state.our_position.unwrap_or(NOT_RANKED),
        analysis: state.analysis.clone().unwrap_or_default(),
        results_hash: results_hash(results),
    }
}

/// Hex SHA-256 of the ranked URLs, one per line.
pub fn results_hash(results: &[SearchResult]) -> String {
    let mut hasher = Sha256::new();
    for r in results {
        hasher.update(r.url.as_bytes());
        hasher.update(b"\n");
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
