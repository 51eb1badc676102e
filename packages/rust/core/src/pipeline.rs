//! Pipeline runner: Search → AnalyzePosition → GenerateRecommendations → PersistResults.
//!
//! The runner threads one [`AnalysisState`] through an ordered list of
//! stages. Once any stage sets `error`, every later stage is given
//! [`Stage::skip`] instead of [`Stage::run`], so the failure propagates to the
//! terminal state without the chain itself branching. A terminal state with
//! `error` set is a normal outcome, not a runner fault.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use serpwatch_llm::Recommender;
use serpwatch_search::SearchProvider;
use serpwatch_shared::{PipelineConfig, Result, SearchConfig, SerpwatchError};
use serpwatch_storage::RankingSink;

use crate::stages::{
    AnalyzePositionStage, GenerateRecommendationsStage, PersistResultsStage, SearchStage, Stage,
};
use crate::state::{AnalysisInput, AnalysisState};

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called before each stage starts.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, state: &AnalysisState);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _state: &AnalysisState) {}
}

/// The external services a standard pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub search: Arc<dyn SearchProvider>,
    pub recommender: Arc<dyn Recommender>,
    /// Optional; without it nothing is persisted.
    pub sink: Option<Arc<dyn RankingSink>>,
}

/// An ordered, validated list of stages.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// The four-stage rank check wired to the given collaborators.
    pub fn standard(
        collaborators: Collaborators,
        search: &SearchConfig,
        pipeline: &PipelineConfig,
    ) -> Result<Self> {
        let timeout = pipeline.stage_timeout();
        Self::builder()
            .stage(SearchStage::new(
                collaborators.search,
                search.engine_domain.clone(),
                timeout,
            ))
            .stage(AnalyzePositionStage)
            .stage(GenerateRecommendationsStage::new(
                collaborators.recommender,
                pipeline.top_results,
                timeout,
            ))
            .stage(PersistResultsStage::new(collaborators.sink, timeout))
            .build()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order and return the terminal state.
    pub async fn run(&self, input: AnalysisInput) -> AnalysisState {
        self.run_with_progress(input, &SilentProgress).await
    }

    #[instrument(skip_all, fields(keyword = input.keyword.as_deref().unwrap_or_default()))]
    pub async fn run_with_progress(
        &self,
        input: AnalysisInput,
        progress: &dyn ProgressReporter,
    ) -> AnalysisState {
        let start = Instant::now();
        let mut state = AnalysisState::from(input);

        for stage in &self.stages {
            progress.phase(stage.name());
            let update = match state.error.as_deref() {
                Some(error) => stage.skip(&state, error).await,
                None => stage.run(&state).await,
            };
            if state.error.is_none() {
                if let Some(error) = update.error.as_deref() {
                    warn!(stage = stage.name(), error, "stage failed");
                }
            }
            debug!(stage = stage.name(), "stage finished");
            state = state.merge(update);
        }

        info!(
            elapsed_ms = start.elapsed().as_millis(),
            our_position = state.our_position,
            failed = state.error.is_some(),
            "pipeline complete"
        );
        progress.done(&state);
        state
    }
}

/// Collects stages and checks the list before a [`Pipeline`] is built.
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Fails if the list is empty or two stages share a name.
    pub fn build(self) -> Result<Pipeline> {
        if self.stages.is_empty() {
            return Err(SerpwatchError::validation("pipeline has no stages"));
        }
        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.name()) {
                return Err(SerpwatchError::validation(format!(
                    "duplicate stage name: {}",
                    stage.name()
                )));
            }
        }
        Ok(Pipeline {
            stages: self.stages,
        })
    }
}
