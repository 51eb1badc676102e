//! Rank-check pipeline for serpwatch.
//!
//! A run threads one [`AnalysisState`] through four stages: search the
//! keyword, find the domain's rank, ask a language model for advice, and
//! persist the outcome. Failures travel as the state's `error` field rather
//! than as `Err`, so [`Pipeline::run`] always yields a terminal state.

pub mod pipeline;
pub mod position;
pub mod prompt;
pub mod stages;
pub mod state;

#[cfg(test)]
mod testing;

pub use pipeline::{Collaborators, Pipeline, PipelineBuilder, ProgressReporter, SilentProgress};
pub use stages::{Stage, StageError};
pub use state::{AnalysisInput, AnalysisState, StateUpdate};
