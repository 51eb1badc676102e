//! Shared types, error model, and configuration for serpwatch.
//!
//! This crate is the foundation depended on by all other serpwatch crates.
//! It provides:
//! - [`SerpwatchError`]: the unified error type
//! - Domain types ([`SearchResult`], [`SearchResults`], [`RankingSnapshot`], [`RunId`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, LlmConfig, PipelineConfig, SCAN_WINDOW, SearchConfig, ServerConfig, StorageConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, require_api_key,
};
pub use error::{Result, SerpwatchError};
pub use types::{PositionEntry, RankingSnapshot, RunId, SearchResult, SearchResults};
