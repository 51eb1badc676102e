//! Application configuration for serpwatch.
//!
//! User config lives at `~/.serpwatch/serpwatch.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SerpwatchError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "serpwatch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".serpwatch";

/// How many results one search returns, and therefore how deep a rank scan goes.
pub const SCAN_WINDOW: u32 = 20;

// ---------------------------------------------------------------------------
// Config structs (matching serpwatch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Search provider settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Language model settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Pipeline behavior.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Result persistence.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP invocation boundary.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Provider API root.
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// The search engine host results are restricted to.
    #[serde(default = "default_engine_domain")]
    pub engine_domain: String,

    /// Maximum results requested per query.
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// Ask the provider for the full page text of each hit.
    #[serde(default = "default_true")]
    pub include_raw_content: bool,

    /// HTTP timeout for one search call.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            base_url: default_search_base_url(),
            engine_domain: default_engine_domain(),
            max_results: default_max_results(),
            include_raw_content: true,
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".into()
}
fn default_search_base_url() -> String {
    "https://api.tavily.com".into()
}
fn default_engine_domain() -> String {
    "yandex.ru".into()
}
fn default_max_results() -> u32 {
    SCAN_WINDOW
}
fn default_true() -> bool {
    true
}
fn default_search_timeout() -> u64 {
    30
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the access token.
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,

    /// Chat-completions API root.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model to ask for recommendations.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// HTTP timeout for one completion call.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Skip TLS certificate verification (some providers ship a private CA).
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_llm_key_env(),
            base_url: default_llm_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
            accept_invalid_certs: false,
        }
    }
}

fn default_llm_key_env() -> String {
    "GIGACHAT_ACCESS_TOKEN".into()
}
fn default_llm_base_url() -> String {
    "https://gigachat.devices.sberbank.ru/api/v1".into()
}
fn default_model() -> String {
    "GigaChat-2".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_llm_timeout() -> u64 {
    60
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on any single external call made by a stage.
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,

    /// How many leading results are quoted in the recommendation prompt.
    #[serde(default = "default_top_results")]
    pub top_results: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout(),
            top_results: default_top_results(),
        }
    }
}

impl PipelineConfig {
    /// The per-call timeout as a [`Duration`].
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

fn default_stage_timeout() -> u64 {
    90
}
fn default_top_results() -> usize {
    5
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Persist each run's ranking snapshot.
    #[serde(default)]
    pub enabled: bool,

    /// libSQL database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "var/serpwatch.db".into()
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address for `serpwatch serve`.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.serpwatch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SerpwatchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.serpwatch/serpwatch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SerpwatchError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SerpwatchError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SerpwatchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SerpwatchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SerpwatchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a non-empty API key from the named env var.
pub fn require_api_key(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(SerpwatchError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("TAVILY_API_KEY"));
        assert!(toml_str.contains("GIGACHAT_ACCESS_TOKEN"));
        assert!(toml_str.contains("yandex.ru"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[search]
engine_domain = "google.com"

[storage]
enabled = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.search.engine_domain, "google.com");
        assert_eq!(config.search.max_results, SCAN_WINDOW);
        assert_eq!(config.search.api_key_env, "TAVILY_API_KEY");
        assert!(config.storage.enabled);
        assert_eq!(config.storage.db_path, "var/serpwatch.db");
        assert_eq!(config.llm.model, "GigaChat-2");
        assert_eq!(config.pipeline.top_results, 5);
    }

    #[test]
    fn stage_timeout_duration() {
        let pipeline = PipelineConfig {
            stage_timeout_secs: 12,
            ..Default::default()
        };
        assert_eq!(pipeline.stage_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn missing_api_key_is_reported() {
        // Use a unique env var name to avoid interfering with other tests
        let result = require_api_key("SW_TEST_NONEXISTENT_KEY_12345");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("SW_TEST_NONEXISTENT_KEY_12345"));
    }
}
