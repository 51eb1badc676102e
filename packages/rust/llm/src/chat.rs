//! OpenAI-style chat-completions client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serpwatch_shared::{LlmConfig, Result, SerpwatchError};
use tracing::{debug, info, instrument};

use crate::{Recommendation, Recommender};

/// Used when a failure carries no message and no body.
const UNKNOWN_ERROR: &str = "Unknown error";

/// Chat-completions client with bearer-token auth.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    client: Client,
    base_url: String,
    token: String,
    model: String,
    temperature: f32,
}

impl ChatCompletionsClient {
    /// Build a client from the `[llm]` config section and an access token.
    pub fn new(token: impl Into<String>, config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| SerpwatchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Build a client, reading the token from the configured env var.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let token = serpwatch_shared::require_api_key(&config.api_key_env)?;
        Self::new(token, config)
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: [ApiMessage<'a>; 1],
    temperature: f32,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Best human-readable description of a failed call's body.
///
/// Prefers the provider's own message (`message`, `error.message`, `error`,
/// `detail`), then the whole error object serialized, then the raw text,
/// and finally `"Unknown error"`.
pub fn failure_text(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return UNKNOWN_ERROR.to_string();
    }

    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return trimmed.to_string();
    };

    let provider_message = value
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| value.pointer("/error/message").and_then(|m| m.as_str()))
        .or_else(|| value.get("error").and_then(|m| m.as_str()))
        .or_else(|| value.get("detail").and_then(|m| m.as_str()))
        .filter(|m| !m.trim().is_empty());

    match provider_message {
        Some(message) => message.to_string(),
        None if value.is_null() => UNKNOWN_ERROR.to_string(),
        None => serde_json::to_string_pretty(&value).unwrap_or_else(|_| trimmed.to_string()),
    }
}

#[async_trait]
impl Recommender for ChatCompletionsClient {
    #[instrument(skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    async fn recommend(&self, prompt: &str) -> Result<Recommendation> {
        let start = Instant::now();

        let request = ChatApiRequest {
            model: &self.model,
            messages: [ApiMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| SerpwatchError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SerpwatchError::Network(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            debug!(%status, "model call rejected");
            return Err(SerpwatchError::Model(failure_text(&body)));
        }

        let parsed: ChatApiResponse = serde_json::from_str(&body)
            .map_err(|e| SerpwatchError::parse(format!("invalid completion response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SerpwatchError::Model("empty response".into()))?;

        info!(
            latency_ms = start.elapsed().as_millis(),
            response_len = text.len(),
            "recommendation received"
        );

        Ok(Recommendation { text })
    }
}
