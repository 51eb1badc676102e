//! Tavily search API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serpwatch_shared::{Result, SearchConfig, SearchResult, SearchResults, SerpwatchError};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::{SearchDepth, SearchProvider, SearchRequest};

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("serpwatch/", env!("CARGO_PKG_VERSION"));

/// Tavily `/search` client.
#[derive(Debug, Clone)]
pub struct TavilyClient {
    client: Client,
    base_url: String,
    api_key: String,
    max_results: u32,
    include_raw_content: bool,
}

impl TavilyClient {
    /// Build a client from the `[search]` config section and an API key.
    pub fn new(api_key: impl Into<String>, config: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SerpwatchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_results: config.max_results,
            include_raw_content: config.include_raw_content,
        })
    }

    /// Build a client, reading the API key from the configured env var.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let api_key = serpwatch_shared::require_api_key(&config.api_key_env)?;
        Self::new(api_key, config)
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ApiRequest<'a> {
    query: &'a str,
    search_depth: SearchDepth,
    include_domains: &'a [String],
    max_results: u32,
    include_raw_content: bool,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    results: Vec<ApiResult>,
}

#[derive(Deserialize)]
struct ApiResult {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    raw_content: Option<String>,
}

/// Error bodies come as `{"detail": {"error": "..."}}` or `{"detail": "..."}`.
#[derive(Deserialize)]
struct ApiErrorBody {
    detail: serde_json::Value,
}

impl ApiErrorBody {
    fn message(&self) -> Option<String> {
        match &self.detail {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(map) => map
                .get("error")
                .and_then(|v| v.as_str())
                .map(String::from),
            _ => None,
        }
    }
}

#[async_trait]
impl SearchProvider for TavilyClient {
    #[instrument(skip_all, fields(query = %request.query))]
    async fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        let body = ApiRequest {
            query: &request.query,
            search_depth: request.search_depth,
            include_domains: &request.include_domains,
            max_results: self.max_results,
            include_raw_content: self.include_raw_content,
        };

        debug!(url = %self.search_url(), "querying search provider");

        let response = self
            .client
            .post(self.search_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SerpwatchError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SerpwatchError::Network(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|b| b.message())
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(SerpwatchError::Search(message));
        }

        let parsed: ApiResponse = serde_json::from_str(&text)
            .map_err(|e| SerpwatchError::parse(format!("invalid search response: {e}")))?;

        let results = validate_results(parsed.results);
        info!(results = results.len(), "search complete");

        Ok(results)
    }
}

/// Keep only entries with an absolute URL, preserving rank order.
fn validate_results(raw: Vec<ApiResult>) -> SearchResults {
    let total = raw.len();
    let results: Vec<SearchResult> = raw
        .into_iter()
        .filter_map(|r| {
            let url = r.url?.trim().to_string();
            if Url::parse(&url).is_err() {
                return None;
            }
            Some(SearchResult {
                url,
                title: r.title,
                content: r.content,
                score: r.score,
                raw_content: r.raw_content,
            })
        })
        .collect();

    let dropped = total - results.len();
    if dropped > 0 {
        warn!(dropped, "discarded search results without a usable URL");
    }

    SearchResults::new(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TavilyClient {
        let config = SearchConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            ..Default::default()
        };
        TavilyClient::new("tvly-test", &config).unwrap()
    }

    #[tokio::test]
    async fn search_sends_depth_and_domain_and_parses_results() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("authorization", "Bearer tvly-test"))
            .and(body_partial_json(serde_json::json!({
                "query": "kitchens",
                "search_depth": "advanced",
                "include_domains": ["yandex.ru"],
                "max_results": 20,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": "kitchens",
                "results": [
                    {"url": "https://a.com/x", "title": "A", "content": "snippet", "score": 0.9},
                    {"url": "https://b.com/y", "title": "B", "raw_content": "full text"}
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let results = client
            .search(&SearchRequest::advanced("kitchens", "yandex.ru"))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results.results[0].url, "https://a.com/x");
        assert_eq!(results.results[0].score, Some(0.9));
        assert_eq!(results.results[1].raw_content.as_deref(), Some("full text"));
    }

    #[tokio::test]
    async fn search_drops_entries_without_usable_url() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"title": "no url"},
                    {"url": "   "},
                    {"url": "not a url"},
                    {"url": "https://kept.com/"}
                ]
            })))
            .mount(&server)
            .await;

        let results = client_for(&server)
            .search(&SearchRequest::advanced("q", "yandex.ru"))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results.results[0].url, "https://kept.com/");
    }

    #[tokio::test]
    async fn search_reports_provider_error_detail() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "detail": {"error": "Unauthorized: missing or invalid API key."}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .search(&SearchRequest::advanced("q", "yandex.ru"))
            .await
            .unwrap_err();

        assert!(matches!(err, SerpwatchError::Search(_)));
        assert_eq!(err.detail(), "Unauthorized: missing or invalid API key.");
    }

    #[tokio::test]
    async fn search_falls_back_to_status_when_body_is_opaque() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .search(&SearchRequest::advanced("q", "yandex.ru"))
            .await
            .unwrap_err();

        assert!(err.detail().contains("502"));
    }

    #[tokio::test]
    async fn search_rejects_malformed_json() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .search(&SearchRequest::advanced("q", "yandex.ru"))
            .await
            .unwrap_err();

        assert!(matches!(err, SerpwatchError::Parse { .. }));
    }
}
