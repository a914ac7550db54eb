//! SerpAPI-backed search provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use redraft_shared::{RedraftError, ReferenceCandidate, Result, SearchConfig, resolve_api_key};

use crate::provider::SearchProvider;

/// Production SerpAPI endpoint.
const SERPAPI_BASE_URL: &str = "https://serpapi.com";

/// Keys left at this value by a copied sample env file count as absent.
const PLACEHOLDER_KEY: &str = "your_serpapi_key_here";

/// SerpAPI Google-search provider.
pub struct SerpApiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl SerpApiProvider {
    /// Create a provider with an explicit key. `None` means unavailable.
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RedraftError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: SERPAPI_BASE_URL.into(),
        })
    }

    /// Create a provider from config, resolving the key from the configured
    /// env var.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        Self::new(
            resolve_api_key(&config.api_key_env),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Point the provider at a different endpoint (for mock servers).
    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// SerpAPI response envelope; only organic results are consumed.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[async_trait]
impl SearchProvider for SerpApiProvider {
    async fn search(&self, query: &str, num: usize) -> Result<Vec<ReferenceCandidate>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| RedraftError::Search("no API key configured".into()))?;

        let response = self
            .client
            .get(format!("{}/search.json", self.base_url))
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("api_key", api_key),
                ("num", &num.to_string()),
                ("hl", "en"),
            ])
            .send()
            .await
            .map_err(|e| RedraftError::Search(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RedraftError::Search(format!(
                "search returned HTTP {status}"
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| RedraftError::Search(format!("malformed search response: {e}")))?;

        let candidates: Vec<ReferenceCandidate> = body
            .organic_results
            .into_iter()
            .filter_map(|r| match (r.link, r.title) {
                (Some(url), Some(title)) => Some(ReferenceCandidate { url, title }),
                _ => None,
            })
            .collect();

        debug!(count = candidates.len(), "serpapi returned organic results");
        Ok(candidates)
    }

    fn name(&self) -> &'static str {
        "serpapi"
    }

    fn is_available(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| key != PLACEHOLDER_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_with_key(key: &str, server_uri: &str) -> SerpApiProvider {
        SerpApiProvider::new(Some(key.into()), Duration::from_secs(5))
            .unwrap()
            .with_base_url(server_uri)
    }

    #[test]
    fn availability_requires_real_key() {
        let none = SerpApiProvider::new(None, Duration::from_secs(5)).unwrap();
        assert!(!none.is_available());

        let placeholder =
            SerpApiProvider::new(Some(PLACEHOLDER_KEY.into()), Duration::from_secs(5)).unwrap();
        assert!(!placeholder.is_available());

        let real = SerpApiProvider::new(Some("sk-123".into()), Duration::from_secs(5)).unwrap();
        assert!(real.is_available());
    }

    #[tokio::test]
    async fn search_sends_expected_query_params() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/search.json"))
            .and(wiremock::matchers::query_param("engine", "google"))
            .and(wiremock::matchers::query_param("q", "rust async"))
            .and(wiremock::matchers::query_param("api_key", "test-key"))
            .and(wiremock::matchers::query_param("num", "3"))
            .and(wiremock::matchers::query_param("hl", "en"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "organic_results": [
                        {"link": "https://blog.example.com/rust-async", "title": "Async Rust Guide"}
                    ]
                })),
            )
            .mount(&server)
            .await;

        let provider = provider_with_key("test-key", &server.uri());
        let results = provider.search("rust async", 3).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://blog.example.com/rust-async");
        assert_eq!(results[0].title, "Async Rust Guide");
    }

    #[tokio::test]
    async fn search_drops_results_missing_link_or_title() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/search.json"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "organic_results": [
                        {"link": "https://a.example/blog/post", "title": "Kept"},
                        {"link": "https://b.example/no-title"},
                        {"title": "No link"},
                        {}
                    ]
                })),
            )
            .mount(&server)
            .await;

        let provider = provider_with_key("test-key", &server.uri());
        let results = provider.search("anything", 4).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Kept");
    }

    #[tokio::test]
    async fn search_surfaces_http_errors() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/search.json"))
            .respond_with(wiremock::ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let provider = provider_with_key("test-key", &server.uri());
        let result = provider.search("anything", 2).await;

        assert!(matches!(result, Err(RedraftError::Search(_))));
    }

    #[tokio::test]
    async fn search_without_key_errors() {
        let provider = SerpApiProvider::new(None, Duration::from_secs(5)).unwrap();
        let result = provider.search("anything", 2).await;
        assert!(matches!(result, Err(RedraftError::Search(_))));
    }
}
