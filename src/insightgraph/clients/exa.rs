//! [`SearchService`] over the Exa `/search` endpoint.
//!
//! Queries use Exa's automatic search type and request a generated summary
//! for every result.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::insightgraph::clients::http_pool::get_http_client;
use crate::insightgraph::error::GraphError;
use crate::insightgraph::search::{SearchResult, SearchService};

const DEFAULT_BASE_URL: &str = "https://api.exa.ai";

#[derive(Debug, Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Debug, Deserialize)]
struct ExaResult {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    summary: Option<String>,
}

/// Decode an Exa search response.
///
/// A missing title becomes an empty string; a blank summary becomes `None`.
pub fn parse_search_results(body: &str) -> Result<Vec<SearchResult>, GraphError> {
    let response: ExaResponse = serde_json::from_str(body)
        .map_err(|e| GraphError::Search(format!("undecodable search response: {}", e)))?;
    Ok(response
        .results
        .into_iter()
        .map(|r| SearchResult {
            title: r.title.unwrap_or_default(),
            url: r.url,
            summary: r.summary.filter(|s| !s.trim().is_empty()),
        })
        .collect())
}

#[derive(Clone)]
pub struct ExaSearchClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ExaSearchClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            http: get_http_client(DEFAULT_BASE_URL),
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Read the key from `EXA_API_KEY`.
    pub fn from_env() -> Result<Self, GraphError> {
        let api_key = std::env::var("EXA_API_KEY")
            .map_err(|_| GraphError::Config("EXA_API_KEY is not set".into()))?;
        Ok(Self::new(&api_key))
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        self.http = get_http_client(base_url);
        self.base_url = base_url.to_string();
        self
    }
}

#[async_trait]
impl SearchService for ExaSearchClient {
    async fn search(&self, query: &str, result_count: usize) -> Result<Vec<SearchResult>, GraphError> {
        let body = json!({
            "query": query,
            "type": "auto",
            "numResults": result_count,
            "contents": { "summary": true },
        });

        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                log::error!("ExaSearchClient::search: transport error: {}", e);
                GraphError::Search(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GraphError::Search(e.to_string()))?;
        if !status.is_success() {
            log::error!("ExaSearchClient::search: HTTP {}: {}", status, text);
            return Err(GraphError::Search(format!("search returned {}: {}", status, text)));
        }

        let mut results = parse_search_results(&text)?;
        results.truncate(result_count);
        Ok(results)
    }
}
