//! The `web_search` action. Adapted from the teacher's `WebFetchTool`
//! (`reqwest`-backed, schema built with `serde_json::json!`, byte-capped
//! response body) but fanning out over a list of queries via a pluggable
//! [`SearchBackend`] instead of fetching a single URL, and an
//! `HttpSearchBackend` reqwest client behind it for production use.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use crate::actions::context::{Action, ActionContext, ActionOutput, Chunk, SearchBackend};
use crate::error::ToolError;

pub struct WebSearchAction;

#[async_trait]
impl Action for WebSearchAction {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> &'static str {
        "Search the web for one or more queries and return relevant passages with titles and URLs."
    }

    fn argument_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "queries": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "One or more search queries to run."
                }
            },
            "required": ["queries"]
        })
    }

    async fn execute(&self, arguments: &serde_json::Value, ctx: &ActionContext) -> ActionOutput {
        let queries: Vec<String> = match arguments.get("queries").and_then(|v| v.as_array()) {
            Some(arr) if !arr.is_empty() => arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            _ => {
                return ActionOutput::Error { message: "web_search requires a non-empty queries array".to_string() };
            }
        };
        if queries.is_empty() {
            return ActionOutput::Error { message: "web_search requires a non-empty queries array".to_string() };
        }

        match ctx.search_backend.search(&queries).await {
            Ok(results) => ActionOutput::SearchResults { results },
            Err(err) => ActionOutput::Error { message: err.to_string() },
        }
    }
}

/// Checks the `queries` argument without executing the search, matching
/// §4.3's validation step ("invalid tool calls are dropped").
pub fn validate_web_search_arguments(arguments: &serde_json::Value) -> bool {
    arguments
        .get("queries")
        .and_then(|v| v.as_array())
        .map(|arr| !arr.is_empty() && arr.iter().any(|v| v.as_str().is_some()))
        .unwrap_or(false)
}

/// A generic JSON search API client: POSTs `{"queries": [...]}`, expects
/// back `{"results": [{"content", "title", "url", ...}]}`. The concrete
/// vendor behind this endpoint is a deployment concern (§1 "Out of scope").
pub struct HttpSearchBackend {
    client: reqwest::Client,
    endpoint: url::Url,
    max_results: usize,
}

impl HttpSearchBackend {
    pub fn new(endpoint: url::Url) -> Self {
        Self {
            client: reqwest::Client::builder().timeout(Duration::from_secs(15)).build().expect("reqwest client builds"),
            endpoint,
            max_results: 10,
        }
    }
}

#[derive(serde::Deserialize)]
struct WireSearchResponse {
    results: Vec<WireSearchResult>,
}

#[derive(serde::Deserialize)]
struct WireSearchResult {
    content: String,
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, queries: &[String]) -> Result<Vec<Chunk>, ToolError> {
        let body = json!({ "queries": queries, "max_results": self.max_results });
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ToolError::Execution(format!("search backend returned {}", resp.status())));
        }

        let wire: WireSearchResponse = resp.json().await.map_err(|e| ToolError::Execution(e.to_string()))?;
        Ok(wire
            .results
            .into_iter()
            .map(|r| Chunk {
                content: r.content,
                metadata: json!({ "title": r.title, "url": r.url, "thumbnail": r.thumbnail }),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    struct FixedBackend(Vec<Chunk>);

    #[async_trait]
    impl SearchBackend for FixedBackend {
        async fn search(&self, _queries: &[String]) -> Result<Vec<Chunk>, ToolError> {
            Ok(self.0.clone())
        }
    }

    fn ctx(backend: impl SearchBackend + 'static) -> ActionContext {
        ActionContext {
            session_id: "s1".to_string(),
            cancellation_token: CancellationToken::new(),
            search_backend: std::sync::Arc::new(backend),
        }
    }

    #[tokio::test]
    async fn empty_queries_is_an_error_output_not_a_panic() {
        let action = WebSearchAction;
        let ctx = ctx(FixedBackend(vec![]));
        let output = action.execute(&json!({"queries": []}), &ctx).await;
        assert!(matches!(output, ActionOutput::Error { .. }));
    }

    #[tokio::test]
    async fn valid_queries_returns_search_results() {
        let action = WebSearchAction;
        let chunk = Chunk { content: "hello".into(), metadata: json!({"title": "T", "url": "https://a"}) };
        let ctx = ctx(FixedBackend(vec![chunk]));
        let output = action.execute(&json!({"queries": ["rust async"]}), &ctx).await;
        match output {
            ActionOutput::SearchResults { results } => assert_eq!(results.len(), 1),
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn validation_rejects_missing_or_empty_queries() {
        assert!(!validate_web_search_arguments(&json!({})));
        assert!(!validate_web_search_arguments(&json!({"queries": []})));
        assert!(validate_web_search_arguments(&json!({"queries": ["a"]})));
    }
}
