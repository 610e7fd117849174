//! Web search adapters.
//!
//! Two backends are available: DuckDuckGo via the daedra crate (keyless,
//! behind the `duckduckgo` feature) and the Tavily REST API over reqwest.

use crate::types::{AppError, Result};
use crate::utils::config::{SearchProvider, VerisConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One result from a web search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Relevance in [0, 1]
    pub score: f32,
}

/// Anything that can answer a web query.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;

    fn name(&self) -> &str;
}

/// Score for backends that only return an ordering.
pub fn rank_score(rank: usize) -> f32 {
    1.0 / (1.0 + rank as f32 * 0.15)
}

/// Build the adapter selected by `[search]`, or `None` when search is disabled.
pub fn from_config(config: &VerisConfig) -> Result<Option<Arc<dyn WebSearch>>> {
    match config.search.provider {
        SearchProvider::None => Ok(None),
        SearchProvider::Tavily => {
            let api_key = config.search_api_key()?;
            let mut search = TavilySearch::new(api_key);
            if let Some(ref base_url) = config.search.base_url {
                search = search.with_base_url(base_url.clone());
            }
            Ok(Some(Arc::new(search)))
        }
        #[cfg(feature = "duckduckgo")]
        SearchProvider::DuckDuckGo => Ok(Some(Arc::new(DuckDuckGoSearch::new()))),
        #[cfg(not(feature = "duckduckgo"))]
        SearchProvider::DuckDuckGo => Err(AppError::Configuration(
            "DuckDuckGo search is not compiled in; rebuild with the 'duckduckgo' feature".into(),
        )),
    }
}

// ============= DuckDuckGo (daedra) =============

/// Web search powered by daedra
#[cfg(feature = "duckduckgo")]
#[derive(Debug, Default, Clone)]
pub struct DuckDuckGoSearch;

#[cfg(feature = "duckduckgo")]
impl DuckDuckGoSearch {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "duckduckgo")]
#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("Search query is empty".to_string()));
        }

        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: max_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| AppError::SourceUnavailable {
                source_name: "duckduckgo".to_string(),
                message: e.to_string(),
            })?;

        Ok(response
            .data
            .iter()
            .take(max_results)
            .enumerate()
            .map(|(rank, r)| SearchHit {
                title: r.title.clone(),
                url: r.url.clone(),
                snippet: r.description.clone(),
                score: rank_score(rank),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

// ============= Tavily =============

const TAVILY_API_URL: &str = "https://api.tavily.com";

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    score: Option<f32>,
}

/// Web search through the Tavily API
pub struct TavilySearch {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TavilySearch {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: TAVILY_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("Search query is empty".to_string()));
        }

        let unavailable = |message: String| AppError::SourceUnavailable {
            source_name: "tavily".to_string(),
            message,
        };

        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&TavilyRequest {
                api_key: &self.api_key,
                query,
                max_results,
                search_depth: "basic",
            })
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {}", status)));
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| unavailable(format!("malformed response: {}", e)))?;

        Ok(body
            .results
            .into_iter()
            .take(max_results)
            .enumerate()
            .map(|(rank, r)| SearchHit {
                title: r.title,
                url: r.url,
                snippet: r.content,
                score: r
                    .score
                    .filter(|s| s.is_finite())
                    .map(|s| s.clamp(0.0, 1.0))
                    .unwrap_or_else(|| rank_score(rank)),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "tavily"
    }
}
