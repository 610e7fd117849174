use crate::agents::Agent;
use crate::rag::{DocumentIndex, RetrievedChunk};
use crate::tools::{SearchHit, WebSearch};
use crate::types::{
    AppError, DegradationReason, Finding, Query, ResearchStrategy, Result, Source, SourceKind,
    SourceOrigin, Stage,
};
use crate::utils::config::VerisConfig;
use crate::utils::retry::RetryPolicy;
use crate::utils::text::content_hash;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ResearchInput {
    pub query: Query,
    pub strategy: ResearchStrategy,
}

#[derive(Debug, Clone, Default)]
pub struct ResearchOutput {
    /// Sources referenced by at least one finding
    pub sources: Vec<Source>,
    pub findings: Vec<Finding>,
    pub degraded: BTreeSet<DegradationReason>,
    /// Sources the strategy asked for, whether or not they succeeded
    pub attempted: BTreeSet<SourceKind>,
}

/// Gathers findings from web search and the document index.
///
/// The two lookups run concurrently and are joined before deduplication. A
/// failing lookup is recorded as a degradation; the other one's findings are
/// still returned.
pub struct ResearcherAgent {
    config: Arc<VerisConfig>,
    web_search: Option<Arc<dyn WebSearch>>,
    index: Arc<DocumentIndex>,
    policy: RetryPolicy,
}

impl ResearcherAgent {
    pub fn new(
        config: Arc<VerisConfig>,
        web_search: Option<Arc<dyn WebSearch>>,
        index: Arc<DocumentIndex>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            config,
            web_search,
            index,
            policy,
        }
    }

    pub async fn research(&self, query: &Query, strategy: &ResearchStrategy) -> ResearchOutput {
        let max_results = self.config.search.max_results.for_complexity(strategy.complexity);
        let top_k = self.config.rag.top_k.for_complexity(strategy.complexity);

        let web = async {
            if !strategy.uses(SourceKind::Web) {
                return None;
            }
            Some(self.search_web(query.text(), max_results).await)
        };
        let documents = async {
            if !strategy.uses(SourceKind::Documents) {
                return None;
            }
            Some(
                self.policy
                    .execute("document_index.query", || self.index.query(query.text(), top_k))
                    .await,
            )
        };

        let (web, documents) = tokio::join!(web, documents);

        let mut output = ResearchOutput {
            attempted: strategy.sources.clone(),
            ..ResearchOutput::default()
        };

        match web {
            Some(Ok(hits)) => {
                debug!(hits = hits.len(), "Web search returned");
                Self::add_web_hits(&mut output, hits);
            }
            Some(Err(e)) => {
                warn!(error = %e, "Web search failed, continuing without it");
                output.degraded.insert(DegradationReason::WebSearchFailed);
            }
            None => {}
        }

        match documents {
            Some(Ok(chunks)) => {
                debug!(chunks = chunks.len(), "Document index returned");
                Self::add_document_chunks(&mut output, chunks);
            }
            Some(Err(e)) => {
                warn!(error = %e, "Document retrieval failed, continuing without it");
                output.degraded.insert(DegradationReason::DocumentRetrievalFailed);
            }
            None => {}
        }

        Self::deduplicate(&mut output);

        info!(
            findings = output.findings.len(),
            sources = output.sources.len(),
            degraded = output.degraded.len(),
            "Research complete"
        );
        output
    }

    async fn search_web(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let search = self.web_search.as_ref().ok_or_else(|| AppError::SourceUnavailable {
            source_name: "web_search".to_string(),
            message: "no web search adapter configured".to_string(),
        })?;
        self.policy
            .execute("web_search", || search.search(query, max_results))
            .await
    }

    fn add_web_hits(output: &mut ResearchOutput, hits: Vec<SearchHit>) {
        let mut by_url: HashMap<String, String> = HashMap::new();

        for hit in hits {
            let text = if hit.snippet.trim().is_empty() {
                hit.title.trim().to_string()
            } else {
                hit.snippet.trim().to_string()
            };
            if text.is_empty() || hit.url.is_empty() {
                continue;
            }

            let source_id = match by_url.get(&hit.url) {
                Some(id) => id.clone(),
                None => {
                    let title = (!hit.title.is_empty()).then(|| hit.title.clone());
                    let source = Source::new(SourceOrigin::Web, hit.url.clone(), title);
                    let id = source.id.clone();
                    by_url.insert(hit.url.clone(), id.clone());
                    output.sources.push(source);
                    id
                }
            };
            output.findings.push(Finding::new(text, source_id, hit.score));
        }
    }

    fn add_document_chunks(output: &mut ResearchOutput, chunks: Vec<RetrievedChunk>) {
        let mut by_document: HashMap<String, String> = HashMap::new();

        for chunk in chunks {
            if chunk.text.trim().is_empty() {
                continue;
            }
            let source_id = by_document
                .entry(chunk.document_id.clone())
                .or_insert_with(|| {
                    let source = Source::new(SourceOrigin::Document, chunk.locator.clone(), None);
                    let id = source.id.clone();
                    output.sources.push(source);
                    id
                })
                .clone();
            output.findings.push(Finding::new(chunk.text, source_id, chunk.score));
        }
    }

    /// Collapse findings with the same normalised text, keeping the most relevant
    /// instance at the position of the first, then drop sources nothing references.
    fn deduplicate(output: &mut ResearchOutput) {
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut unique: Vec<Finding> = Vec::with_capacity(output.findings.len());

        for finding in output.findings.drain(..) {
            let key = content_hash(&finding.text);
            match positions.get(&key) {
                Some(&i) => {
                    if finding.relevance_score > unique[i].relevance_score {
                        unique[i] = finding;
                    }
                }
                None => {
                    positions.insert(key, unique.len());
                    unique.push(finding);
                }
            }
        }

        let referenced: BTreeSet<&str> = unique.iter().map(|f| f.source_id.as_str()).collect();
        output.sources.retain(|s| referenced.contains(s.id.as_str()));
        output.findings = unique;
    }
}

#[async_trait]
impl Agent for ResearcherAgent {
    type Input = ResearchInput;
    type Output = ResearchOutput;

    fn stage(&self) -> Stage {
        Stage::Researching
    }

    async fn process(&self, input: ResearchInput) -> Result<ResearchOutput> {
        Ok(self.research(&input.query, &input.strategy).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Complexity, FactCheckLevel};
    use crate::utils::config::RagConfig;

    struct StaticSearch(Vec<SearchHit>);

    #[async_trait]
    impl WebSearch for StaticSearch {
        async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
            Ok(self.0.iter().take(max_results).cloned().collect())
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    struct DownSearch;

    #[async_trait]
    impl WebSearch for DownSearch {
        async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<SearchHit>> {
            Err(AppError::SourceUnavailable {
                source_name: "down".into(),
                message: "503".into(),
            })
        }

        fn name(&self) -> &str {
            "down"
        }
    }

    fn hit(url: &str, snippet: &str, score: f32) -> SearchHit {
        SearchHit {
            title: format!("title {}", url),
            url: url.to_string(),
            snippet: snippet.to_string(),
            score,
        }
    }

    fn strategy(sources: &[SourceKind]) -> ResearchStrategy {
        ResearchStrategy {
            complexity: Complexity::Moderate,
            sources: sources.iter().copied().collect(),
            fact_check_level: FactCheckLevel::Standard,
        }
    }

    fn researcher(search: Option<Arc<dyn WebSearch>>, index: Arc<DocumentIndex>) -> ResearcherAgent {
        let policy = RetryPolicy::no_retry(std::time::Duration::from_secs(5));
        ResearcherAgent::new(Arc::new(VerisConfig::default()), search, index, policy)
    }

    fn empty_index() -> Arc<DocumentIndex> {
        Arc::new(DocumentIndex::from_config(&RagConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn test_duplicates_keep_higher_relevance_in_first_position() {
        let search = Arc::new(StaticSearch(vec![
            hit("https://a.example", "Rust is memory safe.", 0.5),
            hit("https://b.example", "Go has a garbage collector", 0.9),
            hit("https://c.example", "rust is MEMORY safe", 0.8),
        ]));
        let agent = researcher(Some(search), empty_index());
        let out = agent
            .research(&Query::new("rust", true, false), &strategy(&[SourceKind::Web]))
            .await;

        assert_eq!(out.findings.len(), 2);
        assert_eq!(out.findings[0].relevance_score, 0.8);
        assert_eq!(out.findings[1].text, "Go has a garbage collector");
        // the source of the dropped duplicate is pruned
        assert_eq!(out.sources.len(), 2);
        assert!(out
            .findings
            .iter()
            .all(|f| out.sources.iter().any(|s| s.id == f.source_id)));
    }

    #[tokio::test]
    async fn test_same_url_shares_one_source() {
        let search = Arc::new(StaticSearch(vec![
            hit("https://a.example", "first claim about rust", 0.9),
            hit("https://a.example", "second claim about go", 0.7),
        ]));
        let agent = researcher(Some(search), empty_index());
        let out = agent
            .research(&Query::new("rust", true, false), &strategy(&[SourceKind::Web]))
            .await;
        assert_eq!(out.findings.len(), 2);
        assert_eq!(out.sources.len(), 1);
        assert_eq!(out.findings[0].source_id, out.findings[1].source_id);
    }

    #[tokio::test]
    async fn test_web_failure_degrades_but_keeps_documents() {
        let index = empty_index();
        index
            .load_documents(&["Rust ownership prevents data races at compile time".to_string()])
            .await
            .unwrap();
        let agent = researcher(Some(Arc::new(DownSearch)), index);

        let out = agent
            .research(
                &Query::new("rust ownership data races", true, true),
                &strategy(&[SourceKind::Web, SourceKind::Documents]),
            )
            .await;

        assert_eq!(out.degraded, [DegradationReason::WebSearchFailed].into_iter().collect());
        assert!(!out.findings.is_empty());
        assert!(out.sources.iter().all(|s| s.origin == SourceOrigin::Document));
    }

    #[tokio::test]
    async fn test_no_sources_yields_nothing() {
        let agent = researcher(None, empty_index());
        let out = agent.research(&Query::new("rust", false, false), &strategy(&[])).await;
        assert!(out.findings.is_empty());
        assert!(out.degraded.is_empty());
        assert!(out.attempted.is_empty());
    }
}
