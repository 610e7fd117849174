use crate::agents::{
    Agent, EvaluationInput, EvaluatorAgent, FactCheckInput, FactCheckerAgent, ResearchInput,
    ResearcherAgent, RouterAgent, RoutingInput, SynthesisInput, SynthesizerAgent,
};
use crate::db::{JsonFileSessionStore, SessionStore};
use crate::llm::{LLMClient, LLMClientFactory, ResilientClient};
use crate::rag::{DocumentIndex, IngestSummary};
use crate::research::state::PipelineTracker;
use crate::tools::{self, WebSearch};
use crate::types::{
    AppError, Capabilities, DegradationReason, FailureReason, FailureReport, PipelineRun, Query,
    Result, SourceKind, Stage,
};
use crate::utils::config::VerisConfig;
use crate::utils::retry::RetryPolicy;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Runs queries through routing, research, fact checking, synthesis and
/// evaluation.
///
/// The orchestrator is shared between runs. Runs only share read access to
/// the document index and the completion service; every artifact of a run is
/// owned by that run.
pub struct ResearchOrchestrator {
    config: Arc<VerisConfig>,
    declared: RwLock<Capabilities>,
    web_search: Option<Arc<dyn WebSearch>>,
    index: Arc<DocumentIndex>,
    sessions: Option<Arc<dyn SessionStore>>,
    router: RouterAgent,
    researcher: ResearcherAgent,
    fact_checker: FactCheckerAgent,
    synthesizer: SynthesizerAgent,
    evaluator: EvaluatorAgent,
}

impl ResearchOrchestrator {
    pub fn builder(config: Arc<VerisConfig>, llm: Arc<dyn LLMClient>) -> ResearchOrchestratorBuilder {
        ResearchOrchestratorBuilder::new(config, llm)
    }

    /// Wire everything from configuration: completion backend, web search,
    /// an empty document index and, if enabled, the JSON session store.
    pub async fn from_config(config: Arc<VerisConfig>) -> Result<Self> {
        let llm = LLMClientFactory::from_config(&config)?.create_default().await?;
        let web_search = tools::search::from_config(&config)?;
        let index = Arc::new(DocumentIndex::from_config(&config.rag)?);

        let mut builder = Self::builder(config.clone(), llm).document_index(index);
        if let Some(search) = web_search {
            builder = builder.web_search(search);
        }
        if config.pipeline.persist_sessions {
            builder = builder.session_store(Arc::new(JsonFileSessionStore::new(&config.sessions.path)));
        }
        Ok(builder.build())
    }

    /// Declare which optional sources the caller wants available.
    ///
    /// A declared source still needs a backing adapter (or loaded documents)
    /// at run time to be used.
    pub fn initialize(&self, capabilities: Capabilities) {
        info!(
            web_search = capabilities.web_search,
            document_index = capabilities.document_index,
            "Capabilities declared"
        );
        *self.declared.write() = capabilities;
    }

    /// Capabilities actually usable right now.
    pub fn capabilities(&self) -> Capabilities {
        let declared = *self.declared.read();
        Capabilities {
            web_search: declared.web_search && self.web_search.is_some(),
            document_index: declared.document_index && self.index.is_loaded(),
        }
    }

    pub fn config(&self) -> &VerisConfig {
        &self.config
    }

    pub fn session_store(&self) -> Option<&Arc<dyn SessionStore>> {
        self.sessions.as_ref()
    }

    /// Ingest raw document texts into the retrieval index.
    pub async fn load_documents(&self, texts: &[String]) -> Result<IngestSummary> {
        self.index.load_documents(texts).await
    }

    /// Ingest `(name, text)` pairs; each name becomes the document's locator.
    pub async fn load_named_documents(&self, documents: &[(String, String)]) -> Result<IngestSummary> {
        self.index.load_named_documents(documents).await
    }

    pub async fn run(
        &self,
        query: &str,
        use_web_search: bool,
        use_rag: bool,
    ) -> std::result::Result<PipelineRun, FailureReport> {
        self.run_with_cancellation(query, use_web_search, use_rag, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), checking `cancel` at every stage boundary.
    ///
    /// A stage already in flight when the token fires runs to completion and
    /// its output is dropped.
    pub async fn run_with_cancellation(
        &self,
        query: &str,
        use_web_search: bool,
        use_rag: bool,
        cancel: CancellationToken,
    ) -> std::result::Result<PipelineRun, FailureReport> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("research_run", run_id = %run_id);
        let query = Query::new(query, use_web_search, use_rag);

        RunContext {
            orchestrator: self,
            tracker: PipelineTracker::new(run_id.clone()),
            run_id,
            degraded: BTreeSet::new(),
            cancel,
        }
        .execute(query)
        .instrument(span)
        .await
    }
}

/// Per-run mutable state. Lives for exactly one call to `run`.
struct RunContext<'a> {
    orchestrator: &'a ResearchOrchestrator,
    run_id: String,
    tracker: PipelineTracker,
    degraded: BTreeSet<DegradationReason>,
    cancel: CancellationToken,
}

impl RunContext<'_> {
    async fn execute(mut self, query: Query) -> std::result::Result<PipelineRun, FailureReport> {
        let created_at = Utc::now();
        let o = self.orchestrator;

        self.checkpoint(&query)?;
        let decision = o
            .router
            .process(RoutingInput {
                query: query.clone(),
                capabilities: o.capabilities(),
            })
            .await
            .map_err(|e| self.failure(&query, FailureReason::CompletionServiceExhausted, e.to_string()))?;
        self.degraded.extend(decision.unavailable.iter().copied());
        let strategy = decision.strategy;
        self.advance(&query)?;

        let research = o
            .researcher
            .process(ResearchInput {
                query: query.clone(),
                strategy: strategy.clone(),
            })
            .await
            .map_err(|e| self.failure(&query, FailureReason::NoInformationAvailable, e.to_string()))?;
        self.degraded.extend(research.degraded.iter().copied());
        if research.findings.is_empty() {
            let message = no_information_message(&research.attempted);
            return Err(self.failure(&query, FailureReason::NoInformationAvailable, message));
        }
        info!(
            sources = research.sources.len(),
            findings = research.findings.len(),
            "Research gathered"
        );
        self.advance(&query)?;

        let checked = o
            .fact_checker
            .process(FactCheckInput {
                query: query.text().to_string(),
                findings: research.findings.clone(),
                level: strategy.fact_check_level,
            })
            .await
            .map_err(|e| self.completion_failure(&query, e))?;
        self.advance(&query)?;

        let report = o
            .synthesizer
            .process(SynthesisInput {
                query: query.text().to_string(),
                facts: checked.facts.clone(),
            })
            .await
            .map_err(|e| self.completion_failure(&query, e))?;
        self.advance(&query)?;

        let quality_scores = o
            .evaluator
            .process(EvaluationInput {
                query: query.text().to_string(),
                report: report.clone(),
            })
            .await
            .map_err(|e| self.completion_failure(&query, e))?;
        self.advance(&query)?;

        let mut run = PipelineRun {
            id: self.run_id.clone(),
            query,
            strategy,
            sources: research.sources,
            findings: research.findings,
            verified_facts: checked.facts,
            verification_notes: checked.notes,
            report,
            quality_scores,
            degraded: self.degraded,
            stage_log: self.tracker.into_stage_log(),
            created_at,
            completed_at: Utc::now(),
        };

        persist(o, &mut run).await;

        info!(
            facts = run.verified_facts.len(),
            sections = run.report.sections.len(),
            average_quality = run.quality_scores.average(),
            degraded = run.degraded.len(),
            "Research run complete"
        );
        Ok(run)
    }

    /// Fail with `Cancelled` if the token fired.
    fn checkpoint(&mut self, query: &Query) -> std::result::Result<(), FailureReport> {
        if self.cancel.is_cancelled() {
            let stage = self.tracker.boundary_stage();
            warn!(stage = %stage, "Run cancelled at stage boundary");
            return Err(self.failure(query, FailureReason::Cancelled, AppError::Cancelled.to_string()));
        }
        Ok(())
    }

    /// Close the current stage, then check for cancellation before the next.
    fn advance(&mut self, query: &Query) -> std::result::Result<(), FailureReport> {
        self.tracker
            .advance()
            .map_err(|e| self.failure(query, FailureReason::CompletionServiceExhausted, e.to_string()))?;
        self.checkpoint(query)
    }

    fn completion_failure(&mut self, query: &Query, error: AppError) -> FailureReport {
        let reason = match error {
            AppError::Cancelled => FailureReason::Cancelled,
            _ => FailureReason::CompletionServiceExhausted,
        };
        self.failure(query, reason, error.to_string())
    }

    fn failure(&mut self, query: &Query, reason: FailureReason, message: String) -> FailureReport {
        let stage: Stage = self.tracker.fail();
        warn!(stage = %stage, %reason, %message, "Research run failed");
        FailureReport {
            run_id: self.run_id.clone(),
            query: query.text().to_string(),
            stage,
            reason,
            message,
            degraded: self.degraded.clone(),
            failed_at: Utc::now(),
        }
    }
}

fn no_information_message(attempted: &BTreeSet<SourceKind>) -> String {
    if attempted.is_empty() {
        "no sources were enabled or available for this query".to_string()
    } else {
        let names: Vec<&str> = attempted
            .iter()
            .map(|k| match k {
                SourceKind::Web => "web search",
                SourceKind::Documents => "document index",
            })
            .collect();
        format!("no findings from {}", names.join(" or "))
    }
}

/// Save a completed run. Storage failures only mark the run degraded.
async fn persist(orchestrator: &ResearchOrchestrator, run: &mut PipelineRun) {
    if !orchestrator.config.pipeline.persist_sessions {
        return;
    }
    let Some(store) = orchestrator.sessions.as_ref() else {
        return;
    };
    if let Err(e) = store.save(run).await {
        warn!(error = %e, "Could not persist session");
        run.degraded.insert(DegradationReason::SessionNotSaved);
    }
}

/// Assembles a [`ResearchOrchestrator`] from explicit parts.
pub struct ResearchOrchestratorBuilder {
    config: Arc<VerisConfig>,
    llm: Arc<dyn LLMClient>,
    web_search: Option<Arc<dyn WebSearch>>,
    index: Option<Arc<DocumentIndex>>,
    sessions: Option<Arc<dyn SessionStore>>,
    retry: Option<RetryPolicy>,
}

impl ResearchOrchestratorBuilder {
    pub fn new(config: Arc<VerisConfig>, llm: Arc<dyn LLMClient>) -> Self {
        Self {
            config,
            llm,
            web_search: None,
            index: None,
            sessions: None,
            retry: None,
        }
    }

    pub fn web_search(mut self, search: Arc<dyn WebSearch>) -> Self {
        self.web_search = Some(search);
        self
    }

    pub fn document_index(mut self, index: Arc<DocumentIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    /// Override the retry policy derived from `config.retry` for every
    /// external call.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn build(self) -> ResearchOrchestrator {
        let config = self.config;
        let policy = self.retry.unwrap_or_else(|| RetryPolicy::from(&config.retry));
        let llm: Arc<dyn LLMClient> = Arc::new(ResilientClient::new(self.llm, policy.clone()));
        let index = self.index.unwrap_or_else(|| Arc::new(DocumentIndex::hashed(&config.rag)));

        let declared = Capabilities {
            web_search: self.web_search.is_some(),
            document_index: true,
        };

        ResearchOrchestrator {
            researcher: ResearcherAgent::new(
                config.clone(),
                self.web_search.clone(),
                index.clone(),
                policy,
            ),
            fact_checker: FactCheckerAgent::new(llm.clone(), config.pipeline.claim_similarity_threshold),
            synthesizer: SynthesizerAgent::new(llm.clone(), config.pipeline.max_sections),
            evaluator: EvaluatorAgent::new(llm),
            router: RouterAgent::new(),
            declared: RwLock::new(declared),
            web_search: self.web_search,
            index,
            sessions: self.sessions,
            config,
        }
    }
}
