use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

// ============= Query & Strategy Types =============

/// Immutable research request handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    text: String,
    use_web_search: bool,
    use_rag: bool,
}

impl Query {
    pub fn new(text: impl Into<String>, use_web_search: bool, use_rag: bool) -> Self {
        Self {
            text: text.into(),
            use_web_search,
            use_rag,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn use_web_search(&self) -> bool {
        self.use_web_search
    }

    pub fn use_rag(&self) -> bool {
        self.use_rag
    }
}

/// Optional sources wired into an orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub web_search: bool,
    pub document_index: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Web,
    Documents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactCheckLevel {
    Light,
    Standard,
    Rigorous,
}

/// Output of the router, consumed by the researcher and fact checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchStrategy {
    pub complexity: Complexity,
    pub sources: BTreeSet<SourceKind>,
    pub fact_check_level: FactCheckLevel,
}

impl ResearchStrategy {
    pub fn uses(&self, kind: SourceKind) -> bool {
        self.sources.contains(&kind)
    }
}

// ============= Provenance Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceOrigin {
    Web,
    Document,
}

/// Where a piece of information came from. Findings reference sources by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub origin: SourceOrigin,
    /// URL for web sources, document identifier for indexed documents
    pub locator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub retrieved_at: DateTime<Utc>,
}

impl Source {
    pub fn new(origin: SourceOrigin, locator: impl Into<String>, title: Option<String>) -> Self {
        let prefix = match origin {
            SourceOrigin::Web => "web",
            SourceOrigin::Document => "doc",
        };
        Self {
            id: format!("{}-{}", prefix, Uuid::new_v4()),
            origin,
            locator: locator.into(),
            title,
            retrieved_at: Utc::now(),
        }
    }
}

/// A single raw piece of information gathered by the researcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub text: String,
    pub source_id: String,
    pub relevance_score: f32,
}

impl Finding {
    pub fn new(text: impl Into<String>, source_id: impl Into<String>, relevance_score: f32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            source_id: source_id.into(),
            relevance_score: relevance_score.clamp(0.0, 1.0),
        }
    }
}

/// A claim that has been cross-referenced against the finding set it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedFact {
    pub id: String,
    pub text: String,
    pub supporting_source_ids: BTreeSet<String>,
    /// Findings this fact was derived from; confidence is only meaningful relative to these
    pub finding_ids: Vec<String>,
    pub confidence: f32,
    pub contradicted: bool,
}

impl VerifiedFact {
    pub fn is_unverifiable(&self) -> bool {
        self.confidence == 0.0 && !self.contradicted
    }
}

// ============= Report Types =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub heading: String,
    pub body_text: String,
    /// Fact ids in the order the body text references them
    pub cited_fact_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    /// Short executive summary of the sections; empty when there are none
    #[serde(default)]
    pub summary: String,
    pub sections: Vec<ReportSection>,
    /// Facts with positive confidence that no section cites
    pub unused_fact_ids: Vec<String>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn cited_fact_ids(&self) -> impl Iterator<Item = &String> {
        self.sections.iter().flat_map(|s| s.cited_fact_ids.iter())
    }

    /// Render the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n", self.title);
        if !self.summary.trim().is_empty() {
            out.push_str(&format!("\n## Summary\n\n{}\n", self.summary.trim()));
        }
        for section in &self.sections {
            out.push_str(&format!("\n## {}\n\n{}\n", section.heading, section.body_text.trim()));
        }
        out
    }
}

/// Fixed evaluation dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityDimension {
    Completeness,
    Accuracy,
    Relevance,
    Clarity,
    SourceQuality,
    CitationQuality,
}

impl QualityDimension {
    pub const ALL: [QualityDimension; 6] = [
        QualityDimension::Completeness,
        QualityDimension::Accuracy,
        QualityDimension::Relevance,
        QualityDimension::Clarity,
        QualityDimension::SourceQuality,
        QualityDimension::CitationQuality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityDimension::Completeness => "completeness",
            QualityDimension::Accuracy => "accuracy",
            QualityDimension::Relevance => "relevance",
            QualityDimension::Clarity => "clarity",
            QualityDimension::SourceQuality => "source_quality",
            QualityDimension::CitationQuality => "citation_quality",
        }
    }
}

impl std::fmt::Display for QualityDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    pub scores: BTreeMap<QualityDimension, f32>,
    pub feedback: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl QualityScores {
    pub fn get(&self, dimension: QualityDimension) -> f32 {
        self.scores.get(&dimension).copied().unwrap_or(0.0)
    }

    pub fn average(&self) -> f32 {
        let total: f32 = QualityDimension::ALL.iter().map(|d| self.get(*d)).sum();
        total / QualityDimension::ALL.len() as f32
    }
}

/// Derived join of a cited fact with one of its supporting sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub fact_id: String,
    pub source_id: String,
    pub origin: SourceOrigin,
    pub locator: String,
    pub retrieved_at: DateTime<Utc>,
    pub fact_text: String,
}

// ============= Pipeline Run Types =============

/// Non-terminal pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Routing,
    Researching,
    FactChecking,
    Synthesizing,
    Evaluating,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Routing => "Routing",
            Stage::Researching => "Researching",
            Stage::FactChecking => "FactChecking",
            Stage::Synthesizing => "Synthesizing",
            Stage::Evaluating => "Evaluating",
        };
        f.write_str(name)
    }
}

/// Fallback paths taken during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationReason {
    WebSearchFailed,
    DocumentRetrievalFailed,
    /// Web search was requested but no adapter is wired up
    WebSearchUnavailable,
    /// Document retrieval was requested but the index is empty or absent
    DocumentIndexUnavailable,
    SessionNotSaved,
}

impl std::fmt::Display for DegradationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DegradationReason::WebSearchFailed => "web_search_failed",
            DegradationReason::DocumentRetrievalFailed => "document_retrieval_failed",
            DegradationReason::WebSearchUnavailable => "web_search_unavailable",
            DegradationReason::DocumentIndexUnavailable => "document_index_unavailable",
            DegradationReason::SessionNotSaved => "session_not_saved",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Complete, replayable record of one query's journey through every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: String,
    pub query: Query,
    pub strategy: ResearchStrategy,
    pub sources: Vec<Source>,
    pub findings: Vec<Finding>,
    pub verified_facts: Vec<VerifiedFact>,
    pub verification_notes: String,
    pub report: Report,
    pub quality_scores: QualityScores,
    pub degraded: BTreeSet<DegradationReason>,
    pub stage_log: Vec<StageRecord>,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn source(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn fact(&self, id: &str) -> Option<&VerifiedFact> {
        self.verified_facts.iter().find(|f| f.id == id)
    }

    /// Citations for every fact the report cites, in report order.
    ///
    /// A fact cited by several sections yields its citations once.
    pub fn citations(&self) -> Vec<Citation> {
        let mut seen = BTreeSet::new();
        let mut citations = Vec::new();

        for fact_id in self.report.cited_fact_ids() {
            if !seen.insert(fact_id.as_str()) {
                continue;
            }
            let Some(fact) = self.fact(fact_id) else {
                continue;
            };
            for source_id in &fact.supporting_source_ids {
                if let Some(source) = self.source(source_id) {
                    citations.push(Citation {
                        fact_id: fact.id.clone(),
                        source_id: source.id.clone(),
                        origin: source.origin,
                        locator: source.locator.clone(),
                        retrieved_at: source.retrieved_at,
                        fact_text: fact.text.clone(),
                    });
                }
            }
        }

        citations
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    NoInformationAvailable,
    CompletionServiceExhausted,
    Cancelled,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureReason::NoInformationAvailable => "no_information_available",
            FailureReason::CompletionServiceExhausted => "completion_service_exhausted",
            FailureReason::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Structured terminal failure of a run. Never carries a partial report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("research failed during {stage} ({reason}): {message}")]
pub struct FailureReport {
    pub run_id: String,
    pub query: String,
    pub stage: Stage,
    pub reason: FailureReason,
    pub message: String,
    pub degraded: BTreeSet<DegradationReason>,
    pub failed_at: DateTime<Utc>,
}

// ============= Error Types =============

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("Source unavailable ({source_name}): {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },

    #[error("No information available for query")]
    NoInformationAvailable,

    #[error("Completion service error: {0}")]
    CompletionService(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Ingest error: {0}")]
    Ingest(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
