//! Mock collaborators shared by the integration tests.
//!
//! `ScriptedLLM` answers each kind of completion request (fact-check review,
//! section writing, executive summary, judging) from its own script and counts
//! the calls, so a test can make exactly one step fail.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use veris::db::{SessionStore, SessionSummary};
use veris::llm::LLMClient;
use veris::rag::{Embedder, HashEmbedder};
use veris::tools::{SearchHit, WebSearch};
use veris::types::{AppError, PipelineRun, Result};

/// How a scripted client answers one kind of request.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// Echo every `[Fn]` marker found in the prompt
    CiteAll,
    Fail,
}

impl Reply {
    fn answer(&self, prompt: &str) -> Result<String> {
        match self {
            Reply::Text(text) => Ok(text.clone()),
            Reply::CiteAll => {
                let markers: Vec<&str> = prompt
                    .lines()
                    .filter_map(|line| line.strip_prefix('[').and_then(|rest| rest.split_once(']')))
                    .map(|(marker, _)| marker)
                    .filter(|marker| marker.starts_with('F'))
                    .collect();
                let cites: Vec<String> = markers.iter().map(|m| format!("[{}]", m)).collect();
                Ok(format!("The evidence is summarised here {}.", cites.join(" ")))
            }
            Reply::Fail => Err(AppError::CompletionService("scripted failure".to_string())),
        }
    }
}

pub const GOOD_JUDGEMENT: &str = "completeness: 0.8\naccuracy: 0.9\nrelevance: 0.85\nclarity: 0.7\n\
source_quality: 0.6\ncitation_quality: 0.9\nfeedback: Solid report.";

pub struct ScriptedLLM {
    review: Reply,
    section: Reply,
    summary: Reply,
    judge: Reply,
    pub review_calls: AtomicUsize,
    pub section_calls: AtomicUsize,
    pub summary_calls: AtomicUsize,
    pub judge_calls: AtomicUsize,
}

impl ScriptedLLM {
    /// The summary answers like a section unless overridden.
    pub fn new(review: Reply, section: Reply, judge: Reply) -> Self {
        Self {
            review,
            summary: section.clone(),
            section,
            judge,
            review_calls: AtomicUsize::new(0),
            section_calls: AtomicUsize::new(0),
            summary_calls: AtomicUsize::new(0),
            judge_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_summary(mut self, summary: Reply) -> Self {
        self.summary = summary;
        self
    }

    /// Every stage succeeds and every section cites all its facts.
    pub fn cooperative() -> Self {
        Self::new(
            Reply::Text("No concerns.".to_string()),
            Reply::CiteAll,
            Reply::Text(GOOD_JUDGEMENT.to_string()),
        )
    }

    pub fn failing_sections() -> Self {
        Self::new(
            Reply::Text("No concerns.".to_string()),
            Reply::Fail,
            Reply::Text(GOOD_JUDGEMENT.to_string()),
        )
    }

    pub fn failing_everything() -> Self {
        Self::new(Reply::Fail, Reply::Fail, Reply::Fail)
    }
}

pub fn calls(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

#[async_trait]
impl LLMClient for ScriptedLLM {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        if system.contains("fact-checking") {
            self.review_calls.fetch_add(1, Ordering::SeqCst);
            self.review.answer(prompt)
        } else if system.contains("executive summary") {
            self.summary_calls.fetch_add(1, Ordering::SeqCst);
            self.summary.answer(prompt)
        } else if system.contains("judge") {
            self.judge_calls.fetch_add(1, Ordering::SeqCst);
            self.judge.answer(prompt)
        } else {
            self.section_calls.fetch_add(1, Ordering::SeqCst);
            self.section.answer(prompt)
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Web search returning fixed hits, or failing, and counting calls.
pub struct ScriptedSearch {
    hits: Option<Vec<SearchHit>>,
    cancel_on_call: Option<CancellationToken>,
    pub calls: AtomicUsize,
}

impl ScriptedSearch {
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits: Some(hits),
            cancel_on_call: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            hits: None,
            cancel_on_call: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fire `token` while the search is in flight.
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_call = Some(token);
        self
    }
}

#[async_trait]
impl WebSearch for ScriptedSearch {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }
        match &self.hits {
            Some(hits) => Ok(hits.iter().take(max_results).cloned().collect()),
            None => Err(AppError::SourceUnavailable {
                source_name: "scripted".to_string(),
                message: "search backend down".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn hit(title: &str, url: &str, snippet: &str, score: f32) -> SearchHit {
    SearchHit {
        title: title.to_string(),
        url: url.to_string(),
        snippet: snippet.to_string(),
        score,
    }
}

/// Hash embeddings that start failing once `break_now` is called.
pub struct BreakableEmbedder {
    inner: HashEmbedder,
    broken: AtomicBool,
}

impl BreakableEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            inner: HashEmbedder::new(dimensions),
            broken: AtomicBool::new(false),
        }
    }

    pub fn break_now(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }
}

impl Embedder for BreakableEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(AppError::Internal("embedding model unloaded".to_string()));
        }
        self.inner.embed(texts)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

/// Session store whose writes always fail.
#[derive(Default)]
pub struct BrokenSessionStore {
    pub attempts: Mutex<Vec<String>>,
}

#[async_trait]
impl SessionStore for BrokenSessionStore {
    async fn save(&self, run: &PipelineRun) -> Result<()> {
        self.attempts.lock().push(run.id.clone());
        Err(AppError::Storage("disk full".to_string()))
    }

    async fn load(&self, id: &str) -> Result<PipelineRun> {
        Err(AppError::NotFound(id.to_string()))
    }

    async fn list_recent(&self, _limit: usize) -> Result<Vec<SessionSummary>> {
        Ok(Vec::new())
    }

    async fn delete(&self, _id: &str) -> Result<bool> {
        Ok(false)
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
