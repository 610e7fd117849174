//! # Veris - verified multi-agent research
//!
//! Veris answers a research question by passing it through five agents:
//!
//! 1. a **router** that classifies the query and picks sources,
//! 2. a **researcher** that queries web search and a local document index,
//! 3. a **fact checker** that cross-references findings into scored facts,
//! 4. a **synthesizer** that writes a sectioned report citing those facts,
//! 5. an **evaluator** that scores the report as a judge.
//!
//! Every run ends in either a complete [`PipelineRun`] (possibly marked as
//! degraded) or a structured [`FailureReport`]. Partial reports are never
//! returned.
//!
//! ## Library usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use veris::{ResearchOrchestrator, VerisConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(VerisConfig::load_or_default("veris.toml")?);
//!     let orchestrator = ResearchOrchestrator::from_config(config).await?;
//!
//!     orchestrator
//!         .load_documents(&[std::fs::read_to_string("notes.txt")?])
//!         .await?;
//!
//!     let run = orchestrator.run("How does caffeine affect sleep?", true, true).await?;
//!     println!("{}", run.report.to_markdown());
//!     for citation in run.citations() {
//!         println!("{} <- {}", citation.fact_text, citation.locator);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama completion backend (default) |
//! | `openai` | OpenAI-compatible completion backend |
//! | `duckduckgo` | Keyless DuckDuckGo web search (default) |
//! | `local-embeddings` | Dense embeddings through fastembed |
//!
//! The library never installs a tracing subscriber; the `veris` binary does.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Router, researcher, fact-checker, synthesizer and evaluator agents.
pub mod agents;
/// Command-line parsing and terminal output for the binary.
pub mod cli;
/// Vector and session storage.
pub mod db;
/// Completion service clients.
pub mod llm;
/// Document chunking, embedding and retrieval.
pub mod rag;
/// Pipeline state machine and orchestrator.
pub mod research;
/// Web search adapters.
pub mod tools;
/// Data model and errors.
pub mod types;
/// Configuration, retry policy and text helpers.
pub mod utils;

pub use db::{JsonFileSessionStore, SessionStore};
pub use llm::{LLMClient, LLMClientFactory, Provider, ResilientClient};
pub use rag::DocumentIndex;
pub use research::{PipelineState, ResearchOrchestrator};
pub use tools::WebSearch;
pub use types::{
    AppError, Capabilities, Citation, FailureReason, FailureReport, PipelineRun, Report, Result,
};
pub use utils::{RetryPolicy, VerisConfig};
