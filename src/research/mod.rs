//! Pipeline orchestration.
//!
//! A run moves through a fixed sequence of stages:
//!
//! 1. **Routing** - classify the query and pick sources and a fact-check level
//! 2. **Researching** - query web search and the document index concurrently
//! 3. **FactChecking** - cross-reference findings into verified facts
//! 4. **Synthesizing** - write a sectioned, cited report
//! 5. **Evaluating** - score the report
//!
//! and ends in `Done` with a [`PipelineRun`](crate::types::PipelineRun) or in
//! `Failed` with a [`FailureReport`](crate::types::FailureReport).
//!
//! ```ignore
//! use veris::research::ResearchOrchestrator;
//!
//! let orchestrator = ResearchOrchestrator::from_config(config).await?;
//! match orchestrator.run("Does caffeine affect sleep?", true, false).await {
//!     Ok(run) => println!("{}", run.report.to_markdown()),
//!     Err(failure) => eprintln!("{failure}"),
//! }
//! ```

pub mod orchestrator;
pub mod state;

pub use orchestrator::{ResearchOrchestrator, ResearchOrchestratorBuilder};
pub use state::{PipelineState, PipelineTracker};
