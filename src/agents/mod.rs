//! The five pipeline agents.
//!
//! Each agent is its own type with its own input and output; they share only
//! the [`Agent`] capability interface. The orchestrator drives them in order
//! and is the only place that sees more than one stage.

pub mod evaluator;
pub mod fact_checker;
pub mod researcher;
pub mod router;
pub mod synthesizer;

use crate::types::{Result, Stage};
use async_trait::async_trait;

pub use evaluator::{EvaluationInput, EvaluatorAgent};
pub use fact_checker::{FactCheckInput, FactCheckOutput, FactCheckerAgent};
pub use researcher::{ResearchInput, ResearchOutput, ResearcherAgent};
pub use router::{RouterAgent, RoutingDecision, RoutingInput};
pub use synthesizer::{SynthesisInput, SynthesizerAgent};

/// A single processing entry point for one pipeline stage.
#[async_trait]
pub trait Agent: Send + Sync {
    type Input: Send;
    type Output: Send;

    /// The stage this agent runs in.
    fn stage(&self) -> Stage;

    async fn process(&self, input: Self::Input) -> Result<Self::Output>;
}
