use crate::types::{AppError, Result, Stage, StageRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Where a run is in the pipeline. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Routing,
    Researching,
    FactChecking,
    Synthesizing,
    Evaluating,
    Done,
    Failed,
}

impl PipelineState {
    /// The state that follows on success.
    pub fn next(self) -> PipelineState {
        match self {
            PipelineState::Routing => PipelineState::Researching,
            PipelineState::Researching => PipelineState::FactChecking,
            PipelineState::FactChecking => PipelineState::Synthesizing,
            PipelineState::Synthesizing => PipelineState::Evaluating,
            PipelineState::Evaluating => PipelineState::Done,
            PipelineState::Done => PipelineState::Done,
            PipelineState::Failed => PipelineState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    pub fn stage(self) -> Option<Stage> {
        match self {
            PipelineState::Routing => Some(Stage::Routing),
            PipelineState::Researching => Some(Stage::Researching),
            PipelineState::FactChecking => Some(Stage::FactChecking),
            PipelineState::Synthesizing => Some(Stage::Synthesizing),
            PipelineState::Evaluating => Some(Stage::Evaluating),
            PipelineState::Done | PipelineState::Failed => None,
        }
    }
}

impl From<Stage> for PipelineState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Routing => PipelineState::Routing,
            Stage::Researching => PipelineState::Researching,
            Stage::FactChecking => PipelineState::FactChecking,
            Stage::Synthesizing => PipelineState::Synthesizing,
            Stage::Evaluating => PipelineState::Evaluating,
        }
    }
}

/// Drives a single run through the states and keeps its stage log.
#[derive(Debug)]
pub struct PipelineTracker {
    run_id: String,
    state: PipelineState,
    stage_started: Option<(DateTime<Utc>, Instant)>,
    log: Vec<StageRecord>,
}

impl PipelineTracker {
    pub fn new(run_id: impl Into<String>) -> Self {
        let tracker = Self {
            run_id: run_id.into(),
            state: PipelineState::Routing,
            stage_started: Some((Utc::now(), Instant::now())),
            log: Vec::new(),
        };
        info!(run_id = %tracker.run_id, stage = %Stage::Routing, "Entering stage");
        tracker
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The stage currently executing; `None` once terminal.
    pub fn current_stage(&self) -> Option<Stage> {
        self.state.stage()
    }

    /// The stage a cancellation observed now would be attributed to.
    pub fn boundary_stage(&self) -> Stage {
        self.state.stage().unwrap_or(Stage::Evaluating)
    }

    /// Close the current stage and move to the next state.
    pub fn advance(&mut self) -> Result<PipelineState> {
        if self.state.is_terminal() {
            return Err(AppError::Internal(format!(
                "cannot advance from terminal state {:?}",
                self.state
            )));
        }
        self.close_stage();
        self.state = self.state.next();

        if let Some(stage) = self.state.stage() {
            self.stage_started = Some((Utc::now(), Instant::now()));
            info!(run_id = %self.run_id, stage = %stage, "Entering stage");
        } else {
            debug!(run_id = %self.run_id, state = ?self.state, "Pipeline finished");
        }
        Ok(self.state)
    }

    /// Close the current stage and enter `Failed`. Returns the failing stage.
    pub fn fail(&mut self) -> Stage {
        let stage = self.boundary_stage();
        self.close_stage();
        self.state = PipelineState::Failed;
        stage
    }

    fn close_stage(&mut self) {
        if let (Some(stage), Some((started_at, instant))) = (self.state.stage(), self.stage_started.take()) {
            self.log.push(StageRecord {
                stage,
                started_at,
                duration_ms: instant.elapsed().as_millis() as u64,
            });
        }
    }

    pub fn stage_log(&self) -> &[StageRecord] {
        &self.log
    }

    pub fn into_stage_log(self) -> Vec<StageRecord> {
        self.log
    }
}
