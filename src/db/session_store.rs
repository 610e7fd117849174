//! Persistence of completed pipeline runs.

use crate::types::{AppError, PipelineRun, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Listing entry for a stored run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub query: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub fact_count: usize,
    pub section_count: usize,
    pub average_quality: f32,
    pub degraded: bool,
}

impl From<&PipelineRun> for SessionSummary {
    fn from(run: &PipelineRun) -> Self {
        Self {
            id: run.id.clone(),
            query: run.query.text().to_string(),
            created_at: run.created_at,
            completed_at: run.completed_at,
            fact_count: run.verified_facts.len(),
            section_count: run.report.sections.len(),
            average_quality: run.quality_scores.average(),
            degraded: run.is_degraded(),
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, run: &PipelineRun) -> Result<()>;

    /// Load a run by id; `NotFound` if absent.
    async fn load(&self, id: &str) -> Result<PipelineRun>;

    /// Most recent runs first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<SessionSummary>>;

    /// Returns whether a run was removed.
    async fn delete(&self, id: &str) -> Result<bool>;
}

fn sort_recent(summaries: &mut Vec<SessionSummary>, limit: usize) {
    summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    summaries.truncate(limit);
}

// ============= JSON file store =============

/// Stores each run as `{dir}/{id}.json`.
pub struct JsonFileSessionStore {
    dir: PathBuf,
}

impl JsonFileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AppError::InvalidInput(format!("Invalid session id '{}'", id)));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn save(&self, run: &PipelineRun) -> Result<()> {
        let path = self.path_for(&run.id)?;
        let data = serde_json::to_string_pretty(run)
            .map_err(|e| AppError::Internal(format!("Failed to serialize session: {}", e)))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create session directory: {}", e)))?;

        // Write then rename so a crash never leaves a truncated session behind
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write session file: {}", e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to finalize session file: {}", e)))?;

        debug!(session_id = %run.id, path = %path.display(), "Session saved");
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<PipelineRun> {
        let path = self.path_for(id)?;
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!("Session '{}' not found", id)));
            }
            Err(e) => return Err(AppError::Storage(format!("Failed to read session file: {}", e))),
        };

        serde_json::from_str(&data)
            .map_err(|e| AppError::Storage(format!("Failed to parse session '{}': {}", id, e)))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<SessionSummary>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Storage(format!("Failed to list sessions: {}", e))),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to list sessions: {}", e)))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| e.to_string())
                .and_then(|data| serde_json::from_str::<PipelineRun>(&data).map_err(|e| e.to_string()));
            match parsed {
                Ok(run) => summaries.push(SessionSummary::from(&run)),
                Err(error) => warn!(path = %path.display(), %error, "Skipping unreadable session file"),
            }
        }

        sort_recent(&mut summaries, limit);
        Ok(summaries)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Storage(format!("Failed to delete session: {}", e))),
        }
    }
}

// ============= In-memory store =============

/// Process-local session store; contents are lost on exit.
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    runs: Arc<RwLock<HashMap<String, PipelineRun>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, run: &PipelineRun) -> Result<()> {
        self.runs.write().insert(run.id.clone(), run.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<PipelineRun> {
        self.runs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Session '{}' not found", id)))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<SessionSummary>> {
        let mut summaries: Vec<SessionSummary> = self.runs.read().values().map(SessionSummary::from).collect();
        sort_recent(&mut summaries, limit);
        Ok(summaries)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.runs.write().remove(id).is_some())
    }
}
