//! TOML configuration for the research pipeline (`veris.toml`).
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration. The loaded value is shared read-only as
//! `Arc<VerisConfig>` for the lifetime of an orchestrator.

use crate::types::{AppError, Complexity};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure loaded from veris.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerisConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub rag: RagConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// A value chosen per query complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerComplexity {
    pub simple: usize,
    pub moderate: usize,
    pub complex: usize,
}

impl PerComplexity {
    pub fn for_complexity(&self, complexity: Complexity) -> usize {
        match complexity {
            Complexity::Simple => self.simple,
            Complexity::Moderate => self.moderate,
            Complexity::Complex => self.complex,
        }
    }
}

fn default_per_complexity() -> PerComplexity {
    PerComplexity {
        simple: 3,
        moderate: 5,
        complex: 8,
    }
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Ollama,
    OpenAI,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: LlmProvider,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Base URL of the completion service
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key (OpenAI-compatible providers)
    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_llm_provider() -> LlmProvider {
    LlmProvider::Ollama
}

fn default_llm_model() -> String {
    "llama3.2".to_string()
}

fn default_llm_base_url() -> String {
    "http://localhost:11434".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            api_key_env: None,
        }
    }
}

// ============= Search Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    DuckDuckGo,
    Tavily,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_provider")]
    pub provider: SearchProvider,

    /// Environment variable holding the API key (Tavily)
    #[serde(default = "default_search_api_key_env")]
    pub api_key_env: String,

    /// Override for the search API endpoint
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_per_complexity")]
    pub max_results: PerComplexity,
}

fn default_search_provider() -> SearchProvider {
    SearchProvider::DuckDuckGo
}

fn default_search_api_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            api_key_env: default_search_api_key_env(),
            base_url: None,
            max_results: default_per_complexity(),
        }
    }
}

// ============= RAG Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Feature-hashed bag of words, no model download
    Hash,
    /// fastembed BGE-small (requires the `local-embeddings` feature)
    FastEmbed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_embedder")]
    pub embedder: EmbedderKind,

    /// Chunk size in words
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks, in words
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,

    /// Chunks scoring below this are not returned
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    #[serde(default = "default_per_complexity")]
    pub top_k: PerComplexity,
}

fn default_embedder() -> EmbedderKind {
    EmbedderKind::Hash
}

fn default_chunk_size() -> usize {
    200
}

fn default_chunk_overlap() -> usize {
    40
}

fn default_embedding_dimensions() -> usize {
    256
}

fn default_min_similarity() -> f32 {
    0.05
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedder: default_embedder(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embedding_dimensions: default_embedding_dimensions(),
            min_similarity: default_min_similarity(),
            top_k: default_per_complexity(),
        }
    }
}

// ============= Pipeline Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Jaccard similarity at which two findings state the same claim
    #[serde(default = "default_claim_similarity")]
    pub claim_similarity_threshold: f32,

    #[serde(default = "default_max_sections")]
    pub max_sections: usize,

    #[serde(default = "default_true")]
    pub persist_sessions: bool,
}

fn default_claim_similarity() -> f32 {
    0.6
}

fn default_max_sections() -> usize {
    6
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            claim_similarity_threshold: default_claim_similarity(),
            max_sections: default_max_sections(),
            persist_sessions: true,
        }
    }
}

// ============= Retry Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Per-attempt timeout for external calls
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_call_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl RetryConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

// ============= Sessions & Logging =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_sessions_path")]
    pub path: PathBuf,
}

fn default_sessions_path() -> PathBuf {
    PathBuf::from("./data/sessions")
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            path: default_sessions_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============= Errors =============

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

// ============= Loading =============

impl VerisConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No configuration file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: VerisConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency. Environment variables are checked separately
    /// by [`VerisConfig::validate_env`] since they are only needed at call time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("llm.model must not be empty".into()));
        }
        if self.rag.chunk_size == 0 {
            return Err(ConfigError::ValidationError("rag.chunk_size must be positive".into()));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }
        if self.rag.embedding_dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "rag.embedding_dimensions must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.rag.min_similarity) {
            return Err(ConfigError::ValidationError(
                "rag.min_similarity must be within [0, 1]".into(),
            ));
        }
        let threshold = self.pipeline.claim_similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::ValidationError(
                "pipeline.claim_similarity_threshold must be within (0, 1]".into(),
            ));
        }
        if self.pipeline.max_sections == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.max_sections must be positive".into(),
            ));
        }
        if self.retry.call_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "retry.call_timeout_secs must be positive".into(),
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::ValidationError(
                "retry.backoff_multiplier must be at least 1.0".into(),
            ));
        }
        for (name, values) in [("search.max_results", self.search.max_results), ("rag.top_k", self.rag.top_k)] {
            if values.simple == 0 || values.moderate == 0 || values.complex == 0 {
                return Err(ConfigError::ValidationError(format!("{} values must be positive", name)));
            }
        }
        Ok(())
    }

    /// Check that every environment variable the configured providers need is set.
    pub fn validate_env(&self) -> Result<(), ConfigError> {
        if self.llm.provider == LlmProvider::OpenAI {
            if let Some(ref env) = self.llm.api_key_env {
                resolve_env(env)?;
            }
        }
        if self.search.provider == SearchProvider::Tavily {
            resolve_env(&self.search.api_key_env)?;
        }
        Ok(())
    }

    pub fn llm_api_key(&self) -> Option<String> {
        self.llm
            .api_key_env
            .as_deref()
            .and_then(|name| resolve_env(name).ok())
    }

    pub fn search_api_key(&self) -> Result<String, ConfigError> {
        resolve_env(&self.search.api_key_env)
    }
}

/// Read a non-empty environment variable.
pub fn resolve_env(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnvVar(name.to_string())),
    }
}
