//! Completion-service abstraction and provider selection.

use crate::types::{AppError, Result};
use crate::utils::config::{LlmProvider, VerisConfig};
use async_trait::async_trait;
use std::sync::Arc;

/// Text completion service used by the agents.
///
/// Implementations only need to turn a prompt into text. Timeouts and retries
/// are layered on by [`crate::llm::ResilientClient`].
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion from a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate with a system prompt
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API or any compatible endpoint
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
    },

    /// Ollama local LLM server
    Ollama { base_url: String, model: String },
}

impl Provider {
    /// Build the provider described by the `[llm]` config section.
    pub fn from_config(config: &VerisConfig) -> Result<Self> {
        let llm = &config.llm;
        match llm.provider {
            LlmProvider::Ollama => Ok(Provider::Ollama {
                base_url: llm.base_url.clone(),
                model: llm.model.clone(),
            }),
            LlmProvider::OpenAI => {
                let api_key = match llm.api_key_env {
                    Some(_) => config.llm_api_key().ok_or_else(|| {
                        AppError::Configuration(format!(
                            "environment variable '{}' is not set",
                            llm.api_key_env.as_deref().unwrap_or_default()
                        ))
                    })?,
                    // Local OpenAI-compatible servers often take no key
                    None => String::new(),
                };
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: llm.base_url.clone(),
                    model: llm.model.clone(),
                })
            }
        }
    }

    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the provider's cargo feature is disabled.
    pub async fn create_client(&self) -> Result<Arc<dyn LLMClient>> {
        match self {
            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
            } => Ok(Arc::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
            ))),

            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url, model } => Ok(Arc::new(
                super::ollama::OllamaClient::new(base_url.clone(), model.clone())?,
            )),

            #[allow(unreachable_patterns)]
            other => Err(AppError::Configuration(format!(
                "{} support is not compiled in; rebuild with the '{}' feature",
                other.name(),
                other.name().to_lowercase()
            ))),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAI { model, .. } | Provider::Ollama { model, .. } => model,
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }
}

/// Creates clients with a default provider while allowing runtime switching.
pub struct LLMClientFactory {
    default_provider: Provider,
}

impl LLMClientFactory {
    pub fn new(default_provider: Provider) -> Self {
        Self { default_provider }
    }

    pub fn from_config(config: &VerisConfig) -> Result<Self> {
        Ok(Self::new(Provider::from_config(config)?))
    }

    pub async fn create_default(&self) -> Result<Arc<dyn LLMClient>> {
        self.default_provider.create_client().await
    }

    pub async fn create_with_provider(&self, provider: Provider) -> Result<Arc<dyn LLMClient>> {
        provider.create_client().await
    }

    pub fn default_provider(&self) -> &Provider {
        &self.default_provider
    }
}
