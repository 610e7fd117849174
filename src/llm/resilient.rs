use crate::llm::client::LLMClient;
use crate::types::Result;
use crate::utils::retry::RetryPolicy;
use async_trait::async_trait;
use std::sync::Arc;

/// Wraps a completion client so every call is bounded by a timeout and retried
/// with exponential backoff.
pub struct ResilientClient {
    inner: Arc<dyn LLMClient>,
    policy: RetryPolicy,
}

impl ResilientClient {
    pub fn new(inner: Arc<dyn LLMClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl LLMClient for ResilientClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.policy
            .execute("llm.generate", || self.inner.generate(prompt))
            .await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.policy
            .execute("llm.generate_with_system", || {
                self.inner.generate_with_system(system, prompt)
            })
            .await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
