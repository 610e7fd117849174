//! Completion-service clients.
//!
//! - [`LLMClient`] - the trait every provider implements
//! - [`Provider`] / [`LLMClientFactory`] - build a client from `veris.toml`
//! - [`ResilientClient`] - timeout and retry layer the orchestrator wraps around any client
//!
//! Enable providers via Cargo features:
//! - `ollama` - local Ollama server (default)
//! - `openai` - OpenAI API and compatible endpoints

/// Core LLM client trait and provider selection.
pub mod client;
/// Timeout and retry wrapper.
pub mod resilient;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{LLMClient, LLMClientFactory, Provider};
pub use resilient::ResilientClient;
