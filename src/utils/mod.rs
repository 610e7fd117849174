//! Configuration, retry and text helpers.

/// TOML configuration (`veris.toml`).
pub mod config;
/// Timeout and exponential-backoff retry.
pub mod retry;
/// Tokenisation, normalisation and claim signatures.
pub mod text;

pub use config::{ConfigError, VerisConfig};
pub use retry::RetryPolicy;
