//! Completion clients against a mocked Ollama server.

#![cfg(feature = "ollama")]

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use veris::llm::ollama::OllamaClient;
use veris::llm::{LLMClient, LLMClientFactory, ResilientClient};
use veris::types::AppError;
use veris::{RetryPolicy, VerisConfig};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_response(content: &str) -> serde_json::Value {
    json!({
        "model": "llama3.2",
        "created_at": "2024-01-01T00:00:00Z",
        "message": {
            "role": "assistant",
            "content": content
        },
        "done": true
    })
}

fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        call_timeout: Duration::from_secs(5),
        max_retries: 2,
        base_delay: Duration::from_millis(1),
        backoff_multiplier: 2.0,
    }
}

#[tokio::test]
async fn test_generate_with_system_sends_both_messages() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "llama3.2",
            "messages": [
                {"role": "system", "content": "You are a judge"},
                {"role": "user", "content": "Score this"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("clarity: 0.9")))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(server.uri(), "llama3.2".to_string()).unwrap();
    let reply = client
        .generate_with_system("You are a judge", "Score this")
        .await
        .unwrap();

    assert_eq!(reply, "clarity: 0.9");
    assert_eq!(client.model_name(), "llama3.2");
}

#[tokio::test]
async fn test_server_error_is_completion_service_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let client = OllamaClient::new(server.uri(), "llama3.2".to_string()).unwrap();
    let err = client.generate("hello").await.unwrap_err();
    assert!(matches!(err, AppError::CompletionService(_)), "{err}");
}

#[tokio::test]
async fn test_resilient_client_retries_failing_backend() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let inner = Arc::new(OllamaClient::new(server.uri(), "llama3.2".to_string()).unwrap());
    let client = ResilientClient::new(inner, quick_retry());

    assert!(client.generate("hello").await.is_err());
    server.verify().await;
}

#[tokio::test]
async fn test_resilient_client_times_out_slow_backend() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_response("late"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let inner = Arc::new(OllamaClient::new(server.uri(), "llama3.2".to_string()).unwrap());
    let client = ResilientClient::new(inner, RetryPolicy::no_retry(Duration::from_millis(50)));

    let err = client.generate("hello").await.unwrap_err();
    assert!(matches!(err, AppError::Timeout(50)), "{err}");
}

#[tokio::test]
async fn test_factory_builds_client_from_config() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("pong")))
        .mount(&server)
        .await;

    let mut config = VerisConfig::default();
    config.llm.base_url = server.uri();
    config.llm.model = "tiny".to_string();

    let factory = LLMClientFactory::from_config(&config).unwrap();
    assert_eq!(factory.default_provider().model(), "tiny");

    let client = factory.create_default().await.unwrap();
    assert_eq!(client.generate("ping").await.unwrap(), "pong");
}
