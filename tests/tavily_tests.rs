//! Tavily adapter against a mocked HTTP API.

use serde_json::json;
use veris::tools::search::TavilySearch;
use veris::tools::WebSearch;
use veris::types::AppError;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> TavilySearch {
    TavilySearch::new("tvly-test".to_string()).with_base_url(format!("{}/", server.uri()))
}

#[tokio::test]
async fn test_search_maps_results_to_hits() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("authorization", "Bearer tvly-test"))
        .and(body_partial_json(json!({"query": "caffeine sleep", "max_results": 5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": "caffeine sleep",
            "results": [
                {"title": "Caffeine and sleep", "url": "https://a.example", "content": "Caffeine delays sleep onset.", "score": 0.93},
                {"title": "Coffee", "url": "https://b.example", "content": "Coffee contains caffeine."}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let hits = client(&server).search("caffeine sleep", 5).await.unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].url, "https://a.example");
    assert_eq!(hits[0].snippet, "Caffeine delays sleep onset.");
    assert!((hits[0].score - 0.93).abs() < 1e-6);
    // no provider score: falls back to rank decay
    assert!((hits[1].score - 1.0 / 1.15).abs() < 1e-6);
}

#[tokio::test]
async fn test_out_of_range_scores_are_clamped_and_results_truncated() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"title": "a", "url": "https://a.example", "content": "a", "score": 3.5},
                {"title": "b", "url": "https://b.example", "content": "b", "score": -1.0},
                {"title": "c", "url": "https://c.example", "content": "c", "score": 0.5}
            ]
        })))
        .mount(&server)
        .await;

    let hits = client(&server).search("anything", 2).await.unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].score, 1.0);
    assert_eq!(hits[1].score, 0.0);
}

#[tokio::test]
async fn test_http_error_is_source_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = client(&server).search("caffeine", 3).await.unwrap_err();
    assert!(matches!(err, AppError::SourceUnavailable { .. }), "{err}");
}

#[tokio::test]
async fn test_malformed_body_is_source_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let err = client(&server).search("caffeine", 3).await.unwrap_err();
    assert!(matches!(err, AppError::SourceUnavailable { .. }));
}

#[tokio::test]
async fn test_empty_query_is_rejected_without_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server).search("   ", 3).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}
