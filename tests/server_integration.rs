use axum::http::StatusCode;
use axum_test::TestServer;
use cognify::AppState;
use cognify::config::{AppConfig, ExtractionConfig, ServerConfig};
use cognify::graph::{GraphInput, GraphOrchestrator};
use cognify::llm::{LlmError, ModelOutput, ModelOutputSource};
use serde_json::json;
use std::sync::Arc;

const REPLY: &str = r#"Here is the graph:
{"triples": [
  {"subject": "Marie Curie", "predicate": "discovered", "object": "Polonium"},
  {"subject": "Marie Curie", "predicate": "discovered", "object": "Radium"},
  {"subject": "Pierre Curie", "predicate": "married", "object": "Marie Curie"}
]}"#;

struct CannedSource;

#[async_trait::async_trait]
impl ModelOutputSource for CannedSource {
    async fn generate(&self, _input: &GraphInput) -> Result<ModelOutput, LlmError> {
        let chunks: Vec<Result<String, LlmError>> = REPLY
            .as_bytes()
            .chunks(9)
            .map(|c| Ok(String::from_utf8_lossy(c).into_owned()))
            .collect();
        Ok(ModelOutput::Chunks(Box::pin(futures::stream::iter(chunks))))
    }
}

fn test_server() -> TestServer {
    let extraction = ExtractionConfig {
        max_input_chars: 100,
        ..ExtractionConfig::default()
    };
    let config = AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
        },
        extraction: extraction.clone(),
    };
    let state = AppState {
        orchestrator: Arc::new(GraphOrchestrator::new(Arc::new(CannedSource), extraction)),
        config: Arc::new(config),
    };
    TestServer::new(cognify::server::router(state)).unwrap()
}

#[tokio::test]
async fn test_health() {
    let server = test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_stream_graph_emits_sse_events() {
    let server = test_server();
    let response = server
        .post("/api/graphs/stream")
        .json(&json!({ "text": "Marie and Pierre Curie studied radioactivity." }))
        .await;

    response.assert_status_ok();
    let body = response.text();

    assert!(body.contains("event: status"));
    assert_eq!(body.matches("event: node").count(), 4);
    assert_eq!(body.matches("event: edge").count(), 3);
    assert_eq!(body.matches("event: complete").count(), 1);
    assert!(!body.contains("event: error"));
    assert!(body.contains(r#""id":"marie-curie""#));
    assert!(body.contains(r#""summary":{"nodes":4,"edges":3}"#));

    // Every edge follows both of its endpoint nodes.
    let first_edge = body.find("event: edge").unwrap();
    assert!(body.find(r#""id":"polonium""#).unwrap() < first_edge);
}

#[tokio::test]
async fn test_topic_request_is_accepted() {
    let server = test_server();
    let response = server
        .post("/api/graphs/stream")
        .json(&json!({ "topic": "Radioactivity" }))
        .await;

    response.assert_status_ok();
    assert!(response.text().contains("event: complete"));
}

#[tokio::test]
async fn test_empty_input_is_rejected() {
    let server = test_server();
    let response = server
        .post("/api/graphs/stream")
        .json(&json!({ "text": "   " }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<serde_json::Value>()["error"].is_string());
}

#[tokio::test]
async fn test_ambiguous_request_is_rejected() {
    let server = test_server();
    let response = server
        .post("/api/graphs/stream")
        .json(&json!({ "text": "a", "topic": "b" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_input_is_rejected() {
    let server = test_server();
    let response = server
        .post("/api/graphs/stream")
        .json(&json!({ "text": "x".repeat(101) }))
        .await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
}
