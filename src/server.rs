use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::config::AppConfig;
use crate::events::{GraphEvent, event_json, event_name};
use crate::graph::{GraphInput, GraphOrchestrator, InputError};
use crate::llm::{ChatCompletionsDriver, LlmDriver, LlmSettings, TripleExtractor};

/// Body of `POST /api/graphs/stream`: exactly one of `text` or `topic`.
#[derive(Debug, Deserialize)]
pub struct GraphRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

impl GraphRequest {
    fn into_input(self) -> Option<GraphInput> {
        match (self.text, self.topic) {
            (Some(text), None) => Some(GraphInput::Text(text)),
            (None, Some(topic)) => Some(GraphInput::Topic(topic)),
            _ => None,
        }
    }
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>, settings: LlmSettings) -> anyhow::Result<()> {
    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        provider = ?settings.provider,
        "LLM configuration loaded"
    );

    let driver: Arc<dyn LlmDriver> = Arc::new(ChatCompletionsDriver::new(settings)?);
    let source = Arc::new(TripleExtractor::new(driver, config.extraction.streaming));
    let orchestrator = Arc::new(GraphOrchestrator::new(
        source,
        config.extraction.clone(),
    ));

    let state = AppState {
        orchestrator,
        config: Arc::clone(&config),
    };

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        streaming = config.extraction.streaming,
        "Server started"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Application routes without transport layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/graphs/stream", post(stream_graph))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn stream_graph(State(state): State<AppState>, Json(req): Json<GraphRequest>) -> Response {
    let Some(input) = req.into_input() else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Provide exactly one of `text` or `topic`",
        );
    };

    if let Err(e) = input.validate(state.config.extraction.max_input_chars) {
        tracing::warn!(error = %e, "Rejected graph input");
        let status = match e {
            InputError::Empty => StatusCode::BAD_REQUEST,
            InputError::TooLong { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        };
        return error_response(status, &e.to_string());
    }

    build_sse_response(state.orchestrator.build(input)).into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Frame graph events as SSE. Dropping the response body (client disconnect)
/// drops the event stream and with it the model call.
pub fn build_sse_response<S>(stream: S) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send>
where
    S: Stream<Item = GraphEvent> + Send + 'static,
{
    let stream = stream.map(|event| {
        Ok(Event::default()
            .event(event_name(&event))
            .data(event_json(&event)))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
