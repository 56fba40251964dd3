//! Cognify
//!
//! Turns unstructured text into a deduplicated knowledge graph by streaming
//! a language model's output through an incremental triple parser, and
//! emits nodes and edges to the client as soon as they are discovered.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP server with SSE streaming
//! - **LLM**: Chat Completions driver behind a model-output-source capability
//! - **Graph pipeline**: parser, validator, normalizer, registry, orchestrator
//!
//! # Modules
//!
//! - [`config`]: Layered configuration
//! - [`events`]: Graph-build event model and SSE framing
//! - [`graph`]: Extraction-and-dedup pipeline
//! - [`llm`]: LLM driver traits and implementations

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod events;
pub mod graph;
pub mod llm;
pub mod server;

use crate::config::AppConfig;
use graph::GraphOrchestrator;
use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Graph-build orchestrator.
    pub orchestrator: Arc<GraphOrchestrator>,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}
