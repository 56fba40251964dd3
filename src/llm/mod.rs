//! LLM driver traits and implementations.
//!
//! This module provides the model-call collaborator used by the graph
//! pipeline: a protocol-level [`LlmDriver`] for OpenAI-compatible Chat
//! Completions endpoints, and the [`ModelOutputSource`] capability the
//! orchestrator consumes.
//!
//! # Example
//!
//! ```rust,ignore
//! use cognify::llm::{ChatCompletionsDriver, LlmSettings, TripleExtractor};
//!
//! let settings = cognify::config::load_llm_settings()?;
//! let driver = Arc::new(ChatCompletionsDriver::new(settings)?);
//! let source = TripleExtractor::new(driver, true);
//! ```

pub mod chat_completions;
pub mod error;
pub mod provider;
pub mod source;

pub use chat_completions::ChatCompletionsDriver;
pub use error::LlmError;
pub use provider::Provider;
pub use source::{ModelOutput, ModelOutputSource, TripleExtractor};

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;

/// Ordered text chunks from a streaming model call.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// LLM connection and model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// Optional API key for authentication.
    pub api_key: Option<String>,
    /// Model identifier (e.g., `gpt-4o-mini`).
    pub model: String,
    /// Provider type (auto-detected from `base_url` if not specified).
    pub provider: Provider,
    /// Per-request timeout applied by the HTTP client.
    pub timeout: Duration,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl LlmSettings {
    /// Settings for `model` at `base_url` with provider detection and defaults
    /// for everything else.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            provider: Provider::detect_from_url(&base_url),
            base_url,
            api_key: None,
            model: model.into(),
            timeout: Duration::from_secs(30),
            temperature: 0.2,
            max_tokens: 8192,
        }
    }
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System prompt.
    System,
    /// User message.
    User,
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    /// Role of the message author.
    pub role: MessageRole,
    /// Text content.
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Request to an LLM driver.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Ask the provider to constrain output to a JSON object.
    pub json_mode: bool,
}

/// Trait for LLM drivers.
///
/// A driver exposes both a one-shot call and a streaming call over the same
/// request. Dropping a returned stream aborts the underlying request.
#[async_trait::async_trait]
pub trait LlmDriver: Send + Sync {
    /// Run the request to completion and return the full response text.
    async fn complete(&self, req: LlmRequest) -> Result<String, LlmError>;

    /// Stream the response as ordered text chunks.
    async fn stream(&self, req: LlmRequest) -> Result<TextStream, LlmError>;
}
