//! Model output sources for graph extraction.
//!
//! The orchestrator does not care how output is produced, only whether it
//! arrives as one finished document or as a sequence of chunks.

use std::sync::Arc;

use crate::graph::GraphInput;
use crate::graph::prompts::{TRIPLE_EXTRACTION_SYSTEM_PROMPT, user_prompt};

use super::{LlmDriver, LlmError, LlmRequest, Message, TextStream};

/// Output of one model call.
pub enum ModelOutput {
    /// The complete response, parsed in whole-document mode.
    Document(String),
    /// Ordered response chunks, parsed incrementally.
    Chunks(TextStream),
}

impl std::fmt::Debug for ModelOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document(text) => f.debug_tuple("Document").field(&text.len()).finish(),
            Self::Chunks(_) => f.write_str("Chunks(..)"),
        }
    }
}

/// Capability that turns a graph input into model output.
#[async_trait::async_trait]
pub trait ModelOutputSource: Send + Sync {
    /// Start a model call for `input`.
    async fn generate(&self, input: &GraphInput) -> Result<ModelOutput, LlmError>;
}

/// [`ModelOutputSource`] backed by an [`LlmDriver`] and the extraction prompts.
#[derive(Clone)]
pub struct TripleExtractor {
    driver: Arc<dyn LlmDriver>,
    streaming: bool,
}

impl std::fmt::Debug for TripleExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripleExtractor")
            .field("streaming", &self.streaming)
            .finish_non_exhaustive()
    }
}

impl TripleExtractor {
    pub fn new(driver: Arc<dyn LlmDriver>, streaming: bool) -> Self {
        Self { driver, streaming }
    }

    fn request(input: &GraphInput) -> LlmRequest {
        LlmRequest {
            messages: vec![
                Message::system(TRIPLE_EXTRACTION_SYSTEM_PROMPT),
                Message::user(user_prompt(input)),
            ],
            json_mode: true,
        }
    }
}

#[async_trait::async_trait]
impl ModelOutputSource for TripleExtractor {
    async fn generate(&self, input: &GraphInput) -> Result<ModelOutput, LlmError> {
        let req = Self::request(input);
        tracing::debug!(
            streaming = self.streaming,
            input_chars = input.as_str().chars().count(),
            "Calling model for triple extraction"
        );

        if self.streaming {
            return Ok(ModelOutput::Chunks(self.driver.stream(req).await?));
        }

        match self.driver.complete(req).await {
            Ok(text) => Ok(ModelOutput::Document(text)),
            // An empty reply carries no payload; parsing reports it as malformed.
            Err(LlmError::EmptyResponse) => {
                tracing::warn!("Model returned no content");
                Ok(ModelOutput::Document(String::new()))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDriver {
        seen: Mutex<Vec<LlmRequest>>,
    }

    #[async_trait::async_trait]
    impl LlmDriver for RecordingDriver {
        async fn complete(&self, req: LlmRequest) -> Result<String, LlmError> {
            self.seen.lock().unwrap().push(req);
            Ok("{\"triples\": []}".to_string())
        }

        async fn stream(&self, req: LlmRequest) -> Result<TextStream, LlmError> {
            self.seen.lock().unwrap().push(req);
            let chunks = vec![Ok("{\"triples\"".to_string()), Ok(": []}".to_string())];
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }

    #[tokio::test]
    async fn test_whole_document_mode() {
        let driver = Arc::new(RecordingDriver::default());
        let source = TripleExtractor::new(driver.clone(), false);
        let out = source
            .generate(&GraphInput::Text("Plato taught Aristotle.".to_string()))
            .await
            .unwrap();
        assert!(matches!(out, ModelOutput::Document(ref s) if s.contains("triples")));

        let seen = driver.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].json_mode);
        assert_eq!(seen[0].messages[0].content, TRIPLE_EXTRACTION_SYSTEM_PROMPT);
        assert!(seen[0].messages[1].content.contains("Plato taught Aristotle."));
    }

    struct SilentDriver;

    #[async_trait::async_trait]
    impl LlmDriver for SilentDriver {
        async fn complete(&self, _req: LlmRequest) -> Result<String, LlmError> {
            Err(LlmError::EmptyResponse)
        }

        async fn stream(&self, _req: LlmRequest) -> Result<TextStream, LlmError> {
            Err(LlmError::Timeout)
        }
    }

    #[tokio::test]
    async fn test_empty_reply_is_an_empty_document() {
        let source = TripleExtractor::new(Arc::new(SilentDriver), false);
        let out = source
            .generate(&GraphInput::Text("Plato taught Aristotle.".to_string()))
            .await
            .unwrap();
        assert!(matches!(out, ModelOutput::Document(ref s) if s.is_empty()));

        let streaming = TripleExtractor::new(Arc::new(SilentDriver), true);
        let err = streaming
            .generate(&GraphInput::Text("Plato taught Aristotle.".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Timeout));
    }

    #[tokio::test]
    async fn test_streaming_mode() {
        let driver = Arc::new(RecordingDriver::default());
        let source = TripleExtractor::new(driver, true);
        let out = source
            .generate(&GraphInput::Topic("Stoicism".to_string()))
            .await
            .unwrap();
        let ModelOutput::Chunks(stream) = out else {
            panic!("expected chunks");
        };
        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(chunks.len(), 2);
    }
}
