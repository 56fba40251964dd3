//! Error taxonomy for model calls.

/// Message shown to the user for failures that are not rate limits or timeouts.
pub const GENERIC_FAILURE_MESSAGE: &str = "An unexpected error occurred during graph generation";

/// Errors raised by an [`LlmDriver`](super::LlmDriver).
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The provider rejected the request because of rate limiting.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The request did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The provider returned a non-success status.
    #[error("Provider returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Connection or protocol failure.
    #[error("Transport error: {0}")]
    Transport(reqwest::Error),

    /// A response frame could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The provider answered without any content.
    #[error("Empty response from model")]
    EmptyResponse,
}

impl LlmError {
    /// Classify a non-success HTTP response.
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 429 || body.contains("rate_limit") {
            Self::RateLimited
        } else if status == 408 || status == 504 {
            Self::Timeout
        } else {
            Self::Status {
                status,
                message: body,
            }
        }
    }

    /// User-facing, actionable text for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::RateLimited => "Model rate limit exceeded. Please try again later.",
            Self::Timeout => "Model request timed out. Please try again.",
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if let Some(status) = e.status() {
            Self::from_status(status.as_u16(), e.to_string())
        } else {
            Self::Transport(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(LlmError::from_status(429, String::new()), LlmError::RateLimited));
        assert!(matches!(
            LlmError::from_status(400, r#"{"error":{"code":"rate_limit_exceeded"}}"#.to_string()),
            LlmError::RateLimited
        ));
        assert!(matches!(LlmError::from_status(504, String::new()), LlmError::Timeout));
        assert!(matches!(
            LlmError::from_status(500, "boom".to_string()),
            LlmError::Status { status: 500, .. }
        ));
    }

    #[test]
    fn test_user_messages() {
        assert!(LlmError::RateLimited.user_message().contains("rate limit"));
        assert!(LlmError::Timeout.user_message().contains("timed out"));
        assert_eq!(LlmError::EmptyResponse.user_message(), GENERIC_FAILURE_MESSAGE);
    }
}
