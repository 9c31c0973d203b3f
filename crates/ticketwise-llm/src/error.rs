//! Error types for the LLM crate.

use thiserror::Error;

/// Result type alias using the LLM error type.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Error type for LLM operations.
///
/// Display strings always name the failing service so that downstream
/// pattern-based classification can recognise where a failure came from.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Backend/API error from the provider.
    #[error("language model backend error: {0}")]
    Backend(String),

    /// Network/connectivity error.
    #[error("language model network error: {0}")]
    Network(String),

    /// The request did not complete within its deadline.
    #[error("language model request timed out: {0}")]
    Timeout(String),

    /// Configuration error (API key missing, etc.).
    #[error("language model configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("language model serialization error: {0}")]
    Serialization(String),

    /// Invalid request parameters.
    #[error("language model invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded.
    #[error("language model rate limit exceeded: {0}")]
    RateLimit(String),

    /// Authentication failed (invalid api key, revoked key).
    #[error("language model authentication error: {0}")]
    Auth(String),

    /// Internal error.
    #[error("language model internal error: {0}")]
    Internal(String),
}

impl LlmError {
    /// Returns true if the provider rejected our credentials.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Returns true if the request ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(format!("request timed out: {}", err))
        } else if err.is_connect() {
            LlmError::Network(format!("connection failed: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_service() {
        let err = LlmError::Network("connection refused".to_string());
        assert!(err.to_string().starts_with("language model"));
        assert!(err.to_string().contains("connection refused"));

        let err = LlmError::Auth("invalid api key".to_string());
        assert!(err.to_string().contains("authentication"));
    }

    #[test]
    fn test_predicates() {
        assert!(LlmError::Auth("401".to_string()).is_auth_error());
        assert!(!LlmError::Backend("500".to_string()).is_auth_error());
        assert!(LlmError::Timeout("30s".to_string()).is_timeout());
        assert!(!LlmError::Network("down".to_string()).is_timeout());
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let llm_err: LlmError = err.into();
        assert!(matches!(llm_err, LlmError::Serialization(_)));
    }
}
