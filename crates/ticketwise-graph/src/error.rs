//! Error types for the relationship store.

use thiserror::Error;

/// Result type alias using the graph error type.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Relationship store errors.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    /// Could not reach the store.
    #[error("relationship store unreachable: {0}")]
    Unavailable(String),

    /// Request exceeded its deadline.
    #[error("relationship store request timed out: {0}")]
    Timeout(String),

    /// Credentials rejected.
    #[error("relationship store authentication failed: {0}")]
    Auth(String),

    /// The database reported a query error.
    #[error("relationship store query error {code}: {message}")]
    Query { code: String, message: String },

    /// Invalid configuration.
    #[error("relationship store configuration error: {0}")]
    Config(String),

    /// Unexpected response shape.
    #[error("relationship store response error: {0}")]
    Serialization(String),
}

impl GraphError {
    /// True for failures that mean the store cannot be used right now.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for GraphError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for GraphError {
    fn from(err: url::ParseError) -> Self {
        Self::Config(format!("invalid graph uri: {}", err))
    }
}
