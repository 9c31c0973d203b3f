//! Tracker error types.

use thiserror::Error;

/// Tracker error type.
///
/// Display strings name the issue tracker so the failure source survives
/// once the error has been flattened to text.
#[derive(Debug, Clone, Error)]
pub enum TrackerError {
    /// Credentials were rejected (HTTP 401/403).
    #[error("ticket system authentication failed (HTTP {status}): {message}")]
    Auth {
        /// HTTP status code.
        status: u16,
        /// Message from the server.
        message: String,
    },

    /// Issue or endpoint not found.
    #[error("ticket system: not found: {0}")]
    NotFound(String),

    /// Connection failure.
    #[error("ticket system connection error: {0}")]
    Network(String),

    /// The request exceeded its deadline.
    #[error("ticket system request timed out: {0}")]
    Timeout(String),

    /// Server returned an error response.
    #[error("ticket system API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from server.
        message: String,
    },

    /// Invalid configuration.
    #[error("ticket system configuration error: {0}")]
    Config(String),

    /// Unexpected payload shape.
    #[error("ticket system response error: {0}")]
    Serialization(String),
}

impl TrackerError {
    /// Create an authentication error.
    pub fn auth(status: u16, message: impl Into<String>) -> Self {
        Self::Auth {
            status,
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_)) || matches!(self, Self::Api { status: 404, .. })
    }

    /// Check if this is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {}", err))
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for TrackerError {
    fn from(err: url::ParseError) -> Self {
        Self::Config(format!("invalid tracker url: {}", err))
    }
}

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
