//! Error types for history storage.

/// Error type for session store operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Underlying storage failed.
    #[error("Session storage error: {0}")]
    Storage(String),

    /// Stored history could not be decoded.
    #[error("Session serialization error: {0}")]
    Serialization(String),

    /// The conversation id is unusable.
    #[error("Invalid conversation id: {0:?}")]
    InvalidId(String),
}

impl From<rusqlite::Error> for SessionError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SessionError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Storage(format!("storage task failed: {}", err))
    }
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, SessionError>;
