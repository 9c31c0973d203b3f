//! Store configuration.

use std::time::Duration;

/// Bounds applied by session stores.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum conversations held in memory before LRU eviction.
    pub max_sessions: usize,

    /// Idle time after which a conversation is forgotten. `None` disables expiry.
    pub ttl: Option<Duration>,

    /// Maximum history entries kept per conversation; oldest are dropped.
    pub max_history_entries: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: 1000,
            ttl: None,
            max_history_entries: 200,
        }
    }
}

impl StoreConfig {
    /// Set the maximum number of in-memory conversations.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max.max(1);
        self
    }

    /// Set the idle TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Disable idle expiry.
    pub fn without_ttl(mut self) -> Self {
        self.ttl = None;
        self
    }

    /// Set the per-conversation history cap.
    pub fn with_max_history_entries(mut self, max: usize) -> Self {
        self.max_history_entries = max.max(1);
        self
    }
}
