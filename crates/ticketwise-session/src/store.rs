//! The session store seam.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::history::History;

/// Keyed storage for conversation history.
///
/// `save` replaces the stored history wholesale; a reader never observes a
/// partially written history.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load history; unknown conversations yield an empty history.
    async fn load(&self, conversation_id: &str) -> Result<History>;

    /// Replace the stored history.
    async fn save(&self, conversation_id: &str, history: History) -> Result<()>;

    /// Store name for logs.
    fn name(&self) -> &str;
}

/// A store that can be shared across threads.
pub type SharedSessionStore = Arc<dyn SessionStore>;
