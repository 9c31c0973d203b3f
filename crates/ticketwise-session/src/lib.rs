//! Conversation history storage.
//!
//! History is the only state that survives between turns. This crate
//! provides:
//! - [`SessionStore`], the load/save seam the orchestrator talks to
//! - [`InMemorySessionStore`] with LRU eviction and optional idle TTL
//! - [`SqliteSessionStore`] for history that survives restarts
//! - [`SessionLocks`] for per-conversation mutual exclusion
//!
//! # Example
//!
//! ```rust,ignore
//! use ticketwise_session::{InMemorySessionStore, StoreConfig};
//!
//! let config = StoreConfig::default()
//!     .with_max_sessions(1000)
//!     .with_ttl(Duration::from_secs(3600));
//!
//! let store = InMemorySessionStore::new(config);
//! ```

mod config;
mod error;
mod history;
mod locks;
mod memory;
mod sqlite;
mod store;

pub use config::StoreConfig;
pub use error::{Result, SessionError};
pub use history::{EntryRole, History, HistoryEntry};
pub use locks::{SessionGuard, SessionLocks};
pub use memory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;
pub use store::{SessionStore, SharedSessionStore};
