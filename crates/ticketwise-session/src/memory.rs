//! In-process history store with LRU eviction and idle TTL.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::StoreConfig;
use crate::error::Result;
use crate::history::History;
use crate::store::SessionStore;

/// A cached conversation and when it was last used.
#[derive(Debug)]
struct Slot {
    history: History,
    touched: Instant,
}

/// History store held entirely in memory.
///
/// At most `max_sessions` conversations are kept; the least recently used
/// one is evicted to make room. With a TTL configured, a conversation idle
/// for longer than the TTL loads as empty.
pub struct InMemorySessionStore {
    slots: RwLock<LruCache<String, Slot>>,
    config: StoreConfig,
}

impl InMemorySessionStore {
    /// Create a new store.
    pub fn new(config: StoreConfig) -> Self {
        let cap = NonZeroUsize::new(config.max_sessions).unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: RwLock::new(LruCache::new(cap)),
            config,
        }
    }

    /// Get the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of conversations currently held.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    /// Drop every conversation idle past the TTL. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let Some(ttl) = self.config.ttl else {
            return 0;
        };

        let mut slots = self.slots.write().await;
        let expired: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| slot.touched.elapsed() > ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            slots.pop(id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "Purged expired conversations");
        }
        expired.len()
    }

    fn is_expired(&self, slot: &Slot) -> bool {
        self.config
            .ttl
            .is_some_and(|ttl| slot.touched.elapsed() > ttl)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, conversation_id: &str) -> Result<History> {
        let mut slots = self.slots.write().await;

        let expired = match slots.get(conversation_id) {
            None => {
                trace!(conversation_id = %conversation_id, "No stored history");
                return Ok(History::new());
            }
            Some(slot) => self.is_expired(slot),
        };

        if expired {
            debug!(conversation_id = %conversation_id, "Conversation expired, discarding history");
            slots.pop(conversation_id);
            return Ok(History::new());
        }

        match slots.get_mut(conversation_id) {
            Some(slot) => {
                slot.touched = Instant::now();
                Ok(slot.history.clone())
            }
            None => Ok(History::new()),
        }
    }

    async fn save(&self, conversation_id: &str, mut history: History) -> Result<()> {
        history.truncate_front(self.config.max_history_entries);

        let mut slots = self.slots.write().await;
        if let Some((evicted, _)) = slots.push(
            conversation_id.to_string(),
            Slot {
                history,
                touched: Instant::now(),
            },
        ) {
            if evicted != conversation_id {
                debug!(evicted = %evicted, "Evicted least recently used conversation");
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryEntry;
    use std::time::Duration;

    fn history(texts: &[&str]) -> History {
        History::from_entries(texts.iter().map(|t| HistoryEntry::user(*t)).collect())
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_empty() {
        let store = InMemorySessionStore::new(StoreConfig::default());
        assert!(store.load("nope").await.unwrap().is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = InMemorySessionStore::new(StoreConfig::default());
        store.save("a", history(&["one", "two"])).await.unwrap();

        let loaded = store.load("a").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(store.load("b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_cap_drops_oldest() {
        let store =
            InMemorySessionStore::new(StoreConfig::default().with_max_history_entries(2));
        store.save("a", history(&["1", "2", "3"])).await.unwrap();

        let loaded = store.load("a").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.entries()[0].content, "2");
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let store = InMemorySessionStore::new(StoreConfig::default().with_max_sessions(2));
        store.save("a", history(&["a"])).await.unwrap();
        store.save("b", history(&["b"])).await.unwrap();

        // Touch "a" so "b" becomes least recently used
        store.load("a").await.unwrap();
        store.save("c", history(&["c"])).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert!(store.load("b").await.unwrap().is_empty());
        assert_eq!(store.load("a").await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let store = InMemorySessionStore::new(
            StoreConfig::default().with_ttl(Duration::from_secs(60)),
        );
        store.save("a", history(&["x"])).await.unwrap();
        store.save("b", history(&["y"])).await.unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(store.load("a").await.unwrap().len(), 1);

        tokio::time::advance(Duration::from_secs(45)).await;
        // "a" was touched 45s ago, "b" 75s ago
        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.load("a").await.unwrap().len(), 1);
        assert!(store.load("b").await.unwrap().is_empty());
    }
}
