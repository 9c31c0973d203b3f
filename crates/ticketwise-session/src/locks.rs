//! Per-conversation mutual exclusion.
//!
//! Turns for the same conversation run one at a time; turns for different
//! conversations never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

/// Registry of per-conversation locks.
///
/// Entries are created on demand and removed when the last holder or
/// waiter is gone, so the map only grows with concurrently active
/// conversations.
#[derive(Debug, Clone, Default)]
pub struct SessionLocks {
    inner: Arc<Mutex<LockMap>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `conversation_id`.
    pub async fn acquire(&self, conversation_id: &str) -> SessionGuard {
        let lock = {
            let mut map = self.inner.lock();
            Arc::clone(
                map.entry(conversation_id.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };

        let guard = lock.lock_owned().await;
        SessionGuard {
            conversation_id: conversation_id.to_string(),
            registry: Arc::clone(&self.inner),
            guard: Some(guard),
        }
    }

    /// Number of conversations with a live lock entry.
    pub fn active(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Exclusive access to one conversation; released on drop.
#[derive(Debug)]
pub struct SessionGuard {
    conversation_id: String,
    registry: Arc<Mutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SessionGuard {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let mut map = self.registry.lock();
        let Some(guard) = self.guard.take() else {
            return;
        };
        let shared = Arc::clone(OwnedMutexGuard::mutex(&guard));
        drop(guard);

        // Held by the map and `shared` only: nobody is waiting
        if Arc::strong_count(&shared) == 2 {
            map.remove(&self.conversation_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let locks = SessionLocks::new();
        {
            let guard = locks.acquire("a").await;
            assert_eq!(guard.conversation_id(), "a");
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_same_conversation_is_serialized() {
        let locks = SessionLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("same").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_different_conversations_do_not_block() {
        let locks = SessionLocks::new();
        let _a = locks.acquire("a").await;

        let acquired = tokio::time::timeout(Duration::from_millis(100), locks.acquire("b")).await;
        assert!(acquired.is_ok());
    }
}
