//! The relationship-store trait and a scripted mock.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{Relation, RelationPattern};

/// Read-only access to issue relationships.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// Resolve a pattern to the matching relations.
    async fn query(&self, pattern: &RelationPattern) -> Result<Vec<Relation>>;

    /// Cheap reachability check. Never errors; unreachable is `false`.
    async fn is_reachable(&self) -> bool;

    /// Display name for logs.
    fn name(&self) -> &str;
}

/// A store that can be shared across threads.
pub type SharedStore = Arc<dyn RelationshipStore>;

#[cfg(any(test, feature = "testing"))]
pub use mock::MockGraph;

#[cfg(any(test, feature = "testing"))]
mod mock {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::RelationshipStore;
    use crate::error::{GraphError, Result};
    use crate::types::{Relation, RelationPattern};

    /// In-memory relationship store for tests.
    #[derive(Debug)]
    pub struct MockGraph {
        relations: Vec<Relation>,
        reachable: AtomicBool,
        failure: Option<GraphError>,
        patterns: Mutex<Vec<RelationPattern>>,
        probes: AtomicUsize,
    }

    impl MockGraph {
        /// A reachable store holding `relations`.
        pub fn new(relations: Vec<Relation>) -> Self {
            Self {
                relations,
                reachable: AtomicBool::new(true),
                failure: None,
                patterns: Mutex::new(Vec::new()),
                probes: AtomicUsize::new(0),
            }
        }

        /// A store that reports unreachable and fails every query.
        pub fn unreachable() -> Self {
            let store = Self::new(Vec::new())
                .with_failure(GraphError::Unavailable("connection refused".to_string()));
            store.set_reachable(false);
            store
        }

        /// Fail every query with `err` (reachability is unaffected).
        pub fn with_failure(mut self, err: GraphError) -> Self {
            self.failure = Some(err);
            self
        }

        /// Flip reachability at runtime.
        pub fn set_reachable(&self, reachable: bool) {
            self.reachable.store(reachable, Ordering::SeqCst);
        }

        /// Patterns queried so far.
        pub fn patterns(&self) -> Vec<RelationPattern> {
            self.patterns.lock().map(|p| p.clone()).unwrap_or_default()
        }

        /// Number of reachability checks made.
        pub fn probe_count(&self) -> usize {
            self.probes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RelationshipStore for MockGraph {
        async fn query(&self, pattern: &RelationPattern) -> Result<Vec<Relation>> {
            if let Ok(mut patterns) = self.patterns.lock() {
                patterns.push(pattern.clone());
            }
            if let Some(ref err) = self.failure {
                return Err(err.clone());
            }
            Ok(self
                .relations
                .iter()
                .filter(|r| pattern.matches(r))
                .cloned()
                .collect())
        }

        async fn is_reachable(&self) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.reachable.load(Ordering::SeqCst)
        }

        fn name(&self) -> &str {
            "mock-graph"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_filters_by_pattern() {
        let graph = MockGraph::new(vec![
            Relation::blocks("A-1", "A-2"),
            Relation::blocks("A-3", "A-2"),
            Relation::blocks("A-2", "A-4"),
        ]);

        let blockers = graph
            .query(&RelationPattern::BlockedBy {
                issue: "A-2".into(),
            })
            .await
            .unwrap();
        assert_eq!(blockers.len(), 2);
        assert_eq!(graph.patterns().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_mock() {
        let graph = MockGraph::unreachable();
        assert!(!graph.is_reachable().await);
        assert_eq!(graph.probe_count(), 1);

        let err = graph.query(&RelationPattern::Dependencies).await.unwrap_err();
        assert!(err.is_unavailable());

        graph.set_reachable(true);
        assert!(graph.is_reachable().await);
    }
}
