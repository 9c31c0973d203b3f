//! Relationship-store capability for ticketwise.
//!
//! Answers questions about how work items relate: which issues block which,
//! and what changed on them recently. The store is optional; callers check
//! [`RelationshipStore::is_reachable`] before routing work to it.

pub mod error;
pub mod neo4j;
pub mod store;
pub mod types;

pub use error::{GraphError, Result};
pub use neo4j::{Neo4jConfig, Neo4jStore};
#[cfg(any(test, feature = "testing"))]
pub use store::MockGraph;
pub use store::{RelationshipStore, SharedStore};
pub use types::{DEFAULT_HISTORY_DAYS, Relation, RelationKind, RelationPattern};
