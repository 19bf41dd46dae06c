//! Freshgraph graph storage
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │    Ingestion     │────►│   GraphWriter    │────►│   GraphStore     │
//! │    pipeline      │     │ (upsert, link,   │     │ MemoryGraph  or  │
//! │                  │     │  reconciliation) │     │ Neo4jGraph       │
//! └──────────────────┘     └──────────────────┘     └──────────────────┘
//! ```
//!
//! `GraphStore` is the narrow surface every backend provides: typed
//! create-or-update, label add/remove, idempotent relationship connect and
//! lookup by `(label, id)`, with per-label uniqueness of `id`.
//!
//! `GraphWriter` layers the ingestion semantics on top: zero-or-one
//! relationships, and the one-shot repair of builds that were first written
//! under the generic build label.

pub mod error;
pub mod memory;
#[cfg(feature = "neo4j")]
pub mod neo4j;
pub mod snapshot;
pub mod writer;


pub use error::StoreError;
pub use memory::MemoryGraph;
#[cfg(feature = "neo4j")]
pub use neo4j::{Neo4jConfig, Neo4jGraph};
pub use snapshot::GraphSnapshot;
pub use writer::{BuildOutcome, BuildState, BuildWrite, GraphWriter};

use async_trait::async_trait;
use freshgraph_model::{GraphNode, Label, Node, NodeKey, RelKind};
use std::sync::Arc;

/// Result of a typed create-or-update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    pub node: GraphNode,
    pub created: bool,
}

/// Backend contract for the ingestion graph.
///
/// `create_or_update` matches an existing node only if it carries *all* of the
/// typed node's labels. If no such node exists but one of those labels already
/// holds the id, the call fails with [`StoreError::ConstraintViolation`] naming
/// that label.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn create_or_update(&self, node: &Node) -> Result<Upserted, StoreError>;

    async fn get_or_none(&self, label: Label, id: &str) -> Result<Option<GraphNode>, StoreError>;

    async fn add_label(&self, key: &NodeKey, label: Label) -> Result<(), StoreError>;

    async fn remove_label(&self, key: &NodeKey, label: Label) -> Result<(), StoreError>;

    /// Connect `from -[rel]-> to`. Returns `true` if the edge was created,
    /// `false` if it already existed.
    async fn connect(&self, rel: RelKind, from: &NodeKey, to: &NodeKey)
        -> Result<bool, StoreError>;

    /// Remove every `rel` edge leaving `from`; returns how many were removed.
    async fn disconnect_all(&self, rel: RelKind, from: &NodeKey) -> Result<usize, StoreError>;

    /// Targets of `rel` edges leaving `from`, addressed by the relationship's
    /// target label.
    async fn related(&self, rel: RelKind, from: &NodeKey) -> Result<Vec<NodeKey>, StoreError>;
}

#[async_trait]
impl<G: GraphStore + ?Sized> GraphStore for Arc<G> {
    async fn create_or_update(&self, node: &Node) -> Result<Upserted, StoreError> {
        (**self).create_or_update(node).await
    }

    async fn get_or_none(&self, label: Label, id: &str) -> Result<Option<GraphNode>, StoreError> {
        (**self).get_or_none(label, id).await
    }

    async fn add_label(&self, key: &NodeKey, label: Label) -> Result<(), StoreError> {
        (**self).add_label(key, label).await
    }

    async fn remove_label(&self, key: &NodeKey, label: Label) -> Result<(), StoreError> {
        (**self).remove_label(key, label).await
    }

    async fn connect(
        &self,
        rel: RelKind,
        from: &NodeKey,
        to: &NodeKey,
    ) -> Result<bool, StoreError> {
        (**self).connect(rel, from, to).await
    }

    async fn disconnect_all(&self, rel: RelKind, from: &NodeKey) -> Result<usize, StoreError> {
        (**self).disconnect_all(rel, from).await
    }

    async fn related(&self, rel: RelKind, from: &NodeKey) -> Result<Vec<NodeKey>, StoreError> {
        (**self).related(rel, from).await
    }
}
