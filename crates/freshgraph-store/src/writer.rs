//! Ingestion-level writes on top of a [`GraphStore`].
//!
//! Build reconciliation, per build id:
//!
//! ```text
//! Absent ───────────────► create container build
//! Container ────────────► update in place
//! GenericOnly ──(typed write hits the KojiBuild constraint)──►
//!     add ContainerKojiBuild label ──► retry typed write once
//! ```
//!
//! A second failure on the retry, or a violation that a generic build does not
//! explain, is returned to the caller.

use crate::{GraphStore, StoreError};
use freshgraph_model::{
    AdvisoryNode, BuildKind, BuildNode, Cardinality, EventNode, GraphNode, Label, Node, NodeKey,
    RelKind,
};

/// What is stored under a build id, as seen by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Absent,
    Container,
    GenericOnly,
}

impl BuildState {
    pub fn classify(node: Option<&GraphNode>) -> Self {
        match node.and_then(GraphNode::build_kind) {
            None => BuildState::Absent,
            Some(BuildKind::Container) => BuildState::Container,
            Some(BuildKind::Generic) => BuildState::GenericOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Created,
    Updated,
    /// A generic build was retyped and then updated.
    Reconciled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildWrite {
    /// Address under the container label, the target of `TRIGGERED` edges.
    pub key: NodeKey,
    pub node: GraphNode,
    pub outcome: BuildOutcome,
}

pub struct GraphWriter<G> {
    store: G,
}

impl<G: GraphStore> GraphWriter<G> {
    pub fn new(store: G) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &G {
        &self.store
    }

    pub async fn upsert_event(&self, event: &EventNode) -> Result<NodeKey, StoreError> {
        let node = Node::Event(event.clone());
        let upserted = self.store.create_or_update(&node).await?;
        tracing::debug!(event_id = %event.id, created = upserted.created, "upserted event");
        Ok(node.key())
    }

    pub async fn upsert_advisory(&self, advisory_id: i64) -> Result<NodeKey, StoreError> {
        let node = Node::Advisory(AdvisoryNode { id: advisory_id });
        let upserted = self.store.create_or_update(&node).await?;
        tracing::debug!(advisory_id, created = upserted.created, "upserted advisory");
        Ok(node.key())
    }

    /// Connect with the relationship's cardinality: a zero-or-one
    /// relationship to a new target replaces the existing edge.
    ///
    /// Returns `true` if the graph changed.
    pub async fn link(
        &self,
        rel: RelKind,
        from: &NodeKey,
        to: &NodeKey,
    ) -> Result<bool, StoreError> {
        if rel.cardinality() == Cardinality::ZeroOrOne {
            let current = self.store.related(rel, from).await?;
            if current.iter().any(|key| key.id == to.id) {
                return Ok(false);
            }
            if !current.is_empty() {
                let removed = self.store.disconnect_all(rel, from).await?;
                tracing::info!(
                    from = %from,
                    to = %to,
                    removed,
                    rel = rel.rel_type(),
                    "replacing zero-or-one relationship"
                );
            }
        }
        self.store.connect(rel, from, to).await
    }

    pub async fn link_advisory(
        &self,
        event: &NodeKey,
        advisory: &NodeKey,
    ) -> Result<bool, StoreError> {
        self.link(RelKind::TriggeredBy, event, advisory).await
    }

    pub async fn link_build(
        &self,
        event: &NodeKey,
        build: &BuildWrite,
    ) -> Result<bool, StoreError> {
        self.link(RelKind::TriggeredBuilds, event, &build.key).await
    }

    /// Create or update a container build, repairing a generic build with the
    /// same id at most once.
    pub async fn upsert_container_build(
        &self,
        build_id: &str,
        original_nvr: Option<String>,
    ) -> Result<BuildWrite, StoreError> {
        let node = Node::Build(BuildNode::container(build_id, original_nvr));
        let key = NodeKey::new(Label::ContainerKojiBuild, build_id);

        let violation = match self.store.create_or_update(&node).await {
            Ok(upserted) => {
                let outcome = if upserted.created {
                    BuildOutcome::Created
                } else {
                    BuildOutcome::Updated
                };
                return Ok(BuildWrite {
                    key,
                    node: upserted.node,
                    outcome,
                });
            }
            Err(StoreError::ConstraintViolation { label, id })
                if label == Label::KojiBuild && id == build_id =>
            {
                StoreError::ConstraintViolation { label, id }
            }
            Err(err) => return Err(err),
        };

        let existing = self.store.get_or_none(Label::KojiBuild, build_id).await?;
        match BuildState::classify(existing.as_ref()) {
            BuildState::GenericOnly => {}
            state => {
                tracing::error!(
                    build_id,
                    ?state,
                    "build constraint violation not explained by a generic build"
                );
                return Err(violation);
            }
        }

        tracing::info!(build_id, "retyping generic build as container build");
        self.store
            .add_label(&NodeKey::new(Label::KojiBuild, build_id), Label::ContainerKojiBuild)
            .await?;
        let upserted = self.store.create_or_update(&node).await?;
        Ok(BuildWrite {
            key,
            node: upserted.node,
            outcome: BuildOutcome::Reconciled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryGraph, Upserted};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory store whose build writes can be made to fail in order, counting
    /// build writes and label additions.
    #[derive(Default)]
    struct Scripted {
        inner: MemoryGraph,
        build_failures: Mutex<VecDeque<Option<StoreError>>>,
        build_writes: AtomicUsize,
        labels_added: AtomicUsize,
    }

    impl Scripted {
        fn failing(failures: Vec<Option<StoreError>>) -> Self {
            Self {
                build_failures: Mutex::new(failures.into()),
                ..Self::default()
            }
        }

        fn counts(&self) -> (usize, usize) {
            (
                self.build_writes.load(Ordering::SeqCst),
                self.labels_added.load(Ordering::SeqCst),
            )
        }
    }

    #[async_trait]
    impl GraphStore for Scripted {
        async fn create_or_update(&self, node: &Node) -> Result<Upserted, StoreError> {
            if let Node::Build(_) = node {
                self.build_writes.fetch_add(1, Ordering::SeqCst);
                if let Some(Some(err)) = self.build_failures.lock().pop_front() {
                    return Err(err);
                }
            }
            self.inner.create_or_update(node).await
        }

        async fn get_or_none(&self, label: Label, id: &str) -> Result<Option<GraphNode>, StoreError> {
            self.inner.get_or_none(label, id).await
        }

        async fn add_label(&self, key: &NodeKey, label: Label) -> Result<(), StoreError> {
            self.labels_added.fetch_add(1, Ordering::SeqCst);
            self.inner.add_label(key, label).await
        }

        async fn remove_label(&self, key: &NodeKey, label: Label) -> Result<(), StoreError> {
            self.inner.remove_label(key, label).await
        }

        async fn connect(
            &self,
            rel: RelKind,
            from: &NodeKey,
            to: &NodeKey,
        ) -> Result<bool, StoreError> {
            self.inner.connect(rel, from, to).await
        }

        async fn disconnect_all(&self, rel: RelKind, from: &NodeKey) -> Result<usize, StoreError> {
            self.inner.disconnect_all(rel, from).await
        }

        async fn related(&self, rel: RelKind, from: &NodeKey) -> Result<Vec<NodeKey>, StoreError> {
            self.inner.related(rel, from).await
        }
    }

    fn build_violation(id: &str) -> StoreError {
        StoreError::ConstraintViolation {
            label: Label::KojiBuild,
            id: id.to_string(),
        }
    }

    fn generic(id: &str) -> GraphNode {
        Node::Build(BuildNode::generic(id, None)).to_graph_node()
    }

    #[test]
    fn test_classify_build_states() {
        assert_eq!(BuildState::classify(None), BuildState::Absent);
        assert_eq!(BuildState::classify(Some(&generic("1"))), BuildState::GenericOnly);

        let container = Node::Build(BuildNode::container("1", None)).to_graph_node();
        assert_eq!(BuildState::classify(Some(&container)), BuildState::Container);

        let advisory = Node::Advisory(AdvisoryNode { id: 1 }).to_graph_node();
        assert_eq!(BuildState::classify(Some(&advisory)), BuildState::Absent);
    }

    #[tokio::test]
    async fn test_create_then_update_container_build() {
        let writer = GraphWriter::new(MemoryGraph::new());

        let first = writer.upsert_container_build("55", Some("pkg-1.0-1".into())).await.unwrap();
        assert_eq!(first.outcome, BuildOutcome::Created);

        let second = writer.upsert_container_build("55", Some("pkg-1.0-2".into())).await.unwrap();
        assert_eq!(second.outcome, BuildOutcome::Updated);
        assert_eq!(second.node.property_str("original_nvr"), Some("pkg-1.0-2"));
        assert_eq!(writer.store().node_count(), 1);
    }

    #[tokio::test]
    async fn test_reconciles_generic_build_once() {
        let store = MemoryGraph::new();
        store
            .create_or_update(&Node::Build(BuildNode::generic("55", Some("old-1-1".into()))))
            .await
            .unwrap();
        let writer = GraphWriter::new(store);

        let write = writer.upsert_container_build("55", Some("pkg-1.0-1".into())).await.unwrap();
        assert_eq!(write.outcome, BuildOutcome::Reconciled);
        assert!(write.node.has_label(Label::ContainerKojiBuild));
        assert_eq!(write.node.property_str("original_nvr"), Some("pkg-1.0-1"));

        let nodes = writer.store().nodes_with_id("55");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].build_kind(), Some(BuildKind::Container));

        let again = writer.upsert_container_build("55", None).await.unwrap();
        assert_eq!(again.outcome, BuildOutcome::Updated);
    }

    #[tokio::test]
    async fn test_reconcile_takes_exactly_one_retry() {
        let store = Scripted::default();
        store
            .inner
            .create_or_update(&Node::Build(BuildNode::generic("55", None)))
            .await
            .unwrap();
        let writer = GraphWriter::new(store);

        let write = writer.upsert_container_build("55", Some("pkg-1.0-1".into())).await.unwrap();
        assert_eq!(write.outcome, BuildOutcome::Reconciled);
        assert_eq!(writer.store().counts(), (2, 1));
    }

    #[tokio::test]
    async fn test_build_violation_without_generic_node_is_returned() {
        let writer = GraphWriter::new(Scripted::failing(vec![Some(build_violation("55"))]));

        let err = writer.upsert_container_build("55", None).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::ConstraintViolation { label: Label::KojiBuild, ref id } if id == "55"
        ));
        assert_eq!(writer.store().counts(), (1, 0));
        assert_eq!(writer.store().inner.node_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_after_retyping_is_returned() {
        // first write hits the real generic node, the retry fails again
        let store = Scripted::failing(vec![None, Some(build_violation("55"))]);
        store
            .inner
            .create_or_update(&Node::Build(BuildNode::generic("55", None)))
            .await
            .unwrap();
        let writer = GraphWriter::new(store);

        let err = writer.upsert_container_build("55", None).await.unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(writer.store().counts(), (2, 1));

        // the retype is not rolled back
        let stored = writer.store().inner.get(Label::KojiBuild, "55").unwrap();
        assert!(stored.has_label(Label::ContainerKojiBuild));
    }

    #[tokio::test]
    async fn test_zero_or_one_link_replaces_previous_target() {
        let writer = GraphWriter::new(MemoryGraph::new());
        let event = writer
            .upsert_event(&EventNode {
                id: "1".into(),
                event_type_id: 1,
                message_id: "m".into(),
                state: 2,
                state_name: "COMPLETE".into(),
                state_reason: None,
                url: "/api/1/events/1".into(),
            })
            .await
            .unwrap();
        let a = writer.upsert_advisory(7).await.unwrap();
        let b = writer.upsert_advisory(8).await.unwrap();

        assert!(writer.link_advisory(&event, &a).await.unwrap());
        assert!(!writer.link_advisory(&event, &a).await.unwrap());
        assert!(writer.link_advisory(&event, &b).await.unwrap());

        let related = writer.store().related(RelKind::TriggeredBy, &event).await.unwrap();
        assert_eq!(related, vec![NodeKey::new(Label::Advisory, "8")]);
        assert_eq!(writer.store().edge_count(), 1);
    }
}
