//! In-process graph store.
//!
//! Emulates the uniqueness semantics of a labelled property graph with one
//! `id` constraint per label: every `(label, id)` pair names at most one node,
//! and a node carrying several labels occupies one slot per label.
//!
//! Used directly by tests and, through [`crate::snapshot`], as the offline
//! backend of the CLI.

use crate::{GraphStore, StoreError, Upserted};
use async_trait::async_trait;
use freshgraph_model::{GraphNode, Label, Node, NodeKey, RelKind};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
pub(crate) struct Inner {
    pub(crate) nodes: Vec<GraphNode>,
    index: BTreeMap<(Label, String), usize>,
    pub(crate) edges: BTreeSet<(RelKind, usize, usize)>,
}

impl Inner {
    fn handle(&self, key: &NodeKey) -> Result<usize, StoreError> {
        self.index
            .get(&(key.label, key.id.clone()))
            .copied()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    /// Insert a node, claiming one index slot per label.
    pub(crate) fn insert(&mut self, node: GraphNode) -> Result<usize, StoreError> {
        for label in &node.labels {
            if self.index.contains_key(&(*label, node.id.clone())) {
                return Err(StoreError::ConstraintViolation {
                    label: *label,
                    id: node.id.clone(),
                });
            }
        }
        let handle = self.nodes.len();
        for label in &node.labels {
            self.index.insert((*label, node.id.clone()), handle);
        }
        self.nodes.push(node);
        Ok(handle)
    }

    /// Both ends must exist and carry the relationship's source and target
    /// labels.
    pub(crate) fn link(
        &mut self,
        rel: RelKind,
        from: &NodeKey,
        to: &NodeKey,
    ) -> Result<bool, StoreError> {
        let from = self.typed_handle(from, rel.source())?;
        let to = self.typed_handle(to, rel.target())?;
        Ok(self.edges.insert((rel, from, to)))
    }

    fn typed_handle(&self, key: &NodeKey, label: Label) -> Result<usize, StoreError> {
        let handle = self.handle(key)?;
        if self.nodes[handle].has_label(label) {
            Ok(handle)
        } else {
            Err(StoreError::NotFound(NodeKey::new(label, key.id.clone())))
        }
    }
}

/// Thread-safe in-memory [`GraphStore`].
#[derive(Debug, Default)]
pub struct MemoryGraph {
    pub(crate) inner: RwLock<Inner>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.read().edges.len()
    }

    /// Every node, in insertion order.
    pub fn nodes(&self) -> Vec<GraphNode> {
        self.inner.read().nodes.clone()
    }

    /// Every edge as `(rel, from, to)`, both ends addressed by base label.
    pub fn edges(&self) -> Vec<(RelKind, NodeKey, NodeKey)> {
        let inner = self.inner.read();
        inner
            .edges
            .iter()
            .filter_map(|(rel, from, to)| {
                let from = inner.nodes[*from].key()?;
                let to = inner.nodes[*to].key()?;
                Some((*rel, from, to))
            })
            .collect()
    }

    /// Nodes whose id equals `id`, under any label.
    pub fn nodes_with_id(&self, id: &str) -> Vec<GraphNode> {
        self.inner
            .read()
            .nodes
            .iter()
            .filter(|node| node.id == id)
            .cloned()
            .collect()
    }

    pub fn get(&self, label: Label, id: &str) -> Option<GraphNode> {
        let inner = self.inner.read();
        inner
            .index
            .get(&(label, id.to_string()))
            .map(|handle| inner.nodes[*handle].clone())
    }

    fn upsert(&self, node: &Node) -> Result<Upserted, StoreError> {
        let labels = node.labels();
        let id = node.id();
        let mut inner = self.inner.write();

        let existing = inner
            .index
            .get(&(labels[0], id.clone()))
            .copied()
            .filter(|handle| labels.iter().all(|l| inner.nodes[*handle].has_label(*l)));

        match existing {
            Some(handle) => {
                let stored = &mut inner.nodes[handle];
                stored.properties.extend(node.properties());
                Ok(Upserted {
                    node: stored.clone(),
                    created: false,
                })
            }
            None => {
                let fresh = node.to_graph_node();
                inner.insert(fresh.clone())?;
                Ok(Upserted {
                    node: fresh,
                    created: true,
                })
            }
        }
    }

    fn retag(&self, key: &NodeKey, label: Label, add: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let handle = inner.handle(key)?;
        let slot = (label, key.id.clone());

        if add {
            match inner.index.get(&slot) {
                Some(other) if *other == handle => return Ok(()),
                Some(_) => {
                    return Err(StoreError::ConstraintViolation {
                        label,
                        id: key.id.clone(),
                    })
                }
                None => {}
            }
            inner.index.insert(slot, handle);
            inner.nodes[handle].labels.insert(label);
        } else if inner.nodes[handle].labels.remove(&label) {
            inner.index.remove(&slot);
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn create_or_update(&self, node: &Node) -> Result<Upserted, StoreError> {
        self.upsert(node)
    }

    async fn get_or_none(&self, label: Label, id: &str) -> Result<Option<GraphNode>, StoreError> {
        Ok(self.get(label, id))
    }

    async fn add_label(&self, key: &NodeKey, label: Label) -> Result<(), StoreError> {
        self.retag(key, label, true)
    }

    async fn remove_label(&self, key: &NodeKey, label: Label) -> Result<(), StoreError> {
        self.retag(key, label, false)
    }

    async fn connect(
        &self,
        rel: RelKind,
        from: &NodeKey,
        to: &NodeKey,
    ) -> Result<bool, StoreError> {
        self.inner.write().link(rel, from, to)
    }

    async fn disconnect_all(&self, rel: RelKind, from: &NodeKey) -> Result<usize, StoreError> {
        let mut inner = self.inner.write();
        let from = inner.handle(from)?;
        let before = inner.edges.len();
        inner.edges.retain(|(r, f, _)| !(*r == rel && *f == from));
        Ok(before - inner.edges.len())
    }

    async fn related(&self, rel: RelKind, from: &NodeKey) -> Result<Vec<NodeKey>, StoreError> {
        let inner = self.inner.read();
        let from = inner.handle(from)?;
        Ok(inner
            .edges
            .iter()
            .filter(|(r, f, _)| *r == rel && *f == from)
            .map(|(_, _, to)| NodeKey::new(rel.target(), inner.nodes[*to].id.clone()))
            .collect())
    }
}
