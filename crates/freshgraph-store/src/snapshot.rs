//! JSON snapshots of a [`MemoryGraph`].
//!
//! Lets the offline backend accumulate state across runs, so a second run
//! over the same feed exercises the idempotent update paths.
//!
//! Saves go through a temporary sibling file and a rename, so an interrupted
//! save never leaves a truncated snapshot behind.

use crate::memory::{Inner, MemoryGraph};
use crate::StoreError;
use chrono::{DateTime, Utc};
use freshgraph_model::{GraphNode, NodeKey, RelKind};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub rel: RelKind,
    pub from: NodeKey,
    pub to: NodeKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<SnapshotEdge>,
}

impl GraphSnapshot {
    pub fn capture(graph: &MemoryGraph) -> Self {
        let edges = graph
            .edges()
            .into_iter()
            .map(|(rel, from, to)| SnapshotEdge { rel, from, to })
            .collect();
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            nodes: graph.nodes(),
            edges,
        }
    }

    /// Rebuild a graph, re-checking per-label uniqueness and edge endpoints.
    pub fn restore(self) -> Result<MemoryGraph, StoreError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(StoreError::SnapshotVersion(self.version));
        }
        let mut inner = Inner::default();
        for node in self.nodes {
            inner.insert(node)?;
        }
        for edge in &self.edges {
            inner.link(edge.rel, &edge.from, &edge.to)?;
        }
        Ok(MemoryGraph {
            inner: RwLock::new(inner),
        })
    }
}

impl MemoryGraph {
    /// Load a snapshot; a missing file yields an empty graph.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no snapshot yet; starting empty");
            return Ok(Self::new());
        }
        let bytes = fs::read(path)?;
        let snapshot: GraphSnapshot = serde_json::from_slice(&bytes)?;
        let graph = snapshot.restore()?;
        tracing::info!(
            path = %path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "loaded graph snapshot"
        );
        Ok(graph)
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = GraphSnapshot::capture(self);
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;

        tracing::debug!(
            path = %path.display(),
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            "saved graph snapshot"
        );
        Ok(())
    }
}
