use freshgraph_model::{Label, NodeKey};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A node with this id already exists under `label`, but with a shape the
    /// write did not expect (e.g. a generic build where a container build was
    /// being written).
    #[error("uniqueness constraint on {label}.id violated by id {id:?}")]
    ConstraintViolation { label: Label, id: String },

    #[error("node not found: {0}")]
    NotFound(NodeKey),

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot format error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("unsupported snapshot version {0}")]
    SnapshotVersion(u32),

    #[error("graph backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StoreError::ConstraintViolation { .. })
    }
}
