//! Freshgraph data model
//!
//! Two vocabularies live here:
//! - `feed`: the records served by the Freshmaker events API, exactly as they
//!   arrive on the wire (lenient where the upstream data is known to be dirty).
//! - `node`: the typed graph the ingestion pipeline materializes
//!   (`FreshmakerEvent`, `Advisory`, `KojiBuild` / `ContainerKojiBuild`) and
//!   the relationships between them.
//!
//! Storage backends and the pipeline only ever talk in these types.

pub mod feed;
pub mod node;

pub use feed::{parse_advisory_id, EventPage, FeedBuild, FeedEvent, FeedItem, PageMeta};
pub use node::{
    AdvisoryNode, BuildKind, BuildNode, Cardinality, EventNode, GraphNode, Label, Node, NodeKey,
    RelKind,
};
