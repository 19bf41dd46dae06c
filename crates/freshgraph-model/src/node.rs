//! Typed graph nodes and relationships.
//!
//! Every node is identified by `(label, id)`; identities are unique per
//! label. Ids are stored as strings (event and advisory ids are rendered in
//! base 10), matching what the graph store keeps in its `id` property.
//!
//! Builds come in two shapes:
//!
//! ```text
//! Generic    labels = {KojiBuild}
//! Container  labels = {KojiBuild, ContainerKojiBuild}
//! ```
//!
//! Every container build is also a build, so both shapes share the
//! `KojiBuild` identity constraint. A generic node for an id blocks creation
//! of a container node for the same id until it is retyped.

use crate::feed::FeedEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ============================================================================
// Labels and relationships
// ============================================================================

/// Node label. The declaration order is the canonical order: a node's first
/// label is its base label, used to address it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    FreshmakerEvent,
    Advisory,
    KojiBuild,
    ContainerKojiBuild,
}

impl Label {
    pub const ALL: [Label; 4] = [
        Label::FreshmakerEvent,
        Label::Advisory,
        Label::KojiBuild,
        Label::ContainerKojiBuild,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Label::FreshmakerEvent => "FreshmakerEvent",
            Label::Advisory => "Advisory",
            Label::KojiBuild => "KojiBuild",
            Label::ContainerKojiBuild => "ContainerKojiBuild",
        }
    }

    pub fn parse(s: &str) -> Option<Label> {
        Label::ALL.into_iter().find(|label| label.as_str() == s)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    ZeroOrOne,
    ZeroOrMore,
}

/// Relationship kinds, always directed from an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelKind {
    /// `FreshmakerEvent -[TRIGGERED_BY]-> Advisory`
    TriggeredBy,
    /// `FreshmakerEvent -[TRIGGERED]-> ContainerKojiBuild`
    TriggeredBuilds,
}

impl RelKind {
    /// Relationship type as stored in the graph.
    pub fn rel_type(self) -> &'static str {
        match self {
            RelKind::TriggeredBy => "TRIGGERED_BY",
            RelKind::TriggeredBuilds => "TRIGGERED",
        }
    }

    pub fn source(self) -> Label {
        Label::FreshmakerEvent
    }

    pub fn target(self) -> Label {
        match self {
            RelKind::TriggeredBy => Label::Advisory,
            RelKind::TriggeredBuilds => Label::ContainerKojiBuild,
        }
    }

    pub fn cardinality(self) -> Cardinality {
        match self {
            RelKind::TriggeredBy => Cardinality::ZeroOrOne,
            RelKind::TriggeredBuilds => Cardinality::ZeroOrMore,
        }
    }
}

// ============================================================================
// Node identity
// ============================================================================

/// Address of a node: a label plus the id unique under that label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    pub label: Label,
    pub id: String,
}

impl NodeKey {
    pub fn new(label: Label, id: impl Into<String>) -> Self {
        Self {
            label,
            id: id.into(),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.label, self.id)
    }
}

// ============================================================================
// Typed nodes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventNode {
    pub id: String,
    pub event_type_id: i64,
    pub message_id: String,
    pub state: i64,
    pub state_name: String,
    pub state_reason: Option<String>,
    pub url: String,
}

impl From<&FeedEvent> for EventNode {
    fn from(event: &FeedEvent) -> Self {
        Self {
            id: event.id.clone(),
            event_type_id: event.event_type_id,
            message_id: event.message_id.clone(),
            state: event.state,
            state_name: event.state_name.clone(),
            state_reason: event.state_reason.clone(),
            url: event.url.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryNode {
    pub id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildKind {
    Generic,
    Container,
}

impl BuildKind {
    pub fn labels(self) -> &'static [Label] {
        match self {
            BuildKind::Generic => &[Label::KojiBuild],
            BuildKind::Container => &[Label::KojiBuild, Label::ContainerKojiBuild],
        }
    }

    /// The kind implied by a label set, if it carries the build identity at all.
    pub fn from_labels(labels: &BTreeSet<Label>) -> Option<BuildKind> {
        if labels.contains(&Label::ContainerKojiBuild) {
            Some(BuildKind::Container)
        } else if labels.contains(&Label::KojiBuild) {
            Some(BuildKind::Generic)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildNode {
    pub id: String,
    pub original_nvr: Option<String>,
    pub kind: BuildKind,
}

impl BuildNode {
    pub fn container(id: impl Into<String>, original_nvr: Option<String>) -> Self {
        Self {
            id: id.into(),
            original_nvr,
            kind: BuildKind::Container,
        }
    }

    pub fn generic(id: impl Into<String>, original_nvr: Option<String>) -> Self {
        Self {
            id: id.into(),
            original_nvr,
            kind: BuildKind::Generic,
        }
    }
}

/// A node ready to be written: labels, identity and properties are all
/// derived from the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    Event(EventNode),
    Advisory(AdvisoryNode),
    Build(BuildNode),
}

impl Node {
    pub fn labels(&self) -> &'static [Label] {
        match self {
            Node::Event(_) => &[Label::FreshmakerEvent],
            Node::Advisory(_) => &[Label::Advisory],
            Node::Build(build) => build.kind.labels(),
        }
    }

    pub fn id(&self) -> String {
        match self {
            Node::Event(event) => event.id.clone(),
            Node::Advisory(advisory) => advisory.id.to_string(),
            Node::Build(build) => build.id.clone(),
        }
    }

    /// Address under the base label.
    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.labels()[0], self.id())
    }

    /// Properties other than `id`.
    pub fn properties(&self) -> BTreeMap<String, Value> {
        let mut props = BTreeMap::new();
        match self {
            Node::Event(event) => {
                props.insert("event_type_id".into(), Value::from(event.event_type_id));
                props.insert("message_id".into(), Value::from(event.message_id.clone()));
                props.insert("state".into(), Value::from(event.state));
                props.insert("state_name".into(), Value::from(event.state_name.clone()));
                props.insert(
                    "state_reason".into(),
                    event.state_reason.clone().map_or(Value::Null, Value::from),
                );
                props.insert("url".into(), Value::from(event.url.clone()));
            }
            Node::Advisory(_) => {}
            Node::Build(build) => {
                props.insert(
                    "original_nvr".into(),
                    build.original_nvr.clone().map_or(Value::Null, Value::from),
                );
            }
        }
        props
    }

    pub fn to_graph_node(&self) -> GraphNode {
        GraphNode {
            id: self.id(),
            labels: self.labels().iter().copied().collect(),
            properties: self.properties(),
        }
    }
}

/// A node as the store holds it: untyped labels and properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub labels: BTreeSet<Label>,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl GraphNode {
    pub fn has_label(&self, label: Label) -> bool {
        self.labels.contains(&label)
    }

    /// Address under the base (first) label.
    pub fn key(&self) -> Option<NodeKey> {
        self.labels
            .iter()
            .next()
            .map(|label| NodeKey::new(*label, self.id.clone()))
    }

    pub fn build_kind(&self) -> Option<BuildKind> {
        BuildKind::from_labels(&self.labels)
    }

    pub fn property_str(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_build_carries_both_labels() {
        let node = Node::Build(BuildNode::container("55", Some("pkg-1.0-1".into())));
        assert_eq!(node.labels(), &[Label::KojiBuild, Label::ContainerKojiBuild]);
        assert_eq!(node.key(), NodeKey::new(Label::KojiBuild, "55"));

        let graph = node.to_graph_node();
        assert_eq!(graph.build_kind(), Some(BuildKind::Container));
        assert_eq!(graph.property_str("original_nvr"), Some("pkg-1.0-1"));
    }

    #[test]
    fn test_event_properties_keep_nulls() {
        let node = Node::Event(EventNode {
            id: "42".into(),
            event_type_id: 8,
            message_id: "msg".into(),
            state: 2,
            state_name: "COMPLETE".into(),
            state_reason: None,
            url: "/api/1/events/42".into(),
        });
        let props = node.properties();
        assert_eq!(props.get("state_reason"), Some(&Value::Null));
        assert_eq!(props.get("state"), Some(&Value::from(2)));
        assert!(!props.contains_key("id"));
        assert_eq!(node.key().to_string(), "FreshmakerEvent(42)");
    }

    #[test]
    fn test_label_round_trips_through_name() {
        for label in Label::ALL {
            assert_eq!(Label::parse(label.as_str()), Some(label));
        }
        assert_eq!(Label::parse("User"), None);
    }

    #[test]
    fn test_relationship_shapes() {
        assert_eq!(RelKind::TriggeredBy.cardinality(), Cardinality::ZeroOrOne);
        assert_eq!(RelKind::TriggeredBuilds.cardinality(), Cardinality::ZeroOrMore);
        assert_eq!(RelKind::TriggeredBuilds.target(), Label::ContainerKojiBuild);
        assert_eq!(RelKind::TriggeredBy.rel_type(), "TRIGGERED_BY");
    }
}
