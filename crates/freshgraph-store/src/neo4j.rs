//! Neo4j backend.
//!
//! Labels cannot be bound as Cypher parameters, so they are spliced into the
//! query text. They only ever come from [`Label::as_str`], never from input.
//!
//! Per-label uniqueness is enforced by the database through the constraints
//! created in [`Neo4jGraph::ensure_constraints`]. A violating `MERGE` fails
//! server-side and is surfaced as [`StoreError::ConstraintViolation`].

use crate::{GraphStore, StoreError, Upserted};
use async_trait::async_trait;
use freshgraph_model::{GraphNode, Label, Node, NodeKey, RelKind};
use neo4rs::{query, BoltNull, BoltType, Graph, Query};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

pub struct Neo4jGraph {
    graph: Graph,
}

impl Neo4jGraph {
    pub async fn connect(config: &Neo4jConfig) -> Result<Self, StoreError> {
        let graph = Graph::new(
            config.uri.as_str(),
            config.user.as_str(),
            config.password.as_str(),
        )
        .await
        .map_err(|err| StoreError::Backend(err.to_string()))?;
        tracing::info!(uri = %config.uri, "connected to neo4j");
        Ok(Self { graph })
    }

    /// Create the `id` uniqueness constraint for every label. Idempotent.
    pub async fn ensure_constraints(&self) -> Result<(), StoreError> {
        for label in Label::ALL {
            let cypher = format!(
                "CREATE CONSTRAINT freshgraph_{name}_id IF NOT EXISTS \
                 FOR (n:{label}) REQUIRE n.id IS UNIQUE",
                name = label.as_str().to_lowercase(),
                label = label.as_str(),
            );
            self.graph
                .run(query(&cypher))
                .await
                .map_err(|err| StoreError::Backend(err.to_string()))?;
            tracing::debug!(label = %label, "ensured id constraint");
        }
        Ok(())
    }

    async fn first_row(&self, q: Query, key: &NodeKey) -> Result<Option<neo4rs::Row>, StoreError> {
        let mut stream = self
            .graph
            .execute(q)
            .await
            .map_err(|err| classify(err, key))?;
        stream.next().await.map_err(|err| classify(err, key))
    }
}

/// Map a driver error, recognising uniqueness failures.
///
/// The server reports them as `Neo.ClientError.Schema.ConstraintValidationFailed`
/// with a message of the form "... already exists with label `KojiBuild` and
/// property `id` = '55'". The label is taken from the message when present.
fn classify(err: neo4rs::Error, key: &NodeKey) -> StoreError {
    let text = err.to_string();
    if !text.contains("ConstraintValidationFailed") {
        return StoreError::Backend(text);
    }
    let label = text
        .split_once("label `")
        .and_then(|(_, rest)| rest.split_once('`'))
        .and_then(|(name, _)| Label::parse(name))
        .unwrap_or(key.label);
    StoreError::ConstraintViolation {
        label,
        id: key.id.clone(),
    }
}

fn bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::from(i),
            None => BoltType::from(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => BoltType::from(s.clone()),
        other => BoltType::from(other.to_string()),
    }
}

fn label_pattern(labels: &[Label]) -> String {
    labels.iter().map(|l| format!(":{}", l.as_str())).collect()
}

fn graph_node(row: &neo4rs::Row, id: &str) -> GraphNode {
    let labels: BTreeSet<Label> = row
        .get::<Vec<String>>("labels")
        .unwrap_or_default()
        .iter()
        .filter_map(|name| Label::parse(name))
        .collect();
    let mut properties: BTreeMap<String, Value> = match row.get::<Value>("props") {
        Ok(Value::Object(map)) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    };
    properties.remove("id");
    GraphNode {
        id: id.to_string(),
        labels,
        properties,
    }
}

#[async_trait]
impl GraphStore for Neo4jGraph {
    async fn create_or_update(&self, node: &Node) -> Result<Upserted, StoreError> {
        let pattern = label_pattern(node.labels());
        let props = node.properties();
        let assignments: Vec<String> = props
            .keys()
            .map(|name| format!("n.{name} = $p_{name}"))
            .collect();
        let set_clause = if assignments.is_empty() {
            String::new()
        } else {
            format!("SET {}", assignments.join(", "))
        };
        let cypher = format!(
            "OPTIONAL MATCH (existing{pattern} {{id: $id}})
             WITH count(existing) = 0 AS created
             MERGE (n{pattern} {{id: $id}})
             {set_clause}
             RETURN created, labels(n) AS labels, properties(n) AS props"
        );

        let id = node.id();
        let mut q = query(&cypher).param("id", id.as_str());
        for (name, value) in &props {
            q = q.param(&format!("p_{name}"), bolt(value));
        }

        let key = NodeKey::new(node.labels()[0], id.clone());
        let row = self
            .first_row(q, &key)
            .await?
            .ok_or_else(|| StoreError::Backend(format!("upsert of {key} returned no row")))?;
        Ok(Upserted {
            node: graph_node(&row, &id),
            created: row.get::<bool>("created").unwrap_or(false),
        })
    }

    async fn get_or_none(&self, label: Label, id: &str) -> Result<Option<GraphNode>, StoreError> {
        let cypher = format!(
            "MATCH (n:{} {{id: $id}}) RETURN labels(n) AS labels, properties(n) AS props",
            label.as_str()
        );
        let key = NodeKey::new(label, id);
        let row = self.first_row(query(&cypher).param("id", id), &key).await?;
        Ok(row.map(|row| graph_node(&row, id)))
    }

    async fn add_label(&self, key: &NodeKey, label: Label) -> Result<(), StoreError> {
        let cypher = format!(
            "MATCH (n:{} {{id: $id}}) SET n:{} RETURN count(n) AS matched",
            key.label.as_str(),
            label.as_str()
        );
        let target = NodeKey::new(label, key.id.clone());
        match self.first_row(query(&cypher).param("id", key.id.as_str()), &target).await? {
            Some(row) if row.get::<i64>("matched").unwrap_or(0) > 0 => Ok(()),
            _ => Err(StoreError::NotFound(key.clone())),
        }
    }

    async fn remove_label(&self, key: &NodeKey, label: Label) -> Result<(), StoreError> {
        let cypher = format!(
            "MATCH (n:{} {{id: $id}}) REMOVE n:{} RETURN count(n) AS matched",
            key.label.as_str(),
            label.as_str()
        );
        match self.first_row(query(&cypher).param("id", key.id.as_str()), key).await? {
            Some(row) if row.get::<i64>("matched").unwrap_or(0) > 0 => Ok(()),
            _ => Err(StoreError::NotFound(key.clone())),
        }
    }

    async fn connect(
        &self,
        rel: RelKind,
        from: &NodeKey,
        to: &NodeKey,
    ) -> Result<bool, StoreError> {
        for end in [from, to] {
            if self.get_or_none(end.label, &end.id).await?.is_none() {
                return Err(StoreError::NotFound(end.clone()));
            }
        }
        let cypher = format!(
            "MATCH (a:{from_label} {{id: $from}}), (b:{to_label} {{id: $to}})
             OPTIONAL MATCH (a)-[existing:{rel}]->(b)
             WITH a, b, count(existing) = 0 AS created
             MERGE (a)-[:{rel}]->(b)
             RETURN created",
            from_label = from.label.as_str(),
            to_label = to.label.as_str(),
            rel = rel.rel_type(),
        );
        let q = query(&cypher)
            .param("from", from.id.as_str())
            .param("to", to.id.as_str());
        let row = self.first_row(q, to).await?;
        Ok(row.map_or(false, |row| row.get::<bool>("created").unwrap_or(false)))
    }

    async fn disconnect_all(&self, rel: RelKind, from: &NodeKey) -> Result<usize, StoreError> {
        let cypher = format!(
            "MATCH (a:{} {{id: $id}})-[r:{}]->() DELETE r RETURN count(r) AS removed",
            from.label.as_str(),
            rel.rel_type()
        );
        let row = self.first_row(query(&cypher).param("id", from.id.as_str()), from).await?;
        Ok(row.map_or(0, |row| row.get::<i64>("removed").unwrap_or(0).max(0) as usize))
    }

    async fn related(&self, rel: RelKind, from: &NodeKey) -> Result<Vec<NodeKey>, StoreError> {
        let cypher = format!(
            "MATCH (a:{} {{id: $id}})-[:{}]->(b:{}) RETURN b.id AS id ORDER BY id",
            from.label.as_str(),
            rel.rel_type(),
            rel.target().as_str()
        );
        let mut stream = self
            .graph
            .execute(query(&cypher).param("id", from.id.as_str()))
            .await
            .map_err(|err| classify(err, from))?;
        let mut keys = Vec::new();
        while let Some(row) = stream.next().await.map_err(|err| classify(err, from))? {
            if let Ok(id) = row.get::<String>("id") {
                keys.push(NodeKey::new(rel.target(), id));
            }
        }
        Ok(keys)
    }
}
