//! Graph materializer: backend edge/node lists → `GraphSnapshot`.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::payload::{GraphSource, RawGraphPayload};
use crate::types::{
    describe, display_value, entity_color, GraphLink, GraphNode, GraphSnapshot, DEFAULT_RELATION,
    UNKNOWN_ENTITY,
};

/// Keys that are structural or presentational and never shown in a node tooltip.
const NODE_DESCRIPTION_SKIP: &[&str] = &["color", "id", "label"];
/// Keys owned by the snapshot model rather than the property bag.
const NODE_RESERVED: &[&str] = &["id", "label", "entity_type", "color", "desc"];
const LINK_RESERVED: &[&str] = &["source", "target", "label", "desc"];

/// Materialize a raw backend payload. Returns `None` when the payload is unusable.
pub fn materialize(value: &Value) -> Option<GraphSnapshot> {
    match RawGraphPayload::from_value(value).map(|payload| build_snapshot(&payload)) {
        Ok(snapshot) => {
            debug!(
                "Materialized graph: {} nodes, {} links",
                snapshot.nodes.len(),
                snapshot.links.len()
            );
            Some(snapshot)
        }
        Err(e) => {
            error!("Error transforming knowledge graph data: {}", e);
            None
        }
    }
}

/// Materialize graph data found on a content response.
pub fn materialize_source(source: GraphSource) -> Option<GraphSnapshot> {
    match source.into_value() {
        Ok(value) => materialize(&value),
        Err(e) => {
            error!("Failed to parse stored knowledge graph data: {}", e);
            None
        }
    }
}

/// Insertion-ordered node table keyed by id.
#[derive(Default)]
struct NodeTable {
    order: Vec<String>,
    props: HashMap<String, Map<String, Value>>,
}

impl NodeTable {
    fn set(&mut self, id: &str, props: Map<String, Value>) {
        if self.props.insert(id.to_string(), props).is_none() {
            self.order.push(id.to_string());
        }
    }

    fn ensure(&mut self, id: &str) {
        if !self.props.contains_key(id) {
            let mut props = Map::new();
            props.insert("entity_type".into(), Value::String(UNKNOWN_ENTITY.into()));
            self.set(id, props);
        }
    }
}

fn non_empty_str<'a>(props: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    props.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn strip(props: &Map<String, Value>, reserved: &[&str]) -> Map<String, Value> {
    props
        .iter()
        .filter(|(k, _)| !reserved.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn build_node(id: &str, props: &Map<String, Value>) -> GraphNode {
    let label = non_empty_str(props, "label").unwrap_or(id).to_string();
    let entity_type = match props.get("entity_type") {
        Some(Value::Null) | None => UNKNOWN_ENTITY.to_string(),
        Some(v) => display_value(v),
    };
    let description = describe(props, NODE_DESCRIPTION_SKIP);

    GraphNode {
        id: id.to_string(),
        color: entity_color(&entity_type).to_string(),
        description: if description.is_empty() {
            label.clone()
        } else {
            description
        },
        label,
        entity_type,
        properties: strip(props, NODE_RESERVED),
    }
}

fn build_link(source: &str, target: &str, props: &Map<String, Value>) -> GraphLink {
    let label = non_empty_str(props, "relationship")
        .or_else(|| non_empty_str(props, "type"))
        .unwrap_or(DEFAULT_RELATION)
        .to_string();
    let description = describe(props, &[]);

    GraphLink {
        source: source.to_string(),
        target: target.to_string(),
        description: if description.is_empty() {
            label.clone()
        } else {
            description
        },
        label,
        properties: strip(props, LINK_RESERVED),
    }
}

fn build_snapshot(payload: &RawGraphPayload) -> GraphSnapshot {
    let mut table = NodeTable::default();

    for node in payload.nodes.iter().flatten() {
        table.set(&node.id, node.properties.clone());
    }

    let links = payload
        .edges
        .iter()
        .map(|edge| {
            table.ensure(&edge.source);
            table.ensure(&edge.target);
            build_link(&edge.source, &edge.target, &edge.properties)
        })
        .collect();

    let nodes = table
        .order
        .iter()
        .map(|id| build_node(id, &table.props[id]))
        .collect();

    GraphSnapshot { nodes, links }
}
