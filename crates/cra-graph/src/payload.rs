//! Boundary decoding of backend graph data.
//!
//! The content endpoint may carry the graph under several field names, either
//! JSON-encoded or already parsed. Everything is normalised here into one
//! `RawGraphPayload` so the materializer never looks at shapes again.

use cra_core::{Error, Result};
use serde_json::{Map, Value};

/// Field names the content endpoint uses for graph data, in probe order.
pub const GRAPH_FIELD_ALIASES: &[&str] = &["knowledgeGraph", "knowledge_graph", "knowledge_graph_json"];

/// Graph data as found on a content response.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphSource {
    Encoded(String),
    Parsed(Value),
}

impl GraphSource {
    /// Return the first alias holding usable data; null and empty strings are skipped.
    pub fn probe(fields: &Map<String, Value>) -> Option<Self> {
        GRAPH_FIELD_ALIASES
            .iter()
            .filter_map(|key| fields.get(*key))
            .find_map(|value| match value {
                Value::Null => None,
                Value::String(s) if s.trim().is_empty() => None,
                Value::String(s) => Some(Self::Encoded(s.clone())),
                other => Some(Self::Parsed(other.clone())),
            })
    }

    pub fn into_value(self) -> Result<Value> {
        match self {
            Self::Encoded(text) => Ok(serde_json::from_str(&text)?),
            Self::Parsed(value) => Ok(value),
        }
    }
}

/// An id as sent by the backend; numbers are accepted and stringified.
fn node_key(value: Option<&Value>, what: &str) -> Result<String> {
    match value {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        other => Err(Error::Transform(format!("{} id is not a string: {:?}", what, other))),
    }
}

fn property_bag(value: Option<&Value>, what: &str) -> Result<Map<String, Value>> {
    match value {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(Error::Transform(format!(
            "{} properties are not an object: {}",
            what, other
        ))),
    }
}

fn as_items<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| Error::Transform(format!("{} entry is not an array", what)))
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    pub id: String,
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawEdge {
    pub source: String,
    pub target: String,
    pub properties: Map<String, Value>,
}

/// `{ nodes?: [[id, props], ...], edges: [[source, target, props], ...] }`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGraphPayload {
    pub nodes: Option<Vec<RawNode>>,
    pub edges: Vec<RawEdge>,
}

impl RawGraphPayload {
    pub fn from_value(value: &Value) -> Result<Self> {
        let root = value
            .as_object()
            .ok_or_else(|| Error::Transform("graph payload is not an object".into()))?;

        let nodes = match root.get("nodes") {
            None | Some(Value::Null) => None,
            Some(list) => Some(
                as_items(list, "nodes")?
                    .iter()
                    .map(|item| {
                        let tuple = as_items(item, "node")?;
                        Ok(RawNode {
                            id: node_key(tuple.first(), "node")?,
                            properties: property_bag(tuple.get(1), "node")?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
        };

        let edges = match root.get("edges") {
            None | Some(Value::Null) => Vec::new(),
            Some(list) => as_items(list, "edges")?
                .iter()
                .map(|item| {
                    let tuple = as_items(item, "edge")?;
                    Ok(RawEdge {
                        source: node_key(tuple.first(), "edge source")?,
                        target: node_key(tuple.get(1), "edge target")?,
                        properties: property_bag(tuple.get(2), "edge")?,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        };

        Ok(Self { nodes, edges })
    }
}
