//! Snapshot model handed to layout and persisted to the cache.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Entity type given to nodes the backend did not describe.
pub const UNKNOWN_ENTITY: &str = "UNKNOWN";
/// Label for edges carrying neither `relationship` nor `type`.
pub const DEFAULT_RELATION: &str = "relates_to";

pub const PERSON_COLOR: &str = "#3b82f6";
pub const CONTRACT_PARTY_COLOR: &str = "#ef4444";
pub const DEFAULT_NODE_COLOR: &str = "#10b981";

/// Node color keyed on entity type.
pub fn entity_color(entity_type: &str) -> &'static str {
    if entity_type.eq_ignore_ascii_case("PERSON") {
        PERSON_COLOR
    } else if entity_type.eq_ignore_ascii_case("CONTRACTPARTY") {
        CONTRACT_PARTY_COLOR
    } else {
        DEFAULT_NODE_COLOR
    }
}

/// A node in a materialized knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(default = "unknown_entity")]
    pub entity_type: String,
    pub color: String,
    /// Tooltip text: the informative properties as `key: value` lines.
    #[serde(rename = "desc")]
    pub description: String,
    /// Remaining backend properties.
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

fn unknown_entity() -> String {
    UNKNOWN_ENTITY.into()
}

/// A link between two nodes of the same snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    pub label: String,
    #[serde(rename = "desc")]
    pub description: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl GraphLink {
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// One complete node/link view of a contract's knowledge graph.
///
/// Snapshots are replaced wholesale, never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl GraphSnapshot {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Check the snapshot invariants: unique node ids, every link endpoint present.
    pub fn validate(&self) -> cra_core::Result<()> {
        let mut ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(cra_core::Error::Transform(format!(
                    "duplicate node id {}",
                    node.id
                )));
            }
        }
        for link in &self.links {
            for endpoint in [&link.source, &link.target] {
                if !ids.contains(endpoint.as_str()) {
                    return Err(cra_core::Error::Transform(format!(
                        "link endpoint {} has no node",
                        endpoint
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Render a property value the way it reads in a tooltip.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// `key: value` lines for every property not in `skip`.
pub(crate) fn describe<'a>(props: impl IntoIterator<Item = (&'a String, &'a Value)>, skip: &[&str]) -> String {
    props
        .into_iter()
        .filter(|(k, _)| !skip.contains(&k.as_str()))
        .map(|(k, v)| format!("{}: {}", k, display_value(v)))
        .collect::<Vec<_>>()
        .join("\n")
}
