//! Hover state: what is under the pointer, what it lights up, and the tooltip.

use std::collections::BTreeSet;

use cra_graph::{GraphIndex, GraphLink, GraphNode};
use serde::Serialize;

pub const LINK_CATEGORY: &str = "RELATIONSHIP";
pub const EMPTY_TOOLTIP_BODY: &str = "No details available";

/// The element currently under the pointer. Links are addressed by their
/// position in the snapshot's link list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum HoverTarget {
    #[default]
    None,
    Node(String),
    Link(usize),
}

impl HoverTarget {
    pub fn is_none(&self) -> bool {
        matches!(self, HoverTarget::None)
    }
}

/// Nodes and links emphasized by the hovered node. Rebuilt from scratch on
/// every hover change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightState {
    pub hovered_node_id: Option<String>,
    pub highlighted_node_ids: BTreeSet<String>,
    pub highlighted_link_ids: BTreeSet<usize>,
}

impl HighlightState {
    /// Highlight `node_id`, its neighbors, and every link touching it.
    pub fn for_node(node_id: &str, index: &GraphIndex) -> Self {
        let mut highlighted_node_ids = index.neighbors(node_id);
        highlighted_node_ids.insert(node_id.to_string());
        Self {
            hovered_node_id: Some(node_id.to_string()),
            highlighted_node_ids,
            highlighted_link_ids: index.incident_links(node_id),
        }
    }

    pub fn is_active(&self) -> bool {
        self.hovered_node_id.is_some()
    }

    pub fn is_hovered(&self, node_id: &str) -> bool {
        self.hovered_node_id.as_deref() == Some(node_id)
    }

    pub fn is_node_highlighted(&self, node_id: &str) -> bool {
        self.highlighted_node_ids.contains(node_id)
    }

    pub fn is_link_highlighted(&self, link_id: usize) -> bool {
        self.highlighted_link_ids.contains(&link_id)
    }

    /// Drawn at reduced opacity: a hover is active and the node is outside it.
    pub fn is_node_dimmed(&self, node_id: &str) -> bool {
        self.is_active() && !self.is_node_highlighted(node_id)
    }

    pub fn is_link_dimmed(&self, link_id: usize) -> bool {
        self.is_active() && !self.is_link_highlighted(link_id)
    }
}

/// Floating detail box anchored in screen space.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tooltip {
    pub visible: bool,
    pub anchor_x: f64,
    pub anchor_y: f64,
    pub title: String,
    pub category: Option<String>,
    pub body: String,
}

fn body_text(description: &str) -> String {
    if description.is_empty() {
        EMPTY_TOOLTIP_BODY.to_string()
    } else {
        description.to_string()
    }
}

impl Tooltip {
    pub fn hidden() -> Self {
        Self::default()
    }

    /// Tooltip for a node whose screen projection is (`sx`, `sy`).
    pub fn for_node(node: &GraphNode, sx: f64, sy: f64) -> Self {
        Self {
            visible: true,
            anchor_x: sx,
            anchor_y: sy,
            title: node.label.clone(),
            category: Some(node.entity_type.clone()).filter(|c| !c.is_empty()),
            body: body_text(&node.description),
        }
    }

    /// Tooltip for a link, anchored at the midpoint of its screen endpoints.
    pub fn for_link(link: &GraphLink, start: (f64, f64), end: (f64, f64)) -> Self {
        Self {
            visible: true,
            anchor_x: start.0 + (end.0 - start.0) / 2.0,
            anchor_y: start.1 + (end.1 - start.1) / 2.0,
            title: link.label.clone(),
            category: Some(LINK_CATEGORY.to_string()),
            body: body_text(&link.description),
        }
    }

    /// Top-left corner for a box of `width`x`height`: centered above the anchor.
    pub fn placement(&self, width: f64, height: f64, gap: f64) -> (f64, f64) {
        (self.anchor_x - width / 2.0, self.anchor_y - height - gap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cra_graph::materialize;
    use serde_json::json;

    fn star() -> cra_graph::GraphSnapshot {
        materialize(&json!({
            "nodes": [["A", {"entity_type": "PERSON"}]],
            "edges": [["A", "B", {"relationship": "signs"}], ["C", "A", {}], ["B", "C", {}], ["D", "E", {}]],
        }))
        .unwrap()
    }

    #[test]
    fn test_highlight_covers_node_and_incident_links() {
        let snapshot = star();
        let index = GraphIndex::build(&snapshot);
        let state = HighlightState::for_node("A", &index);

        assert!(state.is_hovered("A"));
        assert_eq!(
            state.highlighted_node_ids,
            BTreeSet::from(["A".to_string(), "B".to_string(), "C".to_string()])
        );
        let expected: BTreeSet<usize> = snapshot
            .links
            .iter()
            .enumerate()
            .filter(|(_, l)| l.touches("A"))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(state.highlighted_link_ids, expected);
        assert!(state.is_node_dimmed("D"));
        assert!(state.is_link_dimmed(2));
        assert!(!state.is_link_dimmed(0));
    }

    #[test]
    fn test_isolated_node_highlights_itself() {
        let snapshot = materialize(&json!({"nodes": [["Solo", {}]], "edges": []})).unwrap();
        let state = HighlightState::for_node("Solo", &GraphIndex::build(&snapshot));
        assert_eq!(state.highlighted_node_ids, BTreeSet::from(["Solo".to_string()]));
        assert!(state.highlighted_link_ids.is_empty());
    }

    #[test]
    fn test_inactive_highlight_dims_nothing() {
        let state = HighlightState::default();
        assert!(!state.is_active());
        assert!(!state.is_node_dimmed("A"));
        assert!(!state.is_link_dimmed(0));
    }

    #[test]
    fn test_tooltips() {
        let snapshot = star();
        let node = Tooltip::for_node(snapshot.node("A").unwrap(), 100.0, 50.0);
        assert!(node.visible);
        assert_eq!(node.title, "A");
        assert_eq!(node.category.as_deref(), Some("PERSON"));
        assert_eq!(node.body, "entity_type: PERSON");
        assert_eq!(node.placement(80.0, 30.0, 10.0), (60.0, 10.0));

        let link = Tooltip::for_link(&snapshot.links[0], (0.0, 0.0), (10.0, 20.0));
        assert_eq!((link.anchor_x, link.anchor_y), (5.0, 10.0));
        assert_eq!(link.title, "signs");
        assert_eq!(link.category.as_deref(), Some(LINK_CATEGORY));

        let mut bare = snapshot.links[1].clone();
        bare.description.clear();
        assert_eq!(Tooltip::for_link(&bare, (0.0, 0.0), (0.0, 0.0)).body, EMPTY_TOOLTIP_BODY);
        assert!(!Tooltip::hidden().visible);
    }
}
