//! Layout and interaction engine for one graph view.
//!
//! The engine owns everything that changes between frames: simulated
//! positions, the viewport, the hover target with its derived highlight and
//! tooltip, and an in-progress drag. Snapshots come in as shared immutable
//! values and are only ever swapped whole.

use std::sync::Arc;

use cra_graph::{GraphIndex, GraphSnapshot};
use tracing::debug;

use crate::config::{ForceConfig, RenderStyle};
use crate::interaction::{HighlightState, HoverTarget, Tooltip};
use crate::render::{Frame, Scene, SceneInput, TextMeasure};
use crate::simulation::Simulation;
use crate::viewport::Viewport;

pub struct GraphEngine {
    snapshot: Option<Arc<GraphSnapshot>>,
    index: GraphIndex,
    simulation: Simulation,
    viewport: Viewport,
    style: RenderStyle,
    hover: HoverTarget,
    highlight: HighlightState,
    tooltip: Tooltip,
    dragging: Option<String>,
}

/// Squared distance from `p` to the segment `a`-`b`.
fn segment_distance2(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    (p.0 - cx).powi(2) + (p.1 - cy).powi(2)
}

impl GraphEngine {
    pub fn new(width: f64, height: f64) -> Self {
        Self::with_config(ForceConfig::default(), RenderStyle::default(), Viewport::new(width, height))
    }

    pub fn with_config(config: ForceConfig, style: RenderStyle, viewport: Viewport) -> Self {
        Self {
            snapshot: None,
            index: GraphIndex::new(),
            simulation: Simulation::new(config),
            viewport,
            style,
            hover: HoverTarget::None,
            highlight: HighlightState::default(),
            tooltip: Tooltip::hidden(),
            dragging: None,
        }
    }

    /// Swap in a new snapshot (or none) and reheat the layout.
    pub fn set_snapshot(&mut self, snapshot: Option<Arc<GraphSnapshot>>) {
        match &snapshot {
            Some(s) => {
                self.index = GraphIndex::build(s);
                self.simulation.set_snapshot(s);
                debug!("Engine loaded snapshot: {:?}", self.index.stats());
            }
            None => {
                self.index = GraphIndex::new();
                self.simulation.set_snapshot(&GraphSnapshot::default());
            }
        }
        self.snapshot = snapshot;

        if let Some(id) = &self.dragging {
            if !self.index.contains(id) {
                self.dragging = None;
                self.simulation.set_alpha_target(0.0);
            }
        }

        // Link positions are not stable across snapshots; a node hover is.
        match std::mem::take(&mut self.hover) {
            HoverTarget::Node(id) => self.hover_node(Some(&id)),
            _ => self.clear_hover(),
        }
    }

    pub fn snapshot(&self) -> Option<&Arc<GraphSnapshot>> {
        self.snapshot.as_ref()
    }

    /// Advance the simulation one step; false once it has cooled down.
    pub fn tick(&mut self) -> bool {
        self.simulation.tick()
    }

    pub fn is_animating(&self) -> bool {
        self.simulation.is_active()
    }

    pub fn hover_node(&mut self, id: Option<&str>) {
        let node = id.and_then(|id| self.snapshot.as_ref()?.node(id).cloned());
        let Some(node) = node else {
            self.clear_hover();
            return;
        };
        let Some((gx, gy)) = self.simulation.position(&node.id) else {
            self.clear_hover();
            return;
        };
        let (sx, sy) = self.viewport.to_screen(gx, gy);
        self.highlight = HighlightState::for_node(&node.id, &self.index);
        self.tooltip = Tooltip::for_node(&node, sx, sy);
        self.hover = HoverTarget::Node(node.id);
    }

    /// Hover a link by position. Requires both endpoints to have positions.
    pub fn hover_link(&mut self, link_id: Option<usize>) {
        let Some(link) = link_id.and_then(|i| self.snapshot.as_ref()?.links.get(i).cloned()) else {
            self.clear_hover();
            return;
        };
        let endpoints = self
            .simulation
            .position(&link.source)
            .zip(self.simulation.position(&link.target));
        let (Some(index), Some(((sx, sy), (tx, ty)))) = (link_id, endpoints) else {
            self.clear_hover();
            return;
        };
        let start = self.viewport.to_screen(sx, sy);
        let end = self.viewport.to_screen(tx, ty);
        self.highlight = HighlightState::default();
        self.tooltip = Tooltip::for_link(&link, start, end);
        self.hover = HoverTarget::Link(index);
    }

    pub fn clear_hover(&mut self) {
        self.hover = HoverTarget::None;
        self.highlight = HighlightState::default();
        self.tooltip = Tooltip::hidden();
    }

    /// Topmost node whose disc contains the screen point.
    pub fn node_at(&self, sx: f64, sy: f64) -> Option<String> {
        let snapshot = self.snapshot.as_ref()?;
        let (gx, gy) = self.viewport.to_graph(sx, sy);
        let r2 = self.style.node_radius.powi(2);
        snapshot
            .nodes
            .iter()
            .rev()
            .find(|node| {
                self.simulation
                    .position(&node.id)
                    .map(|(x, y)| (x - gx).powi(2) + (y - gy).powi(2) <= r2)
                    .unwrap_or(false)
            })
            .map(|node| node.id.clone())
    }

    /// Closest link within the hover precision of the screen point.
    pub fn link_at(&self, sx: f64, sy: f64) -> Option<usize> {
        let snapshot = self.snapshot.as_ref()?;
        let limit = self.style.link_hover_precision.powi(2);
        snapshot
            .links
            .iter()
            .enumerate()
            .filter_map(|(i, link)| {
                let (ax, ay) = self.simulation.position(&link.source)?;
                let (bx, by) = self.simulation.position(&link.target)?;
                let d = segment_distance2(
                    (sx, sy),
                    self.viewport.to_screen(ax, ay),
                    self.viewport.to_screen(bx, by),
                );
                (d <= limit).then_some((i, d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Resolve a pointer position to a hover target: nodes win over links.
    pub fn pointer_move(&mut self, sx: f64, sy: f64) -> &HoverTarget {
        if let Some(id) = self.node_at(sx, sy) {
            self.hover_node(Some(&id));
        } else if let Some(link) = self.link_at(sx, sy) {
            self.hover_link(Some(link));
        } else {
            self.clear_hover();
        }
        &self.hover
    }

    pub fn pointer_leave(&mut self) {
        self.clear_hover();
    }

    /// Grab the node under the pointer. Keeps the simulation warm while held.
    pub fn drag_start(&mut self, sx: f64, sy: f64) -> Option<String> {
        let id = self.node_at(sx, sy)?;
        let (gx, gy) = self.viewport.to_graph(sx, sy);
        self.simulation.pin(&id, gx, gy);
        self.simulation
            .set_alpha_target(self.simulation.config().drag_alpha_target);
        self.dragging = Some(id.clone());
        Some(id)
    }

    pub fn drag_move(&mut self, sx: f64, sy: f64) {
        if let Some(id) = &self.dragging {
            let (gx, gy) = self.viewport.to_graph(sx, sy);
            self.simulation.pin(id, gx, gy);
            self.simulation.reset_countdown();
        }
    }

    /// Release the dragged node; it stays pinned where it was dropped.
    pub fn drag_end(&mut self) -> Option<String> {
        let id = self.dragging.take()?;
        self.simulation.set_alpha_target(0.0);
        Some(id)
    }

    pub fn unpin(&mut self, id: &str) -> bool {
        let released = self.simulation.unpin(id);
        if released {
            self.simulation.reheat();
        }
        released
    }

    pub fn render(&self, measure: &dyn TextMeasure) -> Frame {
        match &self.snapshot {
            Some(snapshot) if !snapshot.is_empty() => Frame::Scene(Scene::build(
                SceneInput {
                    snapshot,
                    simulation: &self.simulation,
                    viewport: &self.viewport,
                    highlight: &self.highlight,
                    tooltip: &self.tooltip,
                    style: &self.style,
                },
                measure,
            )),
            _ => Frame::Placeholder {
                message: self.style.empty_message.to_string(),
            },
        }
    }

    pub fn hover(&self) -> &HoverTarget {
        &self.hover
    }

    pub fn highlight(&self) -> &HighlightState {
        &self.highlight
    }

    pub fn tooltip(&self) -> &Tooltip {
        &self.tooltip
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn style(&self) -> &RenderStyle {
        &self.style
    }
}
