//! Per-frame drawing model.
//!
//! `Scene::build` resolves every node and link to screen space and applies
//! the hover dimming rules; a painter only has to walk the sprites.

use std::f64::consts::FRAC_PI_2;
use std::f64::consts::PI;

use cra_graph::GraphSnapshot;
use serde::Serialize;

use crate::config::RenderStyle;
use crate::interaction::{HighlightState, Tooltip};
use crate::simulation::Simulation;
use crate::viewport::Viewport;

/// Text width in pixels at a given font size.
pub trait TextMeasure {
    fn width(&self, text: &str, font_px: f64) -> f64;
}

/// Fixed advance per character: 0.6em for narrow glyphs, 1em for wide ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTextMeasure;

impl TextMeasure for ApproxTextMeasure {
    fn width(&self, text: &str, font_px: f64) -> f64 {
        text.chars()
            .map(|c| if c.is_ascii() { 0.6 } else { 1.0 })
            .sum::<f64>()
            * font_px
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeLabel {
    pub text: String,
    pub x: f64,
    /// Top of the text box.
    pub y: f64,
    pub font_px: f64,
    pub bold: bool,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSprite {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub color: String,
    pub opacity: f64,
    /// Shadow blur in pixels; zero when not highlighted.
    pub glow: f64,
    pub label: Option<NodeLabel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkLabel {
    pub text: String,
    pub x: f64,
    pub y: f64,
    /// Rotation in radians, always within [-π/2, π/2].
    pub angle: f64,
    pub font_px: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkSprite {
    pub index: usize,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub color: String,
    pub width: f64,
    pub opacity: f64,
    pub label: Option<LinkLabel>,
}

impl LinkSprite {
    pub fn screen_length(&self) -> f64 {
        ((self.x2 - self.x1).powi(2) + (self.y2 - self.y1).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    /// Links first so nodes paint over them.
    pub links: Vec<LinkSprite>,
    pub nodes: Vec<NodeSprite>,
    pub tooltip: Tooltip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Frame {
    Placeholder { message: String },
    Scene(Scene),
}

impl Frame {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Frame::Placeholder { .. })
    }

    pub fn scene(&self) -> Option<&Scene> {
        match self {
            Frame::Scene(scene) => Some(scene),
            Frame::Placeholder { .. } => None,
        }
    }
}

/// Rotate text along a link, flipped so it never reads upside down.
pub fn upright_angle(dx: f64, dy: f64) -> f64 {
    let angle = dy.atan2(dx);
    if angle > FRAC_PI_2 {
        angle - PI
    } else if angle < -FRAC_PI_2 {
        angle + PI
    } else {
        angle
    }
}

pub struct SceneInput<'a> {
    pub snapshot: &'a GraphSnapshot,
    pub simulation: &'a Simulation,
    pub viewport: &'a Viewport,
    pub highlight: &'a HighlightState,
    pub tooltip: &'a Tooltip,
    pub style: &'a RenderStyle,
}

impl Scene {
    pub fn build(input: SceneInput<'_>, measure: &dyn TextMeasure) -> Self {
        let SceneInput {
            snapshot,
            simulation,
            viewport,
            highlight,
            tooltip,
            style,
        } = input;

        let links = snapshot
            .links
            .iter()
            .enumerate()
            .filter_map(|(index, link)| {
                let (sx, sy) = simulation.position(&link.source)?;
                let (tx, ty) = simulation.position(&link.target)?;
                let (x1, y1) = viewport.to_screen(sx, sy);
                let (x2, y2) = viewport.to_screen(tx, ty);
                let dimmed = highlight.is_link_dimmed(index);
                let emphasized = highlight.is_active() && highlight.is_link_highlighted(index);

                let mut sprite = LinkSprite {
                    index,
                    x1,
                    y1,
                    x2,
                    y2,
                    color: if dimmed {
                        style.dimmed_link_color
                    } else {
                        style.link_color
                    }
                    .to_string(),
                    width: if emphasized {
                        style.highlighted_link_width
                    } else {
                        style.link_width
                    },
                    opacity: if dimmed { style.dimmed_link_opacity } else { 1.0 },
                    label: None,
                };

                let text_width = measure.width(&link.label, style.link_label_font_px);
                if !dimmed
                    && !link.label.is_empty()
                    && text_width < sprite.screen_length() - style.link_label_margin
                {
                    sprite.label = Some(LinkLabel {
                        text: link.label.clone(),
                        x: x1 + (x2 - x1) / 2.0,
                        y: y1 + (y2 - y1) / 2.0,
                        angle: upright_angle(x2 - x1, y2 - y1),
                        font_px: style.link_label_font_px,
                    });
                }
                Some(sprite)
            })
            .collect();

        let nodes = snapshot
            .nodes
            .iter()
            .filter_map(|node| {
                let (gx, gy) = simulation.position(&node.id)?;
                let (x, y) = viewport.to_screen(gx, gy);
                let hovered = highlight.is_hovered(&node.id);
                let neighbor = !hovered && highlight.is_active() && highlight.is_node_highlighted(&node.id);
                let dimmed = highlight.is_node_dimmed(&node.id);

                let glow = if hovered {
                    style.hovered_glow
                } else if neighbor {
                    style.neighbor_glow
                } else {
                    0.0
                };
                let label = (!node.label.is_empty()).then(|| {
                    let (lx, ly) = viewport.to_screen(gx, gy + style.node_radius + style.label_gap);
                    NodeLabel {
                        text: node.label.clone(),
                        x: lx,
                        y: ly,
                        font_px: if hovered {
                            style.hovered_label_font_px
                        } else {
                            style.label_font_px
                        },
                        bold: hovered,
                        opacity: if dimmed { style.dimmed_label_opacity } else { 1.0 },
                    }
                });

                Some(NodeSprite {
                    id: node.id.clone(),
                    x,
                    y,
                    radius: style.node_radius * viewport.k,
                    color: node.color.clone(),
                    opacity: if dimmed { style.dimmed_node_opacity } else { 1.0 },
                    glow,
                    label,
                })
            })
            .collect();

        Scene {
            links,
            nodes,
            tooltip: tooltip.clone(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&NodeSprite> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
