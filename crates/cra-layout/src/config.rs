//! Fixed physics and drawing constants.

use serde::Serialize;

/// Simulation parameters, applied as a unit whenever the snapshot changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForceConfig {
    /// Many-body strength; negative repels.
    pub charge_strength: f64,
    /// Pairs farther apart than this ignore each other.
    pub charge_distance_max: f64,
    /// Floor on pair distance to keep close pairs bounded.
    pub charge_distance_min: f64,
    /// Rest length of every link.
    pub link_distance: f64,
    /// Fraction of velocity lost per tick.
    pub velocity_decay: f64,
    pub alpha_min: f64,
    pub alpha_decay: f64,
    /// Alpha held while a node is dragged.
    pub drag_alpha_target: f64,
    /// Ticks after a reheat before the simulation stops on its own.
    pub cooldown_ticks: u32,
}

impl Default for ForceConfig {
    fn default() -> Self {
        let alpha_min = 0.001;
        Self {
            charge_strength: -200.0,
            charge_distance_max: 500.0,
            charge_distance_min: 1.0,
            link_distance: 80.0,
            velocity_decay: 0.4,
            alpha_min,
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
            drag_alpha_target: 0.3,
            cooldown_ticks: 200,
        }
    }
}

/// Drawing constants. Lengths are screen pixels unless noted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderStyle {
    /// Node radius in graph units.
    pub node_radius: f64,
    pub hovered_glow: f64,
    pub neighbor_glow: f64,
    pub dimmed_node_opacity: f64,
    pub dimmed_label_opacity: f64,
    pub dimmed_link_opacity: f64,
    pub label_font_px: f64,
    pub hovered_label_font_px: f64,
    /// Gap between a node and its label, in graph units.
    pub label_gap: f64,
    pub link_label_font_px: f64,
    /// Space a link label must leave free on its link.
    pub link_label_margin: f64,
    pub link_width: f64,
    pub highlighted_link_width: f64,
    pub link_color: &'static str,
    pub dimmed_link_color: &'static str,
    /// Pointer distance within which a link counts as hovered.
    pub link_hover_precision: f64,
    /// Vertical gap between a tooltip and its anchor.
    pub tooltip_gap: f64,
    pub empty_message: &'static str,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            node_radius: 6.0,
            hovered_glow: 20.0,
            neighbor_glow: 10.0,
            dimmed_node_opacity: 0.2,
            dimmed_label_opacity: 0.1,
            dimmed_link_opacity: 0.2,
            label_font_px: 10.0,
            hovered_label_font_px: 12.0,
            label_gap: 2.0,
            link_label_font_px: 10.0,
            link_label_margin: 10.0,
            link_width: 1.0,
            highlighted_link_width: 2.0,
            link_color: "#94a3b8",
            dimmed_link_color: "#e2e8f0",
            link_hover_precision: 4.0,
            tooltip_gap: 10.0,
            empty_message: "No Knowledge Graph data available",
        }
    }
}
