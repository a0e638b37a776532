//! CRA Layout — positions a `GraphSnapshot` with a force simulation and turns
//! pointer input into highlight, tooltip and per-frame drawing state.
//!
//! Nothing here touches a real canvas: a frame is a plain value that a
//! rendering surface can paint, which keeps the physics and the hover logic
//! replayable in tests.

pub mod config;
pub mod engine;
pub mod interaction;
pub mod render;
pub mod simulation;
pub mod viewport;

pub use config::{ForceConfig, RenderStyle};
pub use engine::GraphEngine;
pub use interaction::{HighlightState, HoverTarget, Tooltip};
pub use render::{ApproxTextMeasure, Frame, LinkSprite, NodeSprite, Scene, TextMeasure};
pub use simulation::Simulation;
pub use viewport::Viewport;
