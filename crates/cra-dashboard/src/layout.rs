//! Offline materialize-and-layout of a graph payload file.

use std::path::Path;

use cra_graph::{materialize, GraphLink, GraphNode};
use cra_layout::{ForceConfig, Simulation};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct PlacedNode {
    #[serde(flatten)]
    pub node: GraphNode,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Serialize)]
pub struct LaidOutGraph {
    pub nodes: Vec<PlacedNode>,
    pub links: Vec<GraphLink>,
    pub ticks: u32,
}

/// Materialize `payload` and run the simulation for at most `max_ticks`.
/// `None` when the payload is not a usable graph.
pub fn lay_out(payload: &serde_json::Value, max_ticks: u32) -> Option<LaidOutGraph> {
    let snapshot = materialize(payload)?;
    let mut simulation = Simulation::new(ForceConfig::default());
    simulation.set_snapshot(&snapshot);
    let ticks = simulation.run(max_ticks);

    let nodes = snapshot
        .nodes
        .into_iter()
        .map(|node| {
            let (x, y) = simulation.position(&node.id).unwrap_or((0.0, 0.0));
            PlacedNode { node, x, y }
        })
        .collect();
    Some(LaidOutGraph {
        nodes,
        links: snapshot.links,
        ticks,
    })
}

pub fn lay_out_file(path: &Path, max_ticks: u32) -> anyhow::Result<LaidOutGraph> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let payload: serde_json::Value = serde_json::from_str(&raw)?;
    let graph = lay_out(&payload, max_ticks)
        .ok_or_else(|| anyhow::anyhow!("{} is not a usable knowledge graph payload", path.display()))?;
    info!(
        "Laid out {} nodes and {} links in {} ticks",
        graph.nodes.len(),
        graph.links.len(),
        graph.ticks
    );
    Ok(graph)
}
