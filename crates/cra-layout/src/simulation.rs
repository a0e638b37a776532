//! Force simulation with link, many-body and centering forces, integrated
//! d3-style: forces adjust velocities, velocities decay, positions advance.
//!
//! Replacing the snapshot reheats the simulation from the current positions:
//! nodes that survive keep their position, velocity and pin; new nodes are
//! seeded on a phyllotaxis spiral. The random source used to break exact
//! overlaps is a fixed-seed `StdRng`, so a run is fully deterministic.

use std::collections::HashMap;
use std::f64::consts::PI;

use cra_graph::GraphSnapshot;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

use crate::config::ForceConfig;

const INITIAL_RADIUS: f64 = 10.0;
const JIGGLE_SEED: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeState {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    /// Pinned position; a pinned node ignores forces.
    pub fx: Option<f64>,
    pub fy: Option<f64>,
}

impl NodeState {
    pub fn is_pinned(&self) -> bool {
        self.fx.is_some() || self.fy.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
struct LinkState {
    source: usize,
    target: usize,
    strength: f64,
    bias: f64,
}

/// Tiny random offset that breaks exact overlaps.
fn jiggle(rng: &mut StdRng) -> f64 {
    (rng.random::<f64>() - 0.5) * 1e-6
}

pub struct Simulation {
    config: ForceConfig,
    nodes: Vec<NodeState>,
    by_id: HashMap<String, usize>,
    links: Vec<LinkState>,
    alpha: f64,
    alpha_target: f64,
    ticks: u32,
    rng: StdRng,
}

fn phyllotaxis(i: usize) -> (f64, f64) {
    let angle = PI * (3.0 - 5f64.sqrt());
    let radius = INITIAL_RADIUS * (0.5 + i as f64).sqrt();
    let a = i as f64 * angle;
    (radius * a.cos(), radius * a.sin())
}

impl Simulation {
    pub fn new(config: ForceConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            by_id: HashMap::new(),
            links: Vec::new(),
            alpha: 0.0,
            alpha_target: 0.0,
            ticks: 0,
            rng: StdRng::seed_from_u64(JIGGLE_SEED),
        }
    }

    pub fn config(&self) -> &ForceConfig {
        &self.config
    }

    /// Load a new snapshot and reheat, keeping state for surviving nodes.
    pub fn set_snapshot(&mut self, snapshot: &GraphSnapshot) {
        let mut previous: HashMap<String, NodeState> = self
            .nodes
            .drain(..)
            .map(|n| (n.id.clone(), n))
            .collect();
        let kept = snapshot
            .nodes
            .iter()
            .filter(|n| previous.contains_key(&n.id))
            .count();

        self.nodes = snapshot
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                previous.remove(&node.id).unwrap_or_else(|| {
                    let (x, y) = phyllotaxis(i);
                    NodeState {
                        id: node.id.clone(),
                        x,
                        y,
                        vx: 0.0,
                        vy: 0.0,
                        fx: None,
                        fy: None,
                    }
                })
            })
            .collect();
        self.by_id = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();

        let endpoints: Vec<(usize, usize)> = snapshot
            .links
            .iter()
            .filter_map(|l| Some((*self.by_id.get(&l.source)?, *self.by_id.get(&l.target)?)))
            .collect();
        let mut count = vec![0usize; self.nodes.len()];
        for &(s, t) in &endpoints {
            count[s] += 1;
            count[t] += 1;
        }
        self.links = endpoints
            .into_iter()
            .map(|(source, target)| LinkState {
                source,
                target,
                strength: 1.0 / count[source].min(count[target]) as f64,
                bias: count[source] as f64 / (count[source] + count[target]) as f64,
            })
            .collect();

        debug!(
            "Simulation loaded {} nodes ({} kept), {} links",
            self.nodes.len(),
            kept,
            self.links.len()
        );
        self.reheat();
    }

    /// Restart from current positions.
    pub fn reheat(&mut self) {
        self.alpha = 1.0;
        self.ticks = 0;
    }

    pub fn set_alpha_target(&mut self, target: f64) {
        self.alpha_target = target;
        if target > 0.0 {
            self.reset_countdown();
        }
    }

    /// Restart the cooldown without touching alpha.
    pub fn reset_countdown(&mut self) {
        self.ticks = 0;
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Whether another tick would still move anything.
    pub fn is_active(&self) -> bool {
        !self.nodes.is_empty()
            && self.ticks < self.config.cooldown_ticks
            && (self.alpha >= self.config.alpha_min || self.alpha_target >= self.config.alpha_min)
    }

    /// Advance one step. Returns false once the simulation has cooled down.
    pub fn tick(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;
        self.ticks += 1;

        self.apply_link_force();
        self.apply_charge_force();
        self.apply_center_force();

        let keep = 1.0 - self.config.velocity_decay;
        for node in &mut self.nodes {
            match node.fx {
                Some(fx) => {
                    node.x = fx;
                    node.vx = 0.0;
                }
                None => {
                    node.vx *= keep;
                    node.x += node.vx;
                }
            }
            match node.fy {
                Some(fy) => {
                    node.y = fy;
                    node.vy = 0.0;
                }
                None => {
                    node.vy *= keep;
                    node.y += node.vy;
                }
            }
        }
        true
    }

    /// Tick until cooled down or `max_ticks` is reached; returns ticks run.
    pub fn run(&mut self, max_ticks: u32) -> u32 {
        let mut n = 0;
        while n < max_ticks && self.tick() {
            n += 1;
        }
        n
    }

    fn apply_link_force(&mut self) {
        let distance = self.config.link_distance;
        for i in 0..self.links.len() {
            let link = self.links[i];
            let (s, t) = (&self.nodes[link.source], &self.nodes[link.target]);
            let mut x = t.x + t.vx - s.x - s.vx;
            let mut y = t.y + t.vy - s.y - s.vy;
            if x == 0.0 {
                x = jiggle(&mut self.rng);
            }
            if y == 0.0 {
                y = jiggle(&mut self.rng);
            }
            let mut l = (x * x + y * y).sqrt();
            l = (l - distance) / l * self.alpha * link.strength;
            x *= l;
            y *= l;

            let target = &mut self.nodes[link.target];
            target.vx -= x * link.bias;
            target.vy -= y * link.bias;
            let source = &mut self.nodes[link.source];
            source.vx += x * (1.0 - link.bias);
            source.vy += y * (1.0 - link.bias);
        }
    }

    fn apply_charge_force(&mut self) {
        let max2 = self.config.charge_distance_max.powi(2);
        let min2 = self.config.charge_distance_min.powi(2);
        let strength = self.config.charge_strength;
        let n = self.nodes.len();

        let mut dv = vec![(0.0f64, 0.0f64); n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let mut x = self.nodes[j].x - self.nodes[i].x;
                let mut y = self.nodes[j].y - self.nodes[i].y;
                let mut l = x * x + y * y;
                if l >= max2 {
                    continue;
                }
                if x == 0.0 {
                    x = jiggle(&mut self.rng);
                    l += x * x;
                }
                if y == 0.0 {
                    y = jiggle(&mut self.rng);
                    l += y * y;
                }
                if l < min2 {
                    l = (min2 * l).sqrt();
                }
                let w = strength * self.alpha / l;
                dv[i].0 += x * w;
                dv[i].1 += y * w;
            }
        }
        for (node, (dx, dy)) in self.nodes.iter_mut().zip(dv) {
            node.vx += dx;
            node.vy += dy;
        }
    }

    fn apply_center_force(&mut self) {
        if self.nodes.is_empty() {
            return;
        }
        let n = self.nodes.len() as f64;
        let (sx, sy) = self
            .nodes
            .iter()
            .fold((0.0, 0.0), |(sx, sy), node| (sx + node.x, sy + node.y));
        let (sx, sy) = (sx / n, sy / n);
        for node in &mut self.nodes {
            node.x -= sx;
            node.y -= sy;
        }
    }

    pub fn nodes(&self) -> &[NodeState] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&NodeState> {
        self.by_id.get(id).map(|&i| &self.nodes[i])
    }

    pub fn position(&self, id: &str) -> Option<(f64, f64)> {
        self.node(id).map(|n| (n.x, n.y))
    }

    /// Fix a node at a graph position; it stays there across ticks.
    pub fn pin(&mut self, id: &str, x: f64, y: f64) -> bool {
        match self.by_id.get(id) {
            Some(&i) => {
                let node = &mut self.nodes[i];
                node.fx = Some(x);
                node.fy = Some(y);
                node.x = x;
                node.y = y;
                true
            }
            None => false,
        }
    }

    pub fn unpin(&mut self, id: &str) -> bool {
        match self.by_id.get(id) {
            Some(&i) => {
                let node = &mut self.nodes[i];
                node.fx = None;
                node.fy = None;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cra_graph::materialize;
    use serde_json::json;

    fn snapshot(edges: serde_json::Value) -> GraphSnapshot {
        materialize(&json!({ "edges": edges })).unwrap()
    }

    fn distance(sim: &Simulation, a: &str, b: &str) -> f64 {
        let (ax, ay) = sim.position(a).unwrap();
        let (bx, by) = sim.position(b).unwrap();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    #[test]
    fn test_default_constants() {
        let config = ForceConfig::default();
        assert_eq!(config.charge_strength, -200.0);
        assert_eq!(config.charge_distance_max, 500.0);
        assert_eq!(config.link_distance, 80.0);
        assert_eq!(config.cooldown_ticks, 200);
    }

    #[test]
    fn test_linked_pair_settles_apart() {
        let mut sim = Simulation::new(ForceConfig::default());
        sim.set_snapshot(&snapshot(json!([["A", "B", {}]])));
        let start = distance(&sim, "A", "B");
        let ran = sim.run(1_000);
        assert_eq!(ran, 200);
        assert!(!sim.is_active());
        let end = distance(&sim, "A", "B");
        assert!(end > start);
        assert!(end > 60.0 && end < 400.0, "distance {}", end);
    }

    #[test]
    fn test_deterministic_replay() {
        let data = snapshot(json!([["A", "B", {}], ["B", "C", {}], ["C", "A", {}], ["C", "D", {}]]));
        let mut first = Simulation::new(ForceConfig::default());
        let mut second = Simulation::new(ForceConfig::default());
        first.set_snapshot(&data);
        second.set_snapshot(&data);
        first.run(50);
        second.run(50);
        assert_eq!(first.nodes(), second.nodes());
    }

    #[test]
    fn test_pinned_node_does_not_move() {
        let mut sim = Simulation::new(ForceConfig::default());
        sim.set_snapshot(&snapshot(json!([["A", "B", {}], ["A", "C", {}]])));
        assert!(sim.pin("A", 25.0, -40.0));
        sim.run(30);
        assert_eq!(sim.position("A"), Some((25.0, -40.0)));

        assert!(sim.unpin("A"));
        sim.reheat();
        sim.run(30);
        assert_ne!(sim.position("A"), Some((25.0, -40.0)));
    }

    #[test]
    fn test_reheat_keeps_surviving_positions() {
        let mut sim = Simulation::new(ForceConfig::default());
        sim.set_snapshot(&snapshot(json!([["A", "B", {}]])));
        sim.run(1_000);
        sim.pin("B", 5.0, 5.0);
        let a_before = sim.position("A").unwrap();
        assert!(!sim.is_active());

        sim.set_snapshot(&snapshot(json!([["A", "B", {}], ["B", "C", {}]])));
        assert!(sim.is_active());
        assert_eq!(sim.alpha(), 1.0);
        assert_eq!(sim.position("A"), Some(a_before));
        assert!(sim.node("B").unwrap().is_pinned());
        assert!(sim.position("C").is_some());
    }

    #[test]
    fn test_empty_snapshot_is_idle() {
        let mut sim = Simulation::new(ForceConfig::default());
        sim.set_snapshot(&GraphSnapshot::default());
        assert!(!sim.tick());
    }

    #[test]
    fn test_drag_target_keeps_simulation_warm() {
        let mut sim = Simulation::new(ForceConfig::default());
        sim.set_snapshot(&snapshot(json!([["A", "B", {}]])));
        sim.run(1_000);
        assert!(!sim.is_active());
        sim.set_alpha_target(0.3);
        assert!(sim.tick());
        assert!(sim.alpha() > 0.0);
    }

    #[test]
    fn test_reset_countdown_extends_cooldown() {
        let mut sim = Simulation::new(ForceConfig::default());
        sim.set_snapshot(&snapshot(json!([["A", "B", {}]])));
        sim.set_alpha_target(0.3);
        assert_eq!(sim.run(150), 150);
        sim.reset_countdown();
        assert_eq!(sim.run(150), 150);
        assert!(sim.is_active());
    }
}
