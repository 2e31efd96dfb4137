//! Layered force layout.
//!
//! Nodes get a target height from their depth below the document root and
//! a [`Simulation`] relaxes the graph around those layers.

pub mod canvas;
mod quadtree;
mod simulation;

use serde::{Deserialize, Serialize};

use crate::graph::Graph;

pub use canvas::{measure_panes, Canvas, PaneSizes};
pub use simulation::Simulation;

/// Force and layering parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceConfig {
    pub link_distance: f64,
    pub link_strength: f64,
    /// Negative values repel.
    pub charge_strength: f64,
    /// Pull toward each node's layer (dominant).
    pub y_strength: f64,
    /// Weak pull toward the horizontal center.
    pub x_strength: f64,
    pub collide_radius: f64,
    /// Target y of the root layer.
    pub layer_offset: f64,
    /// Vertical distance between layers.
    pub layer_spacing: f64,
    pub alpha_min: f64,
    pub alpha_decay: f64,
    pub velocity_decay: f64,
    /// Alpha target while a node is being dragged.
    pub drag_alpha_target: f64,
}

impl Default for ForceConfig {
    fn default() -> Self {
        let alpha_min = 0.001;
        Self {
            link_distance: 60.0,
            link_strength: 0.8,
            charge_strength: -300.0,
            y_strength: 0.3,
            x_strength: 0.05,
            collide_radius: 25.0,
            layer_offset: 60.0,
            layer_spacing: 80.0,
            alpha_min,
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
            velocity_decay: 0.4,
            drag_alpha_target: 0.3,
        }
    }
}

/// Depth of every node below node 0, following outgoing edges.
///
/// The first depth assigned to a node wins; nodes unreachable from the root
/// stay `None`.
pub fn calculate_depths(graph: &Graph) -> Vec<Option<usize>> {
    let mut depths = vec![None; graph.nodes.len()];
    if graph.nodes.is_empty() {
        return depths;
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); graph.nodes.len()];
    for edge in &graph.edges {
        if edge.source < children.len() && edge.target < children.len() {
            children[edge.source].push(edge.target);
        }
    }

    // Depth-first in edge order, like the recursive walk it replaces.
    let mut stack = vec![(0usize, 0usize)];
    while let Some((id, depth)) = stack.pop() {
        if depths[id].is_some() {
            continue;
        }
        depths[id] = Some(depth);
        for &child in children[id].iter().rev() {
            if depths[child].is_none() {
                stack.push((child, depth + 1));
            }
        }
    }
    depths
}

/// Set `target_y = layer_offset + depth * layer_spacing` on every node.
/// Unreachable nodes are placed on the root layer.
pub fn assign_target_y(graph: &mut Graph, config: &ForceConfig) {
    let depths = calculate_depths(graph);
    for (node, depth) in graph.nodes.iter_mut().zip(depths) {
        node.target_y = config.layer_offset + depth.unwrap_or(0) as f64 * config.layer_spacing;
    }
}
