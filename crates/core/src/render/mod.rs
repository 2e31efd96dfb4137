//! Visual representation of a laid-out graph.
//!
//! A [`Scene`] is the retained list of shapes for one visualization surface;
//! the simulation moves nodes and [`Scene::sync`] copies the live
//! coordinates into the shapes on every tick.

use serde::{Deserialize, Serialize};

use crate::graph::{Graph, NodeKind};
use crate::layout::{Canvas, Simulation};
use crate::sandbox::escape_html;

/// Circle radius per node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeRadii {
    pub document: f64,
    pub element: f64,
    pub other: f64,
}

impl Default for NodeRadii {
    fn default() -> Self {
        Self {
            document: 22.0,
            element: 18.0,
            other: 14.0,
        }
    }
}

impl NodeRadii {
    pub fn radius(&self, kind: NodeKind) -> f64 {
        match kind {
            NodeKind::Document => self.document,
            NodeKind::Element => self.element,
            NodeKind::Text | NodeKind::Attribute => self.other,
        }
    }
}

fn kind_class(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Document => "document",
        NodeKind::Element => "element",
        NodeKind::Text => "text",
        NodeKind::Attribute => "attribute",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkShape {
    pub source: usize,
    pub target: usize,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeShape {
    pub id: usize,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub label: String,
    pub r: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub width: f64,
    pub height: f64,
    pub links: Vec<LinkShape>,
    pub nodes: Vec<NodeShape>,
}

impl Scene {
    /// Shapes for every node and edge at their current positions.
    pub fn build(graph: &Graph, canvas: Canvas, radii: &NodeRadii) -> Self {
        let nodes = graph
            .nodes
            .iter()
            .map(|n| NodeShape {
                id: n.id,
                kind: n.kind,
                label: n.name.clone(),
                r: radii.radius(n.kind),
                x: n.x,
                y: n.y,
            })
            .collect();
        let links = graph
            .edges
            .iter()
            .filter_map(|e| {
                let (s, t) = (graph.node(e.source)?, graph.node(e.target)?);
                Some(LinkShape {
                    source: e.source,
                    target: e.target,
                    x1: s.x,
                    y1: s.y,
                    x2: t.x,
                    y2: t.y,
                })
            })
            .collect();
        Self {
            width: canvas.width,
            height: canvas.height,
            links,
            nodes,
        }
    }

    /// Tick handler: move shapes to the simulation's live coordinates.
    pub fn sync(&mut self, graph: &Graph) {
        for shape in &mut self.nodes {
            if let Some(node) = graph.node(shape.id) {
                shape.x = node.x;
                shape.y = node.y;
            }
        }
        for link in &mut self.links {
            if let (Some(s), Some(t)) = (graph.node(link.source), graph.node(link.target)) {
                link.x1 = s.x;
                link.y1 = s.y;
                link.x2 = t.x;
                link.y2 = t.y;
            }
        }
    }
}

/// The tree-visualization mount point of one editor instance.
#[derive(Debug, Clone, Default)]
pub struct VisualSurface {
    scene: Option<Scene>,
}

impl VisualSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever was drawn with the simulation's graph.
    ///
    /// Graphs with nothing beyond the document root are not drawn; the
    /// surface is left empty. Returns whether a scene was drawn.
    pub fn render(&mut self, simulation: &Simulation, radii: &NodeRadii) -> bool {
        self.clear();
        let graph = simulation.graph();
        if !graph.is_renderable() {
            return false;
        }
        self.scene = Some(Scene::build(graph, simulation.canvas(), radii));
        true
    }

    pub fn sync(&mut self, simulation: &Simulation) {
        if let Some(scene) = &mut self.scene {
            scene.sync(simulation.graph());
        }
    }

    pub fn clear(&mut self) {
        self.scene = None;
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.scene.is_none()
    }
}

/// Serialize a scene as a standalone SVG document.
pub fn to_svg(scene: &Scene) -> String {
    let (w, h) = (fmt_num(scene.width), fmt_num(scene.height));
    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n"
    ));
    svg.push_str("<g>\n");
    for link in &scene.links {
        svg.push_str(&format!(
            "<line class=\"link\" x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\"/>\n",
            fmt_num(link.x1),
            fmt_num(link.y1),
            fmt_num(link.x2),
            fmt_num(link.y2)
        ));
    }
    svg.push_str("</g>\n<g>\n");
    for node in &scene.nodes {
        svg.push_str(&format!(
            "<g transform=\"translate({},{})\"><circle r=\"{}\" class=\"node node-type-{}\"/><text class=\"node-label\">{}</text></g>\n",
            fmt_num(node.x),
            fmt_num(node.y),
            fmt_num(node.r),
            kind_class(node.kind),
            escape_html(&node.label)
        ));
    }
    svg.push_str("</g>\n</svg>\n");
    svg
}

/// Two decimals, trailing zeros trimmed.
fn fmt_num(v: f64) -> String {
    let s = format!("{v:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_formatting() {
        assert_eq!(fmt_num(400.0), "400");
        assert_eq!(fmt_num(12.345), "12.35");
        assert_eq!(fmt_num(-0.001), "0");
        assert_eq!(fmt_num(0.5), "0.5");
    }

    #[test]
    fn radii_by_kind() {
        let radii = NodeRadii::default();
        assert_eq!(radii.radius(NodeKind::Document), 22.0);
        assert_eq!(radii.radius(NodeKind::Element), 18.0);
        assert_eq!(radii.radius(NodeKind::Text), 14.0);
        assert_eq!(radii.radius(NodeKind::Attribute), 14.0);
    }
}
