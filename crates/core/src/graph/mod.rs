//! Document tree → node/edge graph for visualization.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dom::{DomNode, NodeType};
use crate::sandbox::DocumentHandle;

pub use crate::sandbox::ExtractionError;

/// Attributes injected by the Dark Reader browser extension.
const INJECTED_ATTRIBUTES: &[&str] = &["data-darkreader-mode", "data-darkreader-scheme"];

/// Text labels longer than this are truncated.
const MAX_TEXT_LABEL: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Document,
    Element,
    Text,
    Attribute,
}

/// A graph vertex. Position fields belong to the layout engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: usize,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub target_y: f64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub vx: f64,
    #[serde(default)]
    pub vy: f64,
    #[serde(default)]
    pub fx: Option<f64>,
    #[serde(default)]
    pub fy: Option<f64>,
}

impl GraphNode {
    fn new(id: usize, name: String, kind: NodeKind) -> Self {
        Self {
            id,
            name,
            kind,
            target_y: 0.0,
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            fx: None,
            fy: None,
        }
    }
}

/// Parent → child relationship, by node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: usize,
    pub target: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl Graph {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Anything beyond the synthetic document root to show?
    pub fn is_renderable(&self) -> bool {
        self.nodes.len() > 1
    }

    pub fn node(&self, id: usize) -> Option<&GraphNode> {
        self.nodes.get(id).filter(|n| n.id == id)
    }

    /// Ids of the direct children of `id`, in edge order.
    pub fn children_of(&self, id: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges
            .iter()
            .filter(move |e| e.source == id)
            .map(|e| e.target)
    }
}

/// Accumulates nodes and edges with a single id counter.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node, link it from `parent` and return its id.
    pub fn add(&mut self, name: impl Into<String>, kind: NodeKind, parent: Option<usize>) -> usize {
        let id = self.graph.nodes.len();
        self.graph.nodes.push(GraphNode::new(id, name.into(), kind));
        if let Some(source) = parent {
            self.graph.edges.push(GraphEdge { source, target: id });
        }
        id
    }

    pub fn finish(self) -> Graph {
        self.graph
    }
}

/// Build the filtered graph of a rendered document.
///
/// The graph starts with a synthetic `Document` node (id 0) and an `html`
/// node (id 1). A `head` node is created when the head has at least one
/// element child, counted before filtering, so a head holding only `<meta>`
/// tags still yields an empty `head` node. A `body` node is created whenever
/// the document has a body.
pub fn extract(document: &DomNode) -> Graph {
    let mut builder = GraphBuilder::new();
    let doc = builder.add("Document", NodeKind::Document, None);
    let html = builder.add("html", NodeKind::Element, Some(doc));

    if let Some(head) = document.head() {
        if head.element_children().next().is_some() {
            let head_id = builder.add("head", NodeKind::Element, Some(html));
            for child in &head.children {
                traverse(&mut builder, child, head_id, Filter::HEAD);
            }
        }
    }

    if let Some(body) = document.body() {
        let body_id = builder.add("body", NodeKind::Element, Some(html));
        for child in &body.children {
            traverse(&mut builder, child, body_id, Filter::BODY);
        }
    }

    builder.finish()
}

/// Extract through a document handle. Unreadable documents are logged
/// and produce an empty graph.
pub fn extract_from(handle: &dyn DocumentHandle) -> Graph {
    match handle.snapshot() {
        Ok(document) => extract(document),
        Err(e) => {
            warn!(error = %e, "cannot read rendered document for extraction");
            Graph::empty()
        }
    }
}

/// Unfiltered graph of `root` and its whole subtree under a `Document` node.
/// Only `script` elements are skipped.
pub fn extract_subtree(root: &DomNode) -> Graph {
    let mut builder = GraphBuilder::new();
    let doc = builder.add("Document", NodeKind::Document, None);
    match root.node_type {
        NodeType::Document => {
            for child in &root.children {
                traverse(&mut builder, child, doc, Filter::NONE);
            }
        }
        _ => traverse(&mut builder, root, doc, Filter::NONE),
    }
    builder.finish()
}

#[derive(Debug, Clone, Copy)]
struct Filter {
    /// Inside `<head>`: drop `meta` and empty `title`.
    head: bool,
    /// Drop extension-injected attributes.
    injected_attributes: bool,
}

impl Filter {
    const HEAD: Filter = Filter {
        head: true,
        injected_attributes: true,
    };
    const BODY: Filter = Filter {
        head: false,
        injected_attributes: true,
    };
    const NONE: Filter = Filter {
        head: false,
        injected_attributes: false,
    };
}

fn traverse(builder: &mut GraphBuilder, node: &DomNode, parent: usize, filter: Filter) {
    match node.node_type {
        NodeType::Text => {
            if let Some(label) = text_label(&node.text) {
                builder.add(label, NodeKind::Text, Some(parent));
            }
        }
        NodeType::Element => {
            let tag = node.tag.to_lowercase();
            if tag == "script" {
                return;
            }
            if filter.head && (tag == "meta" || (tag == "title" && node.raw_text_content().is_empty())) {
                return;
            }

            let id = builder.add(tag, NodeKind::Element, Some(parent));
            for (name, value) in &node.attributes {
                if filter.injected_attributes && INJECTED_ATTRIBUTES.contains(&name.as_str()) {
                    continue;
                }
                builder.add(format!("{name}=\"{value}\""), NodeKind::Attribute, Some(id));
            }
            for child in &node.children {
                traverse(builder, child, id, filter);
            }
        }
        NodeType::Document | NodeType::Other => {}
    }
}

/// Quoted, trimmed text label; `None` for whitespace-only text.
pub fn text_label(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.chars().count() > MAX_TEXT_LABEL {
        let head: String = text.chars().take(MAX_TEXT_LABEL).collect();
        Some(format!("\"{head}...\""))
    } else {
        Some(format!("\"{text}\""))
    }
}

/// Indented tree listing, one node per line: `[id] kind name`.
pub fn to_compact_string(graph: &Graph) -> String {
    let mut out = String::new();
    if graph.nodes.is_empty() {
        return out;
    }
    let mut stack = vec![(0usize, 0usize)];
    let mut seen = vec![false; graph.nodes.len()];
    while let Some((id, depth)) = stack.pop() {
        let Some(node) = graph.node(id) else { continue };
        if std::mem::replace(&mut seen[id], true) {
            continue;
        }
        let kind = match node.kind {
            NodeKind::Document => "doc",
            NodeKind::Element => "el",
            NodeKind::Text => "text",
            NodeKind::Attribute => "attr",
        };
        out.push_str(&format!("{}[{}] {} {}\n", "  ".repeat(depth), id, kind, node.name));
        let children: Vec<usize> = graph.children_of(id).collect();
        for child in children.into_iter().rev() {
            stack.push((child, depth + 1));
        }
    }
    out
}
