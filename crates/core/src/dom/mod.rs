use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::ParseOpts;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// A node in the rendered document tree.
///
/// Attributes keep their source order, which the graph extractor relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct DomNode {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<DomNode>,
    pub node_type: NodeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Element,
    Text,
    Document,
    /// Comments and processing instructions: kept in the tree, never visualized.
    Other,
}

impl DomNode {
    pub fn new_element(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
            node_type: NodeType::Element,
        }
    }

    pub fn new_text(text: &str) -> Self {
        Self {
            tag: String::new(),
            attributes: Vec::new(),
            text: text.to_string(),
            children: Vec::new(),
            node_type: NodeType::Text,
        }
    }

    pub fn new_document() -> Self {
        Self {
            tag: String::new(),
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
            node_type: NodeType::Document,
        }
    }

    fn new_other(text: &str) -> Self {
        Self {
            tag: String::new(),
            attributes: Vec::new(),
            text: text.to_string(),
            children: Vec::new(),
            node_type: NodeType::Other,
        }
    }

    pub fn is_element(&self, tag: &str) -> bool {
        self.node_type == NodeType::Element && self.tag == tag
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing the value in place or appending it.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self
                .attributes
                .push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|(n, _)| n == name)?;
        Some(self.attributes.remove(idx).1)
    }

    /// Whitespace-separated class list.
    pub fn classes(&self) -> Vec<&str> {
        self.get_attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Child nodes that are elements (the DOM `children` collection).
    pub fn element_children(&self) -> impl Iterator<Item = &DomNode> {
        self.children
            .iter()
            .filter(|c| c.node_type == NodeType::Element)
    }

    /// The root `<html>` element of a document node.
    pub fn document_element(&self) -> Option<&DomNode> {
        self.element_children().find(|c| c.tag == "html")
    }

    pub fn head(&self) -> Option<&DomNode> {
        self.document_element()?
            .element_children()
            .find(|c| c.tag == "head")
    }

    pub fn body(&self) -> Option<&DomNode> {
        self.document_element()?
            .element_children()
            .find(|c| c.tag == "body")
    }

    pub fn body_mut(&mut self) -> Option<&mut DomNode> {
        self.children
            .iter_mut()
            .find(|c| c.is_element("html"))?
            .children
            .iter_mut()
            .find(|c| c.is_element("body"))
    }

    /// Child-index path to the first node (pre-order) matching `pred`.
    pub fn find_path<F>(&self, pred: &F) -> Option<Vec<usize>>
    where
        F: Fn(&DomNode, &[&DomNode]) -> bool,
    {
        let mut path = Vec::new();
        let mut ancestors = Vec::new();
        if self.find_path_inner(pred, &mut ancestors, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn find_path_inner<'a, F>(
        &'a self,
        pred: &F,
        ancestors: &mut Vec<&'a DomNode>,
        path: &mut Vec<usize>,
    ) -> bool
    where
        F: Fn(&DomNode, &[&DomNode]) -> bool,
    {
        if pred(self, ancestors) {
            return true;
        }
        ancestors.push(self);
        for (idx, child) in self.children.iter().enumerate() {
            path.push(idx);
            if child.find_path_inner(pred, ancestors, path) {
                return true;
            }
            path.pop();
        }
        ancestors.pop();
        false
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&DomNode> {
        path.iter().try_fold(self, |node, &idx| node.children.get(idx))
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut DomNode> {
        path.iter()
            .try_fold(self, |node, &idx| node.children.get_mut(idx))
    }

    /// Detach the node at `path`. The root itself cannot be removed.
    pub fn remove_at(&mut self, path: &[usize]) -> Option<DomNode> {
        let (last, parent_path) = path.split_last()?;
        let parent = self.node_at_mut(parent_path)?;
        if *last < parent.children.len() {
            Some(parent.children.remove(*last))
        } else {
            None
        }
    }

    /// Concatenation of all descendant text exactly as parsed, whitespace included.
    pub fn raw_text_content(&self) -> String {
        let mut out = String::new();
        self.collect_raw_text(&mut out);
        out
    }

    fn collect_raw_text(&self, out: &mut String) {
        match self.node_type {
            NodeType::Text => out.push_str(&self.text),
            NodeType::Other => {}
            _ => self.children.iter().for_each(|c| c.collect_raw_text(out)),
        }
    }

    /// Number of edges on the longest downward path (a leaf has depth 0).
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 0usize)];
        while let Some((node, level)) = stack.pop() {
            deepest = deepest.max(level);
            stack.extend(node.children.iter().map(|c| (c, level + 1)));
        }
        deepest
    }

    /// Replace all children with a single text node (empty text clears them).
    pub fn set_text_content(&mut self, text: &str) {
        self.children.clear();
        if !text.is_empty() {
            self.children.push(DomNode::new_text(text));
        }
    }
}

// Drop children from an explicit stack so deep documents cannot exhaust
// the thread stack.
impl Drop for DomNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Parse an HTML string into a DomNode tree rooted at a document node.
///
/// html5ever recovers from any malformed input, so parsing never fails;
/// the missing `html`, `head` and `body` elements are synthesized.
pub fn parse_html(html: &str) -> DomNode {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: true,
            ..Default::default()
        },
        ..Default::default()
    };

    let dom = parse_document(RcDom::default(), opts).one(html);

    convert_node(&dom.document)
}

/// Parse markup as the contents of a `<body>` element.
pub fn parse_fragment(markup: &str) -> Vec<DomNode> {
    let mut doc = parse_html(&format!("<body>{markup}"));
    doc.body_mut()
        .map(|body| std::mem::take(&mut body.children))
        .unwrap_or_default()
}

/// Convert the rcdom tree without recursion; nesting depth is unbounded here.
fn convert_node(root: &Handle) -> DomNode {
    let mut stack = vec![open_node(root)];
    loop {
        let top = stack.len() - 1;
        if let Some(child) = stack[top].1.next() {
            stack.push(open_node(&child));
            continue;
        }
        let (node, _) = stack.swap_remove(top);
        match stack.last_mut() {
            Some((parent, _)) => parent.children.push(node),
            None => return node,
        }
    }
}

/// A childless copy of `handle` plus the children still to convert.
fn open_node(handle: &Handle) -> (DomNode, std::vec::IntoIter<Handle>) {
    let node = match &handle.data {
        NodeData::Document => DomNode::new_document(),
        NodeData::Element { name, attrs, .. } => {
            let mut node = DomNode::new_element(&name.local.to_ascii_lowercase());
            for attr in attrs.borrow().iter() {
                let attr_name = match &attr.name.prefix {
                    Some(prefix) => format!("{}:{}", prefix, attr.name.local),
                    None => attr.name.local.to_string(),
                };
                node.attributes.push((attr_name, attr.value.to_string()));
            }
            node
        }
        NodeData::Text { contents } => DomNode::new_text(&contents.borrow()),
        NodeData::Comment { contents } => DomNode::new_other(contents),
        _ => DomNode::new_other(""), // Doctypes and processing instructions
    };
    let children = match &handle.data {
        NodeData::Document | NodeData::Element { .. } => handle.children.borrow().clone(),
        _ => Vec::new(),
    };
    (node, children.into_iter())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_counts_edges_to_deepest_leaf() {
        let doc = parse_html("<div><p><b>x</b></p></div><i></i>");
        // document > html > body > div > p > b > "x"
        assert_eq!(doc.depth(), 6);
        assert_eq!(DomNode::new_text("x").depth(), 0);
    }

    #[test]
    fn deep_documents_convert_and_drop_iteratively() {
        let doc = parse_html(&"<div>".repeat(5_000));
        assert_eq!(doc.depth(), 5_002);
        drop(doc);
    }
}
