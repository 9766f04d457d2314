mod render;

use std::collections::BTreeMap;
use std::fmt;

pub use render::render;

/// A rendered plan: a DOM-like tree with one child element per block.
/// Code blocks are bound out of band by `bind_id` because their text is
/// not part of the regular selectable flow.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub root: Element,
    /// Raw code text keyed by bind id.
    bound: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    /// Set on top-level block elements.
    pub block_id: Option<String>,
    /// Set on code blocks, which are matched against `RenderedDocument::bound_text`.
    pub bind_id: Option<String>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// A position inside a text node: child-index path from the root plus a
/// character offset into that node's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomPoint {
    pub path: Vec<usize>,
    pub offset: usize,
}

impl DomPoint {
    pub fn new(path: Vec<usize>, offset: usize) -> Self {
        DomPoint { path, offset }
    }
}

/// A user selection in the rendered document. May be backwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomRange {
    pub start: DomPoint,
    pub end: DomPoint,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Element {
            tag: tag.into(),
            block_id: None,
            bind_id: None,
            children: Vec::new(),
        }
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => e.write_text(out),
            }
        }
    }

    /// Text nodes under this element in document order, with their paths
    /// relative to this element.
    pub fn text_nodes(&self) -> Vec<(Vec<usize>, &str)> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        self.collect_text_nodes(&mut path, &mut out);
        out
    }

    fn collect_text_nodes<'a>(&'a self, path: &mut Vec<usize>, out: &mut Vec<(Vec<usize>, &'a str)>) {
        for (idx, child) in self.children.iter().enumerate() {
            path.push(idx);
            match child {
                Node::Text(t) => out.push((path.clone(), t.as_str())),
                Node::Element(e) => e.collect_text_nodes(path, out),
            }
            path.pop();
        }
    }
}

impl RenderedDocument {
    pub fn new(root: Element, bound: BTreeMap<String, String>) -> Self {
        RenderedDocument { root, bound }
    }

    /// Top-level block elements in order.
    pub fn blocks(&self) -> impl Iterator<Item = &Element> {
        self.root.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn bound_text(&self, bind_id: &str) -> Option<&str> {
        self.bound.get(bind_id).map(String::as_str)
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.root.children.get(*first)?;
        for idx in rest {
            node = match node {
                Node::Element(e) => e.children.get(*idx)?,
                Node::Text(_) => return None,
            };
        }
        Some(node)
    }

    pub fn element_at(&self, path: &[usize]) -> Option<&Element> {
        if path.is_empty() {
            return Some(&self.root);
        }
        match self.node_at(path)? {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        }
    }

    pub fn text_at(&self, path: &[usize]) -> Option<&str> {
        match self.node_at(path)? {
            Node::Text(t) => Some(t),
            Node::Element(_) => None,
        }
    }

    pub fn text_content(&self) -> String {
        self.root.text_content()
    }

    /// Every element in preorder with its path.
    pub fn elements(&self) -> Vec<(Vec<usize>, &Element)> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        collect_elements(&self.root, &mut path, &mut out);
        out
    }

    /// Text between two points, walking text nodes in document order.
    pub fn extract(&self, start: &DomPoint, end: &DomPoint) -> Option<String> {
        if start.path == end.path {
            let text = self.text_at(&start.path)?;
            return char_slice(text, start.offset, end.offset).map(str::to_string);
        }

        let mut out = String::new();
        let mut inside = false;
        for (path, text) in self.root.text_nodes() {
            if path == start.path {
                out.push_str(char_slice(text, start.offset, char_len(text))?);
                inside = true;
            } else if path == end.path {
                if !inside {
                    return None;
                }
                out.push_str(char_slice(text, 0, end.offset)?);
                return Some(out);
            } else if inside {
                out.push_str(text);
            }
        }
        None
    }
}

fn collect_elements<'a>(
    element: &'a Element,
    path: &mut Vec<usize>,
    out: &mut Vec<(Vec<usize>, &'a Element)>,
) {
    for (idx, child) in element.children.iter().enumerate() {
        if let Node::Element(e) = child {
            path.push(idx);
            out.push((path.clone(), e));
            collect_elements(e, path, out);
            path.pop();
        }
    }
}

pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Slice by character offsets.
pub(crate) fn char_slice(s: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    let byte_at = |n: usize| -> Option<usize> {
        if n == 0 {
            return Some(0);
        }
        s.char_indices()
            .map(|(b, _)| b)
            .chain(std::iter::once(s.len()))
            .nth(n)
    };
    let from = byte_at(start)?;
    let to = byte_at(end)?;
    s.get(from..to)
}

impl fmt::Display for RenderedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in self.blocks() {
            writeln!(f, "{}", block)?;
        }
        Ok(())
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        if let Some(id) = &self.block_id {
            write!(f, " data-block-id=\"{}\"", id)?;
        }
        if let Some(id) = &self.bind_id {
            write!(f, " data-bind-id=\"{}\"", id)?;
        }
        write!(f, ">")?;
        for child in &self.children {
            match child {
                Node::Text(t) => write!(f, "{}", t)?,
                Node::Element(e) => write!(f, "{}", e)?,
            }
        }
        write!(f, "</{}>", self.tag)
    }
}
