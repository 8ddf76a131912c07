//! Virtual Nodes
//!
//! A virtual node tree describes what should be on screen without touching
//! any live target. Trees are plain data: cloning one is the snapshot that
//! the next diff compares against.
//!
//! Nodes are addressed two ways:
//!
//! - by **child path**, the child index at each level from the root
//!   (`[]` is the root, `[1, 0]` the first child of the root's second
//!   child). Binding sites use this to find the node they update.
//! - by **traversal index**, the pre-order depth-first position (root is
//!   0). Patch sets use this.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Attribute name to value, in source order.
pub type Attributes = IndexMap<String, String>;

/// A node in a virtual tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VNode {
    Element(Element),
    Text(String),
}

/// An element node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub children: Vec<VNode>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }
}

impl VNode {
    /// An element with no attributes or children.
    pub fn element(tag: impl Into<String>) -> Self {
        Self::Element(Element::new(tag))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Builder: set an attribute. No effect on text nodes.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Element(element) = &mut self {
            element.attributes.insert(name.into(), value.into());
        }
        self
    }

    /// Builder: append a child. No effect on text nodes.
    pub fn child(mut self, child: VNode) -> Self {
        if let Self::Element(element) = &mut self {
            element.children.push(child);
        }
        self
    }

    /// Builder: append several children. No effect on text nodes.
    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = VNode>,
    {
        if let Self::Element(element) = &mut self {
            element.children.extend(children);
        }
        self
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Element(_) => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.as_element().map(|element| element.tag.as_str())
    }

    /// Child nodes; empty for text.
    pub fn child_nodes(&self) -> &[VNode] {
        match self {
            Self::Element(element) => &element.children,
            Self::Text(_) => &[],
        }
    }

    /// Number of nodes in this subtree, including this one.
    pub fn subtree_size(&self) -> usize {
        1 + self
            .child_nodes()
            .iter()
            .map(VNode::subtree_size)
            .sum::<usize>()
    }

    /// Follow a child path from this node.
    pub fn node_at(&self, path: &[usize]) -> Option<&VNode> {
        path.iter()
            .try_fold(self, |node, &index| node.child_nodes().get(index))
    }

    /// Follow a child path from this node, mutably.
    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut VNode> {
        let mut node = self;
        for &index in path {
            node = match node {
                Self::Element(element) => element.children.get_mut(index)?,
                Self::Text(_) => return None,
            };
        }
        Some(node)
    }

    /// Nodes in pre-order; the position in the result is the traversal index.
    pub fn preorder(&self) -> Vec<&VNode> {
        let mut nodes = Vec::with_capacity(self.subtree_size());
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            nodes.push(node);
            stack.extend(node.child_nodes().iter().rev());
        }
        nodes
    }

    /// Replace the text of a text node. Returns `false` for elements.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        match self {
            Self::Text(current) => {
                *current = text.into();
                true
            }
            Self::Element(_) => false,
        }
    }

    /// Set (`Some`) or remove (`None`) an attribute. Returns `false` for text.
    pub fn set_attribute(&mut self, name: &str, value: Option<String>) -> bool {
        match self {
            Self::Element(element) => {
                match value {
                    Some(value) => {
                        element.attributes.insert(name.to_string(), value);
                    }
                    None => {
                        element.attributes.shift_remove(name);
                    }
                }
                true
            }
            Self::Text(_) => false,
        }
    }

    /// Serialize as HTML-ish markup, for logs and test assertions.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        match self {
            Self::Text(text) => out.push_str(text),
            Self::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attributes {
                    out.push_str(&format!(" {name}=\"{value}\""));
                }
                out.push('>');
                for child in &element.children {
                    child.write_markup(out);
                }
                out.push_str(&format!("</{}>", element.tag));
            }
        }
    }
}

impl From<Element> for VNode {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> VNode {
        VNode::element("ul").attr("class", "list").children([
            VNode::element("li").child(VNode::text("a")),
            VNode::element("li").child(VNode::text("b")),
        ])
    }

    #[test]
    fn builders_ignore_text_nodes() {
        let text = VNode::text("x").attr("a", "b").child(VNode::text("y"));
        assert_eq!(text, VNode::text("x"));
    }

    #[test]
    fn subtree_size_counts_every_node() {
        assert_eq!(list().subtree_size(), 5);
        assert_eq!(VNode::text("x").subtree_size(), 1);
    }

    #[test]
    fn preorder_matches_traversal_index() {
        let tree = list();
        let order: Vec<String> = tree
            .preorder()
            .iter()
            .map(|node| match node {
                VNode::Element(element) => element.tag.clone(),
                VNode::Text(text) => text.clone(),
            })
            .collect();
        assert_eq!(order, ["ul", "li", "a", "li", "b"]);
    }

    #[test]
    fn child_paths() {
        let mut tree = list();
        assert_eq!(tree.node_at(&[1, 0]), Some(&VNode::text("b")));
        assert_eq!(tree.node_at(&[2]), None);
        assert_eq!(tree.node_at(&[0, 0, 0]), None);

        tree.node_at_mut(&[1, 0]).unwrap().set_text("B");
        assert_eq!(tree.node_at(&[1, 0]).and_then(VNode::as_text), Some("B"));
    }

    #[test]
    fn attribute_updates() {
        let mut node = VNode::element("input").attr("value", "1");
        assert!(node.set_attribute("value", Some("2".into())));
        assert!(node.set_attribute("disabled", Some(String::new())));
        assert!(node.set_attribute("value", None));
        assert_eq!(node.to_markup(), "<input disabled=\"\"></input>");
        assert!(!VNode::text("x").set_attribute("a", None));
    }

    #[test]
    fn snapshots_are_independent() {
        let mut live = list();
        let snapshot = live.clone();
        live.node_at_mut(&[0, 0]).unwrap().set_text("changed");
        assert_ne!(live, snapshot);
        assert_eq!(snapshot.node_at(&[0, 0]), Some(&VNode::text("a")));
    }

    #[test]
    fn markup() {
        assert_eq!(
            list().to_markup(),
            "<ul class=\"list\"><li>a</li><li>b</li></ul>"
        );
    }
}
