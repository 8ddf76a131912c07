//! In-Memory Live Tree
//!
//! An arena-backed [`Renderer`] with no outside target. Useful for tests,
//! server-side markup, and as a reference for writing real renderers.
//!
//! Nodes are never freed. A removed or replaced node stays in the arena,
//! detached, and its handle keeps working.

use std::collections::HashSet;
use std::fmt;

use tracing::warn;

use super::renderer::Renderer;
use crate::error::RenderError;
use crate::vdom::{Attributes, Element, VNode};

/// Handle to a node in a [`MemoryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LiveId(usize);

impl LiveId {
    pub fn raw(&self) -> usize {
        self.0
    }
}

impl fmt::Display for LiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
enum LiveKind {
    Element { tag: String, attributes: Attributes },
    Text(String),
}

#[derive(Debug, Clone)]
struct LiveNode {
    kind: LiveKind,
    children: Vec<LiveId>,
    parent: Option<LiveId>,
}

/// A live tree held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryTree {
    nodes: Vec<LiveNode>,
    rejected: HashSet<String>,
    mutations: u64,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse any future `set_attribute` call for `name`.
    pub fn reject_attribute(&mut self, name: impl Into<String>) {
        self.rejected.insert(name.into());
    }

    /// Number of mutating calls that succeeded, creation excluded.
    pub fn mutation_count(&self) -> u64 {
        self.mutations
    }

    /// Number of nodes ever created, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn tag(&self, id: &LiveId) -> Option<&str> {
        match &self.nodes.get(id.0)?.kind {
            LiveKind::Element { tag, .. } => Some(tag),
            LiveKind::Text(_) => None,
        }
    }

    pub fn text(&self, id: &LiveId) -> Option<&str> {
        match &self.nodes.get(id.0)?.kind {
            LiveKind::Text(text) => Some(text),
            LiveKind::Element { .. } => None,
        }
    }

    pub fn attribute(&self, id: &LiveId, name: &str) -> Option<&str> {
        match &self.nodes.get(id.0)?.kind {
            LiveKind::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            LiveKind::Text(_) => None,
        }
    }

    /// Snapshot the subtree under `id` as a virtual tree.
    pub fn to_vnode(&self, id: &LiveId) -> Option<VNode> {
        let node = self.nodes.get(id.0)?;
        Some(match &node.kind {
            LiveKind::Text(text) => VNode::Text(text.clone()),
            LiveKind::Element { tag, attributes } => VNode::Element(Element {
                tag: tag.clone(),
                attributes: attributes.clone(),
                children: node
                    .children
                    .iter()
                    .filter_map(|child| self.to_vnode(child))
                    .collect(),
            }),
        })
    }

    /// Markup for the subtree under `id`; empty for an unknown handle.
    pub fn to_markup(&self, id: &LiveId) -> String {
        self.to_vnode(id)
            .map(|node| node.to_markup())
            .unwrap_or_default()
    }

    fn node(&self, id: &LiveId) -> Result<&LiveNode, RenderError> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| RenderError::UnknownNode(id.to_string()))
    }

    fn node_mut(&mut self, id: &LiveId) -> Result<&mut LiveNode, RenderError> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| RenderError::UnknownNode(id.to_string()))
    }

    fn attributes_mut(&mut self, id: &LiveId) -> Result<&mut Attributes, RenderError> {
        match &mut self.node_mut(id)?.kind {
            LiveKind::Element { attributes, .. } => Ok(attributes),
            LiveKind::Text(_) => Err(RenderError::NotAnElement(id.to_string())),
        }
    }

    fn push(&mut self, kind: LiveKind) -> LiveId {
        let id = LiveId(self.nodes.len());
        self.nodes.push(LiveNode {
            kind,
            children: Vec::new(),
            parent: None,
        });
        id
    }

    fn position(&self, parent: &LiveId, child: &LiveId) -> Result<usize, RenderError> {
        self.node(parent)?
            .children
            .iter()
            .position(|id| id == child)
            .ok_or_else(|| RenderError::NotAChild {
                parent: parent.to_string(),
                child: child.to_string(),
            })
    }

    /// Unlink `child` from its current parent, if any.
    fn detach(&mut self, child: &LiveId) -> Result<(), RenderError> {
        if let Some(parent) = self.node(child)?.parent {
            let position = self.position(&parent, child)?;
            self.node_mut(&parent)?.children.remove(position);
            self.node_mut(child)?.parent = None;
        }
        Ok(())
    }

    fn ensure_element(&self, id: &LiveId) -> Result<(), RenderError> {
        match self.node(id)?.kind {
            LiveKind::Element { .. } => Ok(()),
            LiveKind::Text(_) => Err(RenderError::NotAnElement(id.to_string())),
        }
    }
}

impl Renderer for MemoryTree {
    type Node = LiveId;

    fn create_element(&mut self, tag: &str) -> LiveId {
        self.push(LiveKind::Element {
            tag: tag.to_string(),
            attributes: Attributes::new(),
        })
    }

    fn create_text(&mut self, content: &str) -> LiveId {
        self.push(LiveKind::Text(content.to_string()))
    }

    fn set_attribute(&mut self, node: &LiveId, name: &str, value: &str) -> Result<(), RenderError> {
        if self.rejected.contains(name) {
            warn!(node = %node, name, "attribute rejected");
            return Err(RenderError::AttributeRejected {
                name: name.to_string(),
                reason: "attribute is blocked on this tree".to_string(),
            });
        }
        self.attributes_mut(node)?
            .insert(name.to_string(), value.to_string());
        self.mutations += 1;
        Ok(())
    }

    fn remove_attribute(&mut self, node: &LiveId, name: &str) -> Result<(), RenderError> {
        self.attributes_mut(node)?.shift_remove(name);
        self.mutations += 1;
        Ok(())
    }

    fn set_text(&mut self, node: &LiveId, content: &str) -> Result<(), RenderError> {
        match &mut self.node_mut(node)?.kind {
            LiveKind::Text(text) => {
                *text = content.to_string();
                self.mutations += 1;
                Ok(())
            }
            LiveKind::Element { .. } => Err(RenderError::NotText(node.to_string())),
        }
    }

    fn append_child(&mut self, parent: &LiveId, child: &LiveId) -> Result<(), RenderError> {
        self.ensure_element(parent)?;
        self.detach(child)?;
        self.node_mut(parent)?.children.push(*child);
        self.node_mut(child)?.parent = Some(*parent);
        self.mutations += 1;
        Ok(())
    }

    fn remove_child(&mut self, parent: &LiveId, child: &LiveId) -> Result<(), RenderError> {
        let position = self.position(parent, child)?;
        self.node_mut(parent)?.children.remove(position);
        self.node_mut(child)?.parent = None;
        self.mutations += 1;
        Ok(())
    }

    fn replace_child(
        &mut self,
        parent: &LiveId,
        old_child: &LiveId,
        new_child: &LiveId,
    ) -> Result<(), RenderError> {
        self.position(parent, old_child)?;
        self.detach(new_child)?;
        // Detaching may shift siblings, so look the slot up again.
        let position = self.position(parent, old_child)?;
        self.node_mut(parent)?.children[position] = *new_child;
        self.node_mut(new_child)?.parent = Some(*parent);
        self.node_mut(old_child)?.parent = None;
        self.mutations += 1;
        Ok(())
    }

    fn children(&self, node: &LiveId) -> Vec<LiveId> {
        self.nodes
            .get(node.0)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    fn parent(&self, node: &LiveId) -> Option<LiveId> {
        self.nodes.get(node.0)?.parent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_print() {
        let mut tree = MemoryTree::new();
        let ul = tree.create_element("ul");
        let li = tree.create_element("li");
        let text = tree.create_text("a");
        tree.set_attribute(&ul, "class", "list").unwrap();
        tree.append_child(&li, &text).unwrap();
        tree.append_child(&ul, &li).unwrap();

        assert_eq!(tree.to_markup(&ul), "<ul class=\"list\"><li>a</li></ul>");
        assert_eq!(tree.parent(&text), Some(li));
        assert_eq!(tree.attribute(&ul, "class"), Some("list"));
        assert_eq!(tree.tag(&li), Some("li"));
        assert_eq!(tree.text(&text), Some("a"));
        assert_eq!(tree.mutation_count(), 3);
    }

    #[test]
    fn text_and_element_operations_are_checked() {
        let mut tree = MemoryTree::new();
        let div = tree.create_element("div");
        let text = tree.create_text("x");

        assert_eq!(
            tree.set_attribute(&text, "a", "b"),
            Err(RenderError::NotAnElement("#1".into()))
        );
        assert_eq!(tree.set_text(&div, "y"), Err(RenderError::NotText("#0".into())));
        assert!(matches!(
            tree.append_child(&text, &div),
            Err(RenderError::NotAnElement(_))
        ));
        assert!(matches!(
            tree.set_text(&LiveId(99), "z"),
            Err(RenderError::UnknownNode(_))
        ));
    }

    #[test]
    fn remove_child_requires_the_parent() {
        let mut tree = MemoryTree::new();
        let a = tree.create_element("a");
        let b = tree.create_element("b");
        let c = tree.create_text("c");
        tree.append_child(&a, &c).unwrap();

        assert!(matches!(
            tree.remove_child(&b, &c),
            Err(RenderError::NotAChild { .. })
        ));
        tree.remove_child(&a, &c).unwrap();
        assert_eq!(tree.parent(&c), None);
        assert!(tree.children(&a).is_empty());
    }

    #[test]
    fn replace_child_keeps_the_slot() {
        let mut tree = MemoryTree::new();
        let ul = tree.create_element("ul");
        let first = tree.create_text("1");
        let second = tree.create_text("2");
        let fresh = tree.create_text("new");
        tree.append_child(&ul, &first).unwrap();
        tree.append_child(&ul, &second).unwrap();

        tree.replace_child(&ul, &first, &fresh).unwrap();
        assert_eq!(tree.children(&ul), vec![fresh, second]);
        assert_eq!(tree.parent(&first), None);
        assert_eq!(tree.parent(&fresh), Some(ul));
    }

    #[test]
    fn appending_moves_an_attached_child() {
        let mut tree = MemoryTree::new();
        let from = tree.create_element("from");
        let to = tree.create_element("to");
        let child = tree.create_text("moved");
        tree.append_child(&from, &child).unwrap();
        tree.append_child(&to, &child).unwrap();

        assert!(tree.children(&from).is_empty());
        assert_eq!(tree.children(&to), vec![child]);
    }

    #[test]
    fn rejected_attributes_leave_the_node_unchanged() {
        let mut tree = MemoryTree::new();
        let a = tree.create_element("a");
        tree.reject_attribute("href");

        assert!(tree.set_attribute(&a, "href", "/").is_err());
        assert_eq!(tree.attribute(&a, "href"), None);
        assert_eq!(tree.mutation_count(), 0);
    }
}
