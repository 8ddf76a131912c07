//! Renderer Capabilities
//!
//! The core never owns a live tree. It drives one through [`Renderer`], a
//! small set of primitives any target can implement: a browser DOM through
//! bindings, a terminal widget tree, or the in-memory [`MemoryTree`].
//!
//! [`MemoryTree`]: super::MemoryTree

use std::fmt::Debug;

use crate::error::RenderError;
use crate::vdom::VNode;

/// The operations the core uses on a live tree.
///
/// Node handles are cheap to clone and compare; they identify a node, they do
/// not own it.
pub trait Renderer {
    type Node: Clone + PartialEq + Debug;

    fn create_element(&mut self, tag: &str) -> Self::Node;

    fn create_text(&mut self, content: &str) -> Self::Node;

    /// Set an attribute. A renderer may refuse a name or value with
    /// [`RenderError::AttributeRejected`].
    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str)
        -> Result<(), RenderError>;

    fn remove_attribute(&mut self, node: &Self::Node, name: &str) -> Result<(), RenderError>;

    /// Replace the content of a text node.
    fn set_text(&mut self, node: &Self::Node, content: &str) -> Result<(), RenderError>;

    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node)
        -> Result<(), RenderError>;

    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node)
        -> Result<(), RenderError>;

    fn replace_child(
        &mut self,
        parent: &Self::Node,
        old_child: &Self::Node,
        new_child: &Self::Node,
    ) -> Result<(), RenderError>;

    /// The current children of `node`, in order.
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// The parent of `node`, if it is attached.
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
}

/// Build a live subtree for `node`.
pub fn render<R: Renderer>(renderer: &mut R, node: &VNode) -> Result<R::Node, RenderError> {
    match node {
        VNode::Text(text) => Ok(renderer.create_text(text)),
        VNode::Element(element) => {
            let live = renderer.create_element(&element.tag);
            for (name, value) in &element.attributes {
                renderer.set_attribute(&live, name, value)?;
            }
            for child in &element.children {
                let child = render(renderer, child)?;
                renderer.append_child(&live, &child)?;
            }
            Ok(live)
        }
    }
}
