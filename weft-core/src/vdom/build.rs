//! Tree Construction
//!
//! Turns a template AST into a virtual tree plus the list of binding sites
//! found in it. The tree has the same shape as the AST: elements stay
//! elements, text stays text. Bound parts start out empty and are filled in
//! by the subscriber created for each site.
//!
//! A binding site is one of:
//!
//! - a text node containing at least one interpolation (`Hi {{ name }}`);
//! - an attribute whose name carries a bind prefix (`:title="user.name"`),
//!   rendered under the stripped name;
//! - a model attribute (`v-model="form.email"`), rendered as `value` and
//!   also writable back into the store.

use serde_json::Value;

use super::ast::AstNode;
use super::node::{Element, VNode};
use crate::config::RuntimeConfig;
use crate::reactive::{display, Evaluator, Expression, Path};

/// The attribute a model binding renders as.
pub const MODEL_TARGET: &str = "value";

/// What a binding site updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteKind {
    /// The text of a text node.
    Text,

    /// An attribute of an element.
    Attribute { name: String },

    /// The `value` attribute of an element, bound two ways to `path`.
    Model { path: Path },
}

/// A place in the tree whose content comes from the store.
#[derive(Debug, Clone)]
pub struct BindingSite {
    /// Child path of the node the site belongs to.
    pub node_path: Vec<usize>,
    pub kind: SiteKind,
    pub expression: Expression,
}

impl BindingSite {
    /// The attribute name this site writes, if it is an attribute site.
    pub fn attribute(&self) -> Option<&str> {
        match &self.kind {
            SiteKind::Text => None,
            SiteKind::Attribute { name } => Some(name),
            SiteKind::Model { .. } => Some(MODEL_TARGET),
        }
    }

    /// Write a subscriber value into `tree` at this site.
    ///
    /// Text renders undefined as empty text. An attribute bound to undefined
    /// is removed from the element. Returns `false` if the node is missing or
    /// of the wrong kind.
    pub fn apply_to(&self, tree: &mut VNode, value: Option<&Value>) -> bool {
        let Some(node) = tree.node_at_mut(&self.node_path) else {
            return false;
        };
        match self.attribute() {
            None => node.set_text(display(value)),
            Some(name) => node.set_attribute(name, value.map(|value| display(Some(value)))),
        }
    }
}

/// A virtual tree with its binding sites, before any value is bound.
#[derive(Debug, Clone)]
pub struct Blueprint {
    pub tree: VNode,
    pub sites: Vec<BindingSite>,
}

/// Build a blueprint from `ast`.
pub fn build(ast: &AstNode, evaluator: &Evaluator, config: &RuntimeConfig) -> Blueprint {
    let mut sites = Vec::new();
    let mut path = Vec::new();
    let tree = build_node(ast, evaluator, config, &mut path, &mut sites);
    Blueprint { tree, sites }
}

fn build_node(
    ast: &AstNode,
    evaluator: &Evaluator,
    config: &RuntimeConfig,
    path: &mut Vec<usize>,
    sites: &mut Vec<BindingSite>,
) -> VNode {
    match ast {
        AstNode::Text { raw } => match evaluator.parse_text(raw) {
            Some(expression) => {
                sites.push(BindingSite {
                    node_path: path.clone(),
                    kind: SiteKind::Text,
                    expression,
                });
                VNode::Text(String::new())
            }
            None => VNode::Text(raw.clone()),
        },
        AstNode::Element {
            tag,
            attributes,
            children,
        } => {
            let mut element = Element::new(tag.clone());

            for (name, raw) in attributes {
                if *name == config.model_attribute {
                    let binding = evaluator.parse_binding(raw);
                    sites.push(BindingSite {
                        node_path: path.clone(),
                        kind: SiteKind::Model {
                            path: binding.path().clone(),
                        },
                        expression: Expression::Binding(binding),
                    });
                    // Placeholder keeps the attribute in source order.
                    element
                        .attributes
                        .insert(MODEL_TARGET.to_string(), String::new());
                } else if let Some(bound) = config.bound_attribute(name) {
                    sites.push(BindingSite {
                        node_path: path.clone(),
                        kind: SiteKind::Attribute {
                            name: bound.to_string(),
                        },
                        expression: Expression::Binding(evaluator.parse_binding(raw)),
                    });
                    element.attributes.insert(bound.to_string(), String::new());
                } else {
                    element.attributes.insert(name.clone(), raw.clone());
                }
            }

            for (index, child) in children.iter().enumerate() {
                path.push(index);
                let node = build_node(child, evaluator, config, path, sites);
                path.pop();
                element.children.push(node);
            }

            VNode::Element(element)
        }
    }
}
