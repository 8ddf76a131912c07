//! Virtual Node Trees
//!
//! This module holds the data model the diff engine works on and the step
//! that produces it from a parsed template.
//!
//! - `ast`: the template tree handed over by the (external) markup parser
//! - `node`: immutable virtual nodes and their addressing helpers
//! - `build`: AST to virtual tree, collecting the binding sites

mod ast;
mod build;
mod node;

pub use ast::AstNode;
pub use build::{build, BindingSite, Blueprint, SiteKind, MODEL_TARGET};
pub use node::{Attributes, Element, VNode};
