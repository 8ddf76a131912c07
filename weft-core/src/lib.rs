//! Weft Core
//!
//! This crate provides the core of the Weft reactive UI runtime. It
//! implements:
//!
//! - A dependency-tracking store over JSON data
//! - Subscribers that re-run when data they read changes
//! - Virtual node trees built from a parsed template
//! - A positional tree diff and a patch applier for live trees
//!
//! Markup parsing and the concrete display target stay outside the crate.
//! Templates arrive as an [`AstNode`](vdom::AstNode) tree and live trees are
//! driven through the [`Renderer`](patch::Renderer) trait.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: store, cells, subscribers, expressions and flush scheduling
//! - `vdom`: template AST, virtual nodes and tree construction
//! - `diff`: diff engine and patch sets
//! - `patch`: renderer capabilities, patch applier and an in-memory tree
//! - `mount`: the pipeline that ties them together
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use weft_core::{observe, AstNode, MemoryTree, Mount, RuntimeConfig};
//!
//! let store = observe(json!({ "user": { "name": "Ann" } }));
//! let ast = AstNode::element("p").child(AstNode::text("Hi {{user.name}}"));
//! let mount = Mount::new(&ast, &store, MemoryTree::new(), &RuntimeConfig::default())?;
//!
//! store.set("user.name", "Bo")?;
//! mount.flush()?;
//! // The live <p> now reads "Hi Bo", after a single diff/patch pass.
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod mount;
pub mod patch;
pub mod reactive;
pub mod vdom;

pub use config::{BindingMode, Delimiters, RuntimeConfig};
pub use diff::{diff, diff_attributes, PatchOp, PatchSet};
pub use error::{ConfigError, MountError, PatchError, ReactiveError, RenderError};
pub use mount::Mount;
pub use patch::{apply_patches, render, LiveId, MemoryTree, Renderer};
pub use reactive::{bind_subscriber, observe, Evaluator, Expression, Path, Store, Subscriber};
pub use vdom::{AstNode, VNode};
