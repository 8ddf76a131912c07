//! Error Types
//!
//! Reads from the store never fail: a path that cannot be resolved yields
//! `None`. The errors below cover the places where the core has to report
//! something back to its caller instead of degrading silently.

use thiserror::Error;

use crate::reactive::SubscriberId;

/// Errors raised by the reactive store and subscribers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReactiveError {
    /// A subscriber started evaluating while another one was still active.
    ///
    /// Evaluation is flat: an expression may only read cells, it never
    /// constructs or evaluates another subscriber.
    #[error("subscriber {requested:?} cannot evaluate while {active:?} is evaluating")]
    ReentrantEvaluation {
        active: SubscriberId,
        requested: SubscriberId,
    },

    /// A write was attempted with an empty path.
    #[error("cannot write to an empty path")]
    EmptyPath,

    /// The write path has an empty segment.
    #[error("malformed path `{0}`")]
    InvalidPath(String),

    /// An intermediate key on the write path does not exist.
    #[error("cannot write `{path}`: `{missing}` does not exist")]
    MissingParent { path: String, missing: String },

    /// An intermediate value on the write path is not an object.
    #[error("cannot write `{path}`: `{segment}` is not an object")]
    NotAnObject { path: String, segment: String },
}

/// Errors reported by a [`Renderer`](crate::patch::Renderer).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The renderer refused an attribute or its value.
    #[error("attribute `{name}` rejected: {reason}")]
    AttributeRejected { name: String, reason: String },

    /// The node handle does not belong to this renderer.
    #[error("unknown node {0}")]
    UnknownNode(String),

    /// The node is not a child of the given parent.
    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: String, child: String },

    /// An element-only operation was applied to a text node.
    #[error("node {0} is not an element")]
    NotAnElement(String),

    /// A text-only operation was applied to an element.
    #[error("node {0} is not a text node")]
    NotText(String),

    /// The node has no parent to detach it from or replace it in.
    #[error("node {0} has no parent")]
    Detached(String),
}

/// A renderer failure while applying a patch set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("patch at traversal index {index} failed: {source}")]
pub struct PatchError {
    pub index: usize,
    #[source]
    pub source: RenderError,
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("interpolation delimiters must be non-empty (got `{open}` / `{close}`)")]
    InvalidDelimiters { open: String, close: String },
}

/// Errors surfaced by a [`Mount`](crate::mount::Mount).
#[derive(Debug, Error)]
pub enum MountError {
    #[error(transparent)]
    Reactive(#[from] ReactiveError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_error_reports_index_and_cause() {
        let err = PatchError {
            index: 4,
            source: RenderError::AttributeRejected {
                name: "onclick".into(),
                reason: "scripts disabled".into(),
            },
        };
        let message = err.to_string();
        assert!(message.contains("index 4"));
        assert!(message.contains("onclick"));
    }

    #[test]
    fn mount_error_is_transparent() {
        let err: MountError = ReactiveError::EmptyPath.into();
        assert_eq!(err.to_string(), "cannot write to an empty path");
    }
}
