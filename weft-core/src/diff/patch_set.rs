//! Patch Sets
//!
//! A patch set maps traversal indices of the *old* tree to the operations
//! that turn that node into its new form. An index that is absent means the
//! node is unchanged. Indices are kept sorted.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::vdom::VNode;

/// Attribute changes for one element: `Some(value)` sets, `None` removes.
pub type AttributeChanges = IndexMap<String, Option<String>>;

/// Operations for one node. Almost always a single one.
pub type PatchOps = SmallVec<[PatchOp; 2]>;

/// One edit to a live node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    /// Set or remove attributes on an element.
    Attrs { changes: AttributeChanges },

    /// Replace the content of a text node.
    Text { text: String },

    /// Detach the node from its parent.
    Remove,

    /// Substitute a freshly built node.
    Replace { node: VNode },
}

impl PatchOp {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Attrs { .. } => "attrs",
            Self::Text { .. } => "text",
            Self::Remove => "remove",
            Self::Replace { .. } => "replace",
        }
    }
}

/// Operations keyed by traversal index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatchSet {
    entries: BTreeMap<usize, PatchOps>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the operations for `index`. Empty lists are not stored.
    pub fn insert(&mut self, index: usize, ops: PatchOps) {
        if !ops.is_empty() {
            self.entries.insert(index, ops);
        }
    }

    pub fn get(&self, index: usize) -> Option<&[PatchOp]> {
        self.entries.get(&index).map(|ops| ops.as_slice())
    }

    pub fn contains(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    /// Number of patched nodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of operations across all nodes.
    pub fn op_count(&self) -> usize {
        self.entries.values().map(|ops| ops.len()).sum()
    }

    /// Patched indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[PatchOp])> + '_ {
        self.entries
            .iter()
            .map(|(index, ops)| (*index, ops.as_slice()))
    }

    /// Whether any index at or after `index` is patched.
    pub fn has_from(&self, index: usize) -> bool {
        self.entries.range(index..).next().is_some()
    }

    /// Encode as MessagePack, e.g. to ship to a remote renderer.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}
