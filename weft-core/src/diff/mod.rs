//! Tree Diffing
//!
//! - `engine`: compares an old and a new virtual tree
//! - `patch_set`: the resulting edit script, keyed by traversal index
//!
//! The traversal index is the only link between a diff and the live tree it
//! is applied to. It must be computed over the tree the live nodes were
//! rendered from, which is why the diff always indexes the *old* tree.

mod engine;
mod patch_set;

pub use engine::{diff, diff_attributes};
pub use patch_set::{AttributeChanges, PatchOp, PatchOps, PatchSet};
