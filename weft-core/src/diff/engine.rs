//! Diff Engine
//!
//! Compares two virtual trees and produces the [`PatchSet`] that turns the
//! old one into the new one.
//!
//! # Algorithm
//!
//! Both trees are walked together in pre-order. Every node of the *old* tree
//! gets the next traversal index, which is the same index the patch applier
//! assigns when it walks the live tree that the old tree describes. At each
//! position:
//!
//! 1. No new node: emit `Remove`.
//! 2. Two text nodes: emit `Text` if the text differs.
//! 3. Two elements with the same tag: emit `Attrs` for the attribute
//!    differences, then compare children pairwise by position.
//! 4. Anything else: emit `Replace` with the new node.
//!
//! A removed or replaced node is not descended into, but its descendants
//! still consume traversal indices so that later siblings keep the index the
//! applier will see.
//!
//! # Limitations
//!
//! Children are paired strictly by position. Extra old children are
//! removed; extra new children are **not** reported, so appending to a list
//! produces no patch for the appended nodes. Moving a child shifts every
//! later position and shows up as a chain of edits.

use smallvec::SmallVec;
use tracing::{instrument, trace};

use super::patch_set::{AttributeChanges, PatchOp, PatchOps, PatchSet};
use crate::vdom::{Attributes, VNode};

/// Compute the patches that turn `old` into `new`.
#[instrument(level = "debug", skip_all, fields(nodes = old.subtree_size()))]
pub fn diff(old: &VNode, new: &VNode) -> PatchSet {
    let mut walker = DiffWalker {
        next_index: 0,
        patches: PatchSet::new(),
    };
    walker.walk(old, Some(new), 0);
    trace!(patched = walker.patches.len(), "diff complete");
    walker.patches
}

/// Attribute differences between two elements.
///
/// Changed and added keys map to their new value. Keys only in `old` map to
/// `None`. Unchanged keys are absent.
pub fn diff_attributes(old: &Attributes, new: &Attributes) -> AttributeChanges {
    let mut changes = AttributeChanges::new();

    for (name, value) in old {
        match new.get(name) {
            Some(new_value) if new_value == value => {}
            new_value => {
                changes.insert(name.clone(), new_value.cloned());
            }
        }
    }
    for (name, value) in new {
        if !old.contains_key(name) {
            changes.insert(name.clone(), Some(value.clone()));
        }
    }

    changes
}

struct DiffWalker {
    /// Last traversal index handed out.
    next_index: usize,
    patches: PatchSet,
}

impl DiffWalker {
    fn walk(&mut self, old: &VNode, new: Option<&VNode>, index: usize) {
        let mut ops: PatchOps = SmallVec::new();

        match (old, new) {
            (_, None) => {
                trace!(index, "remove");
                ops.push(PatchOp::Remove);
                self.skip_descendants(old);
            }
            (VNode::Text(old_text), Some(VNode::Text(new_text))) => {
                if old_text != new_text {
                    trace!(index, "text");
                    ops.push(PatchOp::Text {
                        text: new_text.clone(),
                    });
                }
            }
            (VNode::Element(old_el), Some(VNode::Element(new_el))) if old_el.tag == new_el.tag => {
                let changes = diff_attributes(&old_el.attributes, &new_el.attributes);
                if !changes.is_empty() {
                    trace!(index, changed = changes.len(), "attrs");
                    ops.push(PatchOp::Attrs { changes });
                }
                for (position, child) in old_el.children.iter().enumerate() {
                    self.next_index += 1;
                    let child_index = self.next_index;
                    self.walk(child, new_el.children.get(position), child_index);
                }
            }
            (_, Some(new)) => {
                trace!(index, "replace");
                ops.push(PatchOp::Replace { node: new.clone() });
                self.skip_descendants(old);
            }
        }

        self.patches.insert(index, ops);
    }

    /// Consume the indices of `node`'s descendants without visiting them.
    fn skip_descendants(&mut self, node: &VNode) {
        self.next_index += node.subtree_size() - 1;
    }
}
