//! Patch Applier
//!
//! Replays a [`PatchSet`] against a live tree.
//!
//! The applier walks the live tree in the same pre-order the diff engine used
//! on the old virtual tree, handing out the same traversal indices. Each node
//! visits all of its children before its own operations run, so patches are
//! applied bottom-up: removing or replacing a node never happens before its
//! descendants and later siblings have been numbered. Children are listed
//! before the walk descends, which keeps the sibling list stable while a
//! child detaches itself.
//!
//! The walk stops early once no patched index is left ahead of it.

use tracing::{instrument, trace};

use super::renderer::{render, Renderer};
use crate::diff::{PatchOp, PatchSet};
use crate::error::{PatchError, RenderError};

/// Apply `patches` to the live tree rooted at `root`.
///
/// Stops at the first renderer error and reports it with the traversal index
/// it happened at. Operations applied before the error stay applied.
#[instrument(level = "debug", skip_all, fields(patched = patches.len()))]
pub fn apply_patches<R: Renderer>(
    renderer: &mut R,
    root: &R::Node,
    patches: &PatchSet,
) -> Result<(), PatchError> {
    if patches.is_empty() {
        return Ok(());
    }

    let mut applier = Applier {
        renderer,
        patches,
        next_index: 0,
    };
    applier.walk(root)
}

struct Applier<'a, R: Renderer> {
    renderer: &'a mut R,
    patches: &'a PatchSet,
    next_index: usize,
}

impl<R: Renderer> Applier<'_, R> {
    fn walk(&mut self, node: &R::Node) -> Result<(), PatchError> {
        let index = self.next_index;
        self.next_index += 1;

        if !self.patches.has_from(index) {
            return Ok(());
        }

        for child in self.renderer.children(node) {
            self.walk(&child)?;
        }

        if let Some(ops) = self.patches.get(index) {
            for op in ops {
                trace!(index, op = op.kind(), "applying patch");
                self.apply(node, op)
                    .map_err(|source| PatchError { index, source })?;
            }
        }
        Ok(())
    }

    fn apply(&mut self, node: &R::Node, op: &PatchOp) -> Result<(), RenderError> {
        match op {
            PatchOp::Attrs { changes } => {
                for (name, value) in changes {
                    match value {
                        Some(value) => self.renderer.set_attribute(node, name, value)?,
                        None => self.renderer.remove_attribute(node, name)?,
                    }
                }
                Ok(())
            }
            PatchOp::Text { text } => self.renderer.set_text(node, text),
            PatchOp::Remove => {
                let parent = self.parent_of(node)?;
                self.renderer.remove_child(&parent, node)
            }
            PatchOp::Replace { node: replacement } => {
                let parent = self.parent_of(node)?;
                let fresh = render(&mut *self.renderer, replacement)?;
                self.renderer.replace_child(&parent, node, &fresh)
            }
        }
    }

    fn parent_of(&self, node: &R::Node) -> Result<R::Node, RenderError> {
        self.renderer
            .parent(node)
            .ok_or_else(|| RenderError::Detached(format!("{node:?}")))
    }
}
