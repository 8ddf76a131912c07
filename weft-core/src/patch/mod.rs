//! Live Tree Patching
//!
//! - `renderer`: the primitives the core needs from a live tree
//! - `apply`: replays a patch set against a live tree
//! - `memory`: an in-memory renderer

mod apply;
mod memory;
mod renderer;

pub use apply::apply_patches;
pub use memory::{LiveId, MemoryTree};
pub use renderer::{render, Renderer};
