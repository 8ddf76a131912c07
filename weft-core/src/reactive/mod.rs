//! Reactive Store
//!
//! This module implements dependency tracking over a JSON object graph:
//! cells, the store that owns them, and the subscribers that re-run when
//! cells they read change.
//!
//! # Concepts
//!
//! ## Cells
//!
//! Every field of every object in the store has exactly one [`Cell`]. A cell
//! remembers which subscribers read it. Nested objects are wrapped eagerly,
//! when the store is built and again whenever an object is written.
//!
//! ## Subscribers
//!
//! A [`Subscriber`] evaluates an [`Expression`] (a path or an interpolated
//! text template), caches the result and calls back when a re-evaluation
//! produces something different. One subscriber exists per binding site.
//!
//! ## Runtime
//!
//! Each store owns a [`Runtime`] that maps subscriber IDs back to live
//! subscribers and makes sure a single write updates each dependent once.
//!
//! ## Flush scheduling
//!
//! [`FlushScheduler`] coalesces the render requests made by subscriber
//! callbacks so a burst of writes costs one diff/patch pass.
//!
//! # Implementation Notes
//!
//! Dependency tracking is automatic: while a subscriber evaluates, it
//! occupies a thread-local [`ReactiveContext`] slot, and every cell read on
//! that thread registers it. The slot holds one subscriber at a time.

mod batch;
mod cell;
mod context;
mod expression;
mod runtime;
mod store;
mod subscriber;
mod value;

pub use batch::{BatchGuard, FlushScheduler};
pub use cell::{Cell, ObjectCells};
pub use context::ReactiveContext;
pub use expression::{Binding, Evaluator, Expression, Filter, FilterFn, Path, Segment};
pub use runtime::{Reactive, ReactiveHandle, Runtime};
pub use store::{observe, Store};
pub use subscriber::{bind_subscriber, Subscriber, SubscriberId};
pub use value::{display, is_plain_object, loosely_equal};
