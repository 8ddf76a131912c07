//! Evaluation Context
//!
//! The evaluation context records which subscriber is currently evaluating,
//! so that cells read during the evaluation can register it as a dependent.
//!
//! # Implementation
//!
//! The context is a thread-local slot that holds at most one entry. A
//! subscriber enters the context for exactly one evaluation and the returned
//! guard clears the slot when dropped, even if the evaluation panics.
//!
//! Evaluation is flat: expressions read cells and concatenate text, they
//! never evaluate another subscriber. Entering the context while it is
//! already occupied is therefore a bug in the caller and is reported as
//! [`ReactiveError::ReentrantEvaluation`] instead of silently nesting.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use super::cell::Cell;
use super::SubscriberId;
use crate::error::ReactiveError;

thread_local! {
    static CURRENT: RefCell<Option<ContextEntry>> = const { RefCell::new(None) };
}

/// The evaluation in progress on this thread.
struct ContextEntry {
    subscriber_id: SubscriberId,
    /// Cells read so far, in read order.
    dependencies: Vec<Weak<Cell>>,
}

/// Guard for one evaluation. Clears the context when dropped.
#[derive(Debug)]
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
}

impl ReactiveContext {
    /// Enter the evaluation context for `subscriber_id`.
    pub fn enter(subscriber_id: SubscriberId) -> Result<Self, ReactiveError> {
        CURRENT.with(|slot| {
            let mut slot = slot.borrow_mut();
            if let Some(active) = slot.as_ref() {
                return Err(ReactiveError::ReentrantEvaluation {
                    active: active.subscriber_id,
                    requested: subscriber_id,
                });
            }
            *slot = Some(ContextEntry {
                subscriber_id,
                dependencies: Vec::new(),
            });
            Ok(Self { subscriber_id })
        })
    }

    /// Check if a subscriber is currently evaluating.
    pub fn is_active() -> bool {
        CURRENT.with(|slot| slot.borrow().is_some())
    }

    /// Get the evaluating subscriber, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CURRENT.with(|slot| slot.borrow().as_ref().map(|entry| entry.subscriber_id))
    }

    /// Record that the current evaluation read `cell`.
    ///
    /// Called by cells when they are read. Does nothing outside an evaluation.
    pub(crate) fn track_dependency(cell: &Arc<Cell>) {
        CURRENT.with(|slot| {
            if let Some(entry) = slot.borrow_mut().as_mut() {
                entry.dependencies.push(Arc::downgrade(cell));
            }
        });
    }

    /// Take the cells read so far, leaving the list empty.
    pub(crate) fn take_dependencies(&self) -> Vec<Weak<Cell>> {
        CURRENT.with(|slot| {
            slot.borrow_mut()
                .as_mut()
                .map(|entry| std::mem::take(&mut entry.dependencies))
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CURRENT.with(|slot| {
            let popped = slot.borrow_mut().take();
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
        });
    }
}
