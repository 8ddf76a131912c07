//! Flush Scheduler
//!
//! Subscriber callbacks run synchronously inside the write that triggered
//! them, so a burst of writes produces a burst of callbacks. Re-rendering on
//! every one of them would diff and patch the tree N times for N writes.
//!
//! The scheduler coalesces them instead:
//!
//! 1. A callback that changed the shadow tree calls [`FlushScheduler::request`].
//!    Only the first request after a flush arms the scheduler; later ones
//!    find it already dirty and return `false`.
//!
//! 2. The owner of the pipeline calls [`FlushScheduler::take`] at the end of
//!    its turn. If anything was requested it runs one diff/patch pass.
//!
//! 3. [`FlushScheduler::enter`] opens a batch. While any batch is open the
//!    turn has not ended, so the owner defers flushing until the outermost
//!    batch closes.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Dirty flag plus batch depth for one render pipeline.
#[derive(Debug, Default)]
pub struct FlushScheduler {
    dirty: AtomicBool,
    depth: AtomicUsize,
    requests: AtomicU64,
    flushes: AtomicU64,
}

impl FlushScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a flush. Returns `true` if this call armed the scheduler.
    pub fn request(&self) -> bool {
        self.requests.fetch_add(1, Ordering::Relaxed);
        !self.dirty.swap(true, Ordering::SeqCst)
    }

    /// Whether a flush is pending.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Claim the pending flush, clearing the dirty flag.
    ///
    /// Returns `false` if nothing was requested since the last claim.
    pub fn take(&self) -> bool {
        let was_dirty = self.dirty.swap(false, Ordering::SeqCst);
        if was_dirty {
            self.flushes.fetch_add(1, Ordering::Relaxed);
        }
        was_dirty
    }

    /// Open a batch. The batch closes when the guard is dropped.
    pub fn enter(&self) -> BatchGuard<'_> {
        let outermost = self.depth.fetch_add(1, Ordering::SeqCst) == 0;
        BatchGuard {
            scheduler: self,
            outermost,
        }
    }

    /// Whether a batch is currently open.
    pub fn in_batch(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }

    /// Total number of `request()` calls.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Total number of successful `take()` calls.
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }
}

/// An open batch.
#[derive(Debug)]
pub struct BatchGuard<'a> {
    scheduler: &'a FlushScheduler,
    outermost: bool,
}

impl BatchGuard<'_> {
    /// Whether closing this batch ends the turn.
    pub fn is_outermost(&self) -> bool {
        self.outermost
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.depth.fetch_sub(1, Ordering::SeqCst);
    }
}
