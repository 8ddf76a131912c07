//! Subscriber Runtime
//!
//! The runtime connects cells to the subscribers that depend on them. Cells
//! only remember subscriber IDs; the runtime maps those IDs back to live
//! subscribers and drives their updates when a write changes a cell.
//!
//! # How It Works
//!
//! 1. A subscriber registers with the runtime of the store it reads from
//!    and keeps the returned [`ReactiveHandle`] alive.
//!
//! 2. A store write collects the dependents of every cell it changed.
//!
//! 3. The runtime de-duplicates those IDs, resolves them to subscribers and
//!    calls [`Reactive::update`] once on each, in first-dependent order.
//!
//! The registry holds weak references, so a subscriber that has been dropped
//! is skipped even if a cell still lists its ID.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use indexmap::IndexSet;
use tracing::trace;

use super::subscriber::SubscriberId;

/// A computation the runtime can re-run when its dependencies change.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Re-evaluate after a dependency changed.
    fn update(&self);
}

/// Handle to a registered reactive computation.
///
/// Dropping this handle unregisters the computation from the runtime.
#[derive(Debug)]
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
    runtime: Weak<Runtime>,
}

impl ReactiveHandle {
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.unregister(self.subscriber_id);
        }
    }
}

/// Registry of the subscribers attached to one store.
#[derive(Default)]
pub struct Runtime {
    registry: DashMap<SubscriberId, Weak<dyn Reactive>>,

    /// Number of `update()` calls dispatched so far.
    dispatched: AtomicU64,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reactive computation.
    ///
    /// Returns a handle that unregisters the computation when dropped.
    pub fn register(self: &Arc<Self>, reactive: &Arc<dyn Reactive>) -> ReactiveHandle {
        let subscriber_id = reactive.subscriber_id();
        self.registry.insert(subscriber_id, Arc::downgrade(reactive));

        ReactiveHandle {
            subscriber_id,
            runtime: Arc::downgrade(self),
        }
    }

    fn unregister(&self, subscriber_id: SubscriberId) {
        self.registry.remove(&subscriber_id);
    }

    /// Update every subscriber in `ids` exactly once.
    ///
    /// Returns how many subscribers were updated.
    pub fn notify<I>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = SubscriberId>,
    {
        let unique: IndexSet<SubscriberId> = ids.into_iter().collect();
        if unique.is_empty() {
            return 0;
        }

        // Resolve before running anything: an update may register or drop
        // subscribers, which needs the registry shards unlocked.
        let targets: Vec<Arc<dyn Reactive>> = unique
            .iter()
            .filter_map(|id| self.registry.get(id).and_then(|weak| weak.upgrade()))
            .collect();

        for target in &targets {
            trace!(subscriber = ?target.subscriber_id(), "updating subscriber");
            target.update();
        }

        self.dispatched
            .fetch_add(targets.len() as u64, Ordering::Relaxed);
        targets.len()
    }

    /// Get the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Check whether a subscriber is registered.
    pub fn is_registered(&self, subscriber_id: SubscriberId) -> bool {
        self.registry.contains_key(&subscriber_id)
    }

    /// Total number of updates dispatched by this runtime.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("subscriber_count", &self.subscriber_count())
            .field("dispatched", &self.dispatched())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    struct MockReactive {
        id: SubscriberId,
        updates: AtomicI32,
    }

    impl MockReactive {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: SubscriberId::new(),
                updates: AtomicI32::new(0),
            })
        }
    }

    impl Reactive for MockReactive {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn update(&self) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn runtime_registers_and_unregisters() {
        let runtime = Arc::new(Runtime::new());
        let reactive = MockReactive::new();
        let id = reactive.id;

        let as_dyn: Arc<dyn Reactive> = reactive;
        let handle = runtime.register(&as_dyn);
        assert!(runtime.is_registered(id));

        drop(handle);
        assert!(!runtime.is_registered(id));
        assert_eq!(runtime.subscriber_count(), 0);
    }

    #[test]
    fn runtime_updates_each_subscriber_once() {
        let runtime = Arc::new(Runtime::new());
        let first = MockReactive::new();
        let second = MockReactive::new();

        let first_dyn: Arc<dyn Reactive> = first.clone();
        let second_dyn: Arc<dyn Reactive> = second.clone();
        let _h1 = runtime.register(&first_dyn);
        let _h2 = runtime.register(&second_dyn);

        let updated = runtime.notify([first.id, second.id, first.id, first.id]);

        assert_eq!(updated, 2);
        assert_eq!(first.updates.load(Ordering::SeqCst), 1);
        assert_eq!(second.updates.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.dispatched(), 2);
    }

    #[test]
    fn dropped_subscribers_are_skipped() {
        let runtime = Arc::new(Runtime::new());
        let reactive = MockReactive::new();
        let id = reactive.id;

        let as_dyn: Arc<dyn Reactive> = reactive;
        let _handle = runtime.register(&as_dyn);
        drop(as_dyn);

        assert_eq!(runtime.notify([id]), 0);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let runtime = Runtime::new();
        assert_eq!(runtime.notify([SubscriberId::new()]), 0);
        assert_eq!(runtime.notify(Vec::new()), 0);
    }
}
