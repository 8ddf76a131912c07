//! Subscribers
//!
//! A subscriber (watcher) evaluates one expression against a store, caches
//! the result, and calls its `on_change` callback whenever a later
//! re-evaluation produces a different value.
//!
//! # How Subscribers Work
//!
//! 1. On construction the subscriber enters the evaluation context,
//!    evaluates its expression, and leaves the context. Every cell read on
//!    the way records the subscriber as a dependent.
//!
//! 2. When one of those cells changes, the store's runtime calls
//!    [`Reactive::update`]. The subscriber re-evaluates (picking up any new
//!    cells, e.g. after a nested object was replaced) and compares against
//!    the cached value.
//!
//! 3. If the value differs, the cache is updated and `on_change` runs with
//!    the new value. No lock is held while the callback runs, so it may
//!    write to the store again.
//!
//! Dropping a subscriber disposes it: it leaves every cell it read and the
//! runtime's registry.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, warn};

use super::cell::Cell;
use super::context::ReactiveContext;
use super::expression::Expression;
use super::runtime::{Reactive, ReactiveHandle};
use super::store::Store;
use super::value::loosely_equal;
use crate::error::ReactiveError;

/// Unique identifier for a subscriber.
///
/// Cells store these IDs rather than the subscribers themselves; the
/// store's runtime maps them back when it dispatches updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Callback invoked with a subscriber's new value.
type OnChange = Box<dyn Fn(Option<&Value>) + Send + Sync>;

/// Create a subscriber over `expression`. See [`Subscriber::new`].
pub fn bind_subscriber<F>(
    store: &Store,
    expression: Expression,
    on_change: F,
) -> Result<Subscriber, ReactiveError>
where
    F: Fn(Option<&Value>) + Send + Sync + 'static,
{
    Subscriber::new(store, expression, on_change)
}

/// The shared state of a subscriber, registered with the runtime.
struct Watcher {
    id: SubscriberId,
    store: Store,
    expression: Expression,

    /// Last evaluated value; `None` is undefined.
    cached: RwLock<Option<Value>>,

    on_change: OnChange,

    /// Cells this subscriber has been registered with, without duplicates.
    dependencies: Mutex<Vec<Weak<Cell>>>,

    disposed: AtomicBool,
    updates: AtomicUsize,
    changes: AtomicUsize,
}

impl Watcher {
    fn evaluate(&self) -> Result<Option<Value>, ReactiveError> {
        let ctx = ReactiveContext::enter(self.id)?;
        let value = self.expression.evaluate(&self.store);
        let read = ctx.take_dependencies();
        drop(ctx);

        // Cells of replaced objects are gone; forget them.
        let mut known = self.dependencies.lock();
        known.retain(|existing| existing.strong_count() > 0);
        for cell in read {
            if !known.iter().any(|existing| Weak::ptr_eq(existing, &cell)) {
                known.push(cell);
            }
        }

        Ok(value)
    }

    fn run_update(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        self.updates.fetch_add(1, Ordering::SeqCst);

        let value = match self.evaluate() {
            Ok(value) => value,
            Err(err) => {
                warn!(subscriber = ?self.id, %err, "skipping subscriber update");
                return;
            }
        };

        let changed = {
            let mut cached = self.cached.write();
            if loosely_equal(cached.as_ref(), value.as_ref()) {
                false
            } else {
                cached.clone_from(&value);
                true
            }
        };

        if changed {
            self.changes.fetch_add(1, Ordering::SeqCst);
            debug!(subscriber = ?self.id, value = ?value, "subscriber value changed");
            (self.on_change)(value.as_ref());
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let dependencies = std::mem::take(&mut *self.dependencies.lock());
        for cell in dependencies.iter().filter_map(Weak::upgrade) {
            cell.remove_dependent(self.id);
        }
    }
}

impl Reactive for Watcher {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn update(&self) {
        self.run_update();
    }
}

/// A computation over the store that reacts to changes of what it read.
///
/// # Example
///
/// ```rust,ignore
/// let store = observe(json!({ "user": { "name": "Ann" } }));
/// let greeting = Subscriber::new(&store, evaluator.parse_text("Hi {{user.name}}").unwrap(), |text| {
///     println!("{:?}", text);
/// })?;
/// assert_eq!(greeting.value(), Some(json!("Hi Ann")));
///
/// store.set("user.name", "Bo")?;   // prints Some(String("Hi Bo"))
/// ```
pub struct Subscriber {
    watcher: Arc<Watcher>,
    _handle: ReactiveHandle,
}

impl Subscriber {
    /// Evaluate `expression` once, record its dependencies and start
    /// listening for changes.
    ///
    /// Fails only if called while another subscriber is evaluating.
    pub fn new<F>(store: &Store, expression: Expression, on_change: F) -> Result<Self, ReactiveError>
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        let watcher = Arc::new(Watcher {
            id: SubscriberId::new(),
            store: store.clone(),
            expression,
            cached: RwLock::new(None),
            on_change: Box::new(on_change),
            dependencies: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            updates: AtomicUsize::new(0),
            changes: AtomicUsize::new(0),
        });

        let initial = watcher.evaluate()?;
        *watcher.cached.write() = initial;

        let reactive: Arc<dyn Reactive> = watcher.clone();
        let handle = store.runtime().register(&reactive);

        Ok(Self {
            watcher,
            _handle: handle,
        })
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.watcher.id
    }

    /// The cached value from the last evaluation.
    pub fn value(&self) -> Option<Value> {
        self.watcher.cached.read().clone()
    }

    pub fn expression(&self) -> &Expression {
        &self.watcher.expression
    }

    /// Re-evaluate now, calling `on_change` if the value differs.
    pub fn update(&self) {
        self.watcher.run_update();
    }

    /// Stop reacting. The subscriber leaves every cell it depended on.
    pub fn dispose(&self) {
        self.watcher.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.watcher.disposed.load(Ordering::SeqCst)
    }

    /// Number of times `update()` ran (by notification or by hand).
    pub fn update_count(&self) -> usize {
        self.watcher.updates.load(Ordering::SeqCst)
    }

    /// Number of times `on_change` was called.
    pub fn change_count(&self) -> usize {
        self.watcher.changes.load(Ordering::SeqCst)
    }

    /// Number of distinct cells this subscriber depends on.
    pub fn dependency_count(&self) -> usize {
        self.watcher.dependencies.lock().len()
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.watcher.dispose();
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id())
            .field("value", &self.value())
            .field("update_count", &self.update_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{observe, Evaluator};
    use serde_json::json;
    use std::sync::atomic::AtomicI32;

    fn counter() -> (Arc<AtomicI32>, impl Fn(Option<&Value>) + Send + Sync + 'static) {
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        (count, move |_: Option<&Value>| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn evaluates_on_creation() {
        let store = observe(json!({"user": {"name": "Ann"}}));
        let (calls, on_change) = counter();

        let subscriber = Subscriber::new(&store, Expression::path("user.name"), on_change).unwrap();

        assert_eq!(subscriber.value(), Some(json!("Ann")));
        assert_eq!(subscriber.dependency_count(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn write_triggers_on_change_with_new_value() {
        let store = observe(json!({"user": {"name": "Ann"}}));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let subscriber = Subscriber::new(&store, Expression::path("user.name"), move |value| {
            seen_clone.lock().push(value.cloned());
        })
        .unwrap();

        store.set("user.name", "Bo").unwrap();

        assert_eq!(subscriber.value(), Some(json!("Bo")));
        assert_eq!(*seen.lock(), vec![Some(json!("Bo"))]);
    }

    #[test]
    fn unchanged_value_does_not_call_back() {
        let store = observe(json!({"a": 1, "b": 2}));
        let (calls, on_change) = counter();
        let evaluator = Evaluator::default();
        let expression = evaluator.parse_text("{{a}}-{{b}}").unwrap();

        let subscriber = Subscriber::new(&store, expression, on_change).unwrap();
        subscriber.update();

        assert_eq!(subscriber.update_count(), 1);
        assert_eq!(subscriber.change_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn one_write_updates_each_subscriber_once() {
        let store = observe(json!({"user": {"name": "Ann", "age": 3}}));
        let (calls, on_change) = counter();

        let subscriber = Subscriber::new(&store, Expression::path("user"), on_change).unwrap();
        store
            .set("user", json!({"name": "Bo", "age": 4, "pet": {"kind": "cat"}}))
            .unwrap();

        assert_eq!(subscriber.update_count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn template_reading_two_cells_updates_once_per_write() {
        let store = observe(json!({"user": {"first": "Ann", "last": "Lee"}}));
        let (calls, on_change) = counter();
        let expression = Evaluator::default()
            .parse_text("{{user.first}} {{user.last}}")
            .unwrap();

        let subscriber = Subscriber::new(&store, expression, on_change).unwrap();
        store.set("user.last", "Ng").unwrap();

        assert_eq!(subscriber.value(), Some(json!("Ann Ng")));
        assert_eq!(subscriber.update_count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn replaced_objects_are_tracked_after_update() {
        let store = observe(json!({"user": {"name": "Ann"}}));
        let (calls, on_change) = counter();

        let subscriber = Subscriber::new(&store, Expression::path("user.name"), on_change).unwrap();
        store.set("user", json!({"name": "Bo"})).unwrap();
        assert_eq!(subscriber.value(), Some(json!("Bo")));

        // The new `name` cell now lists the subscriber too.
        store.set("user.name", "Cy").unwrap();
        assert_eq!(subscriber.value(), Some(json!("Cy")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_key_becomes_reactive_once_inserted() {
        let store = observe(json!({"user": {}}));
        let (calls, on_change) = counter();

        let subscriber = Subscriber::new(&store, Expression::path("user.age"), on_change).unwrap();
        assert_eq!(subscriber.value(), None);

        store.set("user.age", 30).unwrap();
        assert_eq!(subscriber.value(), Some(json!(30)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disposed_subscriber_leaves_its_cells() {
        let store = observe(json!({"count": 0}));
        let (calls, on_change) = counter();

        let subscriber = Subscriber::new(&store, Expression::path("count"), on_change).unwrap();
        assert_eq!(store.dependents("count"), vec![subscriber.id()]);

        subscriber.dispose();
        assert!(subscriber.is_disposed());
        assert!(store.dependents("count").is_empty());

        store.set("count", 1).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropped_subscriber_unregisters() {
        let store = observe(json!({"count": 0}));
        let subscriber = Subscriber::new(&store, Expression::path("count"), |_| {}).unwrap();
        let id = subscriber.id();
        assert!(store.runtime().is_registered(id));

        drop(subscriber);
        assert!(!store.runtime().is_registered(id));
        assert!(store.dependents("count").is_empty());
    }

    #[test]
    fn creation_inside_an_evaluation_is_rejected() {
        let store = observe(json!({"count": 0}));
        let _ctx = ReactiveContext::enter(SubscriberId::new()).unwrap();

        let result = Subscriber::new(&store, Expression::path("count"), |_| {});
        assert!(matches!(
            result,
            Err(ReactiveError::ReentrantEvaluation { .. })
        ));
    }

    #[test]
    fn callbacks_may_write_back() {
        let store = observe(json!({"source": 1, "mirror": 1}));
        let writer = store.clone();

        let _copy = Subscriber::new(&store, Expression::path("source"), move |value| {
            writer
                .write(&"mirror".into(), value.cloned().unwrap_or_default())
                .unwrap();
        })
        .unwrap();

        store.set("source", 5).unwrap();
        assert_eq!(store.get("mirror"), Some(json!(5)));
    }

    #[test]
    fn replaced_objects_do_not_accumulate_dependencies() {
        let store = observe(json!({"user": {"name": "Ann"}}));
        let subscriber = Subscriber::new(&store, Expression::path("user.name"), |_| {}).unwrap();
        assert_eq!(subscriber.dependency_count(), 2);

        for i in 0..100 {
            store.set("user", json!({ "name": format!("user {i}") })).unwrap();
        }

        assert_eq!(subscriber.value(), Some(json!("user 99")));
        assert_eq!(subscriber.dependency_count(), 2);
    }
}
