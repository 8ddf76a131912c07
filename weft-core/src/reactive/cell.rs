//! Reactive Cells
//!
//! A cell holds one stored value and tracks which subscribers have read it.
//!
//! # How Cells Work
//!
//! 1. When a cell is read during a subscriber's evaluation, the cell adds
//!    that subscriber to its dependents.
//!
//! 2. When a cell's value is replaced by an unequal value, the store asks
//!    the runtime to update every dependent.
//!
//! 3. Dependents are only ever added while the subscriber lives. A disposed
//!    subscriber removes itself from every cell it read.
//!
//! # Nested Objects
//!
//! A plain object is not stored as a value. It becomes an [`ObjectCells`]
//! table with one cell per field, built eagerly and recursively when the
//! object enters the store. Arrays and scalars are leaves: an array is
//! replaced as a whole, its elements are not individually reactive.
//!
//! Every object table also owns a `keys` cell. Reading a key the object does
//! not have registers the reader there, so inserting that key later
//! re-runs it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::context::ReactiveContext;
use super::value::{is_plain_object, loosely_equal};
use super::SubscriberId;

/// Counter for generating unique cell IDs.
static CELL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_cell_id() -> u64 {
    CELL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// What a cell currently holds.
pub(crate) enum Slot {
    Leaf(Value),
    Object(Arc<ObjectCells>),
}

/// A reactive slot for one stored value.
pub struct Cell {
    /// Unique identifier for this cell.
    id: u64,

    /// The current value.
    slot: RwLock<Slot>,

    /// Subscribers that read this cell, in first-read order.
    dependents: RwLock<IndexSet<SubscriberId>>,
}

impl Cell {
    /// Wrap a value, recursively turning plain objects into cell tables.
    pub(crate) fn wrap(value: Value) -> Arc<Self> {
        Arc::new(Self {
            id: next_cell_id(),
            slot: RwLock::new(Self::slot_for(value)),
            dependents: RwLock::new(IndexSet::new()),
        })
    }

    fn slot_for(value: Value) -> Slot {
        match value {
            Value::Object(map) => Slot::Object(ObjectCells::wrap(map)),
            other => Slot::Leaf(other),
        }
    }

    /// Get the cell's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Register the evaluating subscriber, if any, as a dependent.
    pub(crate) fn track(self: &Arc<Self>) {
        if let Some(subscriber_id) = ReactiveContext::current_subscriber() {
            self.dependents.write().insert(subscriber_id);
            ReactiveContext::track_dependency(self);
        }
    }

    /// The nested cell table, if this cell holds an object.
    pub(crate) fn object(&self) -> Option<Arc<ObjectCells>> {
        match &*self.slot.read() {
            Slot::Object(object) => Some(Arc::clone(object)),
            Slot::Leaf(_) => None,
        }
    }

    /// Get the current value without recording a dependency.
    ///
    /// Objects are materialized from their nested cells.
    pub fn get_untracked(&self) -> Value {
        match &*self.slot.read() {
            Slot::Leaf(value) => value.clone(),
            Slot::Object(object) => object.to_value(),
        }
    }

    /// Replace the value, returning whether it changed.
    ///
    /// Scalars compare loosely and are left untouched when equal. Objects and
    /// arrays always count as a change: the incoming value is a fresh
    /// identity, and an object is wrapped into new cells before it is
    /// installed.
    pub(crate) fn replace(&self, value: Value) -> bool {
        let fresh_identity = is_plain_object(&value) || value.is_array();
        if !fresh_identity {
            let current = self.get_untracked();
            if loosely_equal(Some(&current), Some(&value)) {
                return false;
            }
        }

        let slot = Self::slot_for(value);
        *self.slot.write() = slot;
        true
    }

    /// Snapshot of the dependents, in registration order.
    pub fn dependents(&self) -> Vec<SubscriberId> {
        self.dependents.read().iter().copied().collect()
    }

    /// Remove a subscriber from the dependents.
    pub(crate) fn remove_dependent(&self, subscriber_id: SubscriberId) {
        self.dependents.write().shift_remove(&subscriber_id);
    }

    /// Get the number of dependents.
    pub fn dependent_count(&self) -> usize {
        self.dependents.read().len()
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.id)
            .field("value", &self.get_untracked())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

/// The cells of one plain object, keyed by field name in insertion order.
pub struct ObjectCells {
    fields: RwLock<IndexMap<String, Arc<Cell>>>,

    /// Tracks readers that looked up a key this object did not have.
    keys: Arc<Cell>,
}

impl ObjectCells {
    pub(crate) fn wrap(map: Map<String, Value>) -> Arc<Self> {
        let fields = map
            .into_iter()
            .map(|(key, value)| (key, Cell::wrap(value)))
            .collect();
        Arc::new(Self {
            fields: RwLock::new(fields),
            keys: Cell::wrap(Value::Null),
        })
    }

    pub(crate) fn empty() -> Arc<Self> {
        Self::wrap(Map::new())
    }

    /// Look up the cell for `key`.
    pub fn field(&self, key: &str) -> Option<Arc<Cell>> {
        self.fields.read().get(key).cloned()
    }

    /// Install a cell for a key the object did not have.
    pub(crate) fn insert(&self, key: String, cell: Arc<Cell>) {
        self.fields.write().insert(key, cell);
    }

    /// The cell that records lookups of missing keys.
    pub(crate) fn keys(&self) -> &Arc<Cell> {
        &self.keys
    }

    /// Field names in insertion order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.read().keys().cloned().collect()
    }

    /// Materialize the object without recording dependencies.
    pub fn to_value(&self) -> Value {
        let fields: Vec<(String, Arc<Cell>)> = self
            .fields
            .read()
            .iter()
            .map(|(key, cell)| (key.clone(), Arc::clone(cell)))
            .collect();

        Value::Object(
            fields
                .into_iter()
                .map(|(key, cell)| (key, cell.get_untracked()))
                .collect(),
        )
    }
}

impl fmt::Debug for ObjectCells {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCells")
            .field("fields", &self.field_names())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
