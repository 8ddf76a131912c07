//! Reactive Store
//!
//! The store turns a JSON object graph into cells, one per field, recursively
//! through nested objects. Reads resolve dotted paths and record every cell
//! they traverse as a dependency of the evaluating subscriber. Writes replace
//! one cell's value and update its dependents synchronously, each of them
//! exactly once.
//!
//! ```rust,ignore
//! let store = observe(json!({ "user": { "name": "Ann" } }));
//! assert_eq!(store.get("user.name"), Some(json!("Ann")));
//! store.set("user.name", "Bo")?;
//! ```

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::cell::{Cell, ObjectCells};
use super::expression::Path;
use super::runtime::Runtime;
use super::SubscriberId;
use crate::error::ReactiveError;

/// Wrap `root` into a reactive store.
///
/// The root should be a JSON object. Any other value yields an empty store.
pub fn observe(root: Value) -> Store {
    Store::new(root)
}

/// A reactive object graph. Cloning shares the same cells.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    root: Arc<ObjectCells>,
    runtime: Arc<Runtime>,
}

impl Store {
    pub fn new(root: Value) -> Self {
        let root = match root {
            Value::Object(map) => ObjectCells::wrap(map),
            other => {
                warn!(root = %other, "store root is not an object; starting empty");
                ObjectCells::empty()
            }
        };

        Self {
            inner: Arc::new(StoreInner {
                root,
                runtime: Arc::new(Runtime::new()),
            }),
        }
    }

    /// The subscriber runtime attached to this store.
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.inner.runtime
    }

    /// Resolve `path`, recording each traversed cell as a dependency.
    ///
    /// Returns `None` when any segment is missing, when a segment passes
    /// through a non-object value, or when the path is malformed.
    pub fn read(&self, path: &Path) -> Option<Value> {
        if !path.is_valid() {
            return None;
        }

        let mut object = Arc::clone(&self.inner.root);
        let mut segments = path.segments().iter().peekable();

        while let Some(segment) = segments.next() {
            let Some(cell) = object.field(segment) else {
                object.keys().track();
                return None;
            };
            cell.track();

            if segments.peek().is_none() {
                return Some(cell.get_untracked());
            }
            object = cell.object()?;
        }

        None
    }

    /// Dotted-path form of [`read`](Self::read).
    pub fn get(&self, path: &str) -> Option<Value> {
        self.read(&Path::parse(path))
    }

    /// Write `value` at `path` and update dependents.
    ///
    /// Returns whether the stored value changed. Writing a key the parent
    /// object does not have installs a new cell and updates subscribers that
    /// looked for that key. Intermediate keys must already exist.
    pub fn write(&self, path: &Path, value: Value) -> Result<bool, ReactiveError> {
        let segments = path.segments();
        let Some((last, parents)) = segments.split_last() else {
            return Err(ReactiveError::EmptyPath);
        };
        if !path.is_valid() {
            return Err(ReactiveError::InvalidPath(path.to_string()));
        }

        let mut object = Arc::clone(&self.inner.root);
        for (depth, segment) in parents.iter().enumerate() {
            let prefix = || segments[..=depth].join(".");
            let cell = object
                .field(segment)
                .ok_or_else(|| ReactiveError::MissingParent {
                    path: path.to_string(),
                    missing: prefix(),
                })?;
            object = cell.object().ok_or_else(|| ReactiveError::NotAnObject {
                path: path.to_string(),
                segment: prefix(),
            })?;
        }

        let dependents = match object.field(last) {
            Some(cell) => {
                if !cell.replace(value) {
                    return Ok(false);
                }
                cell.dependents()
            }
            None => {
                object.insert(last.clone(), Cell::wrap(value));
                object.keys().dependents()
            }
        };

        debug!(path = %path, dependents = dependents.len(), "store write");
        self.inner.runtime.notify(dependents);
        Ok(true)
    }

    /// Dotted-path form of [`write`](Self::write).
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<bool, ReactiveError> {
        self.write(&Path::parse(path), value.into())
    }

    /// Look up the cell at `path` without recording a dependency.
    pub fn cell(&self, path: &Path) -> Option<Arc<Cell>> {
        if !path.is_valid() {
            return None;
        }
        let (last, parents) = path.segments().split_last()?;
        let mut object = Arc::clone(&self.inner.root);
        for segment in parents {
            object = object.field(segment)?.object()?;
        }
        object.field(last)
    }

    /// Subscribers currently depending on the cell at `path`.
    pub fn dependents(&self, path: &str) -> Vec<SubscriberId> {
        self.cell(&Path::parse(path))
            .map(|cell| cell.dependents())
            .unwrap_or_default()
    }

    /// Materialize the whole store without recording dependencies.
    pub fn to_value(&self) -> Value {
        self.inner.root.to_value()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("root", &self.inner.root)
            .field("runtime", &self.inner.runtime)
            .finish()
    }
}
