//! Expressions
//!
//! Subscribers evaluate one of two expression shapes against a store:
//!
//! - a **binding**: a dotted path such as `user.name`, optionally piped
//!   through filters (`user.name | trim | upper`);
//! - a **template**: literal text with interpolated bindings between
//!   delimiters, such as `Hi {{ user.name }}!`.
//!
//! Evaluation never fails. A path that does not resolve, a malformed path or
//! an unknown filter all evaluate to undefined, which renders as empty text.
//! A template always evaluates to a string.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use smallvec::SmallVec;
use tracing::warn;

use super::store::Store;
use super::value::display;
use crate::config::{Delimiters, RuntimeConfig};

/// A filter function: takes the (possibly undefined) value and returns the
/// filtered one.
pub type FilterFn = Arc<dyn Fn(Option<Value>) -> Option<Value> + Send + Sync>;

/// A dotted path into the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    segments: SmallVec<[String; 4]>,
    valid: bool,
}

impl Path {
    /// Parse `user.name` into its segments.
    ///
    /// Whitespace around segments is ignored. An empty path or an empty
    /// segment (`user..name`) yields an invalid path that never resolves.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let segments: SmallVec<[String; 4]> = raw
            .split('.')
            .map(|segment| segment.trim().to_string())
            .collect();
        let valid = !raw.is_empty() && segments.iter().all(|segment| !segment.is_empty());
        Self { segments, valid }
    }

    /// Build a path from already-split segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: SmallVec<[String; 4]> = segments.into_iter().map(Into::into).collect();
        let valid = !segments.is_empty() && segments.iter().all(|segment| !segment.is_empty());
        Self { segments, valid }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl From<&str> for Path {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// A named filter, resolved when the expression was parsed.
#[derive(Clone)]
pub struct Filter {
    name: String,
    apply: Option<FilterFn>,
}

impl Filter {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the filter name was known to the evaluator.
    pub fn is_resolved(&self) -> bool {
        self.apply.is_some()
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("name", &self.name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// A path with the filters to apply to its value.
#[derive(Debug, Clone)]
pub struct Binding {
    path: Path,
    filters: Vec<Filter>,
}

impl Binding {
    pub fn new(path: Path) -> Self {
        Self {
            path,
            filters: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Read the path and run the value through the filters.
    pub fn evaluate(&self, store: &Store) -> Option<Value> {
        let mut value = store.read(&self.path);
        for filter in &self.filters {
            value = match &filter.apply {
                Some(apply) => apply(value),
                None => return None,
            };
        }
        value
    }
}

/// One piece of a template.
#[derive(Debug, Clone)]
pub enum Segment {
    Literal(String),
    Binding(Binding),
}

/// What a subscriber evaluates.
#[derive(Debug, Clone)]
pub enum Expression {
    /// A single binding; evaluates to the bound value itself.
    Binding(Binding),

    /// Text with interpolations; evaluates to a string.
    Template(Vec<Segment>),
}

impl Expression {
    /// A plain path expression with no filters.
    pub fn path(raw: &str) -> Self {
        Self::Binding(Binding::new(Path::parse(raw)))
    }

    /// Evaluate against the store, reading cells as a side effect.
    pub fn evaluate(&self, store: &Store) -> Option<Value> {
        match self {
            Self::Binding(binding) => binding.evaluate(store),
            Self::Template(segments) => {
                let mut text = String::new();
                for segment in segments {
                    match segment {
                        Segment::Literal(literal) => text.push_str(literal),
                        Segment::Binding(binding) => {
                            text.push_str(&display(binding.evaluate(store).as_ref()))
                        }
                    }
                }
                Some(Value::String(text))
            }
        }
    }

    pub fn is_template(&self) -> bool {
        matches!(self, Self::Template(_))
    }

    /// The bindings this expression reads, in order.
    pub fn bindings(&self) -> Vec<&Binding> {
        match self {
            Self::Binding(binding) => vec![binding],
            Self::Template(segments) => segments
                .iter()
                .filter_map(|segment| match segment {
                    Segment::Binding(binding) => Some(binding),
                    Segment::Literal(_) => None,
                })
                .collect(),
        }
    }
}

impl From<&str> for Expression {
    fn from(raw: &str) -> Self {
        Self::path(raw)
    }
}

/// Parses binding and template source text into expressions.
///
/// Owns the interpolation delimiters and the filter table. Filters are looked
/// up at parse time, so registering a filter affects expressions parsed
/// afterwards only.
#[derive(Clone)]
pub struct Evaluator {
    delimiters: Delimiters,
    filters: IndexMap<String, FilterFn>,
}

impl Evaluator {
    /// Create an evaluator with the built-in filters.
    pub fn new(delimiters: Delimiters) -> Self {
        let mut evaluator = Self {
            delimiters,
            filters: IndexMap::new(),
        };
        evaluator.register_filter("upper", map_text(|text: &str| text.to_uppercase()));
        evaluator.register_filter("lower", map_text(|text: &str| text.to_lowercase()));
        evaluator.register_filter("trim", map_text(|text: &str| text.trim().to_string()));
        evaluator.register_filter("capitalize", map_text(capitalize));
        evaluator.register_filter("json", |value: Option<Value>| {
            value.map(|value| Value::String(value.to_string()))
        });
        evaluator
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.delimiters.clone())
    }

    /// Register or replace a filter.
    pub fn register_filter<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(Option<Value>) -> Option<Value> + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    /// Builder form of [`register_filter`](Self::register_filter).
    pub fn with_filter<F>(mut self, name: impl Into<String>, filter: F) -> Self
    where
        F: Fn(Option<Value>) -> Option<Value> + Send + Sync + 'static,
    {
        self.register_filter(name, filter);
        self
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Parse `path | filter | filter`.
    pub fn parse_binding(&self, raw: &str) -> Binding {
        let mut parts = split_pipes(raw).into_iter();
        let path = Path::parse(parts.next().unwrap_or_default());
        if !path.is_valid() {
            warn!(expression = raw, "malformed binding path");
        }

        let filters = parts
            .map(|name| {
                let name = name.trim();
                let apply = self.filters.get(name).cloned();
                if apply.is_none() {
                    warn!(filter = name, expression = raw, "unknown filter");
                }
                Filter {
                    name: name.to_string(),
                    apply,
                }
            })
            .collect();

        Binding { path, filters }
    }

    /// Parse a text node. Returns `None` when the text has no interpolation.
    pub fn parse_text(&self, raw: &str) -> Option<Expression> {
        let Delimiters { open, close } = &self.delimiters;
        let mut segments = Vec::new();
        let mut has_binding = false;
        let mut rest = raw;

        while let Some(start) = rest.find(open.as_str()) {
            let after_open = &rest[start + open.len()..];
            let Some(end) = after_open.find(close.as_str()) else {
                break;
            };
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            segments.push(Segment::Binding(self.parse_binding(&after_open[..end])));
            has_binding = true;
            rest = &after_open[end + close.len()..];
        }

        if !has_binding {
            return None;
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Some(Expression::Template(segments))
    }

    /// Interpolate `raw` against the store in one step.
    pub fn interpolate(&self, raw: &str, store: &Store) -> String {
        match self.parse_text(raw) {
            Some(expression) => display(expression.evaluate(store).as_ref()),
            None => raw.to_string(),
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(Delimiters::default())
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("delimiters", &self.delimiters)
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Split on single `|`, leaving `||` alone.
fn split_pipes(raw: &str) -> Vec<&str> {
    let bytes = raw.as_bytes();
    let mut parts = Vec::new();
    let mut last = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        let doubled = (i > 0 && bytes[i - 1] == b'|') || bytes.get(i + 1) == Some(&b'|');
        if byte == b'|' && !doubled {
            parts.push(&raw[last..i]);
            last = i + 1;
        }
    }
    parts.push(&raw[last..]);
    parts
}

fn map_text(f: fn(&str) -> String) -> impl Fn(Option<Value>) -> Option<Value> + Send + Sync {
    move |value: Option<Value>| value.map(|value| Value::String(f(&display(Some(&value)))))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
