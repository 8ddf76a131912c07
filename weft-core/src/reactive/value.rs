//! Value comparison and display rules.
//!
//! Store values are plain JSON values. `None` stands for "undefined": the
//! result of reading a path that does not resolve.

use serde_json::Value;

/// Whether `value` is a plain object, i.e. something the store wraps
/// field by field. Arrays are leaves.
pub fn is_plain_object(value: &Value) -> bool {
    matches!(value, Value::Object(_))
}

/// Loose equality between two possibly-undefined values.
///
/// Scalars compare by value with numeric coercion, so `1`, `"1"` and
/// `true` are all equal to each other, and undefined equals null. Objects
/// and arrays compare structurally.
pub fn loosely_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => true,
        (None | Some(Value::Null), Some(_)) | (Some(_), None | Some(Value::Null)) => false,
        (Some(Value::String(a)), Some(Value::String(b))) => a == b,
        (Some(a @ (Value::Array(_) | Value::Object(_))), Some(b))
        | (Some(b), Some(a @ (Value::Array(_) | Value::Object(_)))) => a == b,
        (Some(a), Some(b)) => match (to_number(a), to_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse().ok()
            }
        }
        _ => None,
    }
}

/// Render a value as text for interpolation or an attribute value.
///
/// Undefined renders as the empty string. Whole floats drop their
/// fractional part, arrays join with commas and objects print as JSON.
pub fn display(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => display(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(object @ Value::Object(_)) => object.to_string(),
    }
}
