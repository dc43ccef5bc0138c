//! # Formstate Format
//!
//! Pure value transforms used by the formstate engine. Everything here is a
//! function from a JSON value (plus optional options) to a new JSON value, so
//! the engine can look transforms up by name from field configuration.
//!
//! ## Modules
//!
//! - [`converters`] - Type converters (`string`, `integer`, `number`, `boolean`, dates)
//! - [`formatters`] - Display formatters (`phone`, `properCase`, `date`, ...)
//! - [`date`] - Date parsing and keyword-driven date formatting
//! - [`registry`] - Named transform lookup tables

pub mod converters;
pub mod date;
pub mod formatters;
pub mod registry;

pub use registry::{TransformFn, TransformRegistry};

use serde_json::Value;

/// JavaScript-style falsiness for JSON values.
///
/// `null`, `false`, `0` and `""` are falsy. Arrays and objects never are.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map(|f| f == 0.0 || f.is_nan()).unwrap_or(false),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Render a value as plain text the way a form control would show it.
///
/// Strings are returned raw, `null` becomes an empty string and arrays are
/// comma-joined.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(to_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Numeric coercion. Returns `None` where the coercion would produce NaN.
///
/// Blank strings coerce to zero, booleans to one or zero.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok().filter(|f| !f.is_nan())
            }
        }
        Value::Array(items) => match items.as_slice() {
            [] => Some(0.0),
            [only] => to_number(only),
            _ => None,
        },
        Value::Object(_) => None,
    }
}

/// Build a JSON number, preferring an integer representation for whole values.
///
/// Non-finite input yields `null` since JSON cannot carry it.
pub fn number_value(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
