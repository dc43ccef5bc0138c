//! Named transform tables.
//!
//! Field configuration refers to formatters and converters by name. A
//! [`TransformRegistry`] maps those names to functions; the engine starts from
//! [`TransformRegistry::formatters`] / [`TransformRegistry::converters`] and
//! layers user-supplied entries on top with [`TransformRegistry::extend`].

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{converters, formatters};

/// A value transform: `(value, options) -> value`.
pub type TransformFn = Arc<dyn Fn(&Value, Option<&Value>) -> Value + Send + Sync>;

/// Name → transform lookup.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    entries: HashMap<String, TransformFn>,
}

impl TransformRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in formatters.
    pub fn formatters() -> Self {
        let mut registry = Self::new();
        registry.insert("upperCase", formatters::upper_case);
        registry.insert("lowerCase", formatters::lower_case);
        registry.insert("properCase", formatters::proper_case);
        registry.insert("numbersOnly", formatters::numbers_only);
        registry.insert("phone", formatters::phone);
        registry.insert("date", formatters::date);
        registry
    }

    /// The built-in converters.
    pub fn converters() -> Self {
        let mut registry = Self::new();
        registry.insert("string", converters::string);
        registry.insert("integer", converters::integer);
        registry.insert("number", converters::number);
        registry.insert("boolean", converters::boolean);
        registry.insert("date", converters::date);
        registry.insert("dateISO", converters::date_iso);
        registry.insert("dateObject", converters::date_object);
        registry
    }

    /// Register a transform, replacing any existing entry of the same name.
    pub fn insert<F>(&mut self, name: impl Into<String>, transform: F)
    where
        F: Fn(&Value, Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(transform));
    }

    /// Register an already shared transform.
    pub fn insert_arc(&mut self, name: impl Into<String>, transform: TransformFn) {
        self.entries.insert(name.into(), transform);
    }

    /// Merge another registry into this one. Entries in `other` win.
    pub fn extend(&mut self, other: TransformRegistry) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, name: &str) -> Option<&TransformFn> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Apply a named transform. Unknown names leave the value unchanged.
    pub fn apply(&self, name: &str, value: &Value, options: Option<&Value>) -> Value {
        match self.entries.get(name) {
            Some(transform) => transform(value, options),
            None => {
                tracing::debug!(transform = name, "unknown transform; value left unchanged");
                value.clone()
            }
        }
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_tables() {
        let formatters = TransformRegistry::formatters();
        assert_eq!(
            formatters.names(),
            vec!["date", "lowerCase", "numbersOnly", "phone", "properCase", "upperCase"]
        );
        let converters = TransformRegistry::converters();
        assert!(converters.contains("dateISO"));
        assert_eq!(converters.len(), 7);
    }

    #[test]
    fn test_extend_overrides_builtin() {
        let mut formatters = TransformRegistry::formatters();
        let mut custom = TransformRegistry::new();
        custom.insert("phone", |_: &Value, _: Option<&Value>| json!("redacted"));
        custom.insert("reverse", |v: &Value, _: Option<&Value>| {
            json!(v.as_str().unwrap_or_default().chars().rev().collect::<String>())
        });
        formatters.extend(custom);

        assert_eq!(formatters.apply("phone", &json!("5551234567"), None), json!("redacted"));
        assert_eq!(formatters.apply("reverse", &json!("abc"), None), json!("cba"));
    }

    #[test]
    fn test_apply_unknown_is_identity() {
        let converters = TransformRegistry::converters();
        assert_eq!(converters.apply("nope", &json!(5), None), json!(5));
    }
}
