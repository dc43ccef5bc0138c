//! Dotted-path access into nested JSON object trees.
//!
//! Paths look like `user.address.city`. The empty path and `/` both address
//! the root object. Reads borrow (or clone via [`get_cloned`]); writes take
//! ownership of the incoming value, so no caller can alias stored state.

use serde_json::{Map, Value};
use tracing::warn;

/// Path that addresses the root of a tree.
pub const ROOT: &str = "/";

/// Options for [`set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Deep-merge object values into an existing object instead of replacing it
    pub merge: bool,
}

impl SetOptions {
    pub fn merge() -> Self {
        Self { merge: true }
    }
}

/// True when `path` addresses the root.
pub fn is_root(path: &str) -> bool {
    path.is_empty() || path == ROOT
}

/// Join a parent path and a key.
pub fn join(parent: &str, key: &str) -> String {
    if is_root(parent) {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// Read the value at `path`. Returns `None` when any segment is missing or
/// an intermediate is not an object.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if !root.is_object() {
        return None;
    }
    if is_root(path) {
        return Some(root);
    }
    path.split('.')
        .try_fold(root, |branch, key| branch.as_object()?.get(key))
}

/// Read an owned copy of the value at `path`.
pub fn get_cloned(root: &Value, path: &str) -> Option<Value> {
    get(root, path).cloned()
}

/// Write (or with `None`, delete) the value at `path`.
///
/// Missing or non-object intermediates are replaced with empty objects.
/// Returns whether the tree changed. Writing a scalar equal to the current
/// value is not a change; writing any object or array always is.
///
/// A root path accepts only an object, which is deep-merged into the root.
pub fn set(root: &mut Value, path: &str, value: Option<Value>, options: SetOptions) -> bool {
    if !root.is_object() {
        warn!(path, "cannot set a path inside a non-object tree");
        return false;
    }

    if is_root(path) {
        return match value {
            Some(value @ Value::Object(_)) => {
                deep_merge(root, value);
                true
            }
            _ => {
                warn!("a root-level write requires an object value");
                false
            }
        };
    }

    let mut keys: Vec<&str> = path.split('.').collect();
    let Some(last) = keys.pop() else {
        return false;
    };

    let mut branch = root;
    for key in keys {
        let Some(map) = branch.as_object_mut() else {
            return false;
        };
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        branch = entry;
    }

    let Some(map) = branch.as_object_mut() else {
        return false;
    };

    let Some(value) = value else {
        return map.remove(last).is_some();
    };

    match map.get_mut(last) {
        Some(existing) if !is_container(&value) && scalar_eq(existing, &value) => false,
        Some(existing) if options.merge && existing.is_object() && value.is_object() => {
            deep_merge(existing, value);
            true
        }
        _ => {
            map.insert(last.to_string(), value);
            true
        }
    }
}

/// Recursively merge `source` into `target`. Objects merge key by key; any
/// other value in `source` replaces what is in `target`.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value)
                    }
                    _ => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

/// Equality that treats numbers by numeric value, so `40` equals `40.0`.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| loose_eq(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| loose_eq(x, y)))
        }
        _ => a == b,
    }
}

fn is_container(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    !is_container(a) && loose_eq(a, b)
}

/// `null` or the empty string.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_nested() {
        let tree = json!({"user": {"address": {"city": "Paris"}}});
        assert_eq!(get(&tree, "user.address.city"), Some(&json!("Paris")));
        assert_eq!(get(&tree, "user.missing"), None);
        assert_eq!(get(&tree, "user.address.city.zip"), None);
        assert_eq!(get(&tree, ""), Some(&tree));
        assert_eq!(get(&tree, ROOT), Some(&tree));
    }

    #[test]
    fn test_get_on_non_object_root() {
        assert_eq!(get(&json!([1, 2]), "0"), None);
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut tree = json!({});
        assert!(set(&mut tree, "a.b.c", Some(json!(1)), SetOptions::default()));
        assert_eq!(tree, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn test_set_replaces_scalar_intermediate() {
        let mut tree = json!({"a": 5});
        assert!(set(&mut tree, "a.b", Some(json!("x")), SetOptions::default()));
        assert_eq!(tree, json!({"a": {"b": "x"}}));
    }

    #[test]
    fn test_set_same_scalar_is_not_a_change() {
        let mut tree = json!({"age": 40});
        assert!(!set(&mut tree, "age", Some(json!(40.0)), SetOptions::default()));
        assert!(set(&mut tree, "age", Some(json!(41)), SetOptions::default()));
    }

    #[test]
    fn test_set_object_always_changes() {
        let mut tree = json!({"a": {"b": 1}});
        assert!(set(&mut tree, "a", Some(json!({"b": 1})), SetOptions::default()));
    }

    #[test]
    fn test_set_merge() {
        let mut tree = json!({"a": {"b": 1, "c": {"d": 2}}});
        set(&mut tree, "a", Some(json!({"c": {"e": 3}})), SetOptions::merge());
        assert_eq!(tree, json!({"a": {"b": 1, "c": {"d": 2, "e": 3}}}));

        set(&mut tree, "a", Some(json!({"x": 1})), SetOptions::default());
        assert_eq!(tree, json!({"a": {"x": 1}}));
    }

    #[test]
    fn test_set_none_deletes() {
        let mut tree = json!({"a": {"b": 1}});
        assert!(set(&mut tree, "a.b", None, SetOptions::default()));
        assert!(!set(&mut tree, "a.b", None, SetOptions::default()));
        assert_eq!(tree, json!({"a": {}}));
    }

    #[test]
    fn test_set_root() {
        let mut tree = json!({"a": 1});
        assert!(set(&mut tree, ROOT, Some(json!({"b": 2})), SetOptions::default()));
        assert_eq!(tree, json!({"a": 1, "b": 2}));
        assert!(!set(&mut tree, "", Some(json!(3)), SetOptions::default()));
        assert_eq!(tree, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_get_cloned_is_independent() {
        let mut tree = json!({"a": {"b": 1}});
        let copy = get_cloned(&tree, "a").unwrap();
        set(&mut tree, "a.b", Some(json!(2)), SetOptions::default());
        assert_eq!(copy, json!({"b": 1}));
    }

    #[test]
    fn test_loose_eq() {
        assert!(loose_eq(&json!({"n": 1}), &json!({"n": 1.0})));
        assert!(!loose_eq(&json!("1"), &json!(1)));
        assert!(!loose_eq(&json!([1]), &json!([1, 2])));
    }

    #[test]
    fn test_join() {
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("a", "b"), "a.b");
    }
}
