//! Per-field error store.
//!
//! Errors are keyed by canonical field name, then by rule name, and hold one
//! or more rendered messages. A field with no errors has no entry at all.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Error messages of one field keyed by rule name, in rule order.
pub type FieldErrors = IndexMap<String, Vec<String>>;

/// Rule key used for errors that did not come from a named rule.
pub const CUSTOM_RULE: &str = "custom";

/// Rule key of the required-ness check.
pub const REQUIRED_RULE: &str = "required";

/// One or many messages, as accepted by error setters and config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Messages {
    One(String),
    Many(Vec<String>),
}

impl Messages {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(message) => vec![message],
            Self::Many(messages) => messages,
        }
    }
}

impl From<&str> for Messages {
    fn from(message: &str) -> Self {
        Self::One(message.to_string())
    }
}

impl From<String> for Messages {
    fn from(message: String) -> Self {
        Self::One(message)
    }
}

impl From<Vec<String>> for Messages {
    fn from(messages: Vec<String>) -> Self {
        Self::Many(messages)
    }
}

impl From<Vec<&str>> for Messages {
    fn from(messages: Vec<&str>) -> Self {
        Self::Many(messages.into_iter().map(String::from).collect())
    }
}

/// Initial errors from config: a bare message (stored under `custom`) or a
/// map of rule name to messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InitialErrors {
    Text(String),
    Rules(IndexMap<String, Messages>),
}

impl InitialErrors {
    pub fn into_field_errors(self) -> FieldErrors {
        match self {
            Self::Text(message) => {
                let mut errors = FieldErrors::new();
                errors.insert(CUSTOM_RULE.to_string(), vec![message]);
                errors
            }
            Self::Rules(rules) => rules
                .into_iter()
                .map(|(rule, messages)| (rule, messages.into_vec()))
                .collect(),
        }
    }
}

/// One entry of the form-wide error list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFieldError {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub errors: Vec<String>,
}

/// Errors of every field.
#[derive(Debug, Clone, Default)]
pub struct ErrorStore {
    errors: IndexMap<String, FieldErrors>,
}

impl ErrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&FieldErrors> {
        self.errors.get(field)
    }

    /// All messages of a field flattened in rule order.
    pub fn messages(&self, field: &str) -> Vec<String> {
        self.errors
            .get(field)
            .map(flatten)
            .unwrap_or_default()
    }

    /// Whether `field` has at least one error.
    pub fn has(&self, field: &str) -> bool {
        self.errors.get(field).is_some_and(|errors| !errors.is_empty())
    }

    /// Whether any field has an error.
    pub fn any(&self) -> bool {
        self.errors.values().any(|errors| !errors.is_empty())
    }

    /// Set the messages of one rule.
    ///
    /// With `merge` the field's other rule errors are kept. Setting the
    /// `required` error always drops the field's other errors. Returns
    /// whether anything changed.
    pub fn set(&mut self, field: &str, rule: &str, messages: Vec<String>, merge: bool) -> bool {
        let mut errors = if merge && rule != REQUIRED_RULE {
            self.errors.get(field).cloned().unwrap_or_default()
        } else {
            FieldErrors::new()
        };
        errors.insert(rule.to_string(), messages);
        self.replace(field, errors)
    }

    /// Replace all errors of a field. An empty map removes the field's entry.
    /// Returns whether anything changed.
    pub fn replace(&mut self, field: &str, errors: FieldErrors) -> bool {
        if errors.is_empty() {
            return self.errors.shift_remove(field).is_some();
        }
        if self.errors.get(field) == Some(&errors) {
            return false;
        }
        self.errors.insert(field.to_string(), errors);
        true
    }

    /// Clear the errors of one field. Returns whether it had any.
    pub fn clear(&mut self, field: &str) -> bool {
        self.errors.shift_remove(field).is_some()
    }

    /// Clear the errors of every field. Returns whether there were any.
    pub fn clear_all(&mut self) -> bool {
        let had_errors = !self.errors.is_empty();
        self.errors.clear();
        had_errors
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldErrors)> {
        self.errors
            .iter()
            .filter(|(_, errors)| !errors.is_empty())
            .map(|(field, errors)| (field.as_str(), errors))
    }
}

/// Flatten a field's errors into a message list in rule order.
pub fn flatten(errors: &FieldErrors) -> Vec<String> {
    errors.values().flatten().cloned().collect()
}
