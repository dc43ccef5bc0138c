//! Error types for the form engine

use thiserror::Error;

/// Result type for form operations
pub type Result<T> = std::result::Result<T, FormError>;

/// Errors that can occur in form operations.
///
/// Validation *failures* are not errors; they are recorded as field error
/// messages. These variants cover misbehaving rules and unreadable config.
#[derive(Debug, Error)]
pub enum FormError {
    /// A synchronous validation rule returned an error instead of a verdict
    #[error("validation rule '{rule}' failed on field '{field}': {message}")]
    Rule {
        field: String,
        rule: String,
        message: String,
    },

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FormError {
    pub fn rule(field: impl Into<String>, rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rule {
            field: field.into(),
            rule: rule.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_error_display() {
        let err = FormError::rule("username", "pattern", "regex parse error");
        assert_eq!(
            err.to_string(),
            "validation rule 'pattern' failed on field 'username': regex parse error"
        );
    }

    #[test]
    fn test_yaml_error_converts() {
        let parse: std::result::Result<serde_json::Value, _> = serde_yaml_ng::from_str("a: [1, 2");
        let err: FormError = parse.unwrap_err().into();
        assert!(err.to_string().starts_with("YAML error"));
    }
}
