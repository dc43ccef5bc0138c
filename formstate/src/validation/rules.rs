//! Validation rule plumbing: what a rule receives and what it may return.
//!
//! A rule is a function of [`RuleInput`]. It answers either immediately
//! ([`RuleOutcome::Ready`]) or with a future ([`RuleOutcome::Pending`]) for
//! checks that need I/O, such as asking a server whether a username is free.

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::form::FormManager;
use crate::types::ErrorMessage;

/// Error raised by a rule that could not reach a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RuleError {
    pub message: String,
}

impl RuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Everything a rule gets to see.
pub struct RuleInput<'a> {
    /// The value under test (strings are already trimmed)
    pub value: &'a Value,
    /// The rule's configured parameter, `null` for function rules
    pub param: &'a Value,
    /// Canonical name of the field being validated
    pub field: &'a str,
    /// The error-message template configured for this rule, if any
    pub message: Option<&'a ErrorMessage>,
    /// The form, for rules that compare against other fields
    pub form: &'a FormManager,
}

/// A rule's answer.
///
/// An empty message (or empty message list) counts as valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleResponse {
    Pass,
    Fail,
    Message(String),
    Messages(Vec<String>),
}

/// A rule's answer reduced to what the engine records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    /// Invalid, with the messages (templates) to show; `None` means use the
    /// configured or default template for the rule
    Invalid(Option<Vec<String>>),
}

impl RuleResponse {
    pub fn verdict(self) -> Verdict {
        match self {
            Self::Pass => Verdict::Valid,
            Self::Fail => Verdict::Invalid(None),
            Self::Message(message) if message.is_empty() => Verdict::Valid,
            Self::Message(message) => Verdict::Invalid(Some(vec![message])),
            Self::Messages(messages) if messages.is_empty() => Verdict::Valid,
            Self::Messages(messages) => {
                let messages: Vec<String> = messages.into_iter().filter(|m| !m.is_empty()).collect();
                Verdict::Invalid((!messages.is_empty()).then_some(messages))
            }
        }
    }
}

impl From<bool> for RuleResponse {
    fn from(valid: bool) -> Self {
        if valid {
            Self::Pass
        } else {
            Self::Fail
        }
    }
}

impl From<String> for RuleResponse {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for RuleResponse {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl From<Vec<String>> for RuleResponse {
    fn from(messages: Vec<String>) -> Self {
        Self::Messages(messages)
    }
}

impl From<Value> for RuleResponse {
    /// Booleans, strings and string lists map to their typed counterparts;
    /// anything else counts as a failure.
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(valid) => valid.into(),
            Value::String(message) => Self::Message(message),
            Value::Array(items) => Self::Messages(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            _ => Self::Fail,
        }
    }
}

/// Future returned by asynchronous rules.
pub type RuleFuture = BoxFuture<'static, Result<RuleResponse, RuleError>>;

/// A rule's immediate or deferred answer.
pub enum RuleOutcome {
    Ready(RuleResponse),
    Pending(RuleFuture),
}

impl RuleOutcome {
    pub fn ready(response: impl Into<RuleResponse>) -> Self {
        Self::Ready(response.into())
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<RuleResponse, RuleError>> + Send + 'static,
    {
        Self::Pending(Box::pin(future))
    }
}

impl From<bool> for RuleOutcome {
    fn from(valid: bool) -> Self {
        Self::Ready(valid.into())
    }
}

impl From<RuleResponse> for RuleOutcome {
    fn from(response: RuleResponse) -> Self {
        Self::Ready(response)
    }
}

impl fmt::Debug for RuleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(response) => f.debug_tuple("Ready").field(response).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// A validation rule function.
pub type ValidatorFn =
    Arc<dyn Fn(&RuleInput<'_>) -> Result<RuleOutcome, RuleError> + Send + Sync>;

/// Name → validator lookup used for parameterized rules.
#[derive(Clone, Default)]
pub struct Validators {
    entries: HashMap<String, ValidatorFn>,
}

impl Validators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validator, replacing any existing one of the same name.
    pub fn insert<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&RuleInput<'_>) -> Result<RuleOutcome, RuleError> + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(f));
    }

    /// Merge `other` in; its entries win.
    pub fn extend(&mut self, other: Validators) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, name: &str) -> Option<&ValidatorFn> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Validators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validators")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn verdicts() {
        assert_eq!(RuleResponse::Pass.verdict(), Verdict::Valid);
        assert_eq!(RuleResponse::Fail.verdict(), Verdict::Invalid(None));
        assert_eq!(RuleResponse::from("").verdict(), Verdict::Valid);
        assert_eq!(
            RuleResponse::from("taken").verdict(),
            Verdict::Invalid(Some(vec!["taken".into()]))
        );
        assert_eq!(RuleResponse::Messages(vec![]).verdict(), Verdict::Valid);
        assert_eq!(
            RuleResponse::Messages(vec!["".into(), "x".into()]).verdict(),
            Verdict::Invalid(Some(vec!["x".into()]))
        );
        assert_eq!(
            RuleResponse::Messages(vec!["".into()]).verdict(),
            Verdict::Invalid(None)
        );
    }

    #[test]
    fn responses_from_json() {
        assert_eq!(RuleResponse::from(json!(true)), RuleResponse::Pass);
        assert_eq!(RuleResponse::from(json!("no")), RuleResponse::Message("no".into()));
        assert_eq!(
            RuleResponse::from(json!(["a", 1])),
            RuleResponse::Messages(vec!["a".into(), "1".into()])
        );
        assert_eq!(RuleResponse::from(json!(42)), RuleResponse::Fail);
    }

    #[test]
    fn validators_extend_overrides() {
        let mut base = Validators::new();
        base.insert("even", |input: &RuleInput<'_>| {
            Ok(RuleOutcome::from(input.value.as_i64().unwrap_or(1) % 2 == 0))
        });
        let mut custom = Validators::new();
        custom.insert("even", |_: &RuleInput<'_>| Ok(RuleOutcome::from(true)));
        custom.insert("odd", |_: &RuleInput<'_>| Ok(RuleOutcome::from(false)));
        base.extend(custom);
        assert_eq!(base.names(), vec!["even", "odd"]);
    }
}
