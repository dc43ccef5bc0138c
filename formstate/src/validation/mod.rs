//! Field validation engine.
//!
//! Validation of a field runs in two phases. [`evaluate_field`] reads the
//! form and computes the field's new errors; it only borrows the form, so
//! many fields can be evaluated concurrently. [`ValidationState::commit`]
//! then writes the result into the error store.
//!
//! Rule order within a field:
//!
//! 1. String values are trimmed.
//! 2. A blank value (`""` or `null`) clears the field's errors.
//! 3. An active `required` rule runs first; if it fails, its error replaces
//!    all others and nothing else runs.
//! 4. A blank value that is not required only runs a `custom` function rule.
//! 5. Every other rule runs; asynchronous rules settle concurrently.

pub mod builtin;
pub mod messages;
pub mod rules;

use futures::future::join_all;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::error::{FormError, Result};
use crate::field_errors::{ErrorStore, FieldErrors, CUSTOM_RULE, REQUIRED_RULE};
use crate::form::FormManager;
use crate::path::is_blank;
use crate::registry::FieldRegistry;
use crate::types::{FieldDef, InheritableKey, Rule};

pub use messages::MessageCatalog;
pub use rules::{
    RuleError, RuleFuture, RuleInput, RuleOutcome, RuleResponse, ValidatorFn, Validators, Verdict,
};

/// The event that triggered a validation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationEvent {
    Change,
    Blur,
    /// Explicit request; always validates
    Validate,
}

/// Result of consulting the validate/revalidate flags for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Run,
    /// Skip validation and report the field's current validity
    Skip { valid: bool },
}

/// Outcome of [`evaluate_field`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// The field has no rules; existing errors stay as they are
    Unconfigured,
    /// The field's complete new error set
    Errors(FieldErrors),
}

/// Fields to include in [`FormManager::validate_all`]. Names may be aliases.
#[derive(Debug, Clone, Default)]
pub struct ValidateFilter {
    pub only: Option<Vec<String>>,
    pub ignore: Vec<String>,
}

impl ValidateFilter {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            only: Some(names.into_iter().map(Into::into).collect()),
            ignore: Vec::new(),
        }
    }

    pub fn ignore<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            only: None,
            ignore: names.into_iter().map(Into::into).collect(),
        }
    }
}

/// Errors, validators, message templates and timing for a form.
#[derive(Debug, Clone, Default)]
pub struct ValidationState {
    errors: ErrorStore,
    validators: Validators,
    messages: MessageCatalog,
    timeout: Option<Duration>,
}

impl ValidationState {
    pub fn new(validators: Validators, messages: MessageCatalog, timeout: Option<Duration>) -> Self {
        Self {
            errors: ErrorStore::new(),
            validators,
            messages,
            timeout,
        }
    }

    pub fn errors(&self) -> &ErrorStore {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorStore {
        &mut self.errors
    }

    pub fn validators(&self) -> &Validators {
        &self.validators
    }

    pub fn messages(&self) -> &MessageCatalog {
        &self.messages
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Decide whether an event should trigger validation of `field_name`.
    ///
    /// Change and blur consult `revalidateOn*` when the field already has
    /// errors and `validateOn*` otherwise.
    pub fn gate(
        &self,
        registry: &FieldRegistry,
        field_name: &str,
        event: Option<ValidationEvent>,
    ) -> Gate {
        let has_errors = self.errors.has(field_name);
        let key = match (event, has_errors) {
            (None | Some(ValidationEvent::Validate), _) => return Gate::Run,
            (Some(ValidationEvent::Change), false) => InheritableKey::ValidateOnChange,
            (Some(ValidationEvent::Change), true) => InheritableKey::RevalidateOnChange,
            (Some(ValidationEvent::Blur), false) => InheritableKey::ValidateOnBlur,
            (Some(ValidationEvent::Blur), true) => InheritableKey::RevalidateOnBlur,
        };
        if registry.effective_flag(registry.field(field_name), key) {
            Gate::Run
        } else {
            trace!(field = field_name, option = %key, "validation not enabled for event");
            Gate::Skip { valid: !has_errors }
        }
    }

    /// Store an evaluation. Returns `(changed, valid)`.
    pub fn commit(&mut self, field_name: &str, evaluation: Evaluation) -> (bool, bool) {
        let changed = match evaluation {
            Evaluation::Unconfigured => false,
            Evaluation::Errors(errors) => self.errors.replace(field_name, errors),
        };
        (changed, !self.errors.has(field_name))
    }
}

/// Milliseconds in `limit`, saturating at `u64::MAX`.
fn timeout_millis(limit: Duration) -> u64 {
    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)
}

/// Await every pending rule; a rule whose future fails counts as valid.
///
/// With a `timeout`, rules that have not settled in time also count as
/// valid. Results keep the order of `pending`.
pub async fn settle_all_as_valid_on_error<K>(
    pending: Vec<(K, RuleFuture)>,
    timeout: Option<Duration>,
) -> Vec<(K, RuleResponse)> {
    join_all(pending.into_iter().map(|(key, future)| async move {
        let settled = match timeout {
            Some(limit) => match tokio::time::timeout(limit, future).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        timeout_ms = timeout_millis(limit),
                        "async rule timed out; treating as valid"
                    );
                    return (key, RuleResponse::Pass);
                }
            },
            None => future.await,
        };
        match settled {
            Ok(response) => (key, response),
            Err(e) => {
                debug!(%e, "async rule failed; treating as valid");
                (key, RuleResponse::Pass)
            }
        }
    }))
    .await
}

/// Accumulates one field's errors while its rules run.
struct FieldRun<'a> {
    form: &'a FormManager,
    field_name: &'a str,
    def: &'a FieldDef,
    value: Value,
    errors: FieldErrors,
}

impl<'a> FieldRun<'a> {
    fn invoke(&self, rule_name: &str, rule: &Rule) -> Result<Option<RuleOutcome>> {
        let message = self
            .form
            .validation()
            .messages()
            .for_field(Some(self.def), rule_name);
        let input = RuleInput {
            value: &self.value,
            param: rule.param(),
            field: self.field_name,
            message: message.as_ref(),
            form: self.form,
        };
        let outcome = match rule {
            Rule::Func(f) => f(&input),
            Rule::Param(_) => match self.form.validation().validators().get(rule_name) {
                Some(validator) => validator(&input),
                None => {
                    trace!(field = self.field_name, rule = rule_name, "no validator for rule; skipped");
                    return Ok(None);
                }
            },
        };
        outcome
            .map(Some)
            .map_err(|e| FormError::rule(self.field_name, rule_name, e.message))
    }

    async fn resolve(&self, outcome: RuleOutcome) -> RuleResponse {
        match outcome {
            RuleOutcome::Ready(response) => response,
            RuleOutcome::Pending(future) => {
                let timeout = self.form.validation().timeout();
                settle_all_as_valid_on_error(vec![((), future)], timeout)
                    .await
                    .pop()
                    .map(|(_, response)| response)
                    .unwrap_or(RuleResponse::Pass)
            }
        }
    }

    /// Record a rule's response. Returns whether the rule failed.
    fn apply(&mut self, rule_name: &str, param: &Value, response: RuleResponse) -> bool {
        match response.verdict() {
            Verdict::Valid => {
                self.errors.shift_remove(rule_name);
                false
            }
            Verdict::Invalid(explicit) => {
                let catalog = self.form.validation().messages();
                let rendered = match explicit {
                    Some(messages) => messages
                        .iter()
                        .map(|m| catalog.render(Some(self.def), rule_name, param, Some(m)))
                        .collect(),
                    None => vec![catalog.render(Some(self.def), rule_name, param, None)],
                };
                if rule_name == REQUIRED_RULE {
                    self.errors.clear();
                }
                self.errors.insert(rule_name.to_string(), rendered);
                true
            }
        }
    }
}

/// Compute the new errors of one field without touching the form.
///
/// A `Rule` error is returned when a synchronous rule raises an error.
pub async fn evaluate_field(
    form: &FormManager,
    field_name: &str,
    value: Value,
) -> Result<Evaluation> {
    let Some(def) = form.registry().field(field_name) else {
        return Ok(Evaluation::Unconfigured);
    };
    if def.validation.is_empty() {
        return Ok(Evaluation::Unconfigured);
    }

    let value = match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other,
    };
    let blank = is_blank(&value);
    let errors = if blank {
        FieldErrors::new()
    } else {
        form.validation().errors().get(field_name).cloned().unwrap_or_default()
    };

    let mut run = FieldRun {
        form,
        field_name,
        def,
        value,
        errors,
    };

    if let Some(rule) = def.validation.required() {
        let failed = match rule {
            Rule::Func(_) => match run.invoke(REQUIRED_RULE, rule)? {
                Some(outcome) => {
                    let response = run.resolve(outcome).await;
                    run.apply(REQUIRED_RULE, &Value::Null, response)
                }
                None => false,
            },
            Rule::Param(param) => {
                let response = RuleResponse::from(!blank);
                run.apply(REQUIRED_RULE, param, response)
            }
        };
        if failed {
            debug!(field = field_name, "required rule failed");
            return Ok(Evaluation::Errors(run.errors));
        }
    }

    if blank {
        if let Some(rule @ Rule::Func(_)) = def.validation.get(CUSTOM_RULE) {
            if let Some(outcome) = run.invoke(CUSTOM_RULE, rule)? {
                let response = run.resolve(outcome).await;
                run.apply(CUSTOM_RULE, &Value::Null, response);
            }
        }
        return Ok(Evaluation::Errors(run.errors));
    }

    let mut pending = Vec::new();
    for (rule_name, rule) in def.validation.iter() {
        if rule_name == REQUIRED_RULE || !rule.is_active() {
            continue;
        }
        match run.invoke(rule_name, rule)? {
            Some(RuleOutcome::Ready(response)) => {
                run.apply(rule_name, rule.param(), response);
            }
            Some(RuleOutcome::Pending(future)) => {
                pending.push(((rule_name, rule.param()), future));
            }
            None => {}
        }
    }

    let timeout = form.validation().timeout();
    for ((rule_name, param), response) in settle_all_as_valid_on_error(pending, timeout).await {
        run.apply(rule_name, param, response);
    }

    Ok(Evaluation::Errors(run.errors))
}
