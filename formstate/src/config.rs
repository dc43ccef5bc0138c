//! Form configuration.
//!
//! The serializable part of a form's setup (fields, defaults, initial data,
//! messages) can be read from YAML or JSON with camelCase keys. Callables
//! (callbacks, custom transforms and validators) are attached with the
//! `with_*` builder methods.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use formstate_format::TransformRegistry;

use crate::error::Result;
use crate::field_errors::InitialErrors;
use crate::form::FormManager;
use crate::types::{ErrorMessage, FieldCallback, FieldDef, FieldDefaults, FieldsInput};
use crate::validation::{RuleError, RuleInput, RuleOutcome, Validators};

/// Everything needed to build a [`FormManager`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormConfig {
    pub fields: FieldsInput,
    pub field_defaults: FieldDefaults,
    pub initial_data: Value,
    pub initial_state: Value,
    pub initial_errors: IndexMap<String, InitialErrors>,
    pub error_messages: IndexMap<String, ErrorMessage>,
    /// Upper bound for asynchronous rules; rules still pending afterwards
    /// count as valid
    pub validator_timeout_ms: Option<u64>,

    #[serde(skip)]
    pub formatters: TransformRegistry,
    #[serde(skip)]
    pub converters: TransformRegistry,
    #[serde(skip)]
    pub validators: Validators,
    #[serde(skip)]
    pub on_change: Option<FieldCallback>,
    #[serde(skip)]
    pub on_blur: Option<FieldCallback>,
    #[serde(skip)]
    pub on_focus: Option<FieldCallback>,
}

impl FormConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn validator_timeout(&self) -> Option<Duration> {
        self.validator_timeout_ms.map(Duration::from_millis)
    }

    pub fn with_field(mut self, def: FieldDef) -> Self {
        self.fields.push(def);
        self
    }

    pub fn with_fields(mut self, defs: impl IntoIterator<Item = FieldDef>) -> Self {
        for def in defs {
            self.fields.push(def);
        }
        self
    }

    pub fn with_field_defaults(mut self, defaults: FieldDefaults) -> Self {
        self.field_defaults = defaults;
        self
    }

    pub fn with_initial_data(mut self, data: Value) -> Self {
        self.initial_data = data;
        self
    }

    pub fn with_initial_state(mut self, state: Value) -> Self {
        self.initial_state = state;
        self
    }

    pub fn with_error_message(mut self, rule: impl Into<String>, message: impl Into<ErrorMessage>) -> Self {
        self.error_messages.insert(rule.into(), message.into());
        self
    }

    pub fn with_validator_timeout(mut self, timeout: Duration) -> Self {
        self.validator_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Register a custom formatter (or replace a built-in one).
    pub fn with_formatter<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.formatters.insert(name, f);
        self
    }

    /// Register a custom converter (or replace a built-in one).
    pub fn with_converter<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.converters.insert(name, f);
        self
    }

    /// Register a validator usable as a parameterized rule by `name`.
    pub fn with_validator<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RuleInput<'_>) -> std::result::Result<RuleOutcome, RuleError> + Send + Sync + 'static,
    {
        self.validators.insert(name, f);
        self
    }

    pub fn on_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &str, &mut FormManager) + Send + Sync + 'static,
    {
        self.on_change = Some(FieldCallback::new(f));
        self
    }

    pub fn on_blur<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &str, &mut FormManager) + Send + Sync + 'static,
    {
        self.on_blur = Some(FieldCallback::new(f));
        self
    }

    pub fn on_focus<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &str, &mut FormManager) + Send + Sync + 'static,
    {
        self.on_focus = Some(FieldCallback::new(f));
        self
    }
}
