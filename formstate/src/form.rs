//! FormManager: the public facade of a form.
//!
//! A `FormManager` owns the field registry, value store, validation state and
//! host notifier of one form. Reads take `&self`; anything that can change
//! state takes `&mut self` and notifies the host when state actually changed.

use futures::future::join_all;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::config::FormConfig;
use crate::error::Result;
use crate::field_errors::{FieldErrors, FormFieldError, Messages};
use crate::notify::{HostNotifier, Notifier};
use crate::path::SetOptions;
use crate::registry::FieldRegistry;
use crate::store::{Transforms, ValueStore, WriteOptions};
use crate::types::{FieldCallback, FieldDef, FieldDefaults, FieldsInput, InheritableKey, OptionValue, RuleSet};
use crate::validation::{
    evaluate_field, Gate, MessageCatalog, ValidateFilter, ValidationEvent, ValidationState, Validators,
};

/// Options for [`FormManager::set_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetValueOptions {
    /// Notify the host when something changed
    pub update: bool,
    /// Validation event to gate on (change/blur consult the field's flags)
    pub event: Option<ValidationEvent>,
    /// Validate unconditionally
    pub validate: bool,
    /// Also record the value in the initial snapshot
    pub is_initial_value: bool,
    /// Apply the field's cleaning rules before storing
    pub clean_value: bool,
    /// Notify and run change callbacks even if nothing changed
    pub force: bool,
}

impl Default for SetValueOptions {
    fn default() -> Self {
        Self {
            update: true,
            event: None,
            validate: false,
            is_initial_value: false,
            clean_value: false,
            force: false,
        }
    }
}

impl SetValueOptions {
    /// Set as if the user edited the field.
    pub fn change() -> Self {
        Self {
            event: Some(ValidationEvent::Change),
            ..Default::default()
        }
    }

    /// Set and validate unconditionally.
    pub fn validated() -> Self {
        Self {
            validate: true,
            ..Default::default()
        }
    }

    /// Set without notifying the host.
    pub fn silent() -> Self {
        Self {
            update: false,
            ..Default::default()
        }
    }
}

/// Form-level event callbacks, run after the field-level ones.
#[derive(Debug, Clone, Default)]
struct FormCallbacks {
    on_change: Option<FieldCallback>,
    on_blur: Option<FieldCallback>,
    on_focus: Option<FieldCallback>,
}

/// Configuration kept for [`FormManager::reset`].
#[derive(Debug, Clone)]
struct Seed {
    initial_data: Value,
    initial_state: Value,
    initial_errors: IndexMap<String, FieldErrors>,
    field_defaults: FieldDefaults,
    extra_data: Option<Value>,
}

/// Which callback of a field to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldEvent {
    Change,
    Blur,
    Focus,
}

/// Build a form. Equivalent to [`FormManager::new`].
pub fn create_form(host: HostNotifier, config: FormConfig, initial_data: Option<Value>) -> FormManager {
    FormManager::new(host, config, initial_data)
}

/// State and behaviour of one form.
#[derive(Debug)]
pub struct FormManager {
    registry: FieldRegistry,
    store: ValueStore,
    validation: ValidationState,
    callbacks: FormCallbacks,
    notifier: Notifier,
    seed: Seed,
}

impl FormManager {
    /// Build a form from `config`.
    ///
    /// `extra_data` is loaded after the config's initial data, so it can
    /// override it. Both become the initial snapshot for dirty tracking.
    /// The host is not notified during construction.
    pub fn new(host: HostNotifier, config: FormConfig, extra_data: Option<Value>) -> Self {
        let timeout = config.validator_timeout();
        let FormConfig {
            fields,
            field_defaults,
            initial_data,
            initial_state,
            initial_errors,
            error_messages,
            formatters,
            converters,
            validators,
            on_change,
            on_blur,
            on_focus,
            ..
        } = config;

        let mut registry = FieldRegistry::new(field_defaults.clone());
        registry.register_fields(fields);

        let mut transforms = Transforms::default();
        transforms.formatters.extend(formatters);
        transforms.converters.extend(converters);

        let mut all_validators = Validators::builtin();
        all_validators.extend(validators);

        let initial_errors = initial_errors
            .into_iter()
            .map(|(name, errors)| {
                let field_name = registry.resolve_name(&name).to_string();
                (field_name, errors.into_field_errors())
            })
            .collect();

        let mut form = Self {
            registry,
            store: ValueStore::new(transforms),
            validation: ValidationState::new(
                all_validators,
                MessageCatalog::with_overrides(error_messages),
                timeout,
            ),
            callbacks: FormCallbacks {
                on_change,
                on_blur,
                on_focus,
            },
            notifier: Notifier::new(host),
            seed: Seed {
                initial_data,
                initial_state,
                initial_errors,
                field_defaults,
                extra_data,
            },
        };
        form.initialize();
        for (field_name, errors) in form.seed.initial_errors.clone() {
            form.validation.errors_mut().replace(&field_name, errors);
        }
        form.notifier.arm();
        debug!(fields = form.registry.len(), "form initialized");
        form
    }

    fn initialize(&mut self) {
        self.store.reset(&self.seed.initial_state);
        if let Value::Object(data) = self.seed.initial_data.clone() {
            self.store.load(&self.registry, data, WriteOptions::initial());
        }
        if let Some(Value::Object(data)) = self.seed.extra_data.clone() {
            self.store.load(&self.registry, data, WriteOptions::initial());
        }
        self.validation.errors_mut().clear_all();
    }

    /// Restore the form to its configured initial state: data, snapshot,
    /// state and field defaults. All errors are cleared; `initialErrors`
    /// only apply to a freshly built form.
    pub fn reset(&mut self) {
        self.registry.set_defaults(self.seed.field_defaults.clone());
        self.initialize();
        self.notify();
    }

    /// Monotonic counter bumped on every host notification.
    pub fn revision(&self) -> u64 {
        self.notifier.revision()
    }

    pub(crate) fn notify(&mut self) {
        self.notifier.notify();
    }

    /// Run `f` with notifications coalesced into at most one.
    pub fn batch<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.notifier.begin_batch();
        let result = f(self);
        self.notifier.end_batch();
        result
    }

    pub(crate) fn begin_batch(&mut self) {
        self.notifier.begin_batch();
    }

    pub(crate) fn end_batch(&mut self) {
        self.notifier.end_batch();
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn validation(&self) -> &ValidationState {
        &self.validation
    }

    /// Map a field name or alias to the canonical field name.
    pub fn resolve_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.registry.resolve_name(name)
    }

    pub fn get_field(&self, name: &str) -> Option<FieldDef> {
        self.registry.get_field(name)
    }

    pub fn get_fields(&self) -> IndexMap<String, FieldDef> {
        self.registry.get_fields()
    }

    pub fn get_validation(&self, name: &str) -> Option<RuleSet> {
        self.registry.field(name).map(|def| def.validation.clone())
    }

    /// Add or replace one field definition on a live form.
    pub fn register_field(&mut self, def: FieldDef) -> bool {
        let registered = self.registry.register_field(def);
        if registered {
            self.notify();
        }
        registered
    }

    /// Add or replace field definitions on a live form.
    pub fn register_fields(&mut self, input: impl Into<FieldsInput>) -> usize {
        let count = self.registry.register_fields(input.into());
        self.notify();
        count
    }

    /// Replace the form-level field defaults on a live form.
    pub fn set_field_defaults(&mut self, defaults: FieldDefaults) {
        self.registry.set_defaults(defaults);
        self.notify();
    }

    /// Resolve an inheritable option (e.g. `cleaning.trim`) for a field.
    pub fn effective_option(&self, name: &str, key: &str) -> Option<OptionValue> {
        self.registry.effective_option(self.registry.field(name), key)
    }

    pub(crate) fn flag(&self, field_name: &str, key: InheritableKey) -> bool {
        self.registry
            .effective_flag(self.registry.field(field_name), key)
    }

    // -----------------------------------------------------------------------
    // Data
    // -----------------------------------------------------------------------

    /// Copy of the whole data tree.
    pub fn get_data(&self) -> Value {
        self.store.data().clone()
    }

    /// Copy of one field's stored data.
    pub fn get_field_data(&self, name: &str) -> Option<Value> {
        self.store.field_data(&self.registry, name)
    }

    /// Load a data tree as the new initial data. Objects only.
    pub fn set_data(&mut self, data: Value) -> bool {
        let Value::Object(map) = data else {
            warn!("set_data requires an object; ignored");
            return false;
        };
        let changed = self.store.load(&self.registry, map, WriteOptions::initial());
        if changed {
            self.notify();
        }
        changed
    }

    /// Load one field's data (or a subtree under a path) as initial data.
    pub fn set_field_data(&mut self, name: &str, value: Value) -> bool {
        let field_name = self.registry.resolve_name(name).to_string();
        let mut map = Map::new();
        map.insert(field_name, value);
        let changed = self.store.load(&self.registry, map, WriteOptions::initial());
        if changed {
            self.notify();
        }
        changed
    }

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    /// A field's display value (cached).
    pub fn get_value(&self, name: &str) -> Value {
        self.store.value(&self.registry, name)
    }

    /// A field's display value recomputed from stored data.
    pub fn refresh_value(&mut self, name: &str) -> Value {
        self.store.refresh_value(&self.registry, name)
    }

    /// A field's display value with its cleaning rules applied.
    pub fn get_clean_value(&self, name: &str) -> Value {
        let value = self.get_value(name);
        self.clean_value(name, value)
    }

    /// Every cached display value keyed by canonical name.
    pub fn get_values(&self) -> IndexMap<String, Value> {
        self.store.values().clone()
    }

    /// Write a value without validation or callbacks.
    ///
    /// Safe to call from inside callbacks. Notifies the host when the stored
    /// value changed.
    pub fn write_value(&mut self, name: &str, value: impl Into<Value>) -> bool {
        let changed = self
            .store
            .write_value(&self.registry, name, value.into(), WriteOptions::default());
        if changed {
            self.notify();
        }
        changed
    }

    /// Set a field's value.
    ///
    /// The value is stored, then validated when `options` ask for it, then
    /// (for change events that changed something) the field's and the form's
    /// `on_change` callbacks run in that order. Returns whether the stored
    /// value changed.
    pub async fn set_value(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        options: SetValueOptions,
    ) -> Result<bool> {
        self.begin_batch();
        let result = self.set_value_inner(name, value.into(), options).await;
        self.end_batch();
        result
    }

    /// Set several values, coalescing notifications.
    pub async fn set_values(&mut self, values: Map<String, Value>, options: SetValueOptions) -> Result<bool> {
        self.begin_batch();
        let mut changed = false;
        let mut outcome = Ok(());
        for (name, value) in values {
            match self.set_value_inner(&name, value, options).await {
                Ok(field_changed) => changed |= field_changed,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }
        self.end_batch();
        outcome.map(|_| changed)
    }

    async fn set_value_inner(&mut self, name: &str, value: Value, options: SetValueOptions) -> Result<bool> {
        let field_name = self.registry.resolve_name(name).to_string();
        if !self.registry.contains(&field_name) {
            debug!(field = %field_name, "setting value of unconfigured field");
        }

        let validation_event = if options.validate {
            Some(ValidationEvent::Validate)
        } else {
            options.event
        };
        // Rules see the incoming value, not its stored or displayed form.
        let incoming = match validation_event {
            Some(_) if self.registry.contains(&field_name) => Some(if options.clean_value {
                self.clean_value(&field_name, value.clone())
            } else {
                value.clone()
            }),
            _ => None,
        };

        let write = WriteOptions {
            is_initial_value: options.is_initial_value,
            clean_value: options.clean_value,
        };
        let changed = self
            .store
            .write_value(&self.registry, &field_name, value, write);

        let mut errors_changed = false;
        if let Some(incoming) = incoming {
            let (field_errors_changed, _) = self
                .run_validation(&field_name, Some(incoming), validation_event)
                .await?;
            errors_changed = field_errors_changed;
        }

        let relevant = changed || options.force;
        if options.event == Some(ValidationEvent::Change) && relevant {
            let display = self.get_value(&field_name);
            self.fire(FieldEvent::Change, &field_name, &display);
        }

        if options.update && (relevant || errors_changed) {
            self.notify();
        }
        Ok(changed)
    }

    /// Apply a field's cleaning rules to `value`.
    pub fn clean_value(&self, name: &str, value: Value) -> Value {
        self.store
            .clean_value(&self.registry, self.registry.field(name), value)
    }

    /// Clean a field's current value in place, validating it as a change.
    pub async fn clean_field(&mut self, name: &str) -> Result<bool> {
        let current = self.get_value(name);
        let cleaned = self.clean_value(name, current.clone());
        if cleaned == current {
            return Ok(false);
        }
        self.set_value(name, cleaned, SetValueOptions::change()).await
    }

    // -----------------------------------------------------------------------
    // Dirty tracking
    // -----------------------------------------------------------------------

    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty(&self.registry, None)
    }

    pub fn is_field_dirty(&self, name: &str) -> bool {
        self.store.is_dirty(&self.registry, Some(name))
    }

    pub fn is_clean(&self) -> bool {
        !self.is_dirty()
    }

    pub fn is_field_clean(&self, name: &str) -> bool {
        !self.is_field_dirty(name)
    }

    /// Current data of every changed field as a nested tree.
    pub fn get_changes(&self) -> Value {
        self.store.changes()
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    /// Copy of the whole state tree.
    pub fn get_state(&self) -> Value {
        self.store.state(None).unwrap_or(Value::Null)
    }

    /// Copy of one state key (dotted paths allowed).
    pub fn get_state_value(&self, key: &str) -> Option<Value> {
        self.store.state(Some(key))
    }

    /// Write a state key. Objects are deep-merged into existing objects.
    pub fn set_state(&mut self, key: &str, value: Value) -> bool {
        let changed = self.store.set_state(key, Some(value), SetOptions::merge());
        if changed {
            self.notify();
        }
        changed
    }

    /// Remove a state key.
    pub fn remove_state(&mut self, key: &str) -> bool {
        let changed = self.store.set_state(key, None, SetOptions::default());
        if changed {
            self.notify();
        }
        changed
    }

    // -----------------------------------------------------------------------
    // Errors
    // -----------------------------------------------------------------------

    /// A field's error messages as a list.
    pub fn get_errors(&self, name: &str) -> Vec<String> {
        self.validation.errors().messages(self.resolve_name(name))
    }

    /// A field's error messages joined with newlines.
    pub fn get_error_text(&self, name: &str) -> String {
        self.get_errors(name).join("\n")
    }

    /// A field's errors keyed by rule.
    pub fn get_field_errors(&self, name: &str) -> Option<FieldErrors> {
        self.validation.errors().get(self.resolve_name(name)).cloned()
    }

    /// Whether a field reports its errors as text (`returnErrorsAsString`).
    pub fn errors_as_text(&self, name: &str) -> bool {
        self.flag(self.resolve_name(name), InheritableKey::ReturnErrorsAsString)
    }

    /// Every field with errors, with its alias and display name.
    pub fn get_form_errors(&self) -> Vec<FormFieldError> {
        self.validation
            .errors()
            .iter()
            .map(|(field_name, errors)| {
                let def = self.registry.field(field_name);
                FormFieldError {
                    name: field_name.to_string(),
                    alias_name: def.and_then(|d| d.alias_name.clone()),
                    display_name: def.and_then(|d| d.display_name.clone()),
                    errors: crate::field_errors::flatten(errors),
                }
            })
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.validation.errors().any()
    }

    pub fn field_has_errors(&self, name: &str) -> bool {
        self.validation.errors().has(self.resolve_name(name))
    }

    /// Set a field's error for `rule`. With `merge` other rule errors stay.
    pub fn set_errors(&mut self, name: &str, rule: &str, messages: impl Into<Messages>, merge: bool) -> bool {
        let field_name = self.registry.resolve_name(name).to_string();
        let changed = self
            .validation
            .errors_mut()
            .set(&field_name, rule, messages.into().into_vec(), merge);
        if changed {
            self.notify();
        }
        changed
    }

    /// Clear the errors of the named fields.
    pub fn clear_errors<I, S>(&mut self, names: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut changed = false;
        for name in names {
            let field_name = self.registry.resolve_name(name.as_ref()).to_string();
            changed |= self.validation.errors_mut().clear(&field_name);
        }
        if changed {
            self.notify();
        }
        changed
    }

    /// Clear every field's errors.
    pub fn clear_all_errors(&mut self) -> bool {
        let changed = self.validation.errors_mut().clear_all();
        if changed {
            self.notify();
        }
        changed
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Validate one field.
    ///
    /// `value` defaults to the field's current display value. With a change
    /// or blur `event` the field's validate/revalidate flags decide whether
    /// anything runs; when nothing runs the field's current validity is
    /// returned. Returns whether the field is error-free.
    pub async fn validate(
        &mut self,
        name: &str,
        value: Option<Value>,
        event: Option<ValidationEvent>,
    ) -> Result<bool> {
        let field_name = self.registry.resolve_name(name).to_string();
        let (changed, valid) = self.run_validation(&field_name, value, event).await?;
        if changed {
            self.notify();
        }
        Ok(valid)
    }

    /// Validate one field unconditionally against its current value.
    pub async fn validate_field(&mut self, name: &str) -> Result<bool> {
        self.validate(name, None, Some(ValidationEvent::Validate)).await
    }

    /// Gate, evaluate and commit. Returns `(errors_changed, valid)` without
    /// notifying.
    async fn run_validation(
        &mut self,
        field_name: &str,
        value: Option<Value>,
        event: Option<ValidationEvent>,
    ) -> Result<(bool, bool)> {
        if let Gate::Skip { valid } = self.validation.gate(&self.registry, field_name, event) {
            return Ok((false, valid));
        }
        let value = value.unwrap_or_else(|| self.get_value(field_name));
        let value = if self.flag(field_name, InheritableKey::CleanOnValidation) {
            self.clean_value(field_name, value)
        } else {
            value
        };
        let evaluation = evaluate_field(self, field_name, value).await?;
        Ok(self.validation.commit(field_name, evaluation))
    }

    /// Validate every data field concurrently. Returns whether all of the
    /// validated fields are error-free. The host is notified once.
    pub async fn validate_all(&mut self, filter: ValidateFilter) -> Result<bool> {
        let resolve = |names: &[String]| -> HashSet<String> {
            names
                .iter()
                .map(|n| self.registry.resolve_name(n).to_string())
                .collect()
        };
        let only = filter.only.as_deref().map(&resolve);
        let ignore = resolve(&filter.ignore);

        let targets: Vec<(String, Value)> = self
            .registry
            .fields()
            .iter()
            .filter(|def| def.is_data)
            .filter(|def| only.as_ref().is_none_or(|only| only.contains(&def.name)))
            .filter(|def| !ignore.contains(&def.name))
            .map(|def| (def.name.clone(), self.get_value(&def.name)))
            .collect();

        let evaluations = {
            let form: &Self = self;
            join_all(
                targets
                    .iter()
                    .map(|(field_name, value)| evaluate_field(form, field_name, value.clone())),
            )
            .await
        };

        let mut all_valid = true;
        let mut outcome = Ok(());
        for ((field_name, _), evaluation) in targets.iter().zip(evaluations) {
            match evaluation {
                Ok(evaluation) => {
                    let (_, valid) = self.validation.commit(field_name, evaluation);
                    all_valid &= valid;
                }
                Err(e) if outcome.is_ok() => outcome = Err(e),
                Err(_) => {}
            }
        }
        self.notify();
        debug!(fields = targets.len(), valid = all_valid, "validated form");
        outcome.map(|_| all_valid)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Run the field-level then form-level callback for `event`.
    pub(crate) fn fire(&mut self, event: FieldEvent, field_name: &str, value: &Value) {
        let field_callback = self.registry.field(field_name).and_then(|def| match event {
            FieldEvent::Change => def.on_change.clone(),
            FieldEvent::Blur => def.on_blur.clone(),
            FieldEvent::Focus => def.on_focus.clone(),
        });
        let form_callback = match event {
            FieldEvent::Change => self.callbacks.on_change.clone(),
            FieldEvent::Blur => self.callbacks.on_blur.clone(),
            FieldEvent::Focus => self.callbacks.on_focus.clone(),
        };
        for callback in [field_callback, form_callback].into_iter().flatten() {
            callback.call(value, field_name, self);
        }
    }

    /// A control's value changed.
    pub async fn on_field_change(&mut self, name: &str, value: impl Into<Value>) -> Result<bool> {
        self.set_value(name, value, SetValueOptions::change()).await
    }

    /// A control gained focus. Unconfigured fields are ignored.
    pub fn on_field_focus(&mut self, name: &str) {
        let field_name = self.registry.resolve_name(name).to_string();
        if !self.registry.contains(&field_name) {
            debug!(field = %field_name, "focus on unconfigured field ignored");
            return;
        }
        let value = self.get_value(&field_name);
        self.fire(FieldEvent::Focus, &field_name, &value);
    }

    /// A control lost focus.
    ///
    /// When `cleanOnBlur` applies the value is cleaned and, if that changed
    /// it, written back as a change. The (cleaned) value is then validated
    /// as a blur, and the blur callbacks run. Unconfigured fields are
    /// ignored.
    pub async fn on_field_blur(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let field_name = self.registry.resolve_name(name).to_string();
        if !self.registry.contains(&field_name) {
            debug!(field = %field_name, "blur on unconfigured field ignored");
            return Ok(());
        }
        self.begin_batch();
        let result = self.blur_inner(&field_name, value.into()).await;
        self.end_batch();
        result
    }

    async fn blur_inner(&mut self, field_name: &str, value: Value) -> Result<()> {
        let mut value = value;
        if self.flag(field_name, InheritableKey::CleanOnBlur) {
            let cleaned = self.clean_value(field_name, value.clone());
            if cleaned != value {
                self.set_value_inner(field_name, cleaned.clone(), SetValueOptions::change())
                    .await?;
                value = cleaned;
            }
        }
        self.validate(field_name, Some(value.clone()), Some(ValidationEvent::Blur))
            .await?;
        self.fire(FieldEvent::Blur, field_name, &value);
        Ok(())
    }
}
