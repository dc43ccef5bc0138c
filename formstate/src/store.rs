//! Value store: form data, form state, display values and dirty tracking.
//!
//! Data flows in two directions:
//!
//! - **write**: input → `dataType` conversion → `dataFormat` formatting →
//!   optional cleaning → stored in the data tree (or the state tree for
//!   fields with `isData: false`)
//! - **read**: stored value → `valueType` conversion → `valueFormat`
//!   formatting → display value (`null` becomes `""`)
//!
//! Display values are cached per field and recomputed whenever the field is
//! written. A field is dirty when its data differs from the initial snapshot
//! taken when data was loaded.

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::{debug, trace};

use formstate_format::{formatters::proper_case_str, is_falsy, TransformRegistry};

use crate::path::{self, loose_eq, SetOptions};
use crate::registry::{FieldRegistry, PathTarget};
use crate::types::{FieldDef, InheritableKey, Transform};

fn inner_whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid whitespace regex"))
}

/// Options for [`ValueStore::write_value`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Also record the value in the initial snapshot (it will not be dirty)
    pub is_initial_value: bool,
    /// Apply the field's cleaning rules before storing
    pub clean_value: bool,
}

impl WriteOptions {
    pub fn initial() -> Self {
        Self {
            is_initial_value: true,
            clean_value: false,
        }
    }
}

/// Formatter and converter tables used by the store.
#[derive(Debug, Clone)]
pub struct Transforms {
    pub formatters: TransformRegistry,
    pub converters: TransformRegistry,
}

impl Default for Transforms {
    fn default() -> Self {
        Self {
            formatters: TransformRegistry::formatters(),
            converters: TransformRegistry::converters(),
        }
    }
}

impl Transforms {
    fn convert(&self, transform: Option<&Transform>, value: Value) -> Value {
        match transform {
            Some(t) => t.apply(&self.converters, &value),
            None => value,
        }
    }

    fn format(&self, transform: Option<&Transform>, value: Value) -> Value {
        match transform {
            Some(t) => t.apply(&self.formatters, &value),
            None => value,
        }
    }
}

/// Data tree, initial snapshot, state tree, display cache and dirty set.
#[derive(Debug, Clone)]
pub struct ValueStore {
    data: Value,
    initial: Value,
    state: Value,
    values: IndexMap<String, Value>,
    dirty: IndexSet<String>,
    transforms: Transforms,
}

impl Default for ValueStore {
    fn default() -> Self {
        Self::new(Transforms::default())
    }
}

impl ValueStore {
    pub fn new(transforms: Transforms) -> Self {
        Self {
            data: Value::Object(Map::new()),
            initial: Value::Object(Map::new()),
            state: Value::Object(Map::new()),
            values: IndexMap::new(),
            dirty: IndexSet::new(),
            transforms,
        }
    }

    pub fn transforms(&self) -> &Transforms {
        &self.transforms
    }

    /// Empty everything and seed form state from `initial_state`.
    pub fn reset(&mut self, initial_state: &Value) {
        self.data = Value::Object(Map::new());
        self.initial = Value::Object(Map::new());
        self.state = Value::Object(Map::new());
        self.values.clear();
        self.dirty.clear();
        if initial_state.is_object() {
            path::deep_merge(&mut self.state, initial_state.clone());
        }
    }

    // -----------------------------------------------------------------------
    // Data
    // -----------------------------------------------------------------------

    /// The whole data tree.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Copy of the data at a field path (name or alias).
    pub fn field_data(&self, registry: &FieldRegistry, name: &str) -> Option<Value> {
        path::get_cloned(&self.data, registry.resolve_name(name))
    }

    /// Load a data tree.
    ///
    /// Each key is matched against field configuration: configured fields are
    /// written through their transforms (and cleaned when `cleanOnBlur`
    /// applies), unconfigured objects are descended into, and other
    /// unconfigured values are stored as-is.
    pub fn load(&mut self, registry: &FieldRegistry, data: Map<String, Value>, options: WriteOptions) -> bool {
        self.load_branch(registry, "", data, options)
    }

    fn load_branch(
        &mut self,
        registry: &FieldRegistry,
        parent: &str,
        branch: Map<String, Value>,
        options: WriteOptions,
    ) -> bool {
        let mut changed = false;
        for (key, value) in branch {
            let field_path = path::join(parent, &key);
            match registry.classify(&field_path, &value) {
                PathTarget::Field(def) => {
                    let clean_value =
                        options.clean_value || registry.effective_flag(Some(def), InheritableKey::CleanOnBlur);
                    let write = WriteOptions {
                        clean_value,
                        ..options
                    };
                    changed |= self.write_value(registry, &field_path, value, write);
                }
                PathTarget::Branch => {
                    if let Value::Object(children) = value {
                        changed |= self.load_branch(registry, &field_path, children, options);
                    }
                }
                PathTarget::Leaf => {
                    changed |= self.write_value(registry, &field_path, value, options);
                }
            }
        }
        changed
    }

    /// Write one field's value. Returns whether stored state changed.
    pub fn write_value(
        &mut self,
        registry: &FieldRegistry,
        name: &str,
        value: Value,
        options: WriteOptions,
    ) -> bool {
        let field_name = registry.resolve_name(name).to_string();
        let def = registry.field(&field_name);

        let changed = match def {
            Some(def) if !def.is_data => {
                path::set(&mut self.state, &field_name, Some(value), SetOptions::default())
            }
            Some(def) => {
                let mut stored = self.transforms.convert(def.data_type.as_ref(), value);
                stored = self.transforms.format(def.data_format.as_ref(), stored);
                if options.clean_value {
                    stored = self.clean_value(registry, Some(def), stored);
                }
                self.store_data(&field_name, stored, options)
            }
            None => {
                trace!(field = %field_name, "writing unconfigured field");
                self.store_data(&field_name, value, options)
            }
        };

        self.refresh_value(registry, &field_name);
        if def.is_none_or(|def| def.is_data) {
            self.sync_descendants(registry, &field_name);
        }
        changed
    }

    /// Re-derive dirty flags and display values of configured or tracked
    /// fields nested under `field_name` after it was overwritten.
    fn sync_descendants(&mut self, registry: &FieldRegistry, field_name: &str) {
        let prefix = format!("{field_name}.");
        let mut nested: Vec<String> = registry
            .fields()
            .iter()
            .filter(|def| def.is_data && def.name.starts_with(&prefix))
            .map(|def| def.name.clone())
            .collect();
        for tracked in self.dirty.iter().filter(|name| name.starts_with(&prefix)) {
            if !nested.contains(tracked) {
                nested.push(tracked.clone());
            }
        }
        for name in nested {
            let current = path::get(&self.data, &name).cloned().unwrap_or(Value::Null);
            self.update_dirty(&name, &current);
            if registry.contains(&name) {
                self.refresh_value(registry, &name);
            }
        }
    }

    fn store_data(&mut self, field_name: &str, value: Value, options: WriteOptions) -> bool {
        let mut changed = false;
        if options.is_initial_value {
            changed |= path::set(
                &mut self.initial,
                field_name,
                Some(value.clone()),
                SetOptions::default(),
            );
        }
        changed |= path::set(&mut self.data, field_name, Some(value.clone()), SetOptions::default());
        self.update_dirty(field_name, &value);
        changed
    }

    fn update_dirty(&mut self, field_name: &str, value: &Value) {
        let dirty = match path::get(&self.initial, field_name) {
            None => !matches!(value, Value::Null | Value::Bool(false))
                && value.as_str() != Some(""),
            Some(initial) => !loose_eq(initial, value),
        };
        if dirty {
            self.dirty.insert(field_name.to_string());
        } else {
            self.dirty.shift_remove(field_name);
        }
    }

    // -----------------------------------------------------------------------
    // Display values
    // -----------------------------------------------------------------------

    fn stored_value(&self, registry: &FieldRegistry, field_name: &str) -> Option<&Value> {
        match registry.field(field_name) {
            Some(def) if !def.is_data => path::get(&self.state, field_name),
            _ => path::get(&self.data, field_name),
        }
    }

    /// Compute a display value from stored data without caching it.
    pub fn derive_value(&self, registry: &FieldRegistry, name: &str) -> Value {
        let field_name = registry.resolve_name(name);
        let stored = self
            .stored_value(registry, field_name)
            .cloned()
            .unwrap_or(Value::Null);
        let display = match registry.field(field_name) {
            Some(def) => {
                let converted = self.transforms.convert(def.value_type.as_ref(), stored);
                self.transforms.format(def.value_format.as_ref(), converted)
            }
            None => stored,
        };
        if display.is_null() {
            Value::from("")
        } else {
            display
        }
    }

    /// Recompute and cache a field's display value.
    pub fn refresh_value(&mut self, registry: &FieldRegistry, name: &str) -> Value {
        let field_name = registry.resolve_name(name).to_string();
        let display = self.derive_value(registry, &field_name);
        self.values.insert(field_name, display.clone());
        display
    }

    /// The cached display value, or a freshly derived one.
    pub fn value(&self, registry: &FieldRegistry, name: &str) -> Value {
        let field_name = registry.resolve_name(name);
        match self.values.get(field_name) {
            Some(value) => value.clone(),
            None => self.derive_value(registry, field_name),
        }
    }

    /// Every cached display value keyed by canonical field name.
    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    // -----------------------------------------------------------------------
    // Cleaning
    // -----------------------------------------------------------------------

    /// Apply a field's cleaning rules: reformat, then for strings trim,
    /// collapse inner whitespace and fix single-case text.
    ///
    /// Falsy values are returned unchanged.
    pub fn clean_value(&self, registry: &FieldRegistry, field: Option<&FieldDef>, value: Value) -> Value {
        if is_falsy(&value) {
            return value;
        }

        let value = match registry.effective_reformat(field) {
            Some(reformat) => reformat.apply(&self.transforms.formatters, &value),
            None => value,
        };

        let Value::String(mut text) = value else {
            return value;
        };
        if registry.effective_flag(field, InheritableKey::Trim) {
            text = text.trim().to_string();
        }
        if registry.effective_flag(field, InheritableKey::TrimInner) {
            text = inner_whitespace_regex().replace_all(&text, " ").into_owned();
        }
        if registry.effective_flag(field, InheritableKey::MonoCaseToProper) {
            let mono_case = text == text.to_uppercase() || text == text.to_lowercase();
            if mono_case {
                text = proper_case_str(&text);
            }
        }
        Value::String(text)
    }

    // -----------------------------------------------------------------------
    // Dirty tracking
    // -----------------------------------------------------------------------

    /// Whether any field (or, with a name, that field) differs from its
    /// initial value.
    pub fn is_dirty(&self, registry: &FieldRegistry, name: Option<&str>) -> bool {
        match name {
            Some(name) => self.dirty.contains(registry.resolve_name(name)),
            None => !self.dirty.is_empty(),
        }
    }

    /// Names of the dirty fields.
    pub fn dirty_fields(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// Current data of every dirty field, as a nested tree.
    pub fn changes(&self) -> Value {
        let mut changes = Value::Object(Map::new());
        for field_name in &self.dirty {
            let value = path::get_cloned(&self.data, field_name);
            path::set(&mut changes, field_name, value.or(Some(Value::Null)), SetOptions::default());
        }
        debug!(dirty = self.dirty.len(), "collected changes");
        changes
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    /// The state tree, or one key of it.
    pub fn state(&self, key: Option<&str>) -> Option<Value> {
        match key {
            Some(key) => path::get_cloned(&self.state, key),
            None => Some(self.state.clone()),
        }
    }

    /// Write (or with `None`, delete) a state key.
    pub fn set_state(&mut self, key: &str, value: Option<Value>, options: SetOptions) -> bool {
        path::set(&mut self.state, key, value, options)
    }
}
