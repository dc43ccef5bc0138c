//! FieldRegistry: the form's field configuration.
//!
//! Holds field definitions in registration order with in-memory indexes for
//! lookup by canonical name and by alias, plus the form-level defaults that
//! unset field options inherit.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{FieldDef, FieldDefaults, FieldsInput, InheritableKey, OptionValue, Transform};

/// What a data path refers to when loading a data tree.
#[derive(Debug)]
pub enum PathTarget<'a> {
    /// A configured field
    Field(&'a FieldDef),
    /// An unconfigured object whose children should be loaded individually
    Branch,
    /// An unconfigured leaf value stored as-is
    Leaf,
}

/// Field definitions plus name and alias indexes.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    fields: Vec<FieldDef>,
    name_index: HashMap<String, usize>,
    alias_index: HashMap<String, usize>,
    configured_defaults: FieldDefaults,
    defaults: FieldDefaults,
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::new(FieldDefaults::default())
    }
}

impl FieldRegistry {
    /// Create an empty registry. `defaults` is layered over the system
    /// defaults.
    pub fn new(defaults: FieldDefaults) -> Self {
        Self {
            fields: Vec::new(),
            name_index: HashMap::new(),
            alias_index: HashMap::new(),
            defaults: FieldDefaults::system().overlay(&defaults),
            configured_defaults: defaults,
        }
    }

    /// Register a batch of definitions. Returns how many were accepted.
    pub fn register_fields(&mut self, input: FieldsInput) -> usize {
        let count = input
            .into_defs()
            .into_iter()
            .map(|def| self.register_field(def))
            .filter(|accepted| *accepted)
            .count();
        debug!(fields = self.fields.len(), registered = count, "registered field definitions");
        count
    }

    /// Register (or replace) one definition.
    ///
    /// Definitions without a name are skipped. When two fields claim the same
    /// alias the later registration wins.
    pub fn register_field(&mut self, def: FieldDef) -> bool {
        if def.name.trim().is_empty() {
            warn!(alias = ?def.alias_name, "skipping field definition without a name");
            return false;
        }

        let index = match self.name_index.get(&def.name) {
            Some(&index) => {
                let previous_alias = self.fields[index].alias_name.clone();
                if let Some(alias) = previous_alias {
                    if self.alias_index.get(&alias) == Some(&index) {
                        self.alias_index.remove(&alias);
                    }
                }
                self.fields[index] = def;
                index
            }
            None => {
                let index = self.fields.len();
                self.name_index.insert(def.name.clone(), index);
                self.fields.push(def);
                index
            }
        };

        if let Some(alias) = self.fields[index].alias_name.clone().filter(|a| !a.is_empty()) {
            if let Some(&other) = self.alias_index.get(&alias) {
                if other != index {
                    warn!(
                        alias = %alias,
                        previous = %self.fields[other].name,
                        field = %self.fields[index].name,
                        "alias reassigned to a later field"
                    );
                }
            }
            self.alias_index.insert(alias, index);
        }
        true
    }

    /// Map a name or alias to the canonical field name.
    ///
    /// Canonical names win over aliases. Unknown names are returned unchanged,
    /// which makes the mapping idempotent.
    pub fn resolve_name<'a>(&'a self, name: &'a str) -> &'a str {
        if self.name_index.contains_key(name) {
            return name;
        }
        match self.alias_index.get(name) {
            Some(&index) => &self.fields[index].name,
            None => name,
        }
    }

    /// Borrow the definition for a name or alias.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        let canonical = self.resolve_name(name);
        self.name_index.get(canonical).map(|&index| &self.fields[index])
    }

    /// Copy of the definition for a name or alias.
    pub fn get_field(&self, name: &str) -> Option<FieldDef> {
        self.field(name).cloned()
    }

    /// All definitions in registration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Copy of all definitions keyed by canonical name.
    pub fn get_fields(&self) -> indexmap::IndexMap<String, FieldDef> {
        self.fields
            .iter()
            .map(|def| (def.name.clone(), def.clone()))
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Alias → canonical name pairs.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.alias_index
            .iter()
            .map(|(alias, &index)| (alias.as_str(), self.fields[index].name.as_str()))
    }

    /// Effective form-level defaults (system defaults plus configuration).
    pub fn defaults(&self) -> &FieldDefaults {
        &self.defaults
    }

    /// Replace the configured defaults.
    pub fn set_defaults(&mut self, defaults: FieldDefaults) {
        self.defaults = FieldDefaults::system().overlay(&defaults);
        self.configured_defaults = defaults;
    }

    /// The defaults as configured, without the system layer.
    pub fn configured_defaults(&self) -> &FieldDefaults {
        &self.configured_defaults
    }

    /// Resolve a boolean option for `field`, falling back to form defaults.
    pub fn effective_flag(&self, field: Option<&FieldDef>, key: InheritableKey) -> bool {
        field
            .and_then(|def| def.own_option(key))
            .and_then(|value| value.as_bool())
            .or_else(|| self.defaults.flag(key))
            .unwrap_or(false)
    }

    /// Resolve the reformat transform for `field`, falling back to defaults.
    pub fn effective_reformat<'a>(&'a self, field: Option<&'a FieldDef>) -> Option<&'a Transform> {
        field
            .and_then(|def| def.cleaning.reformat.as_ref())
            .or(self.defaults.cleaning.reformat.as_ref())
    }

    /// Resolve an option by its dotted key, e.g. `cleaning.trimInner`.
    ///
    /// Unknown keys resolve to `None`.
    pub fn effective_option(&self, field: Option<&FieldDef>, key: &str) -> Option<OptionValue> {
        let key: InheritableKey = match key.parse() {
            Ok(key) => key,
            Err(e) => {
                debug!(%e, "unknown option key");
                return None;
            }
        };
        if key == InheritableKey::Reformat {
            return self
                .effective_reformat(field)
                .cloned()
                .map(OptionValue::Transform);
        }
        Some(OptionValue::Flag(self.effective_flag(field, key)))
    }

    /// Classify a data path for loading a data tree.
    pub fn classify(&self, path: &str, value: &Value) -> PathTarget<'_> {
        match self.field(path) {
            Some(def) => PathTarget::Field(def),
            None if value.is_object() => PathTarget::Branch,
            None => PathTarget::Leaf,
        }
    }
}
