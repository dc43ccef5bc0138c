//! Field definition types.
//!
//! A [`FieldDef`] is the configuration of one form field. Most of it can be
//! read from YAML or JSON; the callable parts (callbacks, function rules,
//! function transforms) are attached with builder methods.

use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use formstate_format::{is_falsy, TransformFn, TransformRegistry};

use crate::form::FormManager;
use crate::validation::rules::{RuleInput, RuleOutcome, ValidatorFn};
use crate::validation::RuleError;

// ---------------------------------------------------------------------------
// Callbacks
// ---------------------------------------------------------------------------

/// Signature of field and form event callbacks: `(value, field_name, form)`.
pub type CallbackFn = dyn Fn(&Value, &str, &mut FormManager) + Send + Sync;

/// A change, blur or focus callback.
///
/// Callbacks receive the form mutably, so they may read and write other
/// fields (for example clearing a dependent field when its parent changes).
#[derive(Clone)]
pub struct FieldCallback(Arc<CallbackFn>);

impl FieldCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &str, &mut FormManager) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, value: &Value, field_name: &str, form: &mut FormManager) {
        (self.0)(value, field_name, form)
    }
}

impl fmt::Debug for FieldCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldCallback(..)")
    }
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

/// Reference to a formatter or converter.
///
/// In config a transform is either a name (`"phone"`) or a list whose first
/// element is the name and second the options (`["date", "long-date"]`).
#[derive(Clone)]
pub enum Transform {
    Named { name: String, options: Option<Value> },
    Func(TransformFn),
}

impl Transform {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            options: None,
        }
    }

    pub fn with_options(name: impl Into<String>, options: Value) -> Self {
        Self::Named {
            name: name.into(),
            options: Some(options),
        }
    }

    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Value, Option<&Value>) -> Value + Send + Sync + 'static,
    {
        Self::Func(Arc::new(f))
    }

    /// Apply using `registry` to resolve names. Unknown or empty names are
    /// the identity transform.
    pub fn apply(&self, registry: &TransformRegistry, value: &Value) -> Value {
        match self {
            Self::Named { name, .. } if name.is_empty() => value.clone(),
            Self::Named { name, options } => registry.apply(name, value, options.as_ref()),
            Self::Func(f) => f(value, None),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named { name, options } => f
                .debug_struct("Named")
                .field("name", name)
                .field("options", options)
                .finish(),
            Self::Func(_) => f.write_str("Func(..)"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TransformSpec {
    Name(String),
    WithOptions(Vec<Value>),
}

impl<'de> Deserialize<'de> for Transform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match TransformSpec::deserialize(deserializer)? {
            TransformSpec::Name(name) => Ok(Self::named(name)),
            TransformSpec::WithOptions(items) => {
                let mut items = items.into_iter();
                match items.next() {
                    Some(Value::String(name)) => Ok(Self::Named {
                        name,
                        options: items.next(),
                    }),
                    _ => Err(de::Error::custom(
                        "a transform list must start with the transform name",
                    )),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Validation rules
// ---------------------------------------------------------------------------

/// One entry in a field's validation rules.
#[derive(Clone)]
pub enum Rule {
    /// Parameter for the built-in (or registered) validator of the same name
    Param(Value),
    /// A field-specific validator function
    Func(ValidatorFn),
}

impl Rule {
    /// Whether the rule participates in validation. `false` and `null`
    /// parameters switch a rule off.
    pub fn is_active(&self) -> bool {
        match self {
            Self::Func(_) => true,
            Self::Param(param) => !matches!(param, Value::Null | Value::Bool(false)),
        }
    }

    pub fn param(&self) -> &Value {
        static NONE: Value = Value::Null;
        match self {
            Self::Param(param) => param,
            Self::Func(_) => &NONE,
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Param(param) => f.debug_tuple("Param").field(param).finish(),
            Self::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for Rule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::Param)
    }
}

/// Ordered validation rules of a field, keyed by rule name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: IndexMap<String, Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameterized rule, e.g. `("minLength", json!(3))`.
    pub fn with(mut self, name: impl Into<String>, param: Value) -> Self {
        self.rules.insert(name.into(), Rule::Param(param));
        self
    }

    /// Add a function rule under `name`.
    pub fn with_fn<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RuleInput<'_>) -> Result<RuleOutcome, RuleError> + Send + Sync + 'static,
    {
        self.rules.insert(name.into(), Rule::Func(Arc::new(f)));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, rule: Rule) {
        self.rules.insert(name.into(), rule);
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    /// The `required` rule, if present and active.
    pub fn required(&self) -> Option<&Rule> {
        self.rules.get("required").filter(|rule| rule.is_active())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.rules.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

// ---------------------------------------------------------------------------
// Error messages
// ---------------------------------------------------------------------------

/// Signature of a message function: `(display_name, rule_param) -> message`.
pub type MessageFn = Arc<dyn Fn(Option<&str>, &Value) -> String + Send + Sync>;

/// An error-message template.
///
/// Text templates may contain `{name}`, `{value}`, `{value1}` and `{value2}`.
/// Groups hold several templates for one rule (the `password` rule reports
/// each unmet requirement separately); a group's `default` entry is used when
/// the group as a whole is rendered.
#[derive(Clone)]
pub enum ErrorMessage {
    Text(String),
    Group(IndexMap<String, String>),
    Func(MessageFn),
}

impl ErrorMessage {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(Option<&str>, &Value) -> String + Send + Sync + 'static,
    {
        Self::Func(Arc::new(f))
    }

    /// Look up an entry of a group message.
    pub fn entry(&self, key: &str) -> Option<&str> {
        match self {
            Self::Group(group) => group.get(key).map(String::as_str),
            _ => None,
        }
    }
}

impl From<&str> for ErrorMessage {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for ErrorMessage {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl fmt::Debug for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Group(group) => f.debug_tuple("Group").field(group).finish(),
            Self::Func(_) => f.write_str("Func(..)"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorMessageSpec {
    Text(String),
    Group(IndexMap<String, String>),
}

impl<'de> Deserialize<'de> for ErrorMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match ErrorMessageSpec::deserialize(deserializer)? {
            ErrorMessageSpec::Text(text) => Self::Text(text),
            ErrorMessageSpec::Group(group) => Self::Group(group),
        })
    }
}

// ---------------------------------------------------------------------------
// Cleaning and inheritable options
// ---------------------------------------------------------------------------

/// Cleaning options applied on blur (and optionally on validation).
///
/// Unset options inherit from the form's field defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cleaning {
    pub clean_on_blur: Option<bool>,
    pub clean_on_validation: Option<bool>,
    pub trim: Option<bool>,
    pub trim_inner: Option<bool>,
    pub mono_case_to_proper: Option<bool>,
    pub reformat: Option<Transform>,
}

impl Cleaning {
    fn overlay(&self, other: &Cleaning) -> Cleaning {
        Cleaning {
            clean_on_blur: other.clean_on_blur.or(self.clean_on_blur),
            clean_on_validation: other.clean_on_validation.or(self.clean_on_validation),
            trim: other.trim.or(self.trim),
            trim_inner: other.trim_inner.or(self.trim_inner),
            mono_case_to_proper: other.mono_case_to_proper.or(self.mono_case_to_proper),
            reformat: other.reformat.clone().or_else(|| self.reformat.clone()),
        }
    }
}

/// Options a field inherits from the form when it does not set them itself.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldDefaults {
    pub validate_on_change: Option<bool>,
    pub validate_on_blur: Option<bool>,
    pub revalidate_on_change: Option<bool>,
    pub revalidate_on_blur: Option<bool>,
    pub return_errors_as_string: Option<bool>,
    pub read_only: Option<bool>,
    pub disabled: Option<bool>,
    pub cleaning: Cleaning,
}

impl FieldDefaults {
    /// Built-in defaults every form starts from.
    pub fn system() -> Self {
        Self {
            validate_on_change: Some(false),
            validate_on_blur: Some(false),
            revalidate_on_change: Some(false),
            revalidate_on_blur: Some(false),
            return_errors_as_string: Some(true),
            read_only: Some(false),
            disabled: Some(false),
            cleaning: Cleaning {
                clean_on_blur: Some(true),
                clean_on_validation: Some(false),
                trim: Some(true),
                trim_inner: Some(false),
                mono_case_to_proper: Some(false),
                reformat: None,
            },
        }
    }

    /// Layer `other` on top of `self`; options set in `other` win.
    pub fn overlay(&self, other: &FieldDefaults) -> FieldDefaults {
        FieldDefaults {
            validate_on_change: other.validate_on_change.or(self.validate_on_change),
            validate_on_blur: other.validate_on_blur.or(self.validate_on_blur),
            revalidate_on_change: other.revalidate_on_change.or(self.revalidate_on_change),
            revalidate_on_blur: other.revalidate_on_blur.or(self.revalidate_on_blur),
            return_errors_as_string: other
                .return_errors_as_string
                .or(self.return_errors_as_string),
            read_only: other.read_only.or(self.read_only),
            disabled: other.disabled.or(self.disabled),
            cleaning: self.cleaning.overlay(&other.cleaning),
        }
    }

    pub fn flag(&self, key: InheritableKey) -> Option<bool> {
        match key {
            InheritableKey::ValidateOnChange => self.validate_on_change,
            InheritableKey::ValidateOnBlur => self.validate_on_blur,
            InheritableKey::RevalidateOnChange => self.revalidate_on_change,
            InheritableKey::RevalidateOnBlur => self.revalidate_on_blur,
            InheritableKey::ReturnErrorsAsString => self.return_errors_as_string,
            InheritableKey::ReadOnly => self.read_only,
            InheritableKey::Disabled => self.disabled,
            InheritableKey::CleanOnBlur => self.cleaning.clean_on_blur,
            InheritableKey::CleanOnValidation => self.cleaning.clean_on_validation,
            InheritableKey::Trim => self.cleaning.trim,
            InheritableKey::TrimInner => self.cleaning.trim_inner,
            InheritableKey::MonoCaseToProper => self.cleaning.mono_case_to_proper,
            InheritableKey::Reformat => None,
        }
    }
}

/// The option keys a field may inherit, addressed by their dotted names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InheritableKey {
    ValidateOnChange,
    ValidateOnBlur,
    RevalidateOnChange,
    RevalidateOnBlur,
    ReturnErrorsAsString,
    ReadOnly,
    Disabled,
    CleanOnBlur,
    CleanOnValidation,
    Trim,
    TrimInner,
    MonoCaseToProper,
    Reformat,
}

impl InheritableKey {
    pub const ALL: [InheritableKey; 13] = [
        Self::ValidateOnChange,
        Self::ValidateOnBlur,
        Self::RevalidateOnChange,
        Self::RevalidateOnBlur,
        Self::ReturnErrorsAsString,
        Self::ReadOnly,
        Self::Disabled,
        Self::CleanOnBlur,
        Self::CleanOnValidation,
        Self::Trim,
        Self::TrimInner,
        Self::MonoCaseToProper,
        Self::Reformat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidateOnChange => "validateOnChange",
            Self::ValidateOnBlur => "validateOnBlur",
            Self::RevalidateOnChange => "revalidateOnChange",
            Self::RevalidateOnBlur => "revalidateOnBlur",
            Self::ReturnErrorsAsString => "returnErrorsAsString",
            Self::ReadOnly => "readOnly",
            Self::Disabled => "disabled",
            Self::CleanOnBlur => "cleaning.cleanOnBlur",
            Self::CleanOnValidation => "cleaning.cleanOnValidation",
            Self::Trim => "cleaning.trim",
            Self::TrimInner => "cleaning.trimInner",
            Self::MonoCaseToProper => "cleaning.monoCaseToProper",
            Self::Reformat => "cleaning.reformat",
        }
    }
}

impl FromStr for InheritableKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown field option: {s}"))
    }
}

impl fmt::Display for InheritableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resolved value of an inheritable option.
#[derive(Debug, Clone)]
pub enum OptionValue {
    Flag(bool),
    Transform(Transform),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            Self::Transform(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Field definitions
// ---------------------------------------------------------------------------

/// Configuration of a single form field.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldDef {
    /// Canonical dotted path of the field, e.g. `user.address.city`
    pub name: String,
    /// Optional short name usable wherever a field name is accepted
    pub alias_name: Option<String>,
    /// Human label used in error messages
    pub display_name: Option<String>,
    /// `false` stores the field's value in form state instead of form data
    pub is_data: bool,

    pub data_type: Option<Transform>,
    pub value_type: Option<Transform>,
    pub data_format: Option<Transform>,
    pub value_format: Option<Transform>,
    pub input_type: Option<String>,

    pub cleaning: Cleaning,
    pub validation: RuleSet,
    pub error_messages: IndexMap<String, ErrorMessage>,

    pub validate_on_change: Option<bool>,
    pub validate_on_blur: Option<bool>,
    pub revalidate_on_change: Option<bool>,
    pub revalidate_on_blur: Option<bool>,
    pub return_errors_as_string: Option<bool>,
    pub read_only: Option<bool>,
    pub disabled: Option<bool>,

    #[serde(skip)]
    pub on_change: Option<FieldCallback>,
    #[serde(skip)]
    pub on_blur: Option<FieldCallback>,
    #[serde(skip)]
    pub on_focus: Option<FieldCallback>,
}

impl Default for FieldDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            alias_name: None,
            display_name: None,
            is_data: true,
            data_type: None,
            value_type: None,
            data_format: None,
            value_format: None,
            input_type: None,
            cleaning: Cleaning::default(),
            validation: RuleSet::default(),
            error_messages: IndexMap::new(),
            validate_on_change: None,
            validate_on_blur: None,
            revalidate_on_change: None,
            revalidate_on_blur: None,
            return_errors_as_string: None,
            read_only: None,
            disabled: None,
            on_change: None,
            on_blur: None,
            on_focus: None,
        }
    }
}

impl FieldDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias_name = Some(alias.into());
        self
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Mark the field as form state rather than form data.
    pub fn state_only(mut self) -> Self {
        self.is_data = false;
        self
    }

    pub fn data_type(mut self, transform: Transform) -> Self {
        self.data_type = Some(transform);
        self
    }

    pub fn value_type(mut self, transform: Transform) -> Self {
        self.value_type = Some(transform);
        self
    }

    pub fn data_format(mut self, transform: Transform) -> Self {
        self.data_format = Some(transform);
        self
    }

    pub fn value_format(mut self, transform: Transform) -> Self {
        self.value_format = Some(transform);
        self
    }

    pub fn input_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into());
        self
    }

    pub fn cleaning(mut self, cleaning: Cleaning) -> Self {
        self.cleaning = cleaning;
        self
    }

    pub fn validation(mut self, rules: RuleSet) -> Self {
        self.validation = rules;
        self
    }

    /// Add one parameterized validation rule.
    pub fn rule(mut self, name: impl Into<String>, param: Value) -> Self {
        self.validation.insert(name, Rule::Param(param));
        self
    }

    /// Add one function validation rule.
    pub fn rule_fn<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RuleInput<'_>) -> Result<RuleOutcome, RuleError> + Send + Sync + 'static,
    {
        self.validation.insert(name, Rule::Func(Arc::new(f)));
        self
    }

    pub fn error_message(mut self, rule: impl Into<String>, message: impl Into<ErrorMessage>) -> Self {
        self.error_messages.insert(rule.into(), message.into());
        self
    }

    pub fn validate_on_change(mut self, enabled: bool) -> Self {
        self.validate_on_change = Some(enabled);
        self
    }

    pub fn validate_on_blur(mut self, enabled: bool) -> Self {
        self.validate_on_blur = Some(enabled);
        self
    }

    pub fn revalidate_on_change(mut self, enabled: bool) -> Self {
        self.revalidate_on_change = Some(enabled);
        self
    }

    pub fn revalidate_on_blur(mut self, enabled: bool) -> Self {
        self.revalidate_on_blur = Some(enabled);
        self
    }

    pub fn return_errors_as_string(mut self, enabled: bool) -> Self {
        self.return_errors_as_string = Some(enabled);
        self
    }

    pub fn read_only(mut self, enabled: bool) -> Self {
        self.read_only = Some(enabled);
        self
    }

    pub fn disabled(mut self, enabled: bool) -> Self {
        self.disabled = Some(enabled);
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

    /// The field's own setting for an inheritable option, if it has one.
    pub fn own_option(&self, key: InheritableKey) -> Option<OptionValue> {
        let flag = match key {
            InheritableKey::ValidateOnChange => self.validate_on_change,
            InheritableKey::ValidateOnBlur => self.validate_on_blur,
            InheritableKey::RevalidateOnChange => self.revalidate_on_change,
            InheritableKey::RevalidateOnBlur => self.revalidate_on_blur,
            InheritableKey::ReturnErrorsAsString => self.return_errors_as_string,
            InheritableKey::ReadOnly => self.read_only,
            InheritableKey::Disabled => self.disabled,
            InheritableKey::CleanOnBlur => self.cleaning.clean_on_blur,
            InheritableKey::CleanOnValidation => self.cleaning.clean_on_validation,
            InheritableKey::Trim => self.cleaning.trim,
            InheritableKey::TrimInner => self.cleaning.trim_inner,
            InheritableKey::MonoCaseToProper => self.cleaning.mono_case_to_proper,
            InheritableKey::Reformat => {
                return self.cleaning.reformat.clone().map(OptionValue::Transform)
            }
        };
        flag.map(OptionValue::Flag)
    }

    /// Whether the field has an active `required` rule.
    pub fn is_required(&self) -> bool {
        match self.validation.required() {
            Some(Rule::Param(param)) => !is_falsy(param),
            Some(Rule::Func(_)) => true,
            None => false,
        }
    }
}

/// Field definitions as supplied in config: a list, or a map keyed by name.
///
/// In the map form the key is copied into each definition's `name`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldsInput {
    List(Vec<FieldDef>),
    Map(IndexMap<String, FieldDef>),
}

impl Default for FieldsInput {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl FieldsInput {
    /// Normalize into a list of definitions with names filled in.
    pub fn into_defs(self) -> Vec<FieldDef> {
        match self {
            Self::List(defs) => defs,
            Self::Map(map) => map
                .into_iter()
                .map(|(name, mut def)| {
                    def.name = name;
                    def
                })
                .collect(),
        }
    }

    pub fn push(&mut self, def: FieldDef) {
        match self {
            Self::List(defs) => defs.push(def),
            Self::Map(map) => {
                map.insert(def.name.clone(), def);
            }
        }
    }
}

impl From<Vec<FieldDef>> for FieldsInput {
    fn from(defs: Vec<FieldDef>) -> Self {
        Self::List(defs)
    }
}
