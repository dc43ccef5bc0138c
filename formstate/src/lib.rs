//! Form state engine
//!
//! `formstate` keeps the data, display values, state and validation errors of
//! a form, driven by per-field configuration. It knows nothing about any view
//! layer; a host re-renders when the [`HostNotifier`] reports a new revision.
//!
//! # Architecture
//!
//! - **Field registry**: field definitions, aliases and inherited defaults
//! - **Value store**: data tree, display values, dirty tracking and form state
//! - **Validation**: event-gated rule evaluation with async rules settled
//!   concurrently
//! - **FormManager**: the facade that wires these together and notifies the
//!   host
//!
//! Formatting and conversion helpers live in the `formstate-format` crate.

pub mod config;
pub mod error;
pub mod field_errors;
pub mod form;
pub mod notify;
pub mod path;
pub mod props;
pub mod registry;
pub mod store;
pub mod types;
pub mod validation;

pub use config::FormConfig;
pub use error::{FormError, Result};
pub use field_errors::{FieldErrors, FormFieldError, InitialErrors, Messages};
pub use form::{create_form, FormManager, SetValueOptions};
pub use notify::{HostNotifier, RevisionState};
pub use props::{
    DataProps, ErrorProps, FieldBinding, FieldProps, HelperText, InputEvent, InputTarget,
    PropOptions,
};
pub use registry::FieldRegistry;
pub use types::{
    Cleaning, ErrorMessage, FieldDef, FieldDefaults, FieldsInput, InheritableKey, OptionValue,
    Rule, RuleSet, Transform,
};
pub use validation::{
    RuleError, RuleInput, RuleOutcome, RuleResponse, ValidateFilter, ValidationEvent, Validators,
};

pub use formstate_format::{TransformFn, TransformRegistry};
