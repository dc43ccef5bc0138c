//! Prop builders and event adapters for binding fields to input controls.
//!
//! A view layer asks the form for [`DataProps`], [`ErrorProps`] or both and
//! spreads them onto a control. Handlers are carried by a [`FieldBinding`]
//! that already knows the canonical field name.

use serde::Serialize;
use serde_json::Value;

use formstate_format::converters;

use crate::error::Result;
use crate::form::FormManager;
use crate::types::InheritableKey;

/// The parts of a control that an event reports.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTarget {
    /// Control type such as `text` or `checkbox`
    pub input_type: Option<String>,
    pub value: Value,
    pub checked: bool,
}

/// Either a control event or a plain value from a programmatic call.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Target(InputTarget),
    Value(Value),
}

impl InputEvent {
    /// The value the event carries. Checkboxes report `checked`.
    pub fn into_value(self) -> Value {
        match self {
            Self::Target(target) => {
                let is_checkbox = target
                    .input_type
                    .as_deref()
                    .is_some_and(|t| t.contains("checkbox"));
                if is_checkbox {
                    Value::Bool(target.checked)
                } else {
                    target.value
                }
            }
            Self::Value(value) => value,
        }
    }
}

impl From<Value> for InputEvent {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<InputTarget> for InputEvent {
    fn from(target: InputTarget) -> Self {
        Self::Target(target)
    }
}

/// Change, focus and blur handlers bound to one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    field_name: String,
}

impl FieldBinding {
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub async fn change(&self, form: &mut FormManager, event: impl Into<InputEvent>) -> Result<bool> {
        form.on_field_change(&self.field_name, event.into().into_value())
            .await
    }

    pub async fn blur(&self, form: &mut FormManager, event: impl Into<InputEvent>) -> Result<()> {
        form.on_field_blur(&self.field_name, event.into().into_value())
            .await
    }

    pub fn focus(&self, form: &mut FormManager) {
        form.on_field_focus(&self.field_name);
    }
}

/// Options for [`FormManager::data_props`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropOptions {
    /// Treat the control as a checkbox regardless of `inputType`
    pub checkbox: bool,
}

/// Value-side props of a control.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataProps {
    pub name: String,
    pub value: Value,
    #[serde(rename = "aria-label")]
    pub aria_label: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
    #[serde(skip)]
    pub binding: FieldBinding,
}

/// Helper text in the shape the field asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HelperText {
    Text(String),
    List(Vec<String>),
}

/// Error-side props of a control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorProps {
    pub error: bool,
    pub helper_text: HelperText,
}

/// Data and error props together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldProps {
    #[serde(flatten)]
    pub data: DataProps,
    #[serde(flatten)]
    pub errors: ErrorProps,
}

impl FormManager {
    /// Props for binding a control to a field (name or alias).
    pub fn data_props(&self, name: &str, options: PropOptions) -> DataProps {
        let field_name = self.resolve_name(name).to_string();
        let def = self.registry().field(&field_name);
        let value = self.get_value(&field_name);

        let input_type = def.and_then(|d| d.input_type.clone());
        let is_checkbox = options.checkbox || input_type.as_deref() == Some("checkbox");
        let (value, checked) = if is_checkbox {
            let checked = converters::boolean(&value, None).as_bool().unwrap_or(false);
            let value = if value.is_string() { value } else { Value::from("on") };
            (value, Some(checked))
        } else {
            (value, None)
        };

        DataProps {
            aria_label: def
                .and_then(|d| d.display_name.clone())
                .unwrap_or_else(|| field_name.clone()),
            input_type: input_type.map(|t| {
                if t == "datetime" {
                    "datetime-local".to_string()
                } else {
                    t
                }
            }),
            checked,
            required: def.is_some_and(|d| d.is_required()),
            disabled: self.flag(&field_name, InheritableKey::Disabled),
            read_only: self.flag(&field_name, InheritableKey::ReadOnly),
            binding: FieldBinding::new(field_name.clone()),
            name: field_name,
            value,
        }
    }

    /// Error state and helper text for a field.
    pub fn error_props(&self, name: &str) -> ErrorProps {
        let helper_text = if self.errors_as_text(name) {
            HelperText::Text(self.get_error_text(name))
        } else {
            HelperText::List(self.get_errors(name))
        };
        ErrorProps {
            error: self.field_has_errors(name),
            helper_text,
        }
    }

    /// [`FormManager::data_props`] and [`FormManager::error_props`] together.
    pub fn all_props(&self, name: &str, options: PropOptions) -> FieldProps {
        FieldProps {
            data: self.data_props(name, options),
            errors: self.error_props(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormConfig;
    use crate::notify::HostNotifier;
    use crate::types::FieldDef;
    use serde_json::json;

    fn form() -> FormManager {
        FormManager::new(
            HostNotifier::detached(),
            FormConfig::new()
                .with_field(
                    FieldDef::new("profile.born")
                        .alias("born")
                        .display_name("Birth date")
                        .input_type("datetime")
                        .rule("required", json!(true)),
                )
                .with_field(FieldDef::new("subscribed").input_type("checkbox"))
                .with_field(FieldDef::new("id").read_only(true))
                .with_initial_data(json!({"subscribed": true, "id": 9})),
            None,
        )
    }

    #[test]
    fn checkbox_events_report_checked() {
        let event = InputEvent::from(InputTarget {
            input_type: Some("checkbox".into()),
            value: json!("on"),
            checked: true,
        });
        assert_eq!(event.into_value(), json!(true));
        assert_eq!(InputEvent::from(json!("typed")).into_value(), json!("typed"));
    }

    #[test]
    fn data_props_for_aliased_field() {
        let props = form().data_props("born", PropOptions::default());
        assert_eq!(props.name, "profile.born");
        assert_eq!(props.aria_label, "Birth date");
        assert_eq!(props.input_type.as_deref(), Some("datetime-local"));
        assert!(props.required);
        assert_eq!(props.binding.field_name(), "profile.born");
        assert_eq!(props.value, json!(""));
    }

    #[test]
    fn checkbox_props() {
        let props = form().data_props("subscribed", PropOptions::default());
        assert_eq!(props.checked, Some(true));
        assert_eq!(props.value, json!("on"));
    }

    #[test]
    fn read_only_props_serialize() {
        let props = form().data_props("id", PropOptions::default());
        let json = serde_json::to_value(&props).unwrap();
        assert_eq!(
            json,
            json!({"name": "id", "value": 9, "aria-label": "id", "readOnly": true})
        );
    }

    #[test]
    fn error_props_follow_errors_as_string() {
        let mut form = form();
        form.set_errors("born", "required", "Birth date is required", true);
        let props = form.error_props("born");
        assert!(props.error);
        assert_eq!(props.helper_text, HelperText::Text("Birth date is required".into()));

        let all = form.all_props("born", PropOptions::default());
        let json = serde_json::to_value(&all).unwrap();
        assert_eq!(json["error"], json!(true));
        assert_eq!(json["helperText"], json!("Birth date is required"));
    }

    #[tokio::test]
    async fn binding_routes_events_to_the_field() {
        let mut form = form();
        let binding = form.data_props("subscribed", PropOptions::default()).binding;
        binding
            .change(
                &mut form,
                InputTarget {
                    input_type: Some("checkbox".into()),
                    value: json!("on"),
                    checked: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(form.get_field_data("subscribed"), Some(json!(false)));
        assert!(form.is_field_dirty("subscribed"));
    }
}
