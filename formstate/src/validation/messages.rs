//! Error-message templates and rendering.

use indexmap::IndexMap;
use serde_json::Value;

use formstate_format::to_text;

use crate::types::{ErrorMessage, FieldDef};

/// Key of the fallback template.
pub const UNKNOWN: &str = "unknown";

const DEFAULT_MESSAGES: &[(&str, &str)] = &[
    ("required", "{name} is required"),
    ("type-text", "This must be text"),
    ("type-number", "This is not a valid number"),
    ("type-integer", "This is not a valid integer"),
    ("type-boolean", "This must be true or false"),
    ("type-date", "This is not a valid date"),
    ("phone", "Enter a valid 10-digit phone number"),
    ("address", "Enter a valid address"),
    ("email", "This is not a valid email address."),
    ("number", "{name} must be a number"),
    ("integer", "{name} must be only numbers"),
    ("boolean", "{name} must be true or false"),
    ("string", "{name} must be text"),
    ("pattern", "{name} is not in the expected format"),
    ("minLength", "{name} must be at least {value} characters"),
    ("maxLength", "{name} must be less than {value} characters."),
    ("exactLength", "{name} must be exactly {value} characters."),
    ("lengthRange", "{name} must be between {value1} and {value2} characters"),
    ("date", "{name} is not a valid date"),
    ("minDate", "{name} must be on or after {value}"),
    ("maxDate", "{name} must be on or before {value}"),
    ("dateRange", "{name} must be between {value1} and {value2}"),
    ("minTime", "{name} must be at or after {value}"),
    ("maxTime", "{name} must be at or before {value}"),
    ("timeRange", "{name} must be between {value1} and {value2}"),
    ("minNumber", "{name} must be at least {value}"),
    ("maxNumber", "{name} must be less than or equal to {value}"),
    ("numberRange", "{name} must be between {value1} and {value2}"),
    (UNKNOWN, "This entry is invalid"),
];

const PASSWORD_MESSAGES: &[(&str, &str)] = &[
    ("default", "{name} is not a valid password"),
    ("mixedCase", "Must contain both upper and lower case letters"),
    ("lowerCase", "Must contain at least {value} lower-case letter(s)"),
    ("upperCase", "Must contain at least {value} upper-case letter(s)"),
    ("number", "Must contain at least {value} number(s)"),
    ("symbol", "Must contain at least {value} symbol(s)"),
    ("invalidChars", "Cannot contain these characters: {value}"),
];

/// Form-wide message templates: built-in defaults overlaid with config.
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    messages: IndexMap<String, ErrorMessage>,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        let mut messages: IndexMap<String, ErrorMessage> = DEFAULT_MESSAGES
            .iter()
            .map(|(rule, text)| (rule.to_string(), ErrorMessage::from(*text)))
            .collect();
        messages.insert(
            "password".to_string(),
            ErrorMessage::Group(
                PASSWORD_MESSAGES
                    .iter()
                    .map(|(key, text)| (key.to_string(), text.to_string()))
                    .collect(),
            ),
        );
        Self { messages }
    }
}

impl MessageCatalog {
    /// Defaults overlaid with form-level overrides.
    pub fn with_overrides(overrides: IndexMap<String, ErrorMessage>) -> Self {
        let mut catalog = Self::default();
        for (rule, message) in overrides {
            let merged = match catalog.messages.get(&rule) {
                Some(existing) => merge_messages(message, existing),
                None => message,
            };
            catalog.messages.insert(rule, merged);
        }
        catalog
    }

    pub fn get(&self, rule: &str) -> Option<&ErrorMessage> {
        self.messages.get(rule)
    }

    /// The template for `rule` on `field`: the field's own message merged
    /// over the form's.
    pub fn for_field(&self, field: Option<&FieldDef>, rule: &str) -> Option<ErrorMessage> {
        let own = field.and_then(|def| def.error_messages.get(rule));
        match (own, self.messages.get(rule)) {
            (Some(own), Some(form)) => Some(merge_messages(own.clone(), form)),
            (Some(own), None) => Some(own.clone()),
            (None, form) => form.cloned(),
        }
    }

    /// Render the message for a failed rule.
    ///
    /// `explicit` is a message returned by the rule itself and takes
    /// precedence over the configured template for the rule, which in turn
    /// takes precedence over the `unknown` fallback.
    pub fn render(
        &self,
        field: Option<&FieldDef>,
        rule: &str,
        param: &Value,
        explicit: Option<&str>,
    ) -> String {
        let display_name = field.and_then(|def| def.display_name.as_deref());
        if let Some(text) = explicit.filter(|t| !t.is_empty()) {
            return fill_template(text, display_name, param);
        }

        let fallback = || {
            self.messages
                .get(UNKNOWN)
                .and_then(|m| match m {
                    ErrorMessage::Text(text) => Some(text.clone()),
                    _ => None,
                })
                .unwrap_or_default()
        };

        match self.for_field(field, rule) {
            Some(ErrorMessage::Text(text)) => fill_template(&text, display_name, param),
            Some(ErrorMessage::Group(group)) => {
                let template = group.get("default").cloned().unwrap_or_else(fallback);
                fill_template(&template, display_name, param)
            }
            Some(ErrorMessage::Func(f)) => f(display_name, param),
            None => fill_template(&fallback(), display_name, param),
        }
    }
}

/// Merge `own` over `fallback`: groups merge key-by-key, anything else
/// replaces.
fn merge_messages(own: ErrorMessage, fallback: &ErrorMessage) -> ErrorMessage {
    match (own, fallback) {
        (ErrorMessage::Group(mut own), ErrorMessage::Group(base)) => {
            for (key, text) in base {
                own.entry(key.clone()).or_insert_with(|| text.clone());
            }
            ErrorMessage::Group(own)
        }
        (own, _) => own,
    }
}

/// Substitute template variables.
///
/// `{name}` at the very start becomes the display name or "This field";
/// elsewhere it becomes the display name or "this field". `{value}` is the
/// rule parameter, `{value1}`/`{value2}` the elements of a list parameter.
pub fn fill_template(template: &str, display_name: Option<&str>, param: &Value) -> String {
    let mut message = match template.strip_prefix("{name}") {
        Some(rest) => format!("{}{rest}", display_name.unwrap_or("This field")),
        None => template.to_string(),
    };
    message = message.replace("{name}", display_name.unwrap_or("this field"));
    message = message.replace("{value}", &to_text(param));
    if let Value::Array(items) = param {
        let item = |i: usize| items.get(i).map(to_text).unwrap_or_default();
        message = message.replace("{value1}", &item(0)).replace("{value2}", &item(1));
    }
    message
}
