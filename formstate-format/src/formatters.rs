//! Display formatters.
//!
//! Every formatter tolerates `null` and other falsy input by returning an
//! empty string, and leaves values of unexpected types untouched.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::{date, is_falsy};

fn phone_parts_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([01]+)?([0-9]{0,3})([0-9]{3})([0-9]{4})(.+)?").expect("Invalid phone regex")
    })
}

fn is_mixed_case(text: &str) -> bool {
    text != text.to_uppercase() && text != text.to_lowercase()
}

fn option_flag(options: Option<&Value>, key: &str) -> bool {
    match options {
        Some(Value::Bool(b)) => *b,
        Some(Value::Object(map)) => map.get(key).and_then(Value::as_bool).unwrap_or(false),
        _ => false,
    }
}

/// Upper-case text. `{"ignoreMixedCase": true}` leaves mixed-case text alone.
pub fn upper_case(value: &Value, options: Option<&Value>) -> Value {
    if is_falsy(value) {
        return Value::from("");
    }
    let Value::String(text) = value else {
        return value.clone();
    };
    if option_flag(options, "ignoreMixedCase") && is_mixed_case(text) {
        return value.clone();
    }
    Value::from(text.to_uppercase())
}

/// Lower-case text. `{"ignoreMixedCase": true}` leaves mixed-case text alone.
pub fn lower_case(value: &Value, options: Option<&Value>) -> Value {
    if is_falsy(value) {
        return Value::from("");
    }
    let Value::String(text) = value else {
        return value.clone();
    };
    if option_flag(options, "ignoreMixedCase") && is_mixed_case(text) {
        return value.clone();
    }
    Value::from(text.to_lowercase())
}

/// Convert text to Proper Case.
///
/// Text that is already mixed case is returned as-is unless `options` is
/// `true` (or `{"force": true}`). Words start after whitespace, `/` and `-`.
pub fn proper_case(value: &Value, options: Option<&Value>) -> Value {
    if is_falsy(value) {
        return Value::from("");
    }
    let Value::String(text) = value else {
        return value.clone();
    };
    if !option_flag(options, "force") && is_mixed_case(text) {
        return value.clone();
    }
    Value::from(proper_case_str(text))
}

/// Proper-case a string unconditionally.
pub fn proper_case_str(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut capitalize = true;
    for ch in text.to_lowercase().chars() {
        if capitalize {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        capitalize = ch.is_whitespace() || ch == '/' || ch == '-';
    }
    out
}

/// Strip everything but digits. Numbers are rendered as strings.
pub fn numbers_only(value: &Value, _options: Option<&Value>) -> Value {
    match value {
        Value::Number(n) => Value::from(n.to_string()),
        Value::String(s) => Value::from(digits(s)),
        other => other.clone(),
    }
}

fn digits(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

/// Format a phone number as `[1-][NNN-]NNN-NNNN[ ext]`.
///
/// Input that does not contain enough digits is returned unchanged.
pub fn phone(value: &Value, _options: Option<&Value>) -> Value {
    if is_falsy(value) {
        return Value::from("");
    }
    let numbers = match numbers_only(value, None) {
        Value::String(s) => s,
        _ => return value.clone(),
    };
    let Some(parts) = phone_parts_regex().captures(&numbers) else {
        return value.clone();
    };

    let part = |i: usize| parts.get(i).map(|m| m.as_str()).unwrap_or("");
    let mut display = format!("{}-{}", part(3), part(4));
    if !part(2).is_empty() {
        display = format!("{}-{display}", part(2));
    }
    if !part(1).is_empty() {
        display = format!("{}-{display}", part(1));
    }
    if !part(5).is_empty() {
        display = format!("{display} {}", part(5));
    }
    Value::from(display)
}

/// Format a date-like value.
///
/// `options` is either a single format (keyword or pattern) or a
/// `[dateFormat, timeFormat]` pair. Without options the ISO form is used.
pub fn date(value: &Value, options: Option<&Value>) -> Value {
    let (date_fmt, time_fmt) = match options {
        Some(Value::String(fmt)) => (fmt.as_str(), ""),
        Some(Value::Array(pair)) => (
            pair.first().and_then(Value::as_str).unwrap_or(""),
            pair.get(1).and_then(Value::as_str).unwrap_or(""),
        ),
        _ => ("", ""),
    };
    Value::from(date::format_date(value, date_fmt, time_fmt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!("5551234567"), json!("555-123-4567"))]
    #[case(json!("(555) 123-4567"), json!("555-123-4567"))]
    #[case(json!("1 555 123 4567"), json!("1-555-123-4567"))]
    #[case(json!("1234567"), json!("123-4567"))]
    #[case(json!(5551234567_i64), json!("555-123-4567"))]
    #[case(json!("12345"), json!("12345"))]
    #[case(json!(null), json!(""))]
    fn test_phone(#[case] input: Value, #[case] expected: Value) {
        assert_eq!(phone(&input, None), expected);
    }

    #[rstest]
    #[case(json!("JOHN SMITH"), None, json!("John Smith"))]
    #[case(json!("mary-jane o/neil"), None, json!("Mary-Jane O/Neil"))]
    #[case(json!("McDonald"), None, json!("McDonald"))]
    #[case(json!("McDonald"), Some(json!(true)), json!("Mcdonald"))]
    #[case(json!(null), None, json!(""))]
    fn test_proper_case(
        #[case] input: Value,
        #[case] options: Option<Value>,
        #[case] expected: Value,
    ) {
        assert_eq!(proper_case(&input, options.as_ref()), expected);
    }

    #[test]
    fn test_upper_and_lower_case() {
        assert_eq!(upper_case(&json!("abc"), None), json!("ABC"));
        assert_eq!(
            upper_case(&json!("McDonald"), Some(&json!({"ignoreMixedCase": true}))),
            json!("McDonald")
        );
        assert_eq!(lower_case(&json!("ABC"), None), json!("abc"));
        assert_eq!(lower_case(&json!(null), None), json!(""));
    }

    #[test]
    fn test_numbers_only() {
        assert_eq!(numbers_only(&json!("a1b2c3"), None), json!("123"));
        assert_eq!(numbers_only(&json!(42), None), json!("42"));
        assert_eq!(numbers_only(&json!(true), None), json!(true));
    }

    #[test]
    fn test_date_formatter_options() {
        assert_eq!(
            date(&json!("2018-02-23T10:22:00"), Some(&json!(["medium-date", "medium-time"]))),
            json!("Feb 23, 2018 10:22 AM")
        );
        assert_eq!(date(&json!("2018-02-23"), Some(&json!("short-date"))), json!("Feb 23/18"));
    }
}
