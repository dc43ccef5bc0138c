//! Type converters.
//!
//! Converters move a value between its stored data type and the type a form
//! control works with. `null` is treated as "unspecified" and generally passes
//! through as `null` rather than being coerced.

use serde_json::Value;

use crate::{date, is_falsy, number_value, to_number, to_text};

/// Convert to text. `null` becomes an empty string.
pub fn string(value: &Value, _options: Option<&Value>) -> Value {
    Value::from(to_text(value))
}

/// Convert to an integer, truncating toward zero.
///
/// Non-numeric input becomes `0`.
pub fn integer(value: &Value, _options: Option<&Value>) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    let n = to_number(value).unwrap_or(0.0);
    let truncated = if n.is_infinite() {
        n.signum() * f64::MAX
    } else {
        n.trunc()
    };
    number_value(truncated)
}

/// Convert to a number. Non-numeric input becomes `null`.
pub fn number(value: &Value, _options: Option<&Value>) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    to_number(value).map(number_value).unwrap_or(Value::Null)
}

/// Convert to a boolean.
///
/// `null` stays `null`. Numbers are true when non-zero. Strings are false when
/// blank or one of `0`, `false` or `no` (case-insensitive), true otherwise.
pub fn boolean(value: &Value, _options: Option<&Value>) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(b) => Value::Bool(*b),
        Value::Number(n) => Value::Bool(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        Value::String(s) => {
            let normalized = s.trim().to_lowercase();
            Value::Bool(!matches!(normalized.as_str(), "" | "0" | "false" | "no"))
        }
        other => Value::Bool(!is_falsy(other)),
    }
}

/// Convert to a date string. `options` is a format keyword or pattern and
/// defaults to `date-input` (`YYYY-MM-DD`).
pub fn date(value: &Value, options: Option<&Value>) -> Value {
    let fmt = options.and_then(Value::as_str).unwrap_or("date-input");
    Value::from(date::format_date(value, fmt, ""))
}

/// Convert to a full ISO-8601 timestamp string.
pub fn date_iso(value: &Value, _options: Option<&Value>) -> Value {
    Value::from(date::format_date(value, "iso", ""))
}

/// Convert to a date object, represented as epoch milliseconds.
///
/// Falsy input, non-scalar input and unparseable input yield `null`.
pub fn date_object(value: &Value, _options: Option<&Value>) -> Value {
    if is_falsy(value) {
        return Value::Null;
    }
    match value {
        Value::String(_) | Value::Number(_) => date::to_epoch_millis(value)
            .map(Value::from)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(null), json!(null))]
    #[case(json!(true), json!(true))]
    #[case(json!(0), json!(false))]
    #[case(json!(3), json!(true))]
    #[case(json!("no"), json!(false))]
    #[case(json!(" False "), json!(false))]
    #[case(json!("0"), json!(false))]
    #[case(json!(""), json!(false))]
    #[case(json!("yes"), json!(true))]
    #[case(json!([]), json!(true))]
    fn test_boolean(#[case] input: Value, #[case] expected: Value) {
        assert_eq!(boolean(&input, None), expected);
    }

    #[rstest]
    #[case(json!(null), json!(null))]
    #[case(json!("40"), json!(40))]
    #[case(json!("40.9"), json!(40))]
    #[case(json!(-3.7), json!(-3))]
    #[case(json!("abc"), json!(0))]
    fn test_integer(#[case] input: Value, #[case] expected: Value) {
        assert_eq!(integer(&input, None), expected);
    }

    #[rstest]
    #[case(json!(null), json!(null))]
    #[case(json!("2.5"), json!(2.5))]
    #[case(json!(""), json!(0))]
    #[case(json!("abc"), json!(null))]
    fn test_number(#[case] input: Value, #[case] expected: Value) {
        assert_eq!(number(&input, None), expected);
    }

    #[test]
    fn test_string() {
        assert_eq!(string(&json!(null), None), json!(""));
        assert_eq!(string(&json!(1234), None), json!("1234"));
    }

    #[test]
    fn test_dates() {
        assert_eq!(date(&json!("2020-05-01T10:00:00Z"), None), json!("2020-05-01"));
        assert_eq!(
            date(&json!("2020-05-01"), Some(&json!("long-date"))),
            json!("May 1, 2020")
        );
        assert_eq!(
            date_iso(&json!("2020-05-01"), None),
            json!("2020-05-01T00:00:00.000Z")
        );
        assert_eq!(date_object(&json!("1970-01-02"), None), json!(86_400_000));
        assert_eq!(date_object(&json!(""), None), json!(null));
        assert_eq!(date_object(&json!(["2020-01-01"]), None), json!(null));
    }
}
