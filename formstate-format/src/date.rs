//! Date parsing and formatting.
//!
//! Dates travel through the engine as strings or epoch milliseconds. Parsing
//! accepts ISO-8601 dates, date-times, RFC 3339 timestamps, bare times of day
//! (anchored to 1970-01-01) and epoch milliseconds. Naive date-times are
//! interpreted as UTC.
//!
//! Formatting accepts either one of the keywords in [`DATE_FORMATS`] or a
//! `strftime` pattern as understood by [`chrono::format::strftime`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;
use std::fmt::Write;
use std::sync::OnceLock;

use crate::{is_falsy, to_text};

/// Text returned for values that cannot be parsed as a date.
pub const INVALID_DATE: &str = "Invalid Date";

/// Keyword table for date and time formats.
///
/// An empty pattern (`iso`) means full ISO-8601 with milliseconds in UTC.
pub const DATE_FORMATS: &[(&str, &str)] = &[
    ("short-date", "%b %-d/%y"),
    ("medium-date", "%b %-d, %Y"),
    ("long-date", "%B %-d, %Y"),
    ("short-day-date", "%a, %b %-d"),
    ("medium-day-date", "%a, %b %-d, %Y"),
    ("long-day-date", "%A, %B %-d, %Y"),
    ("short-time", "%H:%M"),
    ("medium-time", "%-I:%M %p"),
    ("long-time", "%-I:%M:%S %p"),
    ("date-input", "%Y-%m-%d"),
    ("time-input", "%H:%M"),
    ("datetime-input", "%Y-%m-%dT%H:%M"),
    ("isoLocal", "%Y-%m-%dT%H:%M:%S%:z"),
    ("iso", ""),
];

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

fn time_only_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{2}:\d{2}[\d:.]*$").expect("Invalid time regex"))
}

/// Look up a format keyword, returning its `strftime` pattern.
pub fn keyword_format(keyword: &str) -> Option<&'static str> {
    DATE_FORMATS
        .iter()
        .find(|(name, _)| *name == keyword)
        .map(|(_, pattern)| *pattern)
}

/// Parse a date-like value. Returns `None` when the value is not a date.
pub fn parse_date(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Number(n) => {
            let millis = n.as_f64()?;
            if !millis.is_finite() {
                return None;
            }
            DateTime::from_timestamp_millis(millis as i64).map(|dt| dt.naive_utc())
        }
        Value::String(s) => parse_date_str(s),
        _ => None,
    }
}

/// Parse a date string. See the module docs for accepted shapes.
pub fn parse_date_str(input: &str) -> Option<NaiveDateTime> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let text = if time_only_regex().is_match(trimmed) {
        format!("1970-01-01T{trimmed}")
    } else {
        trimmed.to_string()
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Some(dt.naive_utc());
    }
    let without_zulu = text.strip_suffix('Z').unwrap_or(&text);
    for pattern in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(without_zulu, pattern) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(without_zulu, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Format a parsed date with an optional date pattern and time pattern.
///
/// Each pattern may be a keyword from [`DATE_FORMATS`]. With neither pattern
/// the ISO-8601 form is produced. Patterns chrono rejects yield `None`.
pub fn format_parsed(date: &NaiveDateTime, date_fmt: &str, time_fmt: &str) -> Option<String> {
    let dt = keyword_format(date_fmt).unwrap_or(date_fmt);
    let tm = keyword_format(time_fmt).unwrap_or(time_fmt);

    let pattern = match (dt.is_empty(), tm.is_empty()) {
        (true, true) => ISO_FORMAT.to_string(),
        (true, false) => tm.to_string(),
        (false, true) => dt.to_string(),
        (false, false) => format!("{dt} {tm}"),
    };

    let mut out = String::new();
    write!(out, "{}", date.and_utc().format(&pattern)).ok()?;
    Some(out)
}

/// Format any date-like value.
///
/// Falsy input yields an empty string and unparseable input yields
/// [`INVALID_DATE`] so bad data is visible in the rendered form.
pub fn format_date(value: &Value, date_fmt: &str, time_fmt: &str) -> String {
    if is_falsy(value) {
        return String::new();
    }
    let Some(date) = parse_date(value) else {
        tracing::debug!(value = %to_text(value), "value is not a valid date");
        return INVALID_DATE.to_string();
    };
    format_parsed(&date, date_fmt, time_fmt).unwrap_or_else(|| {
        tracing::warn!(date_fmt, time_fmt, "unsupported date format pattern");
        INVALID_DATE.to_string()
    })
}

/// Convert a date-like value to epoch milliseconds.
pub fn to_epoch_millis(value: &Value) -> Option<i64> {
    parse_date(value).map(|dt| dt.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("2018-02-23", "date-input", "", "2018-02-23")]
    #[case("2018-02-23", "medium-date", "", "Feb 23, 2018")]
    #[case("2018-02-23", "long-date", "", "February 23, 2018")]
    #[case("2018-02-23T14:22:00", "", "short-time", "14:22")]
    #[case("2018-02-23T14:22:35", "", "long-time", "2:22:35 PM")]
    #[case("2018-02-23T14:22:00", "date-input", "time-input", "2018-02-23 14:22")]
    #[case("2018-02-23T14:22:00", "datetime-input", "", "2018-02-23T14:22")]
    #[case("2018-02-23", "iso", "", "2018-02-23T00:00:00.000Z")]
    #[case("2018-02-23", "", "", "2018-02-23T00:00:00.000Z")]
    #[case("2018-02-23", "%d/%m/%Y", "", "23/02/2018")]
    fn test_format_date(
        #[case] input: &str,
        #[case] date_fmt: &str,
        #[case] time_fmt: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(format_date(&json!(input), date_fmt, time_fmt), expected);
    }

    #[test]
    fn test_format_date_blank_and_invalid() {
        assert_eq!(format_date(&json!(null), "date-input", ""), "");
        assert_eq!(format_date(&json!(""), "date-input", ""), "");
        assert_eq!(format_date(&json!("not a date"), "date-input", ""), INVALID_DATE);
    }

    #[test]
    fn test_parse_time_only_anchors_to_epoch_day() {
        let parsed = parse_date_str("08:30").unwrap();
        assert_eq!(parsed.to_string(), "1970-01-01 08:30:00");
    }

    #[test]
    fn test_parse_rfc3339_normalizes_to_utc() {
        let parsed = parse_date_str("2020-05-01T10:00:00+02:00").unwrap();
        assert_eq!(parsed.to_string(), "2020-05-01 08:00:00");
    }

    #[test]
    fn test_parse_epoch_millis() {
        let parsed = parse_date(&json!(0)).unwrap();
        assert_eq!(parsed.to_string(), "1970-01-01 00:00:00");
        assert_eq!(to_epoch_millis(&json!("1970-01-02")), Some(86_400_000));
    }

    #[test]
    fn test_parse_rejects_non_dates() {
        assert!(parse_date(&json!(true)).is_none());
        assert!(parse_date(&json!({"y": 2020})).is_none());
        assert!(parse_date_str("2020-13-45").is_none());
    }
}
