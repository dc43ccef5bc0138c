//! Built-in validators for parameterized rules.
//!
//! Each validator receives the (trimmed) value and the rule's parameter and
//! answers synchronously. Blank values never reach these validators; the
//! engine handles blankness through the `required` rule.

use chrono::NaiveDateTime;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, OnceLock};

use formstate_format::{date::parse_date, formatters::numbers_only, to_number, to_text};

use super::rules::{RuleInput, RuleOutcome, RuleResponse, Validators};
use super::RuleError;
use crate::types::ErrorMessage;

type RuleResult = Result<RuleOutcome, RuleError>;

/// Symbols a password may contain.
pub const PASSWORD_SYMBOLS: &str = " /$^.*+()[]!\"#%&',-:;<=>?@_`{|}~";

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^\s*(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))\s*$"#,
        )
        .expect("Invalid email regex")
    })
}

impl Validators {
    /// The built-in validator table.
    pub fn builtin() -> Self {
        let mut validators = Self::new();
        validators.insert("email", email);
        validators.insert("phone", phone);
        validators.insert("password", password);
        validators.insert("pattern", pattern);
        validators.insert("boolean", boolean);
        validators.insert("string", string);
        validators.insert("number", number);
        validators.insert("integer", integer);
        validators.insert("minLength", min_length);
        validators.insert("maxLength", max_length);
        validators.insert("exactLength", exact_length);
        validators.insert("lengthRange", length_range);
        validators.insert("minNumber", min_number);
        validators.insert("maxNumber", max_number);
        validators.insert("numberRange", number_range);
        validators.insert("date", date);
        validators.insert("minDate", min_date);
        validators.insert("maxDate", max_date);
        validators.insert("dateRange", date_range);
        validators.insert("minTime", min_time);
        validators.insert("maxTime", max_time);
        validators.insert("timeRange", time_range);
        validators
    }
}

fn verdict(valid: bool) -> RuleResult {
    Ok(RuleOutcome::from(valid))
}

fn text_len(value: &Value) -> usize {
    to_text(value).trim().chars().count()
}

fn param_number(param: &Value) -> Option<f64> {
    match param {
        Value::Number(_) | Value::String(_) => to_number(param),
        _ => None,
    }
}

fn param_pair(param: &Value) -> Option<(&Value, &Value)> {
    match param {
        Value::Array(items) => Some((items.first()?, items.get(1).unwrap_or(&Value::Null))),
        _ => None,
    }
}

/// Half-open `[start, end)` range test. A missing end means `[0, start)`;
/// reversed bounds are swapped.
fn in_range(n: f64, start: f64, end: Option<f64>) -> bool {
    let (start, end) = match end {
        Some(end) => (start, end),
        None => (0.0, start),
    };
    let (low, high) = if start > end { (end, start) } else { (start, end) };
    n >= low && n < high
}

pub fn email(input: &RuleInput<'_>) -> RuleResult {
    verdict(email_regex().is_match(&to_text(input.value).to_lowercase()))
}

/// 7, 10 or 11 digits.
pub fn phone(input: &RuleInput<'_>) -> RuleResult {
    let digits = to_text(&numbers_only(input.value, None));
    verdict(matches!(digits.len(), 7 | 10 | 11))
}

pub fn pattern(input: &RuleInput<'_>) -> RuleResult {
    if input.value.is_null() {
        return verdict(false);
    }
    let re = compiled_pattern(&to_text(input.param))?;
    verdict(re.is_match(&to_text(input.value)))
}

/// Compile a `pattern` parameter once and reuse it across validations.
fn compiled_pattern(source: &str) -> Result<Regex, RuleError> {
    static CACHE: OnceLock<Mutex<HashMap<String, Regex>>> = OnceLock::new();
    let mut cache = CACHE
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(re) = cache.get(source) {
        return Ok(re.clone());
    }
    let re = Regex::new(source).map_err(|e| RuleError::new(format!("invalid pattern: {e}")))?;
    cache.insert(source.to_string(), re.clone());
    Ok(re)
}

pub fn boolean(input: &RuleInput<'_>) -> RuleResult {
    let valid = match input.value {
        Value::Bool(_) => true,
        Value::Number(n) => matches!(n.as_f64(), Some(f) if f == 0.0 || f == 1.0),
        Value::String(s) => matches!(
            s.as_str(),
            "" | "0" | "1" | "true" | "false" | "yes" | "no"
        ),
        _ => false,
    };
    verdict(valid)
}

pub fn string(input: &RuleInput<'_>) -> RuleResult {
    verdict(input.value.is_string())
}

fn allow_negative(param: &Value) -> bool {
    param
        .get("allowNegative")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn is_numeric(value: &Value, integer: bool, allow_negative: bool) -> bool {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(_) => to_number(value),
        _ => None,
    };
    let Some(n) = n else {
        return false;
    };
    if integer && (n.fract() != 0.0 || n.abs() > 9_007_199_254_740_991.0) {
        return false;
    }
    allow_negative || n >= 0.0
}

/// Numeric, and non-negative unless `{"allowNegative": true}`.
pub fn number(input: &RuleInput<'_>) -> RuleResult {
    verdict(is_numeric(input.value, false, allow_negative(input.param)))
}

/// A whole number, non-negative unless `{"allowNegative": true}`.
pub fn integer(input: &RuleInput<'_>) -> RuleResult {
    verdict(is_numeric(input.value, true, allow_negative(input.param)))
}

pub fn min_length(input: &RuleInput<'_>) -> RuleResult {
    verdict(param_number(input.param).is_some_and(|len| text_len(input.value) as f64 >= len))
}

pub fn max_length(input: &RuleInput<'_>) -> RuleResult {
    verdict(param_number(input.param).is_some_and(|len| text_len(input.value) as f64 <= len))
}

pub fn exact_length(input: &RuleInput<'_>) -> RuleResult {
    verdict(param_number(input.param).is_some_and(|len| text_len(input.value) as f64 == len))
}

pub fn length_range(input: &RuleInput<'_>) -> RuleResult {
    let valid = param_pair(input.param).is_some_and(|(start, end)| {
        param_number(start).is_some_and(|start| {
            in_range(text_len(input.value) as f64, start, param_number(end))
        })
    });
    verdict(valid)
}

fn compare_numbers(value: &Value, param: &Value, test: impl Fn(f64, f64) -> bool) -> bool {
    match (to_number(value), param_number(param)) {
        (Some(n), Some(limit)) => test(n, limit),
        _ => false,
    }
}

pub fn min_number(input: &RuleInput<'_>) -> RuleResult {
    verdict(compare_numbers(input.value, input.param, |n, min| n >= min))
}

pub fn max_number(input: &RuleInput<'_>) -> RuleResult {
    verdict(compare_numbers(input.value, input.param, |n, max| n <= max))
}

/// `[start, end)`; see [`in_range`].
pub fn number_range(input: &RuleInput<'_>) -> RuleResult {
    let valid = param_pair(input.param).is_some_and(|(start, end)| {
        match (to_number(input.value), param_number(start)) {
            (Some(n), Some(start)) => in_range(n, start, param_number(end)),
            _ => false,
        }
    });
    verdict(valid)
}

pub fn date(input: &RuleInput<'_>) -> RuleResult {
    verdict(parse_date(input.value).is_some())
}

fn compare_dates(
    value: &Value,
    limit: &Value,
    test: impl Fn(NaiveDateTime, NaiveDateTime) -> bool,
) -> bool {
    match (parse_date(value), parse_date(limit)) {
        (Some(value), Some(limit)) => test(value, limit),
        _ => false,
    }
}

pub fn min_date(input: &RuleInput<'_>) -> RuleResult {
    verdict(compare_dates(input.value, input.param, |d, min| d >= min))
}

pub fn max_date(input: &RuleInput<'_>) -> RuleResult {
    verdict(compare_dates(input.value, input.param, |d, max| d <= max))
}

/// Inclusive on both ends.
pub fn date_range(input: &RuleInput<'_>) -> RuleResult {
    let valid = param_pair(input.param).is_some_and(|(start, end)| {
        match (parse_date(input.value), parse_date(start), parse_date(end)) {
            (Some(d), Some(start), Some(end)) => d >= start && d <= end,
            _ => false,
        }
    });
    verdict(valid)
}

fn compare_times(
    value: &Value,
    limit: &Value,
    test: impl Fn(chrono::NaiveTime, chrono::NaiveTime) -> bool,
) -> bool {
    compare_dates(value, limit, |v, l| test(v.time(), l.time()))
}

/// Time-of-day comparisons ignore the date part.
pub fn min_time(input: &RuleInput<'_>) -> RuleResult {
    verdict(compare_times(input.value, input.param, |t, min| t >= min))
}

pub fn max_time(input: &RuleInput<'_>) -> RuleResult {
    verdict(compare_times(input.value, input.param, |t, max| t <= max))
}

pub fn time_range(input: &RuleInput<'_>) -> RuleResult {
    let valid = param_pair(input.param).is_some_and(|(start, end)| {
        match (parse_date(input.value), parse_date(start), parse_date(end)) {
            (Some(t), Some(start), Some(end)) => {
                let t = t.time();
                t >= start.time() && t <= end.time()
            }
            _ => false,
        }
    });
    verdict(valid)
}

/// Password strength.
///
/// The parameter sets minimum counts: `{"lower": 1, "upper": 1, "number": 1,
/// "symbol": 1}` (a `true` count means one). Each unmet requirement yields
/// its own message from the rule's message group. Without requirements any
/// string passes.
pub fn password(input: &RuleInput<'_>) -> RuleResult {
    let Some(opts) = input.param.as_object().filter(|o| !o.is_empty()) else {
        return string(input);
    };

    let count = |key: &str| -> usize {
        match opts.get(key) {
            Some(Value::Bool(true)) => 1,
            Some(Value::Number(n)) => n.as_f64().map(|f| f.max(0.0) as usize).unwrap_or(0),
            _ => 0,
        }
    };
    let lower = count("lower");
    let upper = count("upper");
    let num = count("number");
    let symbol = count("symbol");

    let text = to_text(input.value);
    let has = |required: usize, test: fn(&char) -> bool| {
        required == 0 || text.chars().filter(test).count() >= required
    };
    let has_lower = has(lower, char::is_ascii_lowercase);
    let has_upper = has(upper, char::is_ascii_uppercase);
    let has_number = has(num, char::is_ascii_digit);
    let has_symbol = has(symbol, |c| PASSWORD_SYMBOLS.contains(*c));

    let message = |key: &str, value: String| -> String {
        input
            .message
            .and_then(|m: &ErrorMessage| m.entry(key))
            .unwrap_or_default()
            .replace("{value}", &value)
    };

    let mut errors = Vec::new();
    if !has_lower || !has_upper {
        if lower == 1 && upper == 1 {
            errors.push(message("mixedCase", String::new()));
        } else {
            if !has_lower {
                errors.push(message("lowerCase", lower.to_string()));
            }
            if !has_upper {
                errors.push(message("upperCase", upper.to_string()));
            }
        }
    }
    if !has_number {
        errors.push(message("number", num.to_string()));
    }
    if !has_symbol {
        errors.push(message("symbol", symbol.to_string()));
    }

    let invalid: BTreeSet<char> = text
        .chars()
        .filter(|c| !c.is_ascii_alphanumeric() && !PASSWORD_SYMBOLS.contains(*c))
        .collect();
    if !invalid.is_empty() {
        let listed: Vec<String> = invalid.iter().map(char::to_string).collect();
        errors.push(message("invalidChars", listed.join(" ")));
    }

    if errors.is_empty() {
        verdict(true)
    } else {
        Ok(RuleOutcome::Ready(RuleResponse::Messages(errors)))
    }
}
