use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{AppError, Result};
use crate::models::ConditionOperator;

/// Per-pass cache of compiled regex patterns
///
/// Patterns are compiled once per rule-evaluation pass, not per condition.
/// Failed compilations are cached too, so a bad pattern costs one parse.
#[derive(Default)]
pub struct RegexCache {
    compiled: HashMap<String, std::result::Result<Regex, regex::Error>>,
}

impl RegexCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_match(&mut self, pattern: &str, text: &str) -> Result<bool> {
        let entry = self
            .compiled
            .entry(pattern.to_string())
            .or_insert_with(|| Regex::new(pattern));

        match entry {
            Ok(regex) => Ok(regex.is_match(text)),
            Err(e) => Err(AppError::Validation(format!(
                "Invalid regex pattern '{}': {}",
                pattern, e
            ))),
        }
    }
}

type OperatorHandler = fn(&JsonValue, &JsonValue, &mut RegexCache) -> Result<bool>;

/// Dispatch table: operator -> handler
static OPERATOR_TABLE: Lazy<HashMap<ConditionOperator, OperatorHandler>> = Lazy::new(|| {
    use ConditionOperator::*;
    let mut table: HashMap<ConditionOperator, OperatorHandler> = HashMap::new();
    table.insert(Equals, op_equals);
    table.insert(NotEquals, op_not_equals);
    table.insert(Contains, op_contains);
    table.insert(NotContains, op_not_contains);
    table.insert(In, op_in);
    table.insert(NotIn, op_not_in);
    table.insert(GreaterThan, op_greater_than);
    table.insert(LessThan, op_less_than);
    table.insert(GreaterOrEqual, op_greater_or_equal);
    table.insert(LessOrEqual, op_less_or_equal);
    table.insert(IsEmpty, op_is_empty);
    table.insert(IsNotEmpty, op_is_not_empty);
    table.insert(MatchesRegex, op_matches_regex);
    table
});

/// Evaluate an operator by name against actual/expected operands
///
/// Unrecognized names return `UnknownOperator`; they never silently evaluate
/// to false here — failing closed is the rule engine's decision.
pub fn evaluate(
    operator_name: &str,
    actual: &JsonValue,
    expected: &JsonValue,
    cache: &mut RegexCache,
) -> Result<bool> {
    let operator = ConditionOperator::from_str(operator_name)
        .map_err(|_| AppError::UnknownOperator(operator_name.to_string()))?;
    evaluate_parsed(operator, actual, expected, cache)
}

/// Evaluate an already-parsed operator
pub fn evaluate_parsed(
    operator: ConditionOperator,
    actual: &JsonValue,
    expected: &JsonValue,
    cache: &mut RegexCache,
) -> Result<bool> {
    let handler = OPERATOR_TABLE
        .get(&operator)
        .ok_or_else(|| AppError::UnknownOperator(operator.to_string()))?;
    handler(actual, expected, cache)
}

// ==================== Equality family ====================

/// Loose equality: case-insensitive for strings, instant-based for dates,
/// numeric for numbers, structural otherwise
fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    if let (Some(da), Some(db)) = (coerce_date(a), coerce_date(b)) {
        return da == db;
    }
    match (a, b) {
        (JsonValue::String(sa), JsonValue::String(sb)) => sa.to_lowercase() == sb.to_lowercase(),
        (JsonValue::Number(_), JsonValue::Number(_)) => a.as_f64() == b.as_f64(),
        _ => a == b,
    }
}

fn op_equals(actual: &JsonValue, expected: &JsonValue, _cache: &mut RegexCache) -> Result<bool> {
    Ok(values_equal(actual, expected))
}

fn op_not_equals(actual: &JsonValue, expected: &JsonValue, _cache: &mut RegexCache) -> Result<bool> {
    Ok(!values_equal(actual, expected))
}

// ==================== Containment family ====================

fn contains(actual: &JsonValue, expected: &JsonValue) -> bool {
    match actual {
        JsonValue::String(haystack) => expected
            .as_str()
            .map(|needle| haystack.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(false),
        JsonValue::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        _ => false,
    }
}

fn op_contains(actual: &JsonValue, expected: &JsonValue, _cache: &mut RegexCache) -> Result<bool> {
    Ok(contains(actual, expected))
}

fn op_not_contains(
    actual: &JsonValue,
    expected: &JsonValue,
    _cache: &mut RegexCache,
) -> Result<bool> {
    Ok(!contains(actual, expected))
}

fn is_in(actual: &JsonValue, expected: &JsonValue) -> bool {
    match expected {
        JsonValue::Array(items) => items.iter().any(|item| values_equal(item, actual)),
        JsonValue::String(set) => actual
            .as_str()
            .map(|member| set.to_lowercase().contains(&member.to_lowercase()))
            .unwrap_or(false),
        _ => false,
    }
}

fn op_in(actual: &JsonValue, expected: &JsonValue, _cache: &mut RegexCache) -> Result<bool> {
    Ok(is_in(actual, expected))
}

fn op_not_in(actual: &JsonValue, expected: &JsonValue, _cache: &mut RegexCache) -> Result<bool> {
    Ok(!is_in(actual, expected))
}

// ==================== Ordering family ====================

fn coerce_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_date(value: &JsonValue) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Coerce both operands to a common ordered type: numeric, then date
fn compare_ordered(actual: &JsonValue, expected: &JsonValue) -> Result<std::cmp::Ordering> {
    if let (Some(a), Some(b)) = (coerce_number(actual), coerce_number(expected)) {
        return a.partial_cmp(&b).ok_or_else(|| {
            AppError::TypeMismatch("Cannot order non-finite numbers".to_string())
        });
    }
    if let (Some(a), Some(b)) = (coerce_date(actual), coerce_date(expected)) {
        return Ok(a.cmp(&b));
    }
    Err(AppError::TypeMismatch(format!(
        "Cannot order {} against {}",
        type_name(actual),
        type_name(expected)
    )))
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn op_greater_than(
    actual: &JsonValue,
    expected: &JsonValue,
    _cache: &mut RegexCache,
) -> Result<bool> {
    Ok(compare_ordered(actual, expected)?.is_gt())
}

fn op_less_than(actual: &JsonValue, expected: &JsonValue, _cache: &mut RegexCache) -> Result<bool> {
    Ok(compare_ordered(actual, expected)?.is_lt())
}

fn op_greater_or_equal(
    actual: &JsonValue,
    expected: &JsonValue,
    _cache: &mut RegexCache,
) -> Result<bool> {
    Ok(compare_ordered(actual, expected)?.is_ge())
}

fn op_less_or_equal(
    actual: &JsonValue,
    expected: &JsonValue,
    _cache: &mut RegexCache,
) -> Result<bool> {
    Ok(compare_ordered(actual, expected)?.is_le())
}

// ==================== Null family ====================

fn is_empty(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Array(items) => items.is_empty(),
        JsonValue::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn op_is_empty(actual: &JsonValue, _expected: &JsonValue, _cache: &mut RegexCache) -> Result<bool> {
    Ok(is_empty(actual))
}

fn op_is_not_empty(
    actual: &JsonValue,
    _expected: &JsonValue,
    _cache: &mut RegexCache,
) -> Result<bool> {
    Ok(!is_empty(actual))
}

// ==================== Pattern family ====================

fn op_matches_regex(
    actual: &JsonValue,
    expected: &JsonValue,
    cache: &mut RegexCache,
) -> Result<bool> {
    let pattern = expected.as_str().ok_or_else(|| {
        AppError::TypeMismatch(format!(
            "Regex pattern must be a string, got {}",
            type_name(expected)
        ))
    })?;

    match actual.as_str() {
        Some(text) => cache.is_match(pattern, text),
        None => Ok(false),
    }
}
