//! JSON document and JSONPath body matchers.

use super::diff::MatchDifference;
use super::{assign_distinct, Compiled, Matcher};
use crate::model::MatchType;
use serde_json::Value;
use serde_json_path::JsonPath;

const IGNORE: &str = "${json-unit.ignore}";
const ANY_STRING: &str = "${json-unit.any-string}";
const ANY_NUMBER: &str = "${json-unit.any-number}";
const ANY_BOOLEAN: &str = "${json-unit.any-boolean}";

/// Compares a candidate JSON document against an expected one.
///
/// `STRICT` requires the same fields and array order. `ONLY_MATCHING_FIELDS`
/// ignores extra fields, array order and extra array items.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonStringMatcher {
    source: String,
    expected: Option<Value>,
    match_type: MatchType,
}

impl JsonStringMatcher {
    pub fn new(source: &str, match_type: MatchType) -> Self {
        let expected = if source.trim().is_empty() {
            None
        } else {
            match serde_json::from_str(source) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::trace!("unable to parse expected json {}: {}", source, e);
                    None
                }
            }
        };
        Self {
            source: source.to_string(),
            expected,
            match_type,
        }
    }

    fn strict(&self) -> bool {
        self.match_type == MatchType::Strict
    }
}

impl Matcher<str> for JsonStringMatcher {
    fn matches(&self, diff: &mut MatchDifference, actual: &str) -> bool {
        if self.is_blank() {
            return true;
        }
        let Some(expected) = &self.expected else {
            diff.add(format_args!("expected json {} is invalid", self.source));
            return false;
        };
        let actual_value: Value = match serde_json::from_str(actual) {
            Ok(value) => value,
            Err(e) => {
                tracing::trace!("failed to parse candidate body as json: {}", e);
                diff.add(format_args!(
                    "json match failed expected:\n\n  {}\n\n found:\n\n  {}\
                     \n\n failed because:\n\n  {}\n",
                    self.source, actual, e
                ));
                return false;
            }
        };
        let mut failures = Vec::new();
        let result = compare(expected, &actual_value, self.strict(), "$", &mut failures);
        if !result {
            diff.add(format_args!(
                "json match failed expected:\n\n  {}\n\n found:\n\n  {}\
                 \n\n failed because:\n\n  {}\n",
                self.source,
                actual,
                failures.join(",\n  ")
            ));
        }
        result
    }

    fn is_blank(&self) -> bool {
        self.source.trim().is_empty()
    }
}

fn placeholder(expected: &str, actual: &Value) -> Option<bool> {
    match expected {
        IGNORE => Some(true),
        ANY_STRING => Some(actual.is_string()),
        ANY_NUMBER => Some(actual.is_number()),
        ANY_BOOLEAN => Some(actual.is_boolean()),
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Object(_) => "object".to_string(),
        Value::Array(items) => format!("array of {} items", items.len()),
        other => other.to_string(),
    }
}

/// Structural comparison, collecting one message per mismatching path.
fn compare(
    expected: &Value,
    actual: &Value,
    strict: bool,
    path: &str,
    failures: &mut Vec<String>,
) -> bool {
    if let Value::String(text) = expected {
        if let Some(result) = placeholder(text, actual) {
            if !result {
                failures.push(format!("{path}: expected {text} but found {}", describe(actual)));
            }
            return result;
        }
    }
    match (expected, actual) {
        (Value::Object(expected_fields), Value::Object(actual_fields)) => {
            let mut result = true;
            for (name, expected_value) in expected_fields {
                let field_path = format!("{path}.{name}");
                match actual_fields.get(name) {
                    Some(actual_value) => {
                        result &=
                            compare(expected_value, actual_value, strict, &field_path, failures);
                    }
                    None => {
                        failures.push(format!("{field_path}: missing field"));
                        result = false;
                    }
                }
            }
            if strict {
                for name in actual_fields.keys().filter(|k| !expected_fields.contains_key(*k)) {
                    failures.push(format!("{path}.{name}: unexpected field"));
                    result = false;
                }
            }
            result
        }
        (Value::Array(expected_items), Value::Array(actual_items)) => {
            if strict {
                if expected_items.len() != actual_items.len() {
                    failures.push(format!(
                        "{path}: expected {} items but found {}",
                        expected_items.len(),
                        actual_items.len()
                    ));
                    return false;
                }
                let mut result = true;
                for (index, (e, a)) in expected_items.iter().zip(actual_items).enumerate() {
                    result &= compare(e, a, strict, &format!("{path}[{index}]"), failures);
                }
                result
            } else {
                let fits: Vec<Vec<bool>> = expected_items
                    .iter()
                    .map(|e| {
                        actual_items
                            .iter()
                            .map(|a| compare(e, a, strict, path, &mut Vec::new()))
                            .collect()
                    })
                    .collect();
                let result = assign_distinct(&fits, actual_items.len());
                if !result {
                    failures.push(format!(
                        "{path}: no match for every expected item in {}",
                        describe(actual)
                    ));
                }
                result
            }
        }
        (Value::Number(e), Value::Number(a)) => {
            let result = e == a || matches!((e.as_f64(), a.as_f64()), (Some(x), Some(y)) if x == y);
            if !result {
                failures.push(format!("{path}: expected {e} but found {a}"));
            }
            result
        }
        _ => {
            let result = expected == actual;
            if !result {
                failures.push(format!(
                    "{path}: expected {} but found {}",
                    describe(expected),
                    describe(actual)
                ));
            }
            result
        }
    }
}

/// Matches when the expression selects at least one node.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPathMatcher {
    path: Compiled<JsonPath>,
}

impl JsonPathMatcher {
    pub fn new(expression: &str) -> Self {
        Self {
            path: Compiled::build(expression, |e| JsonPath::parse(e).map_err(|e| e.to_string())),
        }
    }
}

impl Matcher<str> for JsonPathMatcher {
    fn matches(&self, diff: &mut MatchDifference, actual: &str) -> bool {
        if self.is_blank() {
            return true;
        }
        let Some(path) = self.path.get() else {
            diff.add(format_args!("json path {} is invalid", self.path.source()));
            return false;
        };
        let result = match serde_json::from_str::<Value>(actual) {
            Ok(document) => !path.query(&document).is_empty(),
            Err(e) => {
                tracing::trace!("failed to parse candidate body as json: {}", e);
                false
            }
        };
        if !result {
            diff.add(format_args!(
                "json path match failed expected:\n\n  {}\n\n found:\n\n  {}\n",
                self.path.source(),
                actual
            ));
        }
        result
    }

    fn is_blank(&self) -> bool {
        self.path.source().trim().is_empty()
    }
}
