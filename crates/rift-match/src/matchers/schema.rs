//! JSON Schema validation for bodies and schema-valued parameters.

use super::diff::MatchDifference;
use super::{Compiled, Matcher};
use jsonschema::JSONSchema;
use serde_json::{Number, Value};

fn compile_schema(schema: &Value) -> Compiled<JSONSchema> {
    Compiled::build(&schema.to_string(), |_| {
        JSONSchema::compile(schema).map_err(|e| e.to_string())
    })
}

fn validation_errors(schema: &JSONSchema, instance: &Value) -> Vec<String> {
    match schema.validate(instance) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{path}: {e}")
                }
            })
            .collect(),
    }
}

/// Validates request bodies against a JSON Schema document.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonSchemaMatcher {
    schema: Compiled<JSONSchema>,
}

impl JsonSchemaMatcher {
    pub fn new(schema: &str) -> Self {
        let schema = match serde_json::from_str::<Value>(schema) {
            Ok(parsed) => {
                let mut compiled = compile_schema(&parsed);
                compiled.source = schema.to_string();
                compiled
            }
            Err(e) => {
                tracing::trace!("unable to parse json schema {}: {}", schema, e);
                Compiled::failed(schema)
            }
        };
        Self { schema }
    }
}

impl Matcher<str> for JsonSchemaMatcher {
    fn matches(&self, diff: &mut MatchDifference, actual: &str) -> bool {
        if self.is_blank() {
            return true;
        }
        let Some(schema) = self.schema.get() else {
            diff.add(format_args!("json schema {} is invalid", self.schema.source));
            return false;
        };
        let instance = match serde_json::from_str::<Value>(actual) {
            Ok(instance) => instance,
            Err(e) => {
                diff.add(format_args!("failed to parse body as json: {e}"));
                return false;
            }
        };
        let errors = validation_errors(schema, &instance);
        if !errors.is_empty() {
            diff.add(format_args!(
                "json schema match failed expected:\n\n  {}\n\n found:\n\n  {}\
                 \n\n failed because:\n\n  {}\n",
                self.schema.source,
                actual,
                errors.join(",\n  ")
            ));
        }
        errors.is_empty()
    }

    fn is_blank(&self) -> bool {
        self.schema.source.trim().is_empty()
    }
}

/// Validates a single string value (header, cookie, parameter) against a
/// schema, coercing the text to the type the schema asks for first.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaValueMatcher {
    schema: Value,
    compiled: Compiled<JSONSchema>,
}

impl SchemaValueMatcher {
    pub fn new(schema: &Value) -> Self {
        Self {
            schema: schema.clone(),
            compiled: compile_schema(schema),
        }
    }

    pub fn matches_str(&self, actual: &str) -> bool {
        match self.compiled.get() {
            Some(compiled) => compiled.is_valid(&coerce(&self.schema, actual)),
            None => false,
        }
    }
}

fn schema_types(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

/// Convert parameter text to the JSON value the schema expects.
fn coerce(schema: &Value, raw: &str) -> Value {
    let types = schema_types(schema);
    if raw.is_empty() && types.contains(&"null") {
        return Value::Null;
    }
    for schema_type in &types {
        match *schema_type {
            "integer" => {
                if let Ok(i) = raw.parse::<i64>() {
                    return Value::Number(i.into());
                }
            }
            "number" => {
                if let Ok(i) = raw.parse::<i64>() {
                    return Value::Number(i.into());
                }
                if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
                    return Value::Number(n);
                }
            }
            "boolean" => match raw {
                "true" => return Value::Bool(true),
                "false" => return Value::Bool(false),
                _ => {}
            },
            "array" => {
                let items = schema.get("items").cloned().unwrap_or(Value::Null);
                return Value::Array(raw.split(',').map(|item| coerce(&items, item)).collect());
            }
            "object" => {
                if let Ok(object @ Value::Object(_)) = serde_json::from_str::<Value>(raw) {
                    return object;
                }
            }
            "null" => {
                if raw == "null" {
                    return Value::Null;
                }
            }
            _ => {}
        }
    }
    Value::String(raw.to_string())
}
