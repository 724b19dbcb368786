//! Strings that carry negation and optionality.
//!
//! In the JSON form a leading `!` negates a value and a leading `?` marks a
//! key as optional. Schema-valued strings (produced by the OpenAPI expansion)
//! use an object form with a `schema` member.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NottableString {
    value: String,
    not: bool,
    optional: bool,
    schema: Option<Value>,
}

impl NottableString {
    /// Parse a string, honouring the `!` and `?` prefixes.
    pub fn string(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.len() > 1 {
            if let Some(rest) = value.strip_prefix('!') {
                return Self::not(rest);
            }
            if let Some(rest) = value.strip_prefix('?') {
                return Self::optional(rest);
            }
        }
        Self::exact(value)
    }

    /// Take the value literally, without interpreting prefixes.
    pub fn exact(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn not(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            not: true,
            ..Default::default()
        }
    }

    pub fn optional(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            optional: true,
            ..Default::default()
        }
    }

    pub fn schema(schema: Value) -> Self {
        Self {
            value: schema.to_string(),
            schema: Some(schema),
            ..Default::default()
        }
    }

    pub fn negated(mut self, not: bool) -> Self {
        self.not = not;
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_not(&self) -> bool {
        self.not
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn schema_value(&self) -> Option<&Value> {
        self.schema.as_ref()
    }

    /// A blank string is a wildcard when used as a matcher.
    pub fn is_blank(&self) -> bool {
        self.schema.is_none() && self.value.trim().is_empty()
    }

    /// The same value with negation and optionality stripped.
    pub fn positive(&self) -> Self {
        Self {
            value: self.value.clone(),
            not: false,
            optional: false,
            schema: self.schema.clone(),
        }
    }

    pub(crate) fn to_json_value(&self) -> Value {
        NottableStringRaw::from(self.clone()).into_value()
    }
}

impl fmt::Display for NottableString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.not {
            f.write_str("!")?;
        } else if self.optional {
            f.write_str("?")?;
        }
        f.write_str(&self.value)
    }
}

impl From<&str> for NottableString {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for NottableString {
    fn from(value: String) -> Self {
        Self::string(value)
    }
}

impl From<&String> for NottableString {
    fn from(value: &String) -> Self {
        Self::string(value.as_str())
    }
}

impl Serialize for NottableString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NottableStringRaw::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NottableString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        NottableStringRaw::deserialize(deserializer).map(NottableString::from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum NottableStringRaw {
    Plain(String),
    Number(serde_json::Number),
    Bool(bool),
    Object {
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        not: bool,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        optional: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema: Option<Value>,
    },
}

impl NottableStringRaw {
    fn into_value(self) -> Value {
        match self {
            NottableStringRaw::Plain(s) => Value::String(s),
            NottableStringRaw::Number(n) => Value::Number(n),
            NottableStringRaw::Bool(b) => Value::Bool(b),
            NottableStringRaw::Object {
                not,
                optional,
                value,
                schema,
            } => {
                let mut map = serde_json::Map::new();
                if not {
                    map.insert("not".to_string(), Value::Bool(true));
                }
                if optional {
                    map.insert("optional".to_string(), Value::Bool(true));
                }
                if let Some(value) = value {
                    map.insert("value".to_string(), Value::String(value));
                }
                if let Some(schema) = schema {
                    map.insert("schema".to_string(), schema);
                }
                Value::Object(map)
            }
        }
    }
}

impl From<NottableStringRaw> for NottableString {
    fn from(raw: NottableStringRaw) -> Self {
        match raw {
            NottableStringRaw::Plain(s) => NottableString::string(s),
            NottableStringRaw::Number(n) => NottableString::exact(n.to_string()),
            NottableStringRaw::Bool(b) => NottableString::exact(b.to_string()),
            NottableStringRaw::Object {
                not,
                optional,
                value,
                schema,
            } => {
                let mut parsed = match schema {
                    Some(schema) => NottableString::schema(schema),
                    None => NottableString::exact(value.unwrap_or_default()),
                };
                parsed.not = not;
                parsed.optional = optional;
                parsed
            }
        }
    }
}

impl From<NottableString> for NottableStringRaw {
    fn from(value: NottableString) -> Self {
        let ambiguous = value.value.starts_with('!') || value.value.starts_with('?');
        if value.schema.is_some() || (value.not && value.optional) || ambiguous {
            return NottableStringRaw::Object {
                not: value.not,
                optional: value.optional,
                value: if value.schema.is_some() {
                    None
                } else {
                    Some(value.value)
                },
                schema: value.schema,
            };
        }
        if value.not {
            NottableStringRaw::Plain(format!("!{}", value.value))
        } else if value.optional {
            NottableStringRaw::Plain(format!("?{}", value.value))
        } else {
            NottableStringRaw::Plain(value.value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prefixes() {
        let not = NottableString::string("!GET");
        assert!(not.is_not());
        assert_eq!(not.value(), "GET");

        let optional = NottableString::string("?X-Trace");
        assert!(optional.is_optional());
        assert_eq!(optional.value(), "X-Trace");

        let bang = NottableString::string("!");
        assert!(!bang.is_not());
        assert_eq!(bang.value(), "!");
    }

    #[test]
    fn test_blank() {
        assert!(NottableString::string("").is_blank());
        assert!(NottableString::not("  ").is_blank());
        assert!(!NottableString::schema(json!({"type": "string"})).is_blank());
    }

    #[test]
    fn test_deserialize_forms() {
        let plain: NottableString = serde_json::from_value(json!("!POST")).unwrap();
        assert_eq!(plain, NottableString::not("POST"));

        let object: NottableString =
            serde_json::from_value(json!({"not": true, "value": "PUT"})).unwrap();
        assert_eq!(object, NottableString::not("PUT"));

        let schema: NottableString =
            serde_json::from_value(json!({"schema": {"type": "integer"}})).unwrap();
        assert_eq!(schema.schema_value(), Some(&json!({"type": "integer"})));

        let number: NottableString = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(number.value(), "42");
    }

    #[test]
    fn test_serialize_literal_prefix_as_object() {
        let literal = NottableString::exact("!important");
        let value = serde_json::to_value(&literal).unwrap();
        assert_eq!(value, json!({"value": "!important"}));
        let back: NottableString = serde_json::from_value(value).unwrap();
        assert_eq!(back, literal);
    }

    #[test]
    fn test_display() {
        assert_eq!(NottableString::not("a").to_string(), "!a");
        assert_eq!(NottableString::optional("b").to_string(), "?b");
        assert_eq!(NottableString::exact("c").to_string(), "c");
    }
}
