//! Request body definitions.
//!
//! A body is tagged by `type` in its JSON form:
//!
//! ```json
//! { "type": "JSON", "json": { "id": 1 }, "matchType": "STRICT", "not": false }
//! ```
//!
//! A bare string is an exact STRING body and an untagged object or array is
//! a lenient JSON body.

use super::multimap::KeysToMultiValues;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;

/// JSON comparison mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Strict,
    #[default]
    OnlyMatchingFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyType {
    String,
    Regex,
    Json,
    JsonSchema,
    JsonPath,
    Xml,
    XmlSchema,
    XPath,
    Parameters,
    Binary,
}

impl BodyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyType::String => "STRING",
            BodyType::Regex => "REGEX",
            BodyType::Json => "JSON",
            BodyType::JsonSchema => "JSON_SCHEMA",
            BodyType::JsonPath => "JSON_PATH",
            BodyType::Xml => "XML",
            BodyType::XmlSchema => "XML_SCHEMA",
            BodyType::XPath => "XPATH",
            BodyType::Parameters => "PARAMETERS",
            BodyType::Binary => "BINARY",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "STRING" => BodyType::String,
            "REGEX" => BodyType::Regex,
            "JSON" => BodyType::Json,
            "JSON_SCHEMA" => BodyType::JsonSchema,
            "JSON_PATH" => BodyType::JsonPath,
            "XML" => BodyType::Xml,
            "XML_SCHEMA" => BodyType::XmlSchema,
            "XPATH" => BodyType::XPath,
            "PARAMETERS" => BodyType::Parameters,
            "BINARY" => BodyType::Binary,
            _ => return None,
        })
    }
}

impl fmt::Display for BodyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyKind {
    String { value: String, sub_string: bool },
    Regex(String),
    Json { json: String, match_type: MatchType },
    JsonSchema(String),
    JsonPath(String),
    Xml(String),
    XmlSchema(String),
    XPath(String),
    Parameters(KeysToMultiValues),
    Binary(Bytes),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub kind: BodyKind,
    pub not: bool,
    pub optional: bool,
}

impl Body {
    fn of(kind: BodyKind) -> Self {
        Self {
            kind,
            not: false,
            optional: false,
        }
    }

    pub fn exact(value: impl Into<String>) -> Self {
        Self::of(BodyKind::String {
            value: value.into(),
            sub_string: false,
        })
    }

    pub fn sub_string(value: impl Into<String>) -> Self {
        Self::of(BodyKind::String {
            value: value.into(),
            sub_string: true,
        })
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::of(BodyKind::Regex(pattern.into()))
    }

    pub fn json(json: impl Into<String>, match_type: MatchType) -> Self {
        Self::of(BodyKind::Json {
            json: json.into(),
            match_type,
        })
    }

    pub fn json_value(json: &Value, match_type: MatchType) -> Self {
        Self::json(json.to_string(), match_type)
    }

    pub fn json_schema(schema: impl Into<String>) -> Self {
        Self::of(BodyKind::JsonSchema(schema.into()))
    }

    pub fn json_path(expression: impl Into<String>) -> Self {
        Self::of(BodyKind::JsonPath(expression.into()))
    }

    pub fn xml(xml: impl Into<String>) -> Self {
        Self::of(BodyKind::Xml(xml.into()))
    }

    pub fn xml_schema(schema: impl Into<String>) -> Self {
        Self::of(BodyKind::XmlSchema(schema.into()))
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::of(BodyKind::XPath(expression.into()))
    }

    pub fn parameters(parameters: KeysToMultiValues) -> Self {
        Self::of(BodyKind::Parameters(parameters))
    }

    pub fn binary(bytes: impl Into<Bytes>) -> Self {
        Self::of(BodyKind::Binary(bytes.into()))
    }

    pub fn negated(mut self, not: bool) -> Self {
        self.not = not;
        self
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn body_type(&self) -> BodyType {
        match &self.kind {
            BodyKind::String { .. } => BodyType::String,
            BodyKind::Regex(_) => BodyType::Regex,
            BodyKind::Json { .. } => BodyType::Json,
            BodyKind::JsonSchema(_) => BodyType::JsonSchema,
            BodyKind::JsonPath(_) => BodyType::JsonPath,
            BodyKind::Xml(_) => BodyType::Xml,
            BodyKind::XmlSchema(_) => BodyType::XmlSchema,
            BodyKind::XPath(_) => BodyType::XPath,
            BodyKind::Parameters(_) => BodyType::Parameters,
            BodyKind::Binary(_) => BodyType::Binary,
        }
    }

    /// The body rendered as text, the way it would travel on the wire.
    pub fn as_string(&self) -> Cow<'_, str> {
        match &self.kind {
            BodyKind::String { value, .. } => Cow::Borrowed(value),
            BodyKind::Regex(v)
            | BodyKind::JsonSchema(v)
            | BodyKind::JsonPath(v)
            | BodyKind::Xml(v)
            | BodyKind::XmlSchema(v)
            | BodyKind::XPath(v) => Cow::Borrowed(v),
            BodyKind::Json { json, .. } => Cow::Borrowed(json),
            BodyKind::Parameters(parameters) => Cow::Owned(parameters.to_form_urlencoded()),
            BodyKind::Binary(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    pub fn as_bytes(&self) -> Cow<'_, [u8]> {
        match &self.kind {
            BodyKind::Binary(bytes) => Cow::Borrowed(bytes.as_ref()),
            _ => match self.as_string() {
                Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
                Cow::Owned(s) => Cow::Owned(s.into_bytes()),
            },
        }
    }

    /// Parse a body definition that must carry an explicit, known `type`.
    ///
    /// Used when an example body might itself be a body definition.
    pub fn parse_definition(raw: &str) -> Option<Body> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let type_name = value.get("type")?.as_str()?;
        BodyType::parse(type_name)?;
        Body::from_json_value(value).ok()
    }

    pub fn to_json_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            "type".to_string(),
            Value::String(self.body_type().as_str().to_string()),
        );
        if self.not {
            map.insert("not".to_string(), Value::Bool(true));
        }
        if self.optional {
            map.insert("optional".to_string(), Value::Bool(true));
        }
        match &self.kind {
            BodyKind::String { value, sub_string } => {
                map.insert("string".to_string(), Value::String(value.clone()));
                if *sub_string {
                    map.insert("subString".to_string(), Value::Bool(true));
                }
            }
            BodyKind::Regex(v) => {
                map.insert("regex".to_string(), Value::String(v.clone()));
            }
            BodyKind::Json { json, match_type } => {
                let parsed =
                    serde_json::from_str(json).unwrap_or_else(|_| Value::String(json.clone()));
                map.insert("json".to_string(), parsed);
                if *match_type == MatchType::Strict {
                    map.insert("matchType".to_string(), Value::String("STRICT".to_string()));
                }
            }
            BodyKind::JsonSchema(v) => {
                let parsed = serde_json::from_str(v).unwrap_or_else(|_| Value::String(v.clone()));
                map.insert("jsonSchema".to_string(), parsed);
            }
            BodyKind::JsonPath(v) => {
                map.insert("jsonPath".to_string(), Value::String(v.clone()));
            }
            BodyKind::Xml(v) => {
                map.insert("xml".to_string(), Value::String(v.clone()));
            }
            BodyKind::XmlSchema(v) => {
                map.insert("xmlSchema".to_string(), Value::String(v.clone()));
            }
            BodyKind::XPath(v) => {
                map.insert("xpath".to_string(), Value::String(v.clone()));
            }
            BodyKind::Parameters(parameters) => {
                let parameters = serde_json::to_value(parameters).unwrap_or(Value::Null);
                map.insert("parameters".to_string(), parameters);
            }
            BodyKind::Binary(bytes) => {
                map.insert("base64Bytes".to_string(), Value::String(BASE64.encode(bytes)));
            }
        }
        Value::Object(map)
    }

    pub fn from_json_value(value: Value) -> Result<Body, String> {
        let object = match value {
            Value::String(s) => return Ok(Body::exact(s)),
            Value::Object(object) => object,
            Value::Null => return Err("body must not be null".to_string()),
            other => return Ok(Body::json_value(&other, MatchType::default())),
        };

        let Some(type_name) = object.get("type").and_then(Value::as_str) else {
            return Ok(Body::json_value(&Value::Object(object.clone()), MatchType::default()));
        };
        let body_type =
            BodyType::parse(type_name).ok_or_else(|| format!("unknown body type \"{type_name}\""))?;

        let text = |field: &str| -> Result<String, String> {
            match object.get(field) {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(other) => Ok(other.to_string()),
                None => Err(format!("{type_name} body requires field \"{field}\"")),
            }
        };
        let flag = |field: &str| object.get(field).and_then(Value::as_bool).unwrap_or(false);

        let kind = match body_type {
            BodyType::String => BodyKind::String {
                value: text("string")?,
                sub_string: flag("subString"),
            },
            BodyType::Regex => BodyKind::Regex(text("regex")?),
            BodyType::Json => BodyKind::Json {
                json: text("json")?,
                match_type: match object.get("matchType") {
                    Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?,
                    None => MatchType::default(),
                },
            },
            BodyType::JsonSchema => BodyKind::JsonSchema(text("jsonSchema")?),
            BodyType::JsonPath => BodyKind::JsonPath(text("jsonPath")?),
            BodyType::Xml => BodyKind::Xml(text("xml")?),
            BodyType::XmlSchema => BodyKind::XmlSchema(text("xmlSchema")?),
            BodyType::XPath => BodyKind::XPath(text("xpath")?),
            BodyType::Parameters => BodyKind::Parameters(
                serde_json::from_value(object.get("parameters").cloned().unwrap_or(Value::Null))
                    .map_err(|e| e.to_string())?,
            ),
            BodyType::Binary => BodyKind::Binary(Bytes::from(
                BASE64
                    .decode(text("base64Bytes")?)
                    .map_err(|e| format!("invalid base64Bytes: {e}"))?,
            )),
        };

        Ok(Body {
            kind,
            not: flag("not"),
            optional: flag("optional"),
        })
    }
}

impl Serialize for Body {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Body {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Body::from_json_value(value).map_err(serde::de::Error::custom)
    }
}
