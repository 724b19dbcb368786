//! Body dispatch: one matcher per body variant.

use super::diff::MatchDifference;
use super::json::{JsonPathMatcher, JsonStringMatcher};
use super::parameters::ParameterStringMatcher;
use super::scalar::BinaryMatcher;
use super::schema::JsonSchemaMatcher;
use super::string::{ExactStringMatcher, RegexStringMatcher, SubStringMatcher};
use super::xml::{xml_to_json, XPathMatcher, XmlStringMatcher};
use super::xml_schema::XmlSchemaMatcher;
use super::Matcher;
use crate::error::MatcherError;
use crate::model::{Body, BodyKind, HttpRequest, KeysToMultiValues, NottableString};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum BodyMatcher {
    Exact(ExactStringMatcher),
    SubString(SubStringMatcher),
    Regex(RegexStringMatcher),
    Json(JsonStringMatcher),
    JsonSchema(JsonSchemaMatcher),
    JsonPath(JsonPathMatcher),
    Xml(XmlStringMatcher),
    XmlSchema(XmlSchemaMatcher),
    XPath(XPathMatcher),
    Parameters(ParameterStringMatcher),
    Binary(BinaryMatcher),
}

impl BodyMatcher {
    pub fn compile(body: &Body) -> Result<Self, MatcherError> {
        Ok(match &body.kind {
            BodyKind::String { value, sub_string: true } => {
                let value = NottableString::exact(value.as_str());
                BodyMatcher::SubString(SubStringMatcher::new(value, false))
            }
            BodyKind::String { value, sub_string: false } => {
                let value = NottableString::exact(value.as_str());
                BodyMatcher::Exact(ExactStringMatcher::new(value, false))
            }
            BodyKind::Regex(pattern) => {
                let pattern = NottableString::exact(pattern.as_str());
                BodyMatcher::Regex(RegexStringMatcher::new(pattern, false))
            }
            BodyKind::Json { json, match_type } => {
                BodyMatcher::Json(JsonStringMatcher::new(json, *match_type))
            }
            BodyKind::JsonSchema(schema) => BodyMatcher::JsonSchema(JsonSchemaMatcher::new(schema)),
            BodyKind::JsonPath(path) => BodyMatcher::JsonPath(JsonPathMatcher::new(path)),
            BodyKind::Xml(xml) => BodyMatcher::Xml(XmlStringMatcher::new(xml)),
            BodyKind::XmlSchema(schema) => BodyMatcher::XmlSchema(XmlSchemaMatcher::new(schema)),
            BodyKind::XPath(xpath) => BodyMatcher::XPath(XPathMatcher::new(xpath)),
            BodyKind::Parameters(parameters) => {
                BodyMatcher::Parameters(ParameterStringMatcher::new(parameters)?)
            }
            BodyKind::Binary(bytes) => BodyMatcher::Binary(BinaryMatcher::new(bytes.clone())),
        })
    }

    pub fn is_blank(&self) -> bool {
        match self {
            BodyMatcher::Exact(m) => m.is_blank(),
            BodyMatcher::SubString(m) => m.is_blank(),
            BodyMatcher::Regex(m) => Matcher::<NottableString>::is_blank(m),
            BodyMatcher::Json(m) => m.is_blank(),
            BodyMatcher::JsonSchema(m) => m.is_blank(),
            BodyMatcher::JsonPath(m) => m.is_blank(),
            BodyMatcher::Xml(m) => m.is_blank(),
            BodyMatcher::XmlSchema(m) => m.is_blank(),
            BodyMatcher::XPath(m) => m.is_blank(),
            BodyMatcher::Parameters(m) => m.is_blank(),
            BodyMatcher::Binary(m) => m.is_blank(),
        }
    }

    fn matches(&self, diff: &mut MatchDifference, request: &HttpRequest) -> bool {
        match self {
            BodyMatcher::Binary(m) => m.matches(diff, request.body_as_bytes().as_slice()),
            BodyMatcher::Exact(m) => {
                m.matches(diff, &NottableString::exact(request.body_as_string()))
            }
            BodyMatcher::SubString(m) => {
                m.matches(diff, &NottableString::exact(request.body_as_string()))
            }
            BodyMatcher::Regex(m) => {
                m.matches(diff, &NottableString::exact(request.body_as_string()))
            }
            BodyMatcher::Xml(m) => m.matches(diff, request.body_as_string().as_str()),
            BodyMatcher::XmlSchema(m) => m.matches(diff, request.body_as_string().as_str()),
            BodyMatcher::XPath(m) => m.matches(diff, request.body_as_string().as_str()),
            BodyMatcher::Json(m) => m.matches(diff, json_candidate(request).as_str()),
            BodyMatcher::JsonSchema(m) => m.matches(diff, json_candidate(request).as_str()),
            BodyMatcher::JsonPath(m) => m.matches(diff, json_candidate(request).as_str()),
            BodyMatcher::Parameters(m) => match request.body.as_ref().map(|body| &body.kind) {
                Some(BodyKind::Parameters(parameters)) => m.matches_parameters(diff, parameters),
                _ => m.matches(diff, request.body_as_string().as_str()),
            },
        }
    }
}

fn parameters_to_json(parameters: &KeysToMultiValues) -> Value {
    let mut map = Map::new();
    for entry in parameters.entries() {
        let mut values: Vec<Value> = entry
            .values
            .iter()
            .map(|value| Value::String(value.value().to_string()))
            .collect();
        let value = if values.len() == 1 {
            values.remove(0)
        } else {
            Value::Array(values)
        };
        map.insert(entry.name.value().to_string(), value);
    }
    Value::Object(map)
}

/// The request body as JSON text, converting form and XML bodies first.
fn json_candidate(request: &HttpRequest) -> String {
    let content_type = request.content_type().unwrap_or_default().to_lowercase();
    match request.body.as_ref().map(|body| &body.kind) {
        Some(BodyKind::Parameters(parameters)) => parameters_to_json(parameters).to_string(),
        Some(BodyKind::Xml(xml)) => xml_to_json(xml)
            .map(|json| json.to_string())
            .unwrap_or_else(|| xml.clone()),
        Some(_) if content_type.contains("x-www-form-urlencoded") => {
            let form = KeysToMultiValues::from_form_urlencoded(&request.body_as_string());
            parameters_to_json(&form).to_string()
        }
        Some(_) if content_type.contains("xml") => {
            let body = request.body_as_string();
            xml_to_json(&body).map(|json| json.to_string()).unwrap_or(body)
        }
        _ => request.body_as_string(),
    }
}

/// A body matcher with the body's own `not` and `optional` flags applied.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledBody {
    matcher: BodyMatcher,
    not: bool,
    optional: bool,
}

impl CompiledBody {
    pub fn compile(body: &Body) -> Result<Self, MatcherError> {
        Ok(Self {
            matcher: BodyMatcher::compile(body)?,
            not: body.not,
            optional: body.optional,
        })
    }

    pub fn matcher(&self) -> &BodyMatcher {
        &self.matcher
    }

    pub fn is_blank(&self) -> bool {
        self.matcher.is_blank()
    }

    pub fn matches(&self, diff: &mut MatchDifference, request: &HttpRequest) -> bool {
        if self.optional && request.body.is_none() {
            return true;
        }
        if self.is_blank() {
            return true;
        }
        let result = self.matcher.matches(diff, request) ^ self.not;
        if !result && self.not {
            diff.add(format_args!("body matched but body 'not' operator is enabled"));
        }
        result
    }
}
