//! What an expectation matches: a concrete request shape or an OpenAPI
//! operation.

use super::request::HttpRequest;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

fn is_false(value: &bool) -> bool {
    !*value
}

/// Accept the OpenAPI document either as a string (URL, file path or payload) or as an
/// inline JSON document.
fn spec_from_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenApiDefinition {
    #[serde(deserialize_with = "spec_from_value")]
    pub spec_url_or_payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub not: bool,
}

impl OpenApiDefinition {
    pub fn new(spec_url_or_payload: impl Into<String>) -> Self {
        Self {
            spec_url_or_payload: spec_url_or_payload.into(),
            operation_id: None,
            not: false,
        }
    }

    pub fn with_operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    pub fn negated(mut self, not: bool) -> Self {
        self.not = not;
        self
    }

    /// Operation filter, `None` when blank.
    pub fn operation_filter(&self) -> Option<&str> {
        self.operation_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RequestDefinition {
    OpenApi(OpenApiDefinition),
    Http(HttpRequest),
}

impl RequestDefinition {
    pub fn is_not(&self) -> bool {
        match self {
            RequestDefinition::OpenApi(definition) => definition.not,
            RequestDefinition::Http(request) => request.not,
        }
    }

    pub fn as_http(&self) -> Option<&HttpRequest> {
        match self {
            RequestDefinition::Http(request) => Some(request),
            RequestDefinition::OpenApi(_) => None,
        }
    }

    pub fn as_open_api(&self) -> Option<&OpenApiDefinition> {
        match self {
            RequestDefinition::OpenApi(definition) => Some(definition),
            RequestDefinition::Http(_) => None,
        }
    }
}

impl From<HttpRequest> for RequestDefinition {
    fn from(request: HttpRequest) -> Self {
        RequestDefinition::Http(request)
    }
}

impl From<OpenApiDefinition> for RequestDefinition {
    fn from(definition: OpenApiDefinition) -> Self {
        RequestDefinition::OpenApi(definition)
    }
}
