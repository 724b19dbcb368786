//! The slice of the OpenAPI 3 document model needed to derive request
//! matchers.
//!
//! Documents are deserialized after every local `$ref` has been inlined, so
//! schemas are carried as plain [`serde_json::Value`]s.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Inlined references deeper than this are replaced by an empty schema,
/// which keeps recursive schemas finite.
const MAX_REF_DEPTH: usize = 16;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenApiDocument {
    #[serde(default)]
    pub openapi: Option<String>,
    #[serde(default)]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
    #[serde(default)]
    pub components: Components,
    #[serde(default)]
    pub security: Option<Vec<SecurityRequirement>>,
}

/// Scheme name to required scopes.
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Server {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub variables: BTreeMap<String, ServerVariable>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerVariable {
    #[serde(default)]
    pub default: Option<String>,
}

impl Server {
    /// The URL with every variable replaced by its default value.
    pub fn default_url(&self) -> String {
        self.variables
            .iter()
            .fold(self.url.clone(), |url, (name, variable)| {
                url.replace(
                    &format!("{{{name}}}"),
                    variable.default.as_deref().unwrap_or_default(),
                )
            })
    }

    /// Path component of the default URL.
    pub fn path(&self) -> String {
        let url = self.default_url();
        let without_fragment = url.split(['?', '#']).next().unwrap_or_default();
        let after_scheme = match without_fragment.find("://") {
            Some(index) => &without_fragment[index + 3..],
            None => without_fragment,
        };
        if without_fragment.starts_with('/') {
            return without_fragment.to_string();
        }
        match after_scheme.find('/') {
            Some(index) => after_scheme[index..].to_string(),
            None if without_fragment.contains("://") => String::new(),
            None => after_scheme.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathItem {
    #[serde(default)]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub get: Option<Operation>,
    pub put: Option<Operation>,
    pub post: Option<Operation>,
    pub delete: Option<Operation>,
    pub options: Option<Operation>,
    pub head: Option<Operation>,
    pub patch: Option<Operation>,
    pub trace: Option<Operation>,
}

impl PathItem {
    /// Declared operations keyed by upper-case method, sorted by method.
    pub fn operations(&self) -> Vec<(&'static str, &Operation)> {
        let mut operations: Vec<(&'static str, &Operation)> = [
            ("GET", &self.get),
            ("PUT", &self.put),
            ("POST", &self.post),
            ("DELETE", &self.delete),
            ("OPTIONS", &self.options),
            ("HEAD", &self.head),
            ("PATCH", &self.patch),
            ("TRACE", &self.trace),
        ]
        .into_iter()
        .filter_map(|(method, operation)| operation.as_ref().map(|operation| (method, operation)))
        .collect();
        operations.sort_by_key(|(method, _)| *method);
        operations
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub operation_id: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    pub security: Option<Vec<SecurityRequirement>>,
    #[serde(default)]
    pub servers: Vec<Server>,
}

impl Operation {
    pub fn id(&self) -> &str {
        self.operation_id.as_deref().unwrap_or_default()
    }

    /// Path-level parameters overridden by operation-level ones with the same
    /// name and location.
    pub fn effective_parameters<'a>(&'a self, path_item: &'a PathItem) -> Vec<&'a Parameter> {
        let mut parameters: Vec<&Parameter> = path_item
            .parameters
            .iter()
            .filter(|shared| {
                !self
                    .parameters
                    .iter()
                    .any(|own| own.name == shared.name && own.location == shared.location)
            })
            .collect();
        parameters.extend(self.parameters.iter());
        parameters
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    #[serde(default)]
    pub required: bool,
    pub schema: Option<Value>,
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
    #[serde(default)]
    pub allow_empty_value: bool,
    #[serde(default)]
    pub allow_reserved: bool,
}

impl Parameter {
    /// The declared schema, or the schema of the first content entry.
    pub fn effective_schema(&self) -> Option<&Value> {
        self.schema
            .as_ref()
            .or_else(|| self.content.values().find_map(|media| media.schema.as_ref()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestBody {
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaType {
    pub schema: Option<Value>,
    pub encoding: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default)]
    pub security_schemes: BTreeMap<String, SecurityScheme>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SecuritySchemeType {
    #[serde(rename = "apiKey")]
    ApiKey,
    #[serde(rename = "http")]
    Http,
    #[serde(rename = "oauth2")]
    OAuth2,
    #[serde(rename = "openIdConnect")]
    OpenIdConnect,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub kind: SecuritySchemeType,
    pub name: Option<String>,
    #[serde(rename = "in")]
    pub location: Option<String>,
    pub scheme: Option<String>,
}

/// Inline every local (`#/...`) reference.
pub fn resolve_references(root: &Value) -> Result<Value, String> {
    resolve(root, root, 0)
}

fn resolve(root: &Value, node: &Value, depth: usize) -> Result<Value, String> {
    match node {
        Value::Object(object) => {
            if let Some(Value::String(reference)) = object.get("$ref") {
                let Some(pointer) = reference.strip_prefix('#') else {
                    return Err(format!("unsupported external reference \"{reference}\""));
                };
                if depth >= MAX_REF_DEPTH {
                    tracing::trace!(
                        "reference {} nested too deeply, treating as any value",
                        reference
                    );
                    return Ok(Value::Object(Map::new()));
                }
                let target = root
                    .pointer(pointer)
                    .ok_or_else(|| format!("unable to resolve reference \"{reference}\""))?;
                return resolve(root, target, depth + 1);
            }
            object
                .iter()
                .map(|(key, value)| Ok((key.clone(), resolve(root, value, depth)?)))
                .collect::<Result<Map<String, Value>, String>>()
                .map(Value::Object)
        }
        Value::Array(items) => items
            .iter()
            .map(|item| resolve(root, item, depth))
            .collect::<Result<Vec<Value>, String>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

/// Rewrite OpenAPI 3.0 `nullable` into standard JSON Schema.
pub fn to_json_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(object) => {
            let nullable = object.get("nullable").and_then(Value::as_bool).unwrap_or(false);
            let mut converted: Map<String, Value> = object
                .iter()
                .filter(|(key, _)| key.as_str() != "nullable")
                .map(|(key, value)| (key.clone(), to_json_schema(value)))
                .collect();
            if nullable {
                match converted.get("type").cloned() {
                    Some(Value::String(kind)) => {
                        converted.insert(
                            "type".to_string(),
                            Value::Array(vec![Value::String(kind), Value::String("null".into())]),
                        );
                    }
                    Some(Value::Array(mut kinds)) => {
                        if !kinds.iter().any(|kind| kind == "null") {
                            kinds.push(Value::String("null".into()));
                        }
                        converted.insert("type".to_string(), Value::Array(kinds));
                    }
                    _ => {}
                }
            }
            Value::Object(converted)
        }
        Value::Array(items) => Value::Array(items.iter().map(to_json_schema).collect()),
        other => other.clone(),
    }
}
