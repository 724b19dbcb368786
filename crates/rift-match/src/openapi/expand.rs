//! Expansion of an OpenAPI definition into concrete request templates, one
//! per operation and request content type.

use super::loader::{load_document, SpecLocation};
use super::model::{
    to_json_schema, OpenApiDocument, Operation, PathItem, SecuritySchemeType, Server,
};
use crate::config::MatcherConfig;
use crate::error::MatcherError;
use crate::model::{
    Body, HttpRequest, KeyMatchStyle, KeysToMultiValues, NottableString, OpenApiDefinition,
};
use std::collections::{BTreeMap, BTreeSet};

/// A request template derived from one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedRequest {
    pub request: HttpRequest,
    /// e.g. `for swagger "petstore.yaml" operation "createPet" content-type "application/json"`
    pub description: String,
}

/// An operation selected for expansion, with its server-prefixed path.
struct SelectedOperation<'a> {
    path: String,
    method: &'static str,
    operation: &'a Operation,
    path_item: &'a PathItem,
}

/// Expand `definition` into request templates. A blank spec expands to
/// nothing.
pub fn expand_requests(
    config: &MatcherConfig,
    definition: &OpenApiDefinition,
) -> Result<Vec<ExpandedRequest>, MatcherError> {
    if definition.spec_url_or_payload.trim().is_empty() {
        return Ok(Vec::new());
    }
    let document = load_document(&definition.spec_url_or_payload, config.open_api_fetch_timeout())?;
    let expanded = expand_document(&document, definition)?;
    tracing::debug!(
        requests = expanded.len(),
        operation_id = definition.operation_filter().unwrap_or(""),
        "expanded openapi definition"
    );
    Ok(expanded)
}

/// Expand an already loaded document.
pub fn expand_document(
    document: &OpenApiDocument,
    definition: &OpenApiDefinition,
) -> Result<Vec<ExpandedRequest>, MatcherError> {
    let operations = select_operations(document, definition.operation_filter());
    if let (Some(operation_id), true) = (definition.operation_filter(), operations.is_empty()) {
        return Err(MatcherError::open_api(format!(
            "operation \"{operation_id}\" not found"
        )));
    }

    let spec_name = if SpecLocation::detect(&definition.spec_url_or_payload).is_reference() {
        format!("\"{}\" ", definition.spec_url_or_payload.trim())
    } else {
        String::new()
    };
    let describe = |selected: &SelectedOperation<'_>, content_type: &str| {
        let mut description = format!(
            "for swagger {spec_name}operation \"{}\"",
            selected.operation.id()
        );
        if !content_type.is_empty() {
            description.push_str(&format!(" content-type \"{content_type}\""));
        }
        description
    };

    let mut expanded = Vec::new();
    for selected in &operations {
        let body = selected
            .operation
            .request_body
            .as_ref()
            .filter(|body| !body.content.is_empty());
        let Some(body) = body else {
            expanded.push(ExpandedRequest {
                request: create_request(document, selected)?,
                description: describe(selected, ""),
            });
            continue;
        };
        for (content_type, media) in &body.content {
            if content_type == "multipart/form-data" {
                return Err(MatcherError::open_api(format!(
                    "multipart form data is not supported on requestBody, \
                     found on operation: \"{}\" method: \"{}\"",
                    selected.operation.id(),
                    selected.method
                )));
            }
            let mut request = create_request(document, selected)?;
            if content_type != "*/*" && body.required {
                // parameters such as charset may follow the media type
                request
                    .headers
                    .add("Content-Type", format!("{}.*", content_type.replace('*', ".*")).as_str());
            }
            if let Some(schema) = &media.schema {
                if media.encoding.is_some() {
                    return Err(MatcherError::open_api(format!(
                        "encoding is not supported on requestBody, \
                         found on operation: \"{}\" method: \"{}\"",
                        selected.operation.id(),
                        selected.method
                    )));
                }
                request.body = Some(
                    Body::json_schema(to_json_schema(schema).to_string())
                        .with_optional(!body.required),
                );
            }
            expanded.push(ExpandedRequest {
                request,
                description: describe(selected, content_type),
            });
        }
    }
    Ok(expanded)
}

fn select_operations<'a>(
    document: &'a OpenApiDocument,
    operation_id: Option<&str>,
) -> Vec<SelectedOperation<'a>> {
    let mut selected = Vec::new();
    for (path, path_item) in &document.paths {
        for (method, operation) in path_item.operations() {
            if operation_id.is_some_and(|id| operation.operation_id.as_deref() != Some(id)) {
                continue;
            }
            let prefix =
                priority_server_path(&[&operation.servers, &path_item.servers, &document.servers]);
            selected.push(SelectedOperation {
                path: format!("{prefix}{path}"),
                method,
                operation,
                path_item,
            });
        }
    }
    selected
}

/// Path of the innermost non-empty `servers` list, without a trailing slash.
fn priority_server_path(server_lists: &[&Vec<Server>]) -> String {
    let path = server_lists
        .iter()
        .find_map(|servers| servers.first())
        .map(Server::path)
        .unwrap_or_default();
    let path = if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    };
    path.trim_end_matches('/').to_string()
}

fn create_request(
    document: &OpenApiDocument,
    selected: &SelectedOperation<'_>,
) -> Result<HttpRequest, MatcherError> {
    let mut request = HttpRequest::request()
        .with_method(selected.method)
        .with_path(NottableString::exact(selected.path.as_str()));

    for parameter in selected.operation.effective_parameters(selected.path_item) {
        let Some(schema) = parameter.effective_schema() else {
            continue;
        };
        let name = if parameter.required {
            NottableString::exact(parameter.name.as_str())
        } else {
            NottableString::optional(parameter.name.as_str())
        };
        if parameter.allow_reserved {
            return Err(MatcherError::open_api(format!(
                "allowReserved field is not supported on parameters, \
                 found on operation: \"{}\" method: \"{}\" parameter: \"{}\" in: \"{}\"",
                selected.operation.id(),
                selected.method,
                name,
                parameter.location
            )));
        }
        let mut schema = schema.clone();
        if parameter.allow_empty_value {
            if let Some(object) = schema.as_object_mut() {
                object.insert("nullable".to_string(), true.into());
            }
        }
        let value = NottableString::schema(to_json_schema(&schema));
        match parameter.location.as_str() {
            "query" => request.query_string_parameters.add(name, value),
            "header" => request.headers.add(name, value),
            "path" => request.path_parameters.add(name, value),
            "cookie" => request.cookies.add(name, value),
            other => tracing::error!(
                "unknown value for parameter in property, \
                 expected \"query\", \"header\", \"path\" or \"cookie\" found \"{}\"",
                other
            ),
        }
    }

    apply_security(document, selected.operation, &mut request);
    Ok(request)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SecurityLocation {
    Header,
    Query,
    Cookie,
}

/// Translate the document's and the operation's security requirements
/// together into presence checks.
fn apply_security(document: &OpenApiDocument, operation: &Operation, request: &mut HttpRequest) {
    let requirements = document
        .security
        .iter()
        .chain(operation.security.iter())
        .flatten();
    let mut by_location: BTreeMap<SecurityLocation, BTreeMap<String, BTreeSet<String>>> =
        BTreeMap::new();
    for requirement in requirements {
        for scheme_name in requirement.keys() {
            let Some(scheme) = document.components.security_schemes.get(scheme_name) else {
                continue;
            };
            let (location, name, value) = match scheme.kind {
                SecuritySchemeType::ApiKey => {
                    let name = scheme.name.as_deref().filter(|name| !name.trim().is_empty());
                    let Some(name) = name else {
                        continue;
                    };
                    let location = match scheme.location.as_deref() {
                        Some("query") => SecurityLocation::Query,
                        Some("cookie") => SecurityLocation::Cookie,
                        _ => SecurityLocation::Header,
                    };
                    (location, name.to_string(), ".+".to_string())
                }
                SecuritySchemeType::Http
                | SecuritySchemeType::OAuth2
                | SecuritySchemeType::OpenIdConnect => (
                    SecurityLocation::Header,
                    "Authorization".to_string(),
                    format!("{}.+", scheme.scheme.as_deref().unwrap_or_default()),
                ),
                SecuritySchemeType::Other => continue,
            };
            by_location
                .entry(location)
                .or_default()
                .entry(name)
                .or_default()
                .insert(value);
        }
    }

    for (location, names) in by_location {
        let map = match location {
            SecurityLocation::Header => &mut request.headers,
            SecurityLocation::Query => &mut request.query_string_parameters,
            SecurityLocation::Cookie => &mut request.cookies,
        };
        add_security_entries(map, &names);
    }
}

fn add_security_entries(map: &mut KeysToMultiValues, names: &BTreeMap<String, BTreeSet<String>>) {
    let join = |values: &BTreeSet<String>| values.iter().cloned().collect::<Vec<_>>().join("|");
    if names.len() > 1 {
        // any one of the credentials will do, each checked against its own key
        for (name, values) in names {
            map.add(NottableString::optional(name.as_str()), join(values).as_str());
        }
        let any_name = names.keys().cloned().collect::<Vec<_>>().join("|");
        map.add(NottableString::exact(any_name), ".*");
        map.set_key_match_style(KeyMatchStyle::MatchingKey);
    } else if let Some((name, values)) = names.iter().next() {
        map.add(NottableString::exact(name.as_str()), join(values).as_str());
    }
}
