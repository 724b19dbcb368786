//! OpenAPI-derived request matching.
//!
//! An [`OpenApiDefinition`](crate::model::OpenApiDefinition) names a spec
//! (inline JSON/YAML, a file or an HTTP URL) and optionally one operation.
//! The document is loaded once, every local `$ref` is inlined and each selected
//! operation becomes a concrete [`HttpRequest`](crate::model::HttpRequest)
//! template:
//!
//! - the method and the server-prefixed path
//! - parameters as schema-valued query, header, path and cookie entries,
//!   optional unless `required`
//! - security requirements as presence checks on the credential's location
//! - one template per request body content type, with a JSON Schema body
//!
//! [`OpenApiMatcher`] matches a request when any template does.

mod expand;
mod loader;
mod matcher;
mod model;

pub use expand::{expand_document, expand_requests, ExpandedRequest};
pub use loader::{load_document, parse_document, SpecLocation};
pub use matcher::OpenApiMatcher;
pub use model::{
    MediaType, OpenApiDocument, Operation, Parameter, PathItem, RequestBody, SecurityScheme,
    SecuritySchemeType, Server,
};
