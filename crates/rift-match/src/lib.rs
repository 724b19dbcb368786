//! Rift match engine.
//!
//! Decides whether an incoming HTTP request satisfies a registered
//! expectation, resolves ordering between competing expectations and
//! explains, field by field, why a request did or didn't match.
//!
//! The crate is split the same way the proxy splits predicates:
//! - [`model`] holds the serde data model (requests, bodies, expectations)
//! - [`matchers`] compiles that model into immutable runtime matchers
//! - [`openapi`] expands OpenAPI documents into request matchers
//! - [`store`] keeps expectations ordered and dispatches requests to them

pub mod config;
pub mod error;
pub mod log;
pub mod matchers;
pub mod metrics;
pub mod model;
pub mod openapi;
pub mod store;

pub use config::MatcherConfig;
pub use error::MatcherError;
pub use log::{
    InMemoryMatchLog, MatchLog, MatchLogEvent, MatchLogType, NoOpMatchLog, TracingMatchLog,
};
pub use matchers::{
    Field, HttpRequestPropertiesMatcher, MatchDifference, MatcherSlot, RequestMatcher,
};
pub use model::{
    Body, Expectation, HttpRequest, NottableString, OpenApiDefinition, RequestDefinition, Times,
    TimeToLive,
};
pub use openapi::OpenApiMatcher;
pub use store::ExpectationStore;
