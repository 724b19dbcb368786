//! Runtime matchers compiled from the serde model.
//!
//! Every matcher is built once from its definition and is immutable
//! afterwards. Redefining an expectation builds a fresh [`RequestMatcher`] and
//! swaps it into the expectation's [`MatcherSlot`], so readers never observe a
//! half-rebuilt matcher.
//!
//! # Module Structure
//!
//! - `diff` - per-evaluation diagnostics ([`MatchDifference`])
//! - `string` - exact, substring and bidirectional regex matchers
//! - `scalar` - boolean, integer and binary matchers
//! - `json` - JSON document and JSONPath matchers
//! - `xml` - XML document and XPath matchers
//! - `xml_schema` - XSD validation
//! - `schema` - JSON Schema validation
//! - `multimap` - headers, cookies, query and path parameters
//! - `parameters` - form-encoded bodies
//! - `body` - body dispatch over the body variants
//! - `path` - path templates and path parameter extraction
//! - `request` - [`HttpRequestPropertiesMatcher`]

mod body;
mod diff;
mod json;
mod multimap;
mod parameters;
mod path;
mod request;
mod scalar;
mod schema;
mod string;
mod xml;
mod xml_schema;

pub use body::{BodyMatcher, CompiledBody};
pub use diff::{Field, MatchDifference, MatchDifferenceCount};
pub use json::{JsonPathMatcher, JsonStringMatcher};
pub use multimap::MultiValueMapMatcher;
pub use parameters::ParameterStringMatcher;
pub use path::{extract_path_parameters, normalise_path};
pub use request::HttpRequestPropertiesMatcher;
pub use scalar::{BinaryMatcher, BooleanMatcher, IntegerMatcher};
pub use schema::{JsonSchemaMatcher, SchemaValueMatcher};
pub use string::{regex_matches, ExactStringMatcher, RegexStringMatcher, SubStringMatcher};
pub use xml::{xml_to_json, XPathMatcher, XmlStringMatcher};
pub use xml_schema::XmlSchemaMatcher;

use crate::config::MatcherConfig;
use crate::error::MatcherError;
use crate::log::{MatchLog, NoOpMatchLog};
use crate::model::{Expectation, HttpRequest, RequestDefinition};
use crate::openapi::OpenApiMatcher;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// A compiled predicate over one kind of candidate value.
///
/// Matching never fails: anything malformed is a non-match, optionally
/// explained in `diff`.
pub trait Matcher<T: ?Sized> {
    fn matches(&self, diff: &mut MatchDifference, candidate: &T) -> bool;

    /// A blank matcher accepts every candidate.
    fn is_blank(&self) -> bool;
}

/// An artifact compiled from source text, or nothing when compilation failed.
///
/// Equality is on the source so matchers holding compiled regexes, schemas
/// or paths can still derive `PartialEq`.
pub struct Compiled<T> {
    pub(crate) source: String,
    inner: Option<Arc<T>>,
}

impl<T> Compiled<T> {
    /// Compile `source`; a failure is traced and leaves the artifact empty.
    pub fn build<F>(source: &str, compile: F) -> Self
    where
        F: FnOnce(&str) -> Result<T, String>,
    {
        let inner = match compile(source) {
            Ok(compiled) => Some(Arc::new(compiled)),
            Err(e) => {
                tracing::trace!("unable to compile \"{}\": {}", source, e);
                None
            }
        };
        Self {
            source: source.to_string(),
            inner,
        }
    }

    pub fn failed(source: &str) -> Self {
        Self {
            source: source.to_string(),
            inner: None,
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.inner.as_deref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl<T> Clone for Compiled<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<T> PartialEq for Compiled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl<T> fmt::Debug for Compiled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiled")
            .field("source", &self.source)
            .field("valid", &self.inner.is_some())
            .finish()
    }
}

/// Whether every required item can be paired with its own candidate.
///
/// `fits[r][c]` says required item `r` accepts candidate `c`. Solved as a
/// bipartite matching with augmenting paths.
pub(crate) fn assign_distinct(fits: &[Vec<bool>], candidates: usize) -> bool {
    if fits.len() > candidates {
        return false;
    }
    let mut owner: Vec<Option<usize>> = vec![None; candidates];
    for required in 0..fits.len() {
        let mut seen = vec![false; candidates];
        if !augment(required, fits, &mut owner, &mut seen) {
            return false;
        }
    }
    true
}

fn augment(
    required: usize,
    fits: &[Vec<bool>],
    owner: &mut [Option<usize>],
    seen: &mut [bool],
) -> bool {
    for candidate in 0..owner.len() {
        if seen[candidate] || !fits[required].get(candidate).copied().unwrap_or(false) {
            continue;
        }
        seen[candidate] = true;
        let free = match owner[candidate] {
            None => true,
            Some(previous) => augment(previous, fits, owner, seen),
        };
        if free {
            owner[candidate] = Some(required);
            return true;
        }
    }
    false
}

/// Settings and collaborators injected into every matcher.
#[derive(Debug, Clone)]
pub struct MatcherContext {
    pub config: MatcherConfig,
    pub log: Arc<dyn MatchLog>,
    /// Internal matching used to filter expectations by example; never logs
    /// and also accepts body definitions in place of bodies.
    pub control_plane: bool,
}

impl MatcherContext {
    pub fn new(config: MatcherConfig, log: Arc<dyn MatchLog>) -> Self {
        Self {
            config,
            log,
            control_plane: false,
        }
    }

    pub fn control_plane(config: MatcherConfig) -> Self {
        Self {
            config,
            log: Arc::new(NoOpMatchLog),
            control_plane: true,
        }
    }

    pub fn new_difference(&self) -> MatchDifference {
        MatchDifference::new(self.config.detailed_match_failures)
    }
}

impl Default for MatcherContext {
    fn default() -> Self {
        Self::new(MatcherConfig::default(), Arc::new(NoOpMatchLog))
    }
}

/// The matcher held by an expectation: a concrete request shape or an
/// OpenAPI operation set.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestMatcher {
    Properties(HttpRequestPropertiesMatcher),
    OpenApi(OpenApiMatcher),
}

impl RequestMatcher {
    /// Build a matcher for a bare definition. `None` yields a blank matcher.
    pub fn build(
        ctx: &MatcherContext,
        definition: Option<&RequestDefinition>,
    ) -> Result<Self, MatcherError> {
        match definition {
            Some(RequestDefinition::OpenApi(open_api)) => {
                Ok(RequestMatcher::OpenApi(OpenApiMatcher::new(ctx, open_api, None)?))
            }
            Some(RequestDefinition::Http(request)) => Ok(RequestMatcher::Properties(
                HttpRequestPropertiesMatcher::new(ctx, Some(request), None)?,
            )),
            None => Ok(RequestMatcher::Properties(HttpRequestPropertiesMatcher::new(
                ctx, None, None,
            )?)),
        }
    }

    /// Build a matcher owned by `expectation`, gated on its remaining times.
    pub fn for_expectation(
        ctx: &MatcherContext,
        expectation: Arc<Expectation>,
    ) -> Result<Self, MatcherError> {
        match &expectation.http_request {
            RequestDefinition::OpenApi(open_api) => Ok(RequestMatcher::OpenApi(
                OpenApiMatcher::new(ctx, open_api, Some(expectation.clone()))?,
            )),
            RequestDefinition::Http(request) => Ok(RequestMatcher::Properties(
                HttpRequestPropertiesMatcher::new(ctx, Some(request), Some(expectation.clone()))?,
            )),
        }
    }

    /// Match a candidate definition. A fresh difference context is used when
    /// none is supplied.
    pub fn matches(
        &self,
        diff: Option<&mut MatchDifference>,
        candidate: &RequestDefinition,
    ) -> bool {
        let mut local;
        let diff = match diff {
            Some(diff) => diff,
            None => {
                local = self.context().new_difference();
                &mut local
            }
        };
        match self {
            RequestMatcher::Properties(matcher) => matcher.matches(diff, candidate),
            RequestMatcher::OpenApi(matcher) => matcher.matches(diff, candidate),
        }
    }

    pub fn matches_request(
        &self,
        diff: Option<&mut MatchDifference>,
        request: &HttpRequest,
    ) -> bool {
        let mut local;
        let diff = match diff {
            Some(diff) => diff,
            None => {
                local = self.context().new_difference();
                &mut local
            }
        };
        match self {
            RequestMatcher::Properties(matcher) => matcher.matches_request(diff, request),
            RequestMatcher::OpenApi(matcher) => matcher.matches_request(diff, request),
        }
    }

    pub fn is_active(&self) -> bool {
        self.expectation().map_or(true, |expectation| expectation.is_active())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            RequestMatcher::Properties(matcher) => matcher.is_blank(),
            RequestMatcher::OpenApi(matcher) => matcher.is_blank(),
        }
    }

    pub fn expectation(&self) -> Option<&Arc<Expectation>> {
        match self {
            RequestMatcher::Properties(matcher) => matcher.expectation(),
            RequestMatcher::OpenApi(matcher) => matcher.expectation(),
        }
    }

    /// Whether this matcher was built from `definition`.
    pub fn is_built_from(&self, definition: &RequestDefinition) -> bool {
        match (self, definition) {
            (RequestMatcher::Properties(matcher), RequestDefinition::Http(request)) => {
                matcher.definition() == Some(request)
            }
            (RequestMatcher::OpenApi(matcher), RequestDefinition::OpenApi(open_api)) => {
                matcher.definition() == open_api
            }
            _ => false,
        }
    }

    fn context(&self) -> &MatcherContext {
        match self {
            RequestMatcher::Properties(matcher) => matcher.context(),
            RequestMatcher::OpenApi(matcher) => matcher.context(),
        }
    }
}

/// Holds the current matcher of an expectation and swaps in a rebuilt one
/// when the expectation's request definition changes.
#[derive(Debug)]
pub struct MatcherSlot {
    current: RwLock<Arc<RequestMatcher>>,
    ctx: MatcherContext,
}

impl MatcherSlot {
    pub fn new(ctx: MatcherContext, expectation: Arc<Expectation>) -> Result<Self, MatcherError> {
        let matcher = RequestMatcher::for_expectation(&ctx, expectation)?;
        Ok(Self {
            current: RwLock::new(Arc::new(matcher)),
            ctx,
        })
    }

    /// A slot holding a matcher for a bare definition, owned by no
    /// expectation. `None` holds a blank matcher.
    pub fn for_definition(
        ctx: MatcherContext,
        definition: Option<&RequestDefinition>,
    ) -> Result<Self, MatcherError> {
        let matcher = RequestMatcher::build(&ctx, definition)?;
        Ok(Self {
            current: RwLock::new(Arc::new(matcher)),
            ctx,
        })
    }

    /// Snapshot of the matcher in use; safe to hold across a concurrent swap.
    pub fn current(&self) -> Arc<RequestMatcher> {
        self.current.read().clone()
    }

    /// Point the slot at `expectation`, rebuilding only when its request
    /// definition differs. Returns whether a rebuild happened.
    pub fn update(&self, expectation: Arc<Expectation>) -> Result<bool, MatcherError> {
        let current = self.current();
        let changed = !current.is_built_from(&expectation.http_request);
        let rebuilt = if changed {
            RequestMatcher::for_expectation(&self.ctx, expectation)?
        } else {
            match current.as_ref() {
                RequestMatcher::Properties(matcher) => {
                    RequestMatcher::Properties(matcher.with_expectation(expectation))
                }
                RequestMatcher::OpenApi(matcher) => {
                    RequestMatcher::OpenApi(matcher.with_expectation(expectation))
                }
            }
        };
        *self.current.write() = Arc::new(rebuilt);
        if changed {
            tracing::debug!("rebuilt request matcher");
        }
        Ok(changed)
    }

    /// Point the slot at a bare definition, rebuilding only when it differs
    /// from the one in use. Returns whether a rebuild happened.
    pub fn update_definition(
        &self,
        definition: Option<&RequestDefinition>,
    ) -> Result<bool, MatcherError> {
        let current = self.current();
        let unchanged = match definition {
            Some(definition) => {
                current.is_built_from(definition) && current.expectation().is_none()
            }
            None => matches!(
                current.as_ref(),
                RequestMatcher::Properties(matcher)
                    if matcher.is_blank() && matcher.expectation().is_none()
            ),
        };
        if unchanged {
            return Ok(false);
        }
        let rebuilt = RequestMatcher::build(&self.ctx, definition)?;
        *self.current.write() = Arc::new(rebuilt);
        tracing::debug!("rebuilt request matcher");
        Ok(true)
    }

    pub fn matches(&self, diff: Option<&mut MatchDifference>, request: &HttpRequest) -> bool {
        self.current().matches_request(diff, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Times;

    #[test]
    fn test_compiled_equality_uses_source() {
        let a: Compiled<regex::Regex> =
            Compiled::build("a+", |p| regex::Regex::new(p).map_err(|e| e.to_string()));
        let b: Compiled<regex::Regex> = Compiled::failed("a+");
        assert_eq!(a, b);
        assert!(a.get().is_some());
        assert!(b.get().is_none());

        let invalid: Compiled<regex::Regex> =
            Compiled::build("(", |p| regex::Regex::new(p).map_err(|e| e.to_string()));
        assert!(invalid.get().is_none());
    }

    #[test]
    fn test_assign_distinct() {
        // both required items only fit candidate 0
        assert!(!assign_distinct(&[vec![true, false], vec![true, false]], 2));
        // needs re-assignment of the first item
        assert!(assign_distinct(&[vec![true, true], vec![true, false]], 2));
        assert!(!assign_distinct(&[vec![true], vec![true]], 1));
        assert!(assign_distinct(&[], 0));
    }

    #[test]
    fn test_blank_matcher_matches_anything() {
        let ctx = MatcherContext::default();
        let matcher = RequestMatcher::build(&ctx, None).unwrap();
        assert!(matcher.is_blank());
        let request = HttpRequest::request().with_method("DELETE").with_path("/x");
        assert!(matcher.matches_request(None, &request));
    }

    #[test]
    fn test_slot_rebuilds_only_on_change() {
        let ctx = MatcherContext::default();
        let expectation = Arc::new(Expectation::when(
            HttpRequest::request().with_method("GET").with_path("/a"),
        ));
        let slot = MatcherSlot::new(ctx, expectation.clone()).unwrap();
        let get_a = HttpRequest::request().with_method("GET").with_path("/a");
        assert!(slot.matches(None, &get_a));

        assert!(!slot.update(expectation.clone()).unwrap());

        let redefined = Arc::new(
            Expectation::when(HttpRequest::request().with_method("POST").with_path("/a"))
                .with_id(expectation.id.clone()),
        );
        let before = slot.current();
        assert!(slot.update(redefined).unwrap());
        assert!(!slot.matches(None, &get_a));
        // the old snapshot keeps working
        assert!(before.matches_request(None, &get_a));
    }

    #[test]
    fn test_slot_for_bare_definition() {
        let ctx = MatcherContext::default();
        let slot = MatcherSlot::for_definition(ctx, None).unwrap();
        let get_a = HttpRequest::request().with_method("GET").with_path("/a");
        assert!(slot.current().is_blank());
        assert!(slot.matches(None, &get_a));
        assert!(!slot.update_definition(None).unwrap());

        let post = RequestDefinition::Http(HttpRequest::request().with_method("POST"));
        assert!(slot.update_definition(Some(&post)).unwrap());
        assert!(!slot.update_definition(Some(&post)).unwrap());
        assert!(!slot.matches(None, &get_a));
    }

    #[test]
    fn test_inactive_expectation_never_matches() {
        let ctx = MatcherContext::default();
        let expectation = Arc::new(
            Expectation::when(HttpRequest::request().with_path("/a")).with_times(Times::once()),
        );
        let matcher = RequestMatcher::for_expectation(&ctx, expectation.clone()).unwrap();
        let request = HttpRequest::request().with_path("/a");
        assert!(matcher.matches_request(None, &request));
        expectation.times.decrement();
        assert!(!matcher.is_active());
        assert!(!matcher.matches_request(None, &request));
    }
}
