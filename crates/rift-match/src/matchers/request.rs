//! Matcher for one concrete expected request shape.
//!
//! A candidate is evaluated field by field in a fixed order: method, path,
//! body, headers, cookies, path parameters, query parameters, keep-alive and
//! TLS. The combined result is inverted once for every `not` set on the
//! candidate, on the stored definition and on the matcher itself.

use super::body::CompiledBody;
use super::diff::{Field, MatchDifference, MatchDifferenceCount};
use super::multimap::MultiValueMapMatcher;
use super::path::{extract_path_parameters, normalise_path};
use super::scalar::BooleanMatcher;
use super::string::RegexStringMatcher;
use super::{Matcher, MatcherContext};
use crate::error::MatcherError;
use crate::log::{MatchLogEvent, MatchLogType};
use crate::model::{
    Body, BodyKind, Expectation, HttpRequest, KeysToMultiValues, NottableString, RequestDefinition,
};
use crate::openapi;
use once_cell::sync::OnceCell;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

const REQUEST_NOT_OPERATOR_IS_ENABLED: &str = ",\nrequest 'not' operator is enabled";
const EXPECTATION_REQUEST_NOT_OPERATOR_IS_ENABLED: &str =
    ",\nexpectation's request 'not' operator is enabled";
const EXPECTATION_REQUEST_MATCHER_NOT_OPERATOR_IS_ENABLED: &str =
    ",\nexpectation's request matcher 'not' operator is enabled";

#[derive(Debug, Clone, PartialEq)]
struct CompiledFields {
    method: RegexStringMatcher,
    path: RegexStringMatcher,
    path_parameters: MultiValueMapMatcher,
    query_parameters: MultiValueMapMatcher,
    headers: MultiValueMapMatcher,
    cookies: MultiValueMapMatcher,
    body: Option<CompiledBody>,
    keep_alive: BooleanMatcher,
    secure: BooleanMatcher,
}

impl CompiledFields {
    fn compile(request: &HttpRequest) -> Result<Self, MatcherError> {
        Ok(Self {
            method: RegexStringMatcher::new(request.method.clone(), false),
            path: RegexStringMatcher::new(
                normalise_path(&request.path, &request.path_parameters),
                false,
            ),
            path_parameters: MultiValueMapMatcher::new(&request.path_parameters)?,
            query_parameters: MultiValueMapMatcher::new(&request.query_string_parameters)?,
            headers: MultiValueMapMatcher::new(&request.headers)?,
            cookies: MultiValueMapMatcher::new(&request.cookies)?,
            body: request.body.as_ref().map(CompiledBody::compile).transpose()?,
            keep_alive: BooleanMatcher::new(request.keep_alive),
            secure: BooleanMatcher::new(request.secure),
        })
    }
}

/// Running state of one evaluation.
struct Evaluation<'a> {
    diff: &'a mut MatchDifference,
    count: MatchDifferenceCount,
    because: String,
    request_not: bool,
}

#[derive(Debug, Clone)]
pub struct HttpRequestPropertiesMatcher {
    definition: Option<HttpRequest>,
    fields: Option<CompiledFields>,
    not: bool,
    description: Option<String>,
    expectation: Option<Arc<Expectation>>,
    ctx: MatcherContext,
    fingerprint: OnceCell<u64>,
}

impl HttpRequestPropertiesMatcher {
    /// Compile `definition`; `None` gives a blank matcher that accepts every
    /// request.
    pub fn new(
        ctx: &MatcherContext,
        definition: Option<&HttpRequest>,
        expectation: Option<Arc<Expectation>>,
    ) -> Result<Self, MatcherError> {
        let fields = definition.map(CompiledFields::compile).transpose()?;
        tracing::debug!(
            blank = definition.is_none(),
            control_plane = ctx.control_plane,
            "built request properties matcher"
        );
        Ok(Self {
            definition: definition.cloned(),
            fields,
            not: false,
            description: None,
            expectation,
            ctx: ctx.clone(),
            fingerprint: OnceCell::new(),
        })
    }

    /// Invert every result of this matcher.
    pub fn with_not(mut self, not: bool) -> Self {
        self.not = not;
        self.fingerprint = OnceCell::new();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self.fingerprint = OnceCell::new();
        self
    }

    /// Same compiled matcher, owned by another expectation.
    pub fn with_expectation(&self, expectation: Arc<Expectation>) -> Self {
        Self {
            expectation: Some(expectation),
            fingerprint: OnceCell::new(),
            ..self.clone()
        }
    }

    pub fn definition(&self) -> Option<&HttpRequest> {
        self.definition.as_ref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn expectation(&self) -> Option<&Arc<Expectation>> {
        self.expectation.as_ref()
    }

    pub fn context(&self) -> &MatcherContext {
        &self.ctx
    }

    pub fn is_blank(&self) -> bool {
        self.definition.is_none()
    }

    pub fn is_active(&self) -> bool {
        self.expectation
            .as_ref()
            .map_or(true, |expectation| expectation.is_active())
    }

    /// Memoised hash of the semantic state, cleared whenever that state
    /// changes.
    pub fn fingerprint(&self) -> u64 {
        *self.fingerprint.get_or_init(|| {
            let mut hasher = DefaultHasher::new();
            serde_json::to_string(&self.definition)
                .unwrap_or_default()
                .hash(&mut hasher);
            self.not.hash(&mut hasher);
            self.description.hash(&mut hasher);
            self.ctx.control_plane.hash(&mut hasher);
            if let Some(expectation) = &self.expectation {
                expectation.id.hash(&mut hasher);
            }
            hasher.finish()
        })
    }

    /// Match any request definition. An OpenAPI candidate matches when one
    /// of the requests it expands to matches.
    pub fn matches(&self, diff: &mut MatchDifference, candidate: &RequestDefinition) -> bool {
        match candidate {
            RequestDefinition::Http(request) => self.matches_request(diff, request),
            RequestDefinition::OpenApi(definition) => {
                match openapi::expand_requests(&self.ctx.config, definition) {
                    Ok(expanded) => expanded.iter().any(|expanded| {
                        let mut child = diff.child();
                        let matched = self.matches_request(&mut child, &expanded.request);
                        diff.merge(child);
                        matched
                    }),
                    Err(e) => {
                        tracing::trace!("unable to expand candidate openapi definition: {}", e);
                        false
                    }
                }
            }
        }
    }

    pub fn matches_request(&self, diff: &mut MatchDifference, request: &HttpRequest) -> bool {
        let mut evaluation = Evaluation {
            diff,
            count: MatchDifferenceCount::new(),
            because: String::new(),
            request_not: request.not,
        };
        let matched = self.evaluate(&mut evaluation, request);
        if !self.ctx.control_plane && self.ctx.log.is_enabled() {
            self.log_result(matched, request, &evaluation);
        }
        matched
    }

    fn definition_not(&self) -> bool {
        self.definition.as_ref().is_some_and(|definition| definition.not)
    }

    fn evaluate(&self, eval: &mut Evaluation<'_>, request: &HttpRequest) -> bool {
        if !self.is_active() {
            return false;
        }
        let (Some(definition), Some(fields)) = (&self.definition, &self.fields) else {
            return true;
        };
        if std::ptr::eq(request, definition) {
            return true;
        }

        eval.diff.set_current_field(Field::Method);
        let method_matches =
            request.method.is_blank() || fields.method.matches(eval.diff, &request.method);
        let method_blank = Matcher::<NottableString>::is_blank(&fields.method);
        if let Some(result) = self.field_done(eval, Field::Method, method_blank, method_matches) {
            return result;
        }

        eval.diff.set_current_field(Field::Path);
        let mut path_matches = request.path.is_blank() || {
            let candidate_path = if self.ctx.control_plane {
                normalise_path(&request.path, &request.path_parameters)
            } else {
                request.path.clone()
            };
            fields.path.matches(eval.diff, &candidate_path)
        };
        let extracted = if self.ctx.control_plane {
            extract_path_parameters(&request.path, definition.path.value())
        } else {
            extract_path_parameters(&definition.path, request.path.value())
        };
        let path_parameters = match extracted {
            Ok(parameters) => parameters,
            Err(e) => {
                if !definition.path.is_blank() {
                    eval.diff.add_difference(Field::Path, format_args!("{e}"));
                    path_matches = false;
                }
                KeysToMultiValues::new()
            }
        };
        let path_blank = Matcher::<NottableString>::is_blank(&fields.path);
        if let Some(result) = self.field_done(eval, Field::Path, path_blank, path_matches) {
            return result;
        }

        eval.diff.set_current_field(Field::Body);
        let body_matches = self.body_matches(eval.diff, fields.body.as_ref(), definition, request);
        let body_blank = fields.body.as_ref().map_or(true, CompiledBody::is_blank);
        if let Some(result) = self.field_done(eval, Field::Body, body_blank, body_matches) {
            return result;
        }

        eval.diff.set_current_field(Field::Headers);
        let headers_match = fields.headers.matches(eval.diff, &request.headers);
        let headers_blank = fields.headers.is_blank();
        if let Some(result) = self.field_done(eval, Field::Headers, headers_blank, headers_match) {
            return result;
        }

        eval.diff.set_current_field(Field::Cookies);
        let cookies_match = fields.cookies.matches(eval.diff, &request.cookies);
        let cookies_blank = fields.cookies.is_blank();
        if let Some(result) = self.field_done(eval, Field::Cookies, cookies_blank, cookies_match) {
            return result;
        }

        eval.diff.set_current_field(Field::PathParameters);
        let path_parameters_match = definition.path.is_blank() || {
            if self.ctx.control_plane {
                MultiValueMapMatcher::new(&request.path_parameters)
                    .map(|matcher| matcher.matches(eval.diff, &path_parameters))
                    .unwrap_or(false)
            } else {
                fields.path_parameters.matches(eval.diff, &path_parameters)
            }
        };
        let path_parameters_blank = fields.path_parameters.is_blank();
        if let Some(result) = self.field_done(
            eval,
            Field::PathParameters,
            path_parameters_blank,
            path_parameters_match,
        ) {
            return result;
        }

        eval.diff.set_current_field(Field::QueryParameters);
        let query_matches = fields
            .query_parameters
            .matches(eval.diff, &request.query_string_parameters);
        let query_blank = fields.query_parameters.is_blank();
        if let Some(result) =
            self.field_done(eval, Field::QueryParameters, query_blank, query_matches)
        {
            return result;
        }

        eval.diff.set_current_field(Field::KeepAlive);
        let keep_alive_matches = fields.keep_alive.matches(eval.diff, &request.keep_alive);
        let keep_alive_blank = fields.keep_alive.is_blank();
        if let Some(result) =
            self.field_done(eval, Field::KeepAlive, keep_alive_blank, keep_alive_matches)
        {
            return result;
        }

        eval.diff.set_current_field(Field::SslMatches);
        let ssl_matches = fields.secure.matches(eval.diff, &request.secure);
        let ssl_blank = fields.secure.is_blank();
        if let Some(result) = self.field_done(eval, Field::SslMatches, ssl_blank, ssl_matches) {
            return result;
        }

        (eval.count.failures() == 0) ^ eval.request_not ^ definition.not ^ self.not
    }

    /// Record a field's outcome. Returns the final result when evaluation
    /// should stop here.
    fn field_done(
        &self,
        eval: &mut Evaluation<'_>,
        field: Field,
        matcher_blank: bool,
        field_matches: bool,
    ) -> Option<bool> {
        if !self.ctx.control_plane {
            eval.because.push('\n');
            eval.because.push_str(field.name());
            eval.because
                .push_str(if field_matches { " matched" } else { " didn't match" });
            let differences = eval.diff.differences(field);
            if !differences.is_empty() {
                eval.because.push_str(":\n\n");
                eval.because.push_str(&differences.join("\n"));
            }
            if !field_matches {
                if eval.request_not {
                    eval.because.push_str(REQUEST_NOT_OPERATOR_IS_ENABLED);
                }
                if self.definition_not() {
                    eval.because.push_str(EXPECTATION_REQUEST_NOT_OPERATOR_IS_ENABLED);
                }
                if self.not {
                    eval.because
                        .push_str(EXPECTATION_REQUEST_MATCHER_NOT_OPERATOR_IS_ENABLED);
                }
            }
        }
        if field_matches {
            return None;
        }
        eval.count.increment_failures();
        if !matcher_blank && self.ctx.config.matchers_fail_fast {
            return Some(false ^ eval.request_not ^ self.definition_not() ^ self.not);
        }
        None
    }

    fn body_matches(
        &self,
        diff: &mut MatchDifference,
        body: Option<&CompiledBody>,
        definition: &HttpRequest,
        request: &HttpRequest,
    ) -> bool {
        let Some(body) = body else {
            return true;
        };
        if !self.ctx.control_plane {
            return body.matches(diff, request);
        }
        let same_text = match (&definition.body, &request.body) {
            (Some(stored), Some(candidate)) => stored
                .as_string()
                .to_lowercase()
                .eq(&candidate.as_string().to_lowercase()),
            _ => false,
        };
        if same_text || body.matches(diff, request) {
            return true;
        }
        // the candidate body may itself be a body definition
        let parsed = match request.body.as_ref().map(|body| &body.kind) {
            Some(BodyKind::String { value, .. }) => Body::parse_definition(value),
            Some(_) => request.body.clone(),
            None => None,
        };
        parsed
            .and_then(|parsed| CompiledBody::compile(&parsed).ok())
            .is_some_and(|matcher| matcher.matches(diff, definition))
    }

    fn log_result(&self, matched: bool, request: &HttpRequest, eval: &Evaluation<'_>) {
        let request_json = serde_json::to_string_pretty(request).unwrap_or_default();
        let target = match &self.expectation {
            Some(expectation) => serde_json::to_string_pretty(expectation.as_ref()),
            None => serde_json::to_string_pretty(&self.definition),
        }
        .unwrap_or_default();
        let noun = if self.expectation.is_some() {
            "expectation"
        } else {
            "request"
        };
        let expectation_id = self.expectation.as_ref().map(|e| e.id.as_str());

        let event = if matched {
            MatchLogEvent::new(
                MatchLogType::ExpectationMatched,
                format!("request:\n\n  {request_json}\n\n matched {noun}:\n\n  {target}"),
            )
        } else {
            let because = eval.because.strip_prefix('\n').unwrap_or(&eval.because);
            let mut message = format!("request:\n\n  {request_json}\n\n didn't match {noun}");
            if let Some(description) = &self.description {
                message.push_str(&format!(" {description}"));
            }
            message.push_str(&format!(":\n\n  {target}"));
            if because.is_empty() {
                MatchLogEvent::new(MatchLogType::ExpectationNotMatched, message)
            } else {
                message.push_str(&format!("\n\n because:\n\n  {because}"));
                MatchLogEvent::new(MatchLogType::ExpectationNotMatched, message)
                    .with_because(because)
            }
        };
        self.ctx.log.log_event(
            event
                .with_correlation_id(eval.diff.correlation_id())
                .with_expectation_id(expectation_id),
        );
    }
}

impl PartialEq for HttpRequestPropertiesMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint() == other.fingerprint()
            && self.definition == other.definition
            && self.not == other.not
            && self.description == other.description
            && self.ctx.control_plane == other.ctx.control_plane
            && self.expectation == other.expectation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatcherConfig;
    use crate::log::{InMemoryMatchLog, MatchLog};
    use crate::model::{MatchType, Times};

    fn ctx() -> MatcherContext {
        MatcherContext::default()
    }

    fn matcher(definition: HttpRequest) -> HttpRequestPropertiesMatcher {
        HttpRequestPropertiesMatcher::new(&ctx(), Some(&definition), None).unwrap()
    }

    fn matches(matcher: &HttpRequestPropertiesMatcher, request: &HttpRequest) -> bool {
        matcher.matches_request(&mut MatchDifference::new(true), request)
    }

    #[test]
    fn test_method_and_path_regex() {
        let m = matcher(HttpRequest::request().with_method("GET").with_path("/a.*"));
        assert!(matches(&m, &HttpRequest::request().with_method("GET").with_path("/abc")));
        assert!(!matches(&m, &HttpRequest::request().with_method("POST").with_path("/abc")));
    }

    #[test]
    fn test_blank_candidate_fields_match() {
        let m = matcher(HttpRequest::request().with_method("GET").with_path("/a"));
        assert!(matches(&m, &HttpRequest::request()));
    }

    #[test]
    fn test_not_at_three_levels() {
        let definition = HttpRequest::request().with_path("/a");
        let hit = HttpRequest::request().with_path("/a");
        let miss = HttpRequest::request().with_path("/b");

        let plain = matcher(definition.clone());
        assert!(matches(&plain, &hit));
        assert!(!matches(&plain, &miss));

        let notted_definition = matcher(definition.clone().negated(true));
        assert!(!matches(&notted_definition, &hit));
        assert!(matches(&notted_definition, &miss));

        let notted_matcher = matcher(definition.clone()).with_not(true);
        assert!(!matches(&notted_matcher, &hit));

        let notted_twice = matcher(definition.negated(true)).with_not(true);
        assert!(matches(&notted_twice, &hit));
        assert!(!matches(&notted_twice, &miss));

        let notted_candidate = HttpRequest::request().with_path("/a").negated(true);
        assert!(!matches(&plain, &notted_candidate));
    }

    #[test]
    fn test_fail_fast_does_not_change_result() {
        let definition = HttpRequest::request()
            .with_method("GET")
            .with_path("/a")
            .with_header("X-Id", "1")
            .negated(true);
        let candidate = HttpRequest::request().with_method("POST").with_path("/b");
        let fast = HttpRequestPropertiesMatcher::new(&ctx(), Some(&definition), None).unwrap();
        let slow_ctx = MatcherContext::new(
            MatcherConfig::default().with_fail_fast(false),
            Arc::new(crate::log::NoOpMatchLog),
        );
        let slow = HttpRequestPropertiesMatcher::new(&slow_ctx, Some(&definition), None).unwrap();
        assert_eq!(matches(&fast, &candidate), matches(&slow, &candidate));
        assert!(matches(&fast, &candidate));
    }

    #[test]
    fn test_path_template_with_parameters() {
        let m = matcher(
            HttpRequest::request()
                .with_path("/pets/{petId}")
                .with_path_parameter("petId", "[0-9]+"),
        );
        assert!(matches(&m, &HttpRequest::request().with_path("/pets/12")));
        assert!(!matches(&m, &HttpRequest::request().with_path("/pets/rex")));
        assert!(!matches(&m, &HttpRequest::request().with_path("/pets/12/toys")));
    }

    #[test]
    fn test_path_part_count_difference() {
        let m = matcher(
            HttpRequest::request()
                .with_path("/pets/{petId}")
                .with_path_parameter("petId", "[0-9]+"),
        );
        let mut diff = MatchDifference::new(true);
        assert!(!m.matches_request(&mut diff, &HttpRequest::request().with_path("/pets/1/2")));
        assert!(diff
            .differences(Field::Path)
            .iter()
            .any(|d| d.contains("has 3 parts but matched path /pets/1/2 has 4 parts")));
    }

    #[test]
    fn test_keep_alive_and_secure() {
        let m = matcher(HttpRequest::request().with_secure(true).with_keep_alive(true));
        assert!(matches(
            &m,
            &HttpRequest::request().with_secure(true).with_keep_alive(true)
        ));
        assert!(!matches(&m, &HttpRequest::request().with_secure(false).with_keep_alive(true)));
        assert!(!matches(&m, &HttpRequest::request().with_keep_alive(true)));
    }

    #[test]
    fn test_inactive_expectation() {
        let definition = HttpRequest::request().with_path("/a");
        let expectation =
            Arc::new(Expectation::when(definition.clone()).with_times(Times::exactly(0)));
        let m = HttpRequestPropertiesMatcher::new(&ctx(), Some(&definition), Some(expectation))
            .unwrap();
        assert!(!matches(&m, &HttpRequest::request().with_path("/a")));
    }

    #[test]
    fn test_same_instance_matches() {
        let m = matcher(HttpRequest::request().with_path("/a"));
        let definition = m.definition().unwrap().clone();
        assert!(matches(&m, &definition));
        let stored = m.definition().unwrap();
        assert!(m.matches_request(&mut MatchDifference::disabled(), stored));
    }

    #[test]
    fn test_logs_because_on_mismatch() {
        let log = Arc::new(InMemoryMatchLog::default());
        let ctx = MatcherContext::new(MatcherConfig::default().with_fail_fast(false), log.clone());
        let definition = HttpRequest::request().with_method("GET").with_path("/a");
        let m = HttpRequestPropertiesMatcher::new(&ctx, Some(&definition), None).unwrap();

        let mut diff = MatchDifference::new(true).with_correlation_id("corr-1");
        let post = HttpRequest::request().with_method("POST").with_path("/a");
        assert!(!m.matches_request(&mut diff, &post));
        assert!(m.matches_request(
            &mut MatchDifference::new(true),
            &HttpRequest::request().with_method("GET").with_path("/a")
        ));

        let not_matched = log.events_of(MatchLogType::ExpectationNotMatched);
        assert_eq!(not_matched.len(), 1);
        assert_eq!(not_matched[0].correlation_id.as_deref(), Some("corr-1"));
        let because = not_matched[0].because.as_deref().unwrap();
        assert!(because.starts_with("method didn't match"));
        assert!(because.contains("\npath matched"));
        assert!(because.contains("\nsslMatches matched"));
        assert_eq!(log.events_of(MatchLogType::ExpectationMatched).len(), 1);
    }

    #[test]
    fn test_because_mentions_not_operators() {
        let log = Arc::new(InMemoryMatchLog::default());
        let ctx = MatcherContext::new(MatcherConfig::default(), log.clone());
        let definition = HttpRequest::request().with_path("/a").negated(true);
        let m = HttpRequestPropertiesMatcher::new(&ctx, Some(&definition), None)
            .unwrap()
            .with_not(true);
        let candidate = HttpRequest::request().with_path("/b").negated(true);
        // three nots over a failure
        assert!(m.matches_request(&mut MatchDifference::new(true), &candidate));
        assert!(log.events_of(MatchLogType::ExpectationNotMatched).is_empty());

        // two nots over a failure
        let m = HttpRequestPropertiesMatcher::new(&ctx, Some(&definition), None).unwrap();
        assert!(!m.matches_request(&mut MatchDifference::new(true), &candidate));
        let events = log.events_of(MatchLogType::ExpectationNotMatched);
        let because = events[0].because.as_deref().unwrap();
        assert!(because.contains("path didn't match"));
        assert!(because.contains("request 'not' operator is enabled"));
        assert!(because.contains("expectation's request 'not' operator is enabled"));
        assert!(!because.contains("matcher 'not' operator"));
    }

    #[test]
    fn test_control_plane_does_not_log() {
        let log = Arc::new(InMemoryMatchLog::default());
        let mut ctx = MatcherContext::new(MatcherConfig::default(), log.clone());
        ctx.control_plane = true;
        let definition = HttpRequest::request().with_path("/a");
        let m = HttpRequestPropertiesMatcher::new(&ctx, Some(&definition), None).unwrap();
        let other = HttpRequest::request().with_path("/b");
        assert!(!m.matches_request(&mut MatchDifference::new(true), &other));
        assert!(log.events().is_empty());
    }

    #[derive(Debug, Default)]
    struct MutedLog {
        events: InMemoryMatchLog,
    }

    impl MatchLog for MutedLog {
        fn log_event(&self, event: MatchLogEvent) {
            self.events.log_event(event);
        }

        fn is_enabled(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_disabled_log_skips_match_events() {
        let log = Arc::new(MutedLog::default());
        let ctx = MatcherContext::new(MatcherConfig::default(), log.clone());
        let definition = HttpRequest::request().with_path("/a");
        let m = HttpRequestPropertiesMatcher::new(&ctx, Some(&definition), None).unwrap();
        assert!(m.matches_request(&mut MatchDifference::new(true), &definition));
        let other = HttpRequest::request().with_path("/b");
        assert!(!m.matches_request(&mut MatchDifference::new(true), &other));
        assert!(log.events.events().is_empty());
    }

    #[test]
    fn test_control_plane_body_definition_fallback() {
        let ctx = MatcherContext::control_plane(MatcherConfig::default());
        let stored = HttpRequest::request()
            .with_path("/a")
            .with_body(Body::json(r#"{"id": 1, "name": "x"}"#, MatchType::OnlyMatchingFields));
        let m = HttpRequestPropertiesMatcher::new(&ctx, Some(&stored), None).unwrap();

        // same body text, ignoring case
        let same = HttpRequest::request().with_body(Body::exact(r#"{"ID": 1, "NAME": "X"}"#));
        assert!(matches(&m, &same));

        // the candidate body is a body definition matched against the stored body
        let by_definition = HttpRequest::request().with_body(Body::exact(
            r#"{"type": "JSON_PATH", "jsonPath": "$.name"}"#,
        ));
        assert!(matches(&m, &by_definition));

        let unrelated = HttpRequest::request().with_body(Body::exact("plain text"));
        assert!(!matches(&m, &unrelated));
    }

    #[test]
    fn test_equality_ignores_collaborators() {
        let definition = HttpRequest::request().with_path("/a");
        let a = HttpRequestPropertiesMatcher::new(&ctx(), Some(&definition), None).unwrap();
        let other_ctx = MatcherContext::new(
            MatcherConfig::default(),
            Arc::new(InMemoryMatchLog::default()),
        );
        let b = HttpRequestPropertiesMatcher::new(&other_ctx, Some(&definition), None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a, b.clone().with_not(true));
    }
}
