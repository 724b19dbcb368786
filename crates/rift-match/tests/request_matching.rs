//! End-to-end request matching through the public API.

use proptest::prelude::*;
use rift_match::matchers::MatcherContext;
use rift_match::model::MatchType;
use rift_match::{
    Body, Field, HttpRequest, HttpRequestPropertiesMatcher, MatchDifference, MatcherConfig,
    NoOpMatchLog, NottableString,
};
use std::sync::Arc;

fn context(fail_fast: bool) -> MatcherContext {
    MatcherContext::new(
        MatcherConfig::default().with_fail_fast(fail_fast),
        Arc::new(NoOpMatchLog),
    )
}

fn matcher(definition: &HttpRequest) -> HttpRequestPropertiesMatcher {
    HttpRequestPropertiesMatcher::new(&context(true), Some(definition), None).unwrap()
}

fn matches(matcher: &HttpRequestPropertiesMatcher, request: &HttpRequest) -> bool {
    matcher.matches_request(&mut MatchDifference::new(true), request)
}

#[test]
fn test_method_and_path_regex() {
    let m = matcher(&HttpRequest::request().with_method("GET").with_path("/a.*"));
    assert!(matches(&m, &HttpRequest::request().with_method("GET").with_path("/abc")));
    assert!(!matches(&m, &HttpRequest::request().with_method("POST").with_path("/abc")));
}

#[test]
fn test_lenient_json_body() {
    let m = matcher(
        &HttpRequest::request().with_body(Body::json(r#"{"x": 1}"#, MatchType::OnlyMatchingFields)),
    );
    assert!(matches(&m, &HttpRequest::request().with_body(Body::exact(r#"{"x":1,"y":9}"#))));
    assert!(!matches(&m, &HttpRequest::request().with_body(Body::exact(r#"{"x":2}"#))));
}

#[test]
fn test_required_authorization_header() {
    let m = matcher(&HttpRequest::request().with_header("Authorization", "Bearer .+"));
    assert!(!matches(&m, &HttpRequest::request().with_path("/secure")));
    assert!(matches(
        &m,
        &HttpRequest::request().with_header("Authorization", "Bearer abc")
    ));
}

#[test]
fn test_negated_body() {
    let m = matcher(&HttpRequest::request().with_body(Body::exact("hello").negated(true)));
    assert!(!matches(&m, &HttpRequest::request().with_body(Body::exact("hello"))));
    assert!(matches(&m, &HttpRequest::request().with_body(Body::exact("world"))));
}

#[test]
fn test_differences_name_failing_fields() {
    let ctx = context(false);
    let m = HttpRequestPropertiesMatcher::new(
        &ctx,
        Some(
            &HttpRequest::request()
                .with_method("GET")
                .with_path("/orders")
                .with_header("Accept", "application/json"),
        ),
        None,
    )
    .unwrap();
    let mut diff = MatchDifference::new(true);
    let request = HttpRequest::request()
        .with_method("POST")
        .with_path("/orders")
        .with_header("Accept", "text/html");
    assert!(!m.matches_request(&mut diff, &request));
    assert!(!diff.differences(Field::Method).is_empty());
    assert!(!diff.differences(Field::Headers).is_empty());
    assert!(diff.differences(Field::Path).is_empty());
}

#[test]
fn test_disabled_differences_stay_empty() {
    let m = matcher(&HttpRequest::request().with_method("GET"));
    let mut diff = MatchDifference::disabled();
    assert!(!m.matches_request(&mut diff, &HttpRequest::request().with_method("PUT")));
    assert!(diff.all_differences().values().all(Vec::is_empty));
}

#[test]
fn test_notted_header_value() {
    let m = matcher(
        &HttpRequest::request().with_header("X-Env", NottableString::not("prod")),
    );
    assert!(matches(&m, &HttpRequest::request().with_header("X-Env", "staging")));
    assert!(!matches(&m, &HttpRequest::request().with_header("X-Env", "prod")));
}

#[test]
fn test_path_parameters_from_template() {
    let m = matcher(
        &HttpRequest::request()
            .with_path("/users/{id}")
            .with_path_parameter("id", "[0-9]+"),
    );
    assert!(matches(&m, &HttpRequest::request().with_path("/users/42")));
    assert!(!matches(&m, &HttpRequest::request().with_path("/users/bob")));
}

fn method() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("GET"), Just("POST"), Just("PUT"), Just("G.*"), Just("")]
}

fn path() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("/a"), Just("/a/b"), Just("/a.*"), Just("/b"), Just("")]
}

fn header() -> impl Strategy<Value = Option<&'static str>> {
    prop_oneof![Just(None), Just(Some("json")), Just(Some("x.*")), Just(Some("xml"))]
}

fn body() -> impl Strategy<Value = Option<&'static str>> {
    prop_oneof![Just(None), Just(Some("hello")), Just(Some("world"))]
}

fn build(method: &str, path: &str, header: Option<&str>, body: Option<&str>) -> HttpRequest {
    let mut request = HttpRequest::request().with_method(method).with_path(path);
    if let Some(value) = header {
        request = request.with_header("X-Kind", value);
    }
    if let Some(text) = body {
        request = request.with_body(Body::exact(text));
    }
    request
}

proptest! {
    #[test]
    fn fail_fast_never_changes_the_outcome(
        def_method in method(), def_path in path(), def_header in header(), def_body in body(),
        req_method in method(), req_path in path(), req_header in header(), req_body in body(),
        not in any::<bool>(),
    ) {
        let definition = build(def_method, def_path, def_header, def_body).negated(not);
        let request = build(req_method, req_path, req_header, req_body);
        let fast =
            HttpRequestPropertiesMatcher::new(&context(true), Some(&definition), None).unwrap();
        let full =
            HttpRequestPropertiesMatcher::new(&context(false), Some(&definition), None).unwrap();
        prop_assert_eq!(
            fast.matches_request(&mut MatchDifference::new(true), &request),
            full.matches_request(&mut MatchDifference::new(true), &request)
        );
    }

    #[test]
    fn negating_the_definition_inverts_the_outcome(
        def_method in method(), def_path in path(), def_header in header(),
        req_method in method(), req_path in path(), req_header in header(),
    ) {
        let definition = build(def_method, def_path, def_header, None);
        let request = build(req_method, req_path, req_header, None);
        let plain = matcher(&definition);
        let negated = matcher(&definition.clone().negated(true));
        prop_assert_eq!(matches(&plain, &request), !matches(&negated, &request));
    }

    #[test]
    fn matching_is_repeatable(
        def_method in method(), def_path in path(), req_method in method(), req_path in path(),
    ) {
        let m = matcher(&build(def_method, def_path, None, None));
        let request = build(req_method, req_path, None, None);
        prop_assert_eq!(matches(&m, &request), matches(&m, &request));
    }
}
