//! OpenAPI-derived matchers against the petstore fixture.

use rift_match::matchers::MatcherContext;
use rift_match::openapi::expand_requests;
use rift_match::{
    Body, Expectation, ExpectationStore, Field, HttpRequest, InMemoryMatchLog, MatchDifference,
    MatchLogType, MatcherConfig, OpenApiDefinition, OpenApiMatcher,
};
use std::sync::Arc;

fn petstore() -> String {
    format!("{}/tests/fixtures/petstore.yaml", env!("CARGO_MANIFEST_DIR"))
}

fn matcher(definition: OpenApiDefinition) -> OpenApiMatcher {
    OpenApiMatcher::new(&MatcherContext::default(), &definition, None).unwrap()
}

fn matches(matcher: &OpenApiMatcher, request: &HttpRequest) -> bool {
    matcher.matches_request(&mut MatchDifference::new(true), request)
}

fn create_pet(body: &str) -> HttpRequest {
    HttpRequest::request()
        .with_method("POST")
        .with_path("/v1/pets")
        .with_header("Content-Type", "application/json; charset=utf-8")
        .with_header("X-API-Key", "secret")
        .with_body(Body::exact(body))
}

#[test]
fn test_expands_every_operation_from_file() {
    let expanded =
        expand_requests(&MatcherConfig::default(), &OpenApiDefinition::new(petstore())).unwrap();
    assert_eq!(expanded.len(), 3);

    let paths: Vec<&str> = expanded.iter().map(|e| e.request.path.value()).collect();
    assert_eq!(paths, vec!["/v1/pets", "/v1/pets", "/v1/pets/{petId}"]);

    let create = expanded
        .iter()
        .find(|e| e.description.contains("createPets"))
        .unwrap();
    assert_eq!(
        create.description,
        format!(
            "for swagger \"{}\" operation \"createPets\" content-type \"application/json\"",
            petstore()
        )
    );
    assert_eq!(create.request.first_header("Content-Type"), Some("application/json.*"));
}

#[test]
fn test_request_body_validated_against_schema() {
    let m = matcher(OpenApiDefinition::new(petstore()).with_operation_id("createPets"));
    assert!(matches(&m, &create_pet(r#"{"id": 1, "name": "Rex", "tag": null}"#)));
    assert!(!matches(&m, &create_pet(r#"{"id": "one", "name": "Rex"}"#)));
    assert!(!matches(&m, &create_pet(r#"{"name": "Rex"}"#)));
}

#[test]
fn test_security_scheme_requires_header() {
    let m = matcher(OpenApiDefinition::new(petstore()).with_operation_id("createPets"));
    let request = create_pet(r#"{"id": 1, "name": "Rex"}"#);
    let without_key = HttpRequest::request()
        .with_method("POST")
        .with_path("/v1/pets")
        .with_header("Content-Type", "application/json")
        .with_body(Body::exact(r#"{"id": 1, "name": "Rex"}"#));
    assert!(matches(&m, &request));
    assert!(!matches(&m, &without_key));
}

#[test]
fn test_operation_filter_reports_part_count() {
    let m = matcher(OpenApiDefinition::new(petstore()).with_operation_id("showPetById"));
    let mut diff = MatchDifference::new(true);
    let request = HttpRequest::request().with_method("GET").with_path("/v1/pets");
    assert!(!m.matches_request(&mut diff, &request));
    assert!(diff.differences(Field::Path).iter().any(|d| d
        == "matcher path /v1/pets/{petId} has 4 parts but matched path /v1/pets has 3 parts "));
    assert!(matches(
        &m,
        &HttpRequest::request().with_method("GET").with_path("/v1/pets/rex")
    ));
}

#[test]
fn test_unknown_operation_is_rejected() {
    let err = OpenApiMatcher::new(
        &MatcherContext::default(),
        &OpenApiDefinition::new(petstore()).with_operation_id("deletePets"),
        None,
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unable to load API spec from provided URL or payload because operation \"deletePets\" not found"
    );
}

#[test]
fn test_store_serves_open_api_expectation() {
    let log = Arc::new(InMemoryMatchLog::new());
    let store = ExpectationStore::new(MatcherConfig::default(), log.clone());
    let list_pets = OpenApiDefinition::new(petstore()).with_operation_id("listPets");
    store.add(Expectation::when(list_pets).with_id("list")).unwrap();

    let list = HttpRequest::request()
        .with_method("GET")
        .with_path("/v1/pets")
        .with_query_parameter("limit", "20");
    assert_eq!(store.first_matching_expectation(&list).unwrap().id, "list");

    let too_many = HttpRequest::request()
        .with_method("GET")
        .with_path("/v1/pets")
        .with_query_parameter("limit", "500");
    assert!(store.first_matching_expectation(&too_many).is_none());

    let not_matched = log.events_of(MatchLogType::ExpectationNotMatched);
    assert!(!not_matched.is_empty());
    assert!(not_matched[0].message.contains("operation \"listPets\""));
}
