//! Tests for the `rift-match` binary.

use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

const EXPECTATIONS: &str = r#"
- id: list-users
  httpRequest:
    method: GET
    path: /users
  httpResponse:
    statusCode: 200
- id: create-user
  priority: 10
  httpRequest:
    method: POST
    path: /users
    body:
      type: JSON
      json: '{"name": "ada"}'
  httpResponse:
    statusCode: 201
"#;

fn write_file(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn run(expectations: &NamedTempFile, requests: &NamedTempFile, extra: &[&str]) -> (bool, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_rift-match"))
        .arg("--expectations")
        .arg(expectations.path())
        .arg("--request")
        .arg(requests.path())
        .arg("--no-color")
        .args(extra)
        .output()
        .unwrap();
    (
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).to_string(),
    )
}

#[test]
fn test_reports_matched_expectations() {
    let expectations = write_file(".yaml", EXPECTATIONS);
    let requests = write_file(
        ".json",
        r#"[
            {"method": "GET", "path": "/users"},
            {"method": "POST", "path": "/users", "body": "{\"name\": \"ada\", \"admin\": false}"}
        ]"#,
    );
    let (success, stdout) = run(&expectations, &requests, &[]);
    assert!(success, "{stdout}");
    assert!(stdout.contains("MATCH #0 GET /users -> list-users"));
    // the higher priority expectation is tried first and explained
    assert!(stdout.contains("expectation create-user:"));
    assert!(stdout.contains("method didn't match"));
    assert!(stdout.contains("MATCH #1 POST /users -> create-user"));
    assert!(stdout.contains("2 requests, 2 matched, 0 unmatched"));
}

#[test]
fn test_explains_unmatched_request() {
    let expectations = write_file(".yaml", EXPECTATIONS);
    let requests = write_file(".json", r#"{"method": "DELETE", "path": "/users"}"#);
    let (success, stdout) = run(&expectations, &requests, &["--no-fail-fast"]);
    assert!(!success);
    assert!(stdout.contains("NO MATCH #0 DELETE /users"));
    assert!(stdout.contains("expectation list-users:"));
    assert!(stdout.contains("method didn't match"));
}
