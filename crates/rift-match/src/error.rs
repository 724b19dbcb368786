//! Errors raised while building matchers or managing expectations.
//!
//! Matching itself never fails: malformed candidates simply don't match.
//! Everything here is a construction or registration problem that makes an
//! expectation unusable.

use thiserror::Error;

/// Prefix shared by every OpenAPI loading failure.
pub const OPEN_API_LOAD_ERROR: &str = "Unable to load API spec from provided URL or payload";

#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("Unable to load API spec from provided URL or payload because {0}")]
    OpenApiLoad(String),

    #[error(
        "multiple values for optional key are not allowed, key \"{key}\" has values \"{values}\""
    )]
    OptionalKeyWithMultipleValues { key: String, values: String },

    #[error("Invalid body definition: {0}")]
    InvalidBody(String),

    #[error("Expectation {0} not found")]
    ExpectationNotFound(String),
}

impl MatcherError {
    pub fn open_api<S: Into<String>>(details: S) -> Self {
        MatcherError::OpenApiLoad(details.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_api_error_message_prefix() {
        let err = MatcherError::open_api("attribute paths is missing");
        let message = err.to_string();
        assert!(message.starts_with(OPEN_API_LOAD_ERROR));
        assert_eq!(
            message,
            format!("{OPEN_API_LOAD_ERROR} because attribute paths is missing")
        );
    }

    #[test]
    fn test_optional_key_error_message() {
        let err = MatcherError::OptionalKeyWithMultipleValues {
            key: "?X-Trace".to_string(),
            values: "[a, b]".to_string(),
        };
        assert!(err.to_string().contains("\"?X-Trace\""));
    }
}
