//! Loading OpenAPI documents from an inline payload, a file or a URL.

use super::model::{resolve_references, OpenApiDocument};
use crate::error::MatcherError;
use serde_json::Value;
use std::time::Duration;

const MALFORMED: &str = "malformed or unreadable swagger supplied";

/// Where a spec string points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecLocation<'a> {
    Url(&'a str),
    File(&'a str),
    Inline(&'a str),
}

impl<'a> SpecLocation<'a> {
    pub fn detect(spec_url_or_payload: &'a str) -> Self {
        let trimmed = spec_url_or_payload.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            SpecLocation::Url(trimmed)
        } else if let Some(path) = trimmed.strip_prefix("file://") {
            SpecLocation::File(path)
        } else if !trimmed.contains('\n')
            && [".json", ".yaml", ".yml"].iter().any(|ext| trimmed.ends_with(ext))
        {
            SpecLocation::File(trimmed)
        } else {
            SpecLocation::Inline(spec_url_or_payload)
        }
    }

    /// Spec files and URLs are named in match descriptions; payloads are not.
    pub fn is_reference(&self) -> bool {
        !matches!(self, SpecLocation::Inline(_))
    }
}

fn read_source(location: SpecLocation<'_>, timeout: Duration) -> Result<String, MatcherError> {
    match location {
        SpecLocation::Inline(payload) => Ok(payload.to_string()),
        SpecLocation::File(path) => std::fs::read_to_string(path)
            .map_err(|e| MatcherError::open_api(format!("unable to read \"{path}\": {e}"))),
        SpecLocation::Url(url) => {
            tracing::debug!(url, timeout_ms = timeout.as_millis() as u64, "fetching openapi spec");
            let client = reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| MatcherError::open_api(e.to_string()))?;
            client
                .get(url)
                .send()
                .and_then(|response| response.error_for_status())
                .and_then(|response| response.text())
                .map_err(|e| MatcherError::open_api(format!("unable to fetch \"{url}\": {e}")))
        }
    }
}

/// Parse JSON or YAML text into a resolved document.
pub fn parse_document(text: &str) -> Result<OpenApiDocument, MatcherError> {
    let raw: Value = serde_yaml::from_str(text).map_err(|e| {
        tracing::trace!("unable to parse openapi spec: {}", e);
        MatcherError::open_api(MALFORMED)
    })?;
    if !raw.is_object() {
        return Err(MatcherError::open_api(MALFORMED));
    }
    if raw.get("swagger").is_some() {
        return Err(MatcherError::open_api(
            "swagger 2.0 documents are not supported, convert to OpenAPI 3",
        ));
    }
    if raw.get("openapi").is_none() {
        return Err(MatcherError::open_api("attribute openapi is missing"));
    }
    let resolved = resolve_references(&raw).map_err(MatcherError::open_api)?;
    serde_json::from_value(resolved).map_err(|e| MatcherError::open_api(e.to_string()))
}

/// Load and resolve the document `spec_url_or_payload` refers to.
pub fn load_document(
    spec_url_or_payload: &str,
    timeout: Duration,
) -> Result<OpenApiDocument, MatcherError> {
    let text = read_source(SpecLocation::detect(spec_url_or_payload), timeout)?;
    parse_document(&text)
}
