use super::expand::expand_requests;
use crate::error::MatcherError;
use crate::matchers::{HttpRequestPropertiesMatcher, MatchDifference, MatcherContext};
use crate::model::{Expectation, HttpRequest, OpenApiDefinition, RequestDefinition};
use std::sync::Arc;

/// Matches requests against every operation of an OpenAPI definition.
///
/// The definition is expanded once into one [`HttpRequestPropertiesMatcher`]
/// per operation and content type; a request matches when any of them does.
#[derive(Debug, Clone)]
pub struct OpenApiMatcher {
    definition: OpenApiDefinition,
    matchers: Vec<HttpRequestPropertiesMatcher>,
    expectation: Option<Arc<Expectation>>,
    ctx: MatcherContext,
}

impl OpenApiMatcher {
    /// Load and expand `definition`. Fails when the document can't be loaded or
    /// uses unsupported constructs.
    pub fn new(
        ctx: &MatcherContext,
        definition: &OpenApiDefinition,
        expectation: Option<Arc<Expectation>>,
    ) -> Result<Self, MatcherError> {
        let matchers = expand_requests(&ctx.config, definition)?
            .into_iter()
            .map(|expanded| {
                HttpRequestPropertiesMatcher::new(ctx, Some(&expanded.request), expectation.clone())
                    .map(|matcher| matcher.with_description(expanded.description))
            })
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(
            matchers = matchers.len(),
            operation_id = definition.operation_filter().unwrap_or(""),
            "created request matcher for open api definition"
        );
        Ok(Self {
            definition: definition.clone(),
            matchers,
            expectation,
            ctx: ctx.clone(),
        })
    }

    pub fn with_expectation(&self, expectation: Arc<Expectation>) -> Self {
        Self {
            definition: self.definition.clone(),
            matchers: self
                .matchers
                .iter()
                .map(|matcher| matcher.with_expectation(expectation.clone()))
                .collect(),
            expectation: Some(expectation),
            ctx: self.ctx.clone(),
        }
    }

    pub fn definition(&self) -> &OpenApiDefinition {
        &self.definition
    }

    pub fn matchers(&self) -> &[HttpRequestPropertiesMatcher] {
        &self.matchers
    }

    pub fn expectation(&self) -> Option<&Arc<Expectation>> {
        self.expectation.as_ref()
    }

    pub fn context(&self) -> &MatcherContext {
        &self.ctx
    }

    pub fn is_blank(&self) -> bool {
        self.definition.spec_url_or_payload.trim().is_empty()
    }

    pub fn is_active(&self) -> bool {
        self.expectation
            .as_ref()
            .map_or(true, |expectation| expectation.is_active())
    }

    /// A concrete request is matched against the operations; another OpenAPI
    /// definition only matches when it is the same definition.
    pub fn matches(&self, diff: &mut MatchDifference, candidate: &RequestDefinition) -> bool {
        match candidate {
            RequestDefinition::Http(request) => self.matches_request(diff, request),
            RequestDefinition::OpenApi(definition) => {
                self.is_active() && *definition == self.definition
            }
        }
    }

    pub fn matches_request(&self, diff: &mut MatchDifference, request: &HttpRequest) -> bool {
        if !self.is_active() {
            return false;
        }
        let matched = self.matchers.is_empty()
            || self.matchers.iter().any(|matcher| {
                let mut single = diff.child();
                let matched = matcher.matches_request(&mut single, request);
                diff.merge(single);
                matched
            });
        matched ^ self.definition.not
    }
}

impl PartialEq for OpenApiMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.definition == other.definition
            && self.expectation == other.expectation
            && self.ctx.control_plane == other.ctx.control_plane
    }
}
