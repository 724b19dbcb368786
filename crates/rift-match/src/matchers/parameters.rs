//! Form-encoded (`application/x-www-form-urlencoded`) body matcher.

use super::diff::MatchDifference;
use super::multimap::MultiValueMapMatcher;
use super::Matcher;
use crate::error::MatcherError;
use crate::model::KeysToMultiValues;

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterStringMatcher {
    parameters: MultiValueMapMatcher,
}

impl ParameterStringMatcher {
    pub fn new(parameters: &KeysToMultiValues) -> Result<Self, MatcherError> {
        Ok(Self {
            parameters: MultiValueMapMatcher::new(parameters)?,
        })
    }

    pub fn matches_parameters(
        &self,
        diff: &mut MatchDifference,
        actual: &KeysToMultiValues,
    ) -> bool {
        self.parameters.matches(diff, actual)
    }
}

impl Matcher<str> for ParameterStringMatcher {
    fn matches(&self, diff: &mut MatchDifference, actual: &str) -> bool {
        let candidate = KeysToMultiValues::from_form_urlencoded(actual);
        self.parameters.matches(diff, &candidate)
    }

    fn is_blank(&self) -> bool {
        self.parameters.is_blank()
    }
}
