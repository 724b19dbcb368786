//! Boolean, integer and binary matchers.

use super::diff::MatchDifference;
use super::Matcher;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;

/// `None` matches anything; otherwise the candidate must be present and equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BooleanMatcher {
    expected: Option<bool>,
}

impl BooleanMatcher {
    pub fn new(expected: Option<bool>) -> Self {
        Self { expected }
    }
}

impl Matcher<Option<bool>> for BooleanMatcher {
    fn matches(&self, diff: &mut MatchDifference, actual: &Option<bool>) -> bool {
        let Some(expected) = self.expected else {
            return true;
        };
        let result = *actual == Some(expected);
        if !result {
            diff.add(format_args!(
                "boolean match failed expected:\n\n  {}\n\n found:\n\n  {}\n",
                expected,
                actual.map_or_else(|| "null".to_string(), |v| v.to_string())
            ));
        }
        result
    }

    fn is_blank(&self) -> bool {
        self.expected.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntegerMatcher {
    expected: Option<i64>,
}

impl IntegerMatcher {
    pub fn new(expected: Option<i64>) -> Self {
        Self { expected }
    }
}

impl Matcher<Option<i64>> for IntegerMatcher {
    fn matches(&self, diff: &mut MatchDifference, actual: &Option<i64>) -> bool {
        let Some(expected) = self.expected else {
            return true;
        };
        let result = *actual == Some(expected);
        if !result {
            diff.add(format_args!(
                "integer match failed expected:\n\n  {}\n\n found:\n\n  {}\n",
                expected,
                actual.map_or_else(|| "null".to_string(), |v| v.to_string())
            ));
        }
        result
    }

    fn is_blank(&self) -> bool {
        self.expected.is_none()
    }
}

/// Byte-for-byte equality; an empty matcher accepts any body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BinaryMatcher {
    expected: Bytes,
}

impl BinaryMatcher {
    pub fn new(expected: Bytes) -> Self {
        Self { expected }
    }
}

impl Matcher<[u8]> for BinaryMatcher {
    fn matches(&self, diff: &mut MatchDifference, actual: &[u8]) -> bool {
        if self.expected.is_empty() {
            return true;
        }
        let result = self.expected.as_ref() == actual;
        if !result {
            diff.add(format_args!(
                "binary match failed expected:\n\n  {}\n\n found:\n\n  {}\n",
                BASE64.encode(&self.expected),
                BASE64.encode(actual)
            ));
        }
        result
    }

    fn is_blank(&self) -> bool {
        self.expected.is_empty()
    }
}
