//! Per-evaluation match diagnostics.

use std::collections::BTreeMap;
use std::fmt;

/// Request facet a difference is recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Method,
    Path,
    PathParameters,
    QueryParameters,
    Cookies,
    Headers,
    Body,
    SslMatches,
    KeepAlive,
    Operation,
    OpenApi,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Method => "method",
            Field::Path => "path",
            Field::PathParameters => "pathParameters",
            Field::QueryParameters => "queryParameters",
            Field::Cookies => "cookies",
            Field::Headers => "headers",
            Field::Body => "body",
            Field::SslMatches => "sslMatches",
            Field::KeepAlive => "keep-alive",
            Field::Operation => "operation",
            Field::OpenApi => "openapi",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Records why fields failed to match.
///
/// Created per match call and never shared. When detailed failures are
/// disabled every write is dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchDifference {
    detailed: bool,
    correlation_id: String,
    current_field: Option<Field>,
    differences: BTreeMap<Field, Vec<String>>,
}

impl MatchDifference {
    pub fn new(detailed: bool) -> Self {
        Self {
            detailed,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            current_field: None,
            differences: BTreeMap::new(),
        }
    }

    /// A sink that records nothing.
    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// A fresh context sharing this one's settings and correlation id.
    pub fn child(&self) -> Self {
        Self {
            detailed: self.detailed,
            correlation_id: self.correlation_id.clone(),
            current_field: None,
            differences: BTreeMap::new(),
        }
    }

    pub fn is_detailed(&self) -> bool {
        self.detailed
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn set_current_field(&mut self, field: Field) -> &mut Self {
        self.current_field = Some(field);
        self
    }

    pub fn current_field(&self) -> Option<Field> {
        self.current_field
    }

    pub fn add_difference(&mut self, field: Field, message: fmt::Arguments<'_>) -> &mut Self {
        if self.detailed {
            self.differences
                .entry(field)
                .or_default()
                .push(message.to_string());
        }
        self
    }

    /// Record against the current field; dropped when no field is selected.
    pub fn add(&mut self, message: fmt::Arguments<'_>) -> &mut Self {
        if let Some(field) = self.current_field {
            self.add_difference(field, message);
        }
        self
    }

    pub fn differences(&self, field: Field) -> &[String] {
        self.differences
            .get(&field)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_differences(&self) -> &BTreeMap<Field, Vec<String>> {
        &self.differences
    }

    /// Fold another context's differences into this one.
    pub fn merge(&mut self, other: MatchDifference) {
        if !self.detailed {
            return;
        }
        for (field, messages) in other.differences {
            self.differences.entry(field).or_default().extend(messages);
        }
    }
}

/// Counts failed fields for fail-fast decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchDifferenceCount {
    failures: usize,
}

impl MatchDifferenceCount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_failures(&mut self) {
        self.failures += 1;
    }

    pub fn failures(&self) -> usize {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_records_nothing() {
        let mut diff = MatchDifference::disabled();
        diff.set_current_field(Field::Path)
            .add(format_args!("path didn't match"));
        assert!(diff.differences(Field::Path).is_empty());
    }

    #[test]
    fn test_records_against_current_field() {
        let mut diff = MatchDifference::new(true);
        diff.add(format_args!("no field selected yet"));
        diff.set_current_field(Field::Headers)
            .add(format_args!("missing {}", "Accept"));
        diff.add_difference(Field::Body, format_args!("body mismatch"));

        assert_eq!(diff.differences(Field::Headers), ["missing Accept"]);
        assert_eq!(diff.differences(Field::Body), ["body mismatch"]);
        assert_eq!(diff.all_differences().len(), 2);
    }

    #[test]
    fn test_merge_and_child() {
        let mut parent = MatchDifference::new(true).with_correlation_id("abc");
        let mut child = parent.child();
        assert_eq!(child.correlation_id(), "abc");
        child.add_difference(Field::Operation, format_args!("operation mismatch"));
        parent.merge(child);
        assert_eq!(parent.differences(Field::Operation).len(), 1);
    }

    #[test]
    fn test_field_names() {
        assert_eq!(Field::KeepAlive.to_string(), "keep-alive");
        assert_eq!(Field::SslMatches.to_string(), "sslMatches");
        assert_eq!(Field::QueryParameters.to_string(), "queryParameters");
    }

    #[test]
    fn test_failure_count() {
        let mut count = MatchDifferenceCount::new();
        count.increment_failures();
        count.increment_failures();
        assert_eq!(count.failures(), 2);
    }
}
