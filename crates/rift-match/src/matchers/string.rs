//! String matchers: exact, substring and regex.

use super::diff::MatchDifference;
use super::schema::SchemaValueMatcher;
use super::{Compiled, Matcher};
use crate::model::NottableString;
use regex::{Regex, RegexBuilder};

const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Compile `pattern` so that it must match the whole candidate.
pub(crate) fn full_match_regex(pattern: &str, ignore_case: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(ignore_case)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
}

fn has_regex_syntax(value: &str) -> bool {
    regex::escape(value) != value
}

fn equals(expected: &str, actual: &str, ignore_case: bool) -> bool {
    if ignore_case {
        expected.to_lowercase() == actual.to_lowercase()
    } else {
        expected == actual
    }
}

/// Bidirectional regex match of two plain strings.
///
/// True when the strings are equal, when `actual` satisfies `expected` as a
/// pattern, or when `expected` satisfies `actual` as a pattern.
pub fn regex_matches(expected: &str, actual: &str, ignore_case: bool) -> bool {
    if equals(expected, actual, ignore_case) {
        return true;
    }
    let forward = match full_match_regex(expected, ignore_case) {
        Ok(regex) => regex.is_match(actual),
        Err(e) => {
            tracing::trace!("invalid regex \"{}\": {}", expected, e);
            false
        }
    };
    forward || reverse_matches(expected, actual, ignore_case)
}

fn reverse_matches(expected: &str, actual: &str, ignore_case: bool) -> bool {
    // a candidate without metacharacters only matches itself, which equality covers
    if !has_regex_syntax(actual) {
        return false;
    }
    match full_match_regex(actual, ignore_case) {
        Ok(regex) => regex.is_match(expected),
        Err(e) => {
            tracing::trace!("candidate \"{}\" is not a valid regex: {}", actual, e);
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CompiledValue {
    Blank,
    Text(Compiled<Regex>),
    Schema(SchemaValueMatcher),
}

/// Regex matcher over a [`NottableString`].
///
/// The pattern is compiled once. An invalid pattern still matches equal
/// strings and reverse patterns, but never as a regex.
#[derive(Debug, Clone, PartialEq)]
pub struct RegexStringMatcher {
    matcher: NottableString,
    compiled: CompiledValue,
    ignore_case: bool,
}

impl RegexStringMatcher {
    pub fn new(matcher: NottableString, ignore_case: bool) -> Self {
        let compiled = if let Some(schema) = matcher.schema_value() {
            CompiledValue::Schema(SchemaValueMatcher::new(schema))
        } else if matcher.is_blank() {
            CompiledValue::Blank
        } else {
            CompiledValue::Text(Compiled::build(matcher.value(), |pattern| {
                full_match_regex(pattern, ignore_case).map_err(|e| e.to_string())
            }))
        };
        Self {
            matcher,
            compiled,
            ignore_case,
        }
    }

    pub fn matcher(&self) -> &NottableString {
        &self.matcher
    }

    /// Match ignoring negation on either side.
    pub fn matches_value(&self, actual: &str) -> bool {
        match &self.compiled {
            CompiledValue::Blank => true,
            CompiledValue::Schema(schema) => schema.matches_str(actual),
            CompiledValue::Text(compiled) => {
                let expected = self.matcher.value();
                if equals(expected, actual, self.ignore_case) {
                    return true;
                }
                if compiled.get().is_some_and(|regex| regex.is_match(actual)) {
                    return true;
                }
                reverse_matches(expected, actual, self.ignore_case)
            }
        }
    }

    /// Match a candidate, applying both sides' negation.
    pub fn matches_nottable(&self, actual: &NottableString) -> bool {
        if matches!(self.compiled, CompiledValue::Blank) {
            return true;
        }
        self.matches_value(actual.value()) ^ self.matcher.is_not() ^ actual.is_not()
    }
}

impl Matcher<NottableString> for RegexStringMatcher {
    fn matches(&self, diff: &mut MatchDifference, actual: &NottableString) -> bool {
        let result = self.matches_nottable(actual);
        if !result {
            diff.add(format_args!(
                "string or regex match failed expected:\n\n  {}\n\n found:\n\n  {}\n",
                self.matcher, actual
            ));
        }
        result
    }

    fn is_blank(&self) -> bool {
        matches!(self.compiled, CompiledValue::Blank)
    }
}

impl Matcher<str> for RegexStringMatcher {
    fn matches(&self, diff: &mut MatchDifference, actual: &str) -> bool {
        self.matches(diff, &NottableString::exact(actual))
    }

    fn is_blank(&self) -> bool {
        matches!(self.compiled, CompiledValue::Blank)
    }
}

/// Exact string equality, optionally ignoring case.
#[derive(Debug, Clone, PartialEq)]
pub struct ExactStringMatcher {
    matcher: NottableString,
    ignore_case: bool,
}

impl ExactStringMatcher {
    pub fn new(matcher: NottableString, ignore_case: bool) -> Self {
        Self {
            matcher,
            ignore_case,
        }
    }
}

impl Matcher<NottableString> for ExactStringMatcher {
    fn matches(&self, diff: &mut MatchDifference, actual: &NottableString) -> bool {
        if self.matcher.value().is_empty() {
            return true;
        }
        let result = equals(self.matcher.value(), actual.value(), self.ignore_case)
            ^ self.matcher.is_not()
            ^ actual.is_not();
        if !result {
            diff.add(format_args!(
                "exact string match failed expected:\n\n  {}\n\n found:\n\n  {}\n",
                self.matcher, actual
            ));
        }
        result
    }

    fn is_blank(&self) -> bool {
        self.matcher.value().is_empty()
    }
}

/// Substring containment, optionally ignoring case.
#[derive(Debug, Clone, PartialEq)]
pub struct SubStringMatcher {
    matcher: NottableString,
    ignore_case: bool,
}

impl SubStringMatcher {
    pub fn new(matcher: NottableString, ignore_case: bool) -> Self {
        Self {
            matcher,
            ignore_case,
        }
    }
}

impl Matcher<NottableString> for SubStringMatcher {
    fn matches(&self, diff: &mut MatchDifference, actual: &NottableString) -> bool {
        if self.matcher.value().is_empty() {
            return true;
        }
        let contained = if self.ignore_case {
            actual
                .value()
                .to_lowercase()
                .contains(&self.matcher.value().to_lowercase())
        } else {
            actual.value().contains(self.matcher.value())
        };
        let result = contained ^ self.matcher.is_not() ^ actual.is_not();
        if !result {
            diff.add(format_args!(
                "substring match failed expected:\n\n  {}\n\n found:\n\n  {}\n",
                self.matcher, actual
            ));
        }
        result
    }

    fn is_blank(&self) -> bool {
        self.matcher.value().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::diff::Field;

    fn regex(pattern: &str) -> RegexStringMatcher {
        RegexStringMatcher::new(NottableString::string(pattern), false)
    }

    fn matches(matcher: &RegexStringMatcher, actual: &str) -> bool {
        Matcher::<str>::matches(matcher, &mut MatchDifference::disabled(), actual)
    }

    #[test]
    fn test_regex_full_match() {
        let matcher = regex("/a.*");
        assert!(matches(&matcher, "/abc"));
        assert!(!matches(&matcher, "/b/abc"));
    }

    #[test]
    fn test_regex_reverse_direction() {
        let matcher = regex("/abc");
        assert!(matches(&matcher, "/a.*"));
        assert!(regex_matches("/abc", "/a.*", false));
        assert!(regex_matches("/a.*", "/abc", false));
    }

    #[test]
    fn test_invalid_regex_is_no_match() {
        let matcher = regex("[unclosed");
        assert!(!matches(&matcher, "x"));
        assert!(matches(&matcher, "[unclosed"));
        assert!(!regex_matches("(", "abc", false));
    }

    #[test]
    fn test_blank_matches_everything() {
        assert!(matches(&regex(""), "anything"));
        let notted_blank = RegexStringMatcher::new(NottableString::not(""), false);
        assert!(matches(&notted_blank, "anything"));
    }

    #[test]
    fn test_not_on_either_side() {
        let not_get = regex("!GET");
        assert!(!matches(&not_get, "GET"));
        assert!(matches(&not_get, "POST"));

        let get = regex("GET");
        let mut diff = MatchDifference::disabled();
        assert!(!get.matches(&mut diff, &NottableString::not("GET")));
        assert!(not_get.matches(&mut diff, &NottableString::not("GET")));
    }

    #[test]
    fn test_ignore_case() {
        let matcher = RegexStringMatcher::new(NottableString::string("content-TYPE"), true);
        assert!(matches(&matcher, "Content-Type"));
        assert!(!matches(&regex("content-TYPE"), "Content-Type"));
    }

    #[test]
    fn test_records_difference() {
        let matcher = regex("GET");
        let mut diff = MatchDifference::new(true);
        diff.set_current_field(Field::Method);
        assert!(!Matcher::<str>::matches(&matcher, &mut diff, "POST"));
        assert_eq!(diff.differences(Field::Method).len(), 1);
        assert!(diff.differences(Field::Method)[0].contains("POST"));
    }

    #[test]
    fn test_exact_and_substring() {
        let mut diff = MatchDifference::disabled();
        let exact = ExactStringMatcher::new(NottableString::exact("hello"), false);
        assert!(exact.matches(&mut diff, &NottableString::exact("hello")));
        assert!(!exact.matches(&mut diff, &NottableString::exact("hello world")));

        let exact_ci = ExactStringMatcher::new(NottableString::exact("hello"), true);
        assert!(exact_ci.matches(&mut diff, &NottableString::exact("HELLO")));

        let sub = SubStringMatcher::new(NottableString::exact("api"), false);
        assert!(sub.matches(&mut diff, &NottableString::exact("this is an api call")));
        assert!(!sub.matches(&mut diff, &NottableString::exact("no match")));

        let blank = SubStringMatcher::new(NottableString::exact(""), false);
        assert!(blank.matches(&mut diff, &NottableString::exact("anything")));
    }
}
