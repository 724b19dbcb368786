//! Matcher for multi-valued maps: headers, cookies, query and path
//! parameters.
//!
//! Keys match case-insensitively and both keys and values may be regexes.
//! A notted key (`!name`) asserts the key is absent. An optional key
//! (`?name`) passes when absent, but must match when present.

use super::diff::MatchDifference;
use super::string::RegexStringMatcher;
use super::{assign_distinct, Matcher};
use crate::error::MatcherError;
use crate::model::{KeyMatchStyle, KeysToMultiValues, NottableString};

#[derive(Debug, Clone, PartialEq)]
struct CompiledEntry {
    name: NottableString,
    key: RegexStringMatcher,
    values: Vec<RegexStringMatcher>,
}

impl CompiledEntry {
    fn key_matches(&self, candidate: &NottableString) -> bool {
        self.key.matches_value(candidate.value()) ^ candidate.is_not()
    }

    fn value_matches(&self, index: usize, candidate: &NottableString) -> bool {
        self.values
            .get(index)
            .map_or(true, |matcher| matcher.matches_nottable(candidate))
    }

    fn any_value_matches(&self, candidate: &NottableString) -> bool {
        self.values.is_empty()
            || self
                .values
                .iter()
                .any(|matcher| matcher.matches_nottable(candidate))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiValueMapMatcher {
    entries: Vec<CompiledEntry>,
    style: KeyMatchStyle,
    expected: String,
}

impl MultiValueMapMatcher {
    pub fn new(map: &KeysToMultiValues) -> Result<Self, MatcherError> {
        let mut entries = Vec::with_capacity(map.len());
        for entry in map.entries() {
            if entry.name.is_optional() && entry.values.len() > 1 {
                return Err(MatcherError::OptionalKeyWithMultipleValues {
                    key: entry.name.to_string(),
                    values: entry
                        .values
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
            entries.push(CompiledEntry {
                name: entry.name.clone(),
                key: RegexStringMatcher::new(entry.name.positive(), true),
                values: entry
                    .values
                    .iter()
                    .map(|value| RegexStringMatcher::new(value.clone(), true))
                    .collect(),
            });
        }
        Ok(Self {
            entries,
            style: map.key_match_style(),
            expected: serde_json::to_string(map).unwrap_or_default(),
        })
    }

    fn sub_set(&self, candidate: &KeysToMultiValues) -> Result<(), String> {
        let empty = NottableString::default();
        let pairs: Vec<(&NottableString, &NottableString)> = candidate
            .pairs()
            .into_iter()
            .map(|(name, value)| (name, value.unwrap_or(&empty)))
            .collect();

        if pairs.is_empty() && self.entries.iter().all(|entry| entry.name.is_not()) {
            return Ok(());
        }

        let mut required: Vec<(usize, Option<usize>)> = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.name.is_not() {
                let present = pairs
                    .iter()
                    .any(|(name, value)| entry.key_matches(name) && entry.any_value_matches(value));
                if present {
                    return Err(format!("key {} should not be present", entry.name.value()));
                }
            } else if entry.name.is_optional() {
                let values: Vec<&NottableString> = pairs
                    .iter()
                    .filter(|(name, _)| entry.key_matches(name))
                    .map(|(_, value)| *value)
                    .collect();
                let any_matches = values.iter().any(|value| entry.any_value_matches(value));
                if !values.is_empty() && !any_matches {
                    return Err(format!(
                        "optional key {} is present with non-matching value",
                        entry.name.value()
                    ));
                }
            } else if entry.values.is_empty() {
                required.push((index, None));
            } else {
                required.extend((0..entry.values.len()).map(|value| (index, Some(value))));
            }
        }

        let fits: Vec<Vec<bool>> = required
            .iter()
            .map(|(entry, value)| {
                let entry = &self.entries[*entry];
                pairs
                    .iter()
                    .map(|(name, candidate)| {
                        entry.key_matches(name)
                            && value.map_or(true, |value| entry.value_matches(value, candidate))
                    })
                    .collect()
            })
            .collect();
        if assign_distinct(&fits, pairs.len()) {
            Ok(())
        } else {
            Err("not every expected entry has its own matching entry".to_string())
        }
    }

    fn matching_key(&self, candidate: &KeysToMultiValues) -> Result<(), String> {
        let empty = NottableString::default();
        let pairs = candidate.pairs();
        for entry in &self.entries {
            let values: Vec<&NottableString> = pairs
                .iter()
                .filter(|(name, _)| entry.key_matches(name))
                .map(|(_, value)| value.unwrap_or(&empty))
                .collect();
            if entry.name.is_not() {
                if values.iter().any(|value| entry.any_value_matches(value)) {
                    return Err(format!("key {} should not be present", entry.name.value()));
                }
                continue;
            }
            if values.is_empty() {
                if entry.name.is_optional() {
                    continue;
                }
                return Err(format!("no entry matches key {}", entry.name.value()));
            }
            if let Some(value) = values.iter().find(|value| !entry.any_value_matches(value)) {
                return Err(format!(
                    "value {} of key {} matches none of the expected values",
                    value,
                    entry.name.value()
                ));
            }
        }
        Ok(())
    }
}

impl Matcher<KeysToMultiValues> for MultiValueMapMatcher {
    fn matches(&self, diff: &mut MatchDifference, candidate: &KeysToMultiValues) -> bool {
        if self.is_blank() {
            return true;
        }
        let outcome = match self.style {
            KeyMatchStyle::SubSet => self.sub_set(candidate),
            KeyMatchStyle::MatchingKey => self.matching_key(candidate),
        };
        match outcome {
            Ok(()) => true,
            Err(reason) => {
                let style = match self.style {
                    KeyMatchStyle::SubSet => "subset",
                    KeyMatchStyle::MatchingKey => "matching key",
                };
                diff.add(format_args!(
                    "multimap {} match failed expected:\n\n  {}\n\n found:\n\n  {}\
                     \n\n failed because:\n\n  {}\n",
                    style,
                    self.expected,
                    serde_json::to_string(candidate).unwrap_or_default(),
                    reason
                ));
                false
            }
        }
    }

    fn is_blank(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyToMultiValue;

    fn matcher(map: KeysToMultiValues) -> MultiValueMapMatcher {
        MultiValueMapMatcher::new(&map).unwrap()
    }

    fn matches(matcher: &MultiValueMapMatcher, candidate: &KeysToMultiValues) -> bool {
        matcher.matches(&mut MatchDifference::disabled(), candidate)
    }

    #[test]
    fn test_empty_matcher_matches_everything() {
        let m = matcher(KeysToMultiValues::new());
        assert!(matches(&m, &KeysToMultiValues::new().with("a", "b")));
        assert!(matches(&m, &KeysToMultiValues::new()));
    }

    #[test]
    fn test_sub_set_with_regex_and_case_insensitive_keys() {
        let m = matcher(KeysToMultiValues::new().with("Authorization", "Bearer .+"));
        assert!(matches(
            &m,
            &KeysToMultiValues::new()
                .with("authorization", "Bearer abc")
                .with("Accept", "*/*")
        ));
        assert!(!matches(&m, &KeysToMultiValues::new().with("Accept", "*/*")));
        assert!(!matches(&m, &KeysToMultiValues::new()));
    }

    #[test]
    fn test_each_expected_value_needs_its_own_candidate() {
        let m = matcher(KeysToMultiValues::new().with("tag", "a.*").with("tag", "ab"));
        assert!(matches(&m, &KeysToMultiValues::new().with("tag", "ab").with("tag", "ax")));
        assert!(!matches(&m, &KeysToMultiValues::new().with("tag", "ab")));
    }

    #[test]
    fn test_notted_key_asserts_absence() {
        let m = matcher(KeysToMultiValues::from_entries(vec![KeyToMultiValue::new(
            NottableString::not("X-Debug"),
            vec![],
        )]));
        assert!(matches(&m, &KeysToMultiValues::new()));
        assert!(matches(&m, &KeysToMultiValues::new().with("Accept", "*/*")));
        assert!(!matches(&m, &KeysToMultiValues::new().with("x-debug", "1")));
    }

    #[test]
    fn test_notted_value() {
        let m = matcher(KeysToMultiValues::new().with("mode", "!test"));
        assert!(matches(&m, &KeysToMultiValues::new().with("mode", "live")));
        assert!(!matches(&m, &KeysToMultiValues::new().with("mode", "test")));
    }

    #[test]
    fn test_optional_key() {
        let m = matcher(KeysToMultiValues::new().with("?limit", "[0-9]+"));
        assert!(matches(&m, &KeysToMultiValues::new()));
        assert!(matches(&m, &KeysToMultiValues::new().with("limit", "10")));
        assert!(!matches(&m, &KeysToMultiValues::new().with("limit", "ten")));
    }

    #[test]
    fn test_optional_key_with_several_values_is_rejected() {
        let map = KeysToMultiValues::new().with("?limit", "1").with("?limit", "2");
        let err = MultiValueMapMatcher::new(&map).unwrap_err();
        assert!(matches!(err, MatcherError::OptionalKeyWithMultipleValues { .. }));
    }

    #[test]
    fn test_matching_key_style() {
        let m = matcher(
            KeysToMultiValues::new()
                .with("id", "[0-9]+")
                .with_key_match_style(KeyMatchStyle::MatchingKey),
        );
        assert!(matches(&m, &KeysToMultiValues::new().with("id", "1").with("id", "2")));
        assert!(!matches(&m, &KeysToMultiValues::new().with("id", "1").with("id", "x")));
        assert!(!matches(&m, &KeysToMultiValues::new().with("other", "1")));
    }

    #[test]
    fn test_difference_recorded() {
        use crate::matchers::diff::Field;
        let m = matcher(KeysToMultiValues::new().with("Accept", "application/json"));
        let mut diff = MatchDifference::new(true);
        diff.set_current_field(Field::Headers);
        assert!(!m.matches(&mut diff, &KeysToMultiValues::new().with("Accept", "text/html")));
        assert!(diff.differences(Field::Headers)[0].starts_with("multimap subset match failed"));
    }
}
