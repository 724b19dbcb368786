//! Multi-valued maps for headers, cookies, query and path parameters.

use super::nottable::NottableString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How a multimap matcher relates its entries to a candidate map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyMatchStyle {
    /// Every matcher entry needs a distinct candidate entry; extra candidate
    /// entries are ignored.
    #[default]
    SubSet,
    /// Every candidate value under a matching key must satisfy one of the
    /// matcher's values for that key.
    MatchingKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyToMultiValue {
    pub name: NottableString,
    pub values: Vec<NottableString>,
}

impl KeyToMultiValue {
    pub fn new(name: impl Into<NottableString>, values: Vec<NottableString>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeysToMultiValues {
    entries: Vec<KeyToMultiValue>,
    key_match_style: KeyMatchStyle,
}

impl KeysToMultiValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<KeyToMultiValue>) -> Self {
        Self {
            entries,
            key_match_style: KeyMatchStyle::default(),
        }
    }

    pub fn with_key_match_style(mut self, style: KeyMatchStyle) -> Self {
        self.key_match_style = style;
        self
    }

    pub fn set_key_match_style(&mut self, style: KeyMatchStyle) {
        self.key_match_style = style;
    }

    pub fn key_match_style(&self) -> KeyMatchStyle {
        self.key_match_style
    }

    pub fn entries(&self) -> &[KeyToMultiValue] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Append a value, merging with an existing entry of the same name.
    pub fn add(&mut self, name: impl Into<NottableString>, value: impl Into<NottableString>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.values.push(value),
            None => self.entries.push(KeyToMultiValue::new(name, vec![value])),
        }
    }

    pub fn with(
        mut self,
        name: impl Into<NottableString>,
        value: impl Into<NottableString>,
    ) -> Self {
        self.add(name, value);
        self
    }

    /// Replace all values of an entry.
    pub fn replace(&mut self, name: impl Into<NottableString>, values: Vec<NottableString>) {
        let name = name.into();
        self.entries.retain(|entry| entry.name != name);
        self.entries.push(KeyToMultiValue::new(name, values));
    }

    /// Values stored under `name`, compared case-insensitively.
    pub fn values(&self, name: &str) -> Vec<&NottableString> {
        self.entries
            .iter()
            .filter(|entry| entry.name.value().eq_ignore_ascii_case(name))
            .flat_map(|entry| entry.values.iter())
            .collect()
    }

    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(|value| value.value())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.name.value().eq_ignore_ascii_case(name))
    }

    /// Flattened `(key, value)` pairs; a key without values yields one pair
    /// with an empty value.
    pub fn pairs(&self) -> Vec<(&NottableString, Option<&NottableString>)> {
        let mut pairs = Vec::new();
        for entry in &self.entries {
            if entry.values.is_empty() {
                pairs.push((&entry.name, None));
            }
            for value in &entry.values {
                pairs.push((&entry.name, Some(value)));
            }
        }
        pairs
    }

    /// Parse `a=1&b=2&a=3` form encoding.
    pub fn from_form_urlencoded(raw: &str) -> Self {
        let mut map = Self::new();
        for part in raw.split('&').filter(|part| !part.is_empty()) {
            let (name, value) = part.split_once('=').unwrap_or((part, ""));
            map.add(
                NottableString::exact(decode_form_component(name)),
                NottableString::exact(decode_form_component(value)),
            );
        }
        map
    }

    pub fn to_form_urlencoded(&self) -> String {
        self.pairs()
            .into_iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(name.value()),
                    urlencoding::encode(value.map(|v| v.value()).unwrap_or(""))
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    fn to_json_value(&self) -> Value {
        let mut map = Map::new();
        if self.key_match_style != KeyMatchStyle::default() {
            map.insert(
                "keyMatchStyle".to_string(),
                Value::String("MATCHING_KEY".to_string()),
            );
        }
        for entry in &self.entries {
            map.insert(
                entry.name.to_string(),
                Value::Array(entry.values.iter().map(NottableString::to_json_value).collect()),
            );
        }
        Value::Object(map)
    }

    fn from_json_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Array(items) => {
                let mut map = Self::default();
                for item in items {
                    let raw: KeyToMultiValueRaw =
                        serde_json::from_value(item).map_err(|e| e.to_string())?;
                    let mut values = raw.values;
                    values.extend(raw.value);
                    map.entries.push(KeyToMultiValue::new(raw.name, values));
                }
                Ok(map)
            }
            Value::Object(object) => {
                let mut map = Self::default();
                for (name, values) in object {
                    if name == "keyMatchStyle" {
                        map.key_match_style =
                            serde_json::from_value(values).map_err(|e| e.to_string())?;
                        continue;
                    }
                    let values = match values {
                        Value::Array(items) => items
                            .into_iter()
                            .map(serde_json::from_value)
                            .collect::<Result<Vec<NottableString>, _>>()
                            .map_err(|e| e.to_string())?,
                        other => vec![serde_json::from_value(other).map_err(|e| e.to_string())?],
                    };
                    map.entries
                        .push(KeyToMultiValue::new(NottableString::string(name), values));
                }
                Ok(map)
            }
            other => Err(format!("expected a map or a list of entries, found {other}")),
        }
    }
}

fn decode_form_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

#[derive(Deserialize)]
struct KeyToMultiValueRaw {
    name: NottableString,
    #[serde(default)]
    values: Vec<NottableString>,
    #[serde(default)]
    value: Option<NottableString>,
}

impl Serialize for KeysToMultiValues {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for KeysToMultiValues {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json_value(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_map_form() {
        let map: KeysToMultiValues = serde_json::from_value(json!({
            "Accept": ["text/html", "application/json"],
            "!X-Debug": "true",
            "keyMatchStyle": "MATCHING_KEY"
        }))
        .unwrap();

        assert_eq!(map.key_match_style(), KeyMatchStyle::MatchingKey);
        assert_eq!(map.values("accept").len(), 2);
        let debug = map
            .entries()
            .iter()
            .find(|entry| entry.name.value() == "X-Debug")
            .unwrap();
        assert!(debug.name.is_not());
    }

    #[test]
    fn test_deserialize_list_form() {
        let map: KeysToMultiValues = serde_json::from_value(json!([
            {"name": "session", "value": "abc"},
            {"name": "id", "values": ["1", "2"]}
        ]))
        .unwrap();

        assert_eq!(map.first_value("session"), Some("abc"));
        assert_eq!(map.values("id").len(), 2);
    }

    #[test]
    fn test_form_urlencoded() {
        let map = KeysToMultiValues::from_form_urlencoded("name=John+Smith&tag=a&tag=b%26c");
        assert_eq!(map.first_value("name"), Some("John Smith"));
        let tags: Vec<&str> = map.values("tag").iter().map(|v| v.value()).collect();
        assert_eq!(tags, vec!["a", "b&c"]);
    }

    #[test]
    fn test_add_merges_entries() {
        let map = KeysToMultiValues::new().with("a", "1").with("a", "2").with("b", "3");
        assert_eq!(map.len(), 2);
        assert_eq!(map.pairs().len(), 3);
    }
}
