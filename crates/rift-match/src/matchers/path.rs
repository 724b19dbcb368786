//! Path templates such as `/pets/{petId}`.

use crate::model::{KeysToMultiValues, NottableString};

/// Name of a whole-segment template (`{id}`, `{.id}`, `{;id}`, `{id*}`).
fn template_name(segment: &str) -> Option<&str> {
    let inner = segment.strip_prefix('{')?.strip_suffix('}')?;
    if inner.contains(['{', '}']) {
        return None;
    }
    let inner = inner.trim_start_matches(['.', ';']).trim_end_matches('*');
    (!inner.is_empty()).then_some(inner)
}

/// Split on `/`, dropping trailing empty segments.
fn segments(path: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = path.split('/').collect();
    while parts.len() > 1 && parts.last().is_some_and(|part| part.is_empty()) {
        parts.pop();
    }
    parts
}

/// Replace `{name}` templates with a single-segment wildcard so the path can
/// be used as a regex. Only applies when path parameters are declared.
pub fn normalise_path(
    path: &NottableString,
    path_parameters: &KeysToMultiValues,
) -> NottableString {
    if path_parameters.is_empty() || !path.value().contains('{') {
        return path.clone();
    }
    let mut normalised = String::with_capacity(path.value().len());
    let mut rest = path.value();
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|close| open + close) else {
            break;
        };
        if rest[open + 1..close].contains('{') {
            normalised.push_str(&rest[..open + 1]);
            rest = &rest[open + 1..];
            continue;
        }
        normalised.push_str(&rest[..open]);
        normalised.push_str("[^/]*");
        rest = &rest[close + 1..];
    }
    normalised.push_str(rest);
    NottableString::exact(normalised).negated(path.is_not())
}

/// Extract template values from `actual`, segment by segment.
///
/// Multiple values in one segment are comma separated.
pub fn extract_path_parameters(
    matcher_path: &NottableString,
    actual: &str,
) -> Result<KeysToMultiValues, String> {
    let mut parameters = KeysToMultiValues::new();
    if !matcher_path.value().contains('{') {
        return Ok(parameters);
    }
    let expected_parts = segments(matcher_path.value());
    let actual_parts = segments(actual);
    if expected_parts.len() != actual_parts.len() {
        return Err(format!(
            "matcher path {} has {} parts but matched path {} has {} parts ",
            matcher_path.value(),
            expected_parts.len(),
            actual,
            actual_parts.len()
        ));
    }
    for (expected, actual) in expected_parts.iter().zip(&actual_parts) {
        let Some(name) = template_name(expected) else {
            continue;
        };
        let decoded = urlencoding::decode(actual)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| actual.to_string());
        for value in decoded.split(',') {
            parameters.add(NottableString::exact(name), NottableString::exact(value));
        }
    }
    Ok(parameters)
}
