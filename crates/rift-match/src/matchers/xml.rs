//! XML document and XPath body matchers.

use super::diff::MatchDifference;
use super::{Compiled, Matcher};
use serde_json::{Map, Value};
use similar::TextDiff;
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Document, Element};
use sxd_document::parser;
use sxd_xpath::{evaluate_xpath, Value as XPathValue};

fn qualified_name(element: &Element<'_>) -> String {
    let name = element.name();
    match name.namespace_uri() {
        Some(namespace) => format!("{{{namespace}}}{}", name.local_part()),
        None => name.local_part().to_string(),
    }
}

fn root_element<'d>(document: &Document<'d>) -> Option<Element<'d>> {
    document.root().children().into_iter().find_map(|child| match child {
        ChildOfRoot::Element(element) => Some(element),
        _ => None,
    })
}

/// Render a document in a canonical indented form: sorted attributes,
/// trimmed text, comments and processing instructions dropped.
fn canonical(xml: &str) -> Result<String, String> {
    let package = parser::parse(xml).map_err(|e| format!("{e:?}"))?;
    let document = package.as_document();
    let root = root_element(&document).ok_or_else(|| "document has no root element".to_string())?;
    let mut out = String::new();
    write_element(&root, 0, &mut out);
    Ok(out)
}

fn write_element(element: &Element<'_>, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    out.push_str(&indent);
    out.push('<');
    out.push_str(&qualified_name(element));

    let mut attributes: Vec<(String, String)> = element
        .attributes()
        .into_iter()
        .map(|attribute| {
            let name = attribute.name();
            let key = match name.namespace_uri() {
                Some(namespace) => format!("{{{namespace}}}{}", name.local_part()),
                None => name.local_part().to_string(),
            };
            (key, attribute.value().to_string())
        })
        .collect();
    attributes.sort();
    for (name, value) in &attributes {
        out.push_str(&format!(" {name}=\"{value}\""));
    }

    let mut text = String::new();
    let mut children = Vec::new();
    for child in element.children() {
        match child {
            ChildOfElement::Element(child) => children.push(child),
            ChildOfElement::Text(t) => text.push_str(t.text()),
            _ => {}
        }
    }
    let text = text.trim();

    if children.is_empty() && text.is_empty() {
        out.push_str("/>\n");
        return;
    }
    out.push('>');
    if children.is_empty() {
        out.push_str(text);
    } else {
        out.push('\n');
        if !text.is_empty() {
            out.push_str(&format!("{indent}  {text}\n"));
        }
        for child in &children {
            write_element(child, depth + 1, out);
        }
        out.push_str(&indent);
    }
    out.push_str(&format!("</{}>\n", qualified_name(element)));
}

/// Compares documents after normalising both to the same canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlStringMatcher {
    source: String,
    expected: Option<String>,
}

impl XmlStringMatcher {
    pub fn new(source: &str) -> Self {
        let expected = if source.trim().is_empty() {
            None
        } else {
            match canonical(source) {
                Ok(expected) => Some(expected),
                Err(e) => {
                    tracing::trace!("unable to parse expected xml {}: {}", source, e);
                    None
                }
            }
        };
        Self {
            source: source.to_string(),
            expected,
        }
    }
}

impl Matcher<str> for XmlStringMatcher {
    fn matches(&self, diff: &mut MatchDifference, actual: &str) -> bool {
        if self.is_blank() {
            return true;
        }
        let Some(expected) = &self.expected else {
            diff.add(format_args!("expected xml {} is invalid", self.source));
            return false;
        };
        let found = match canonical(actual) {
            Ok(found) => found,
            Err(e) => {
                tracing::trace!("failed to parse candidate body as xml: {}", e);
                diff.add(format_args!(
                    "xml match failed expected:\n\n  {}\n\n found:\n\n  {}\
                     \n\n failed because:\n\n  {}\n",
                    self.source, actual, e
                ));
                return false;
            }
        };
        let result = *expected == found;
        if !result {
            let changes = TextDiff::from_lines(expected.as_str(), found.as_str())
                .unified_diff()
                .header("expected", "found")
                .to_string();
            diff.add(format_args!(
                "xml match failed expected:\n\n  {}\n\n found:\n\n  {}\n\n failed because:\n\n{}",
                self.source, actual, changes
            ));
        }
        result
    }

    fn is_blank(&self) -> bool {
        self.source.trim().is_empty()
    }
}

/// Matches when the expression evaluates to a non-empty node set, `true`,
/// a non-zero number or a non-empty string.
#[derive(Debug, Clone, PartialEq)]
pub struct XPathMatcher {
    expression: Compiled<()>,
}

impl XPathMatcher {
    pub fn new(expression: &str) -> Self {
        Self {
            expression: Compiled::build(expression, |e| {
                let probe = parser::parse("<xpath/>").map_err(|e| format!("{e:?}"))?;
                evaluate_xpath(&probe.as_document(), e)
                    .map(|_| ())
                    .map_err(|e| format!("{e:?}"))
            }),
        }
    }

    fn evaluate(&self, actual: &str) -> Result<bool, String> {
        // compiled expressions are not Send, so each evaluation parses again
        let package = parser::parse(actual).map_err(|e| format!("{e:?}"))?;
        let document = package.as_document();
        let value =
            evaluate_xpath(&document, self.expression.source()).map_err(|e| format!("{e:?}"))?;
        Ok(match value {
            XPathValue::Nodeset(nodes) => nodes.size() > 0,
            XPathValue::Boolean(b) => b,
            XPathValue::Number(n) => n != 0.0 && !n.is_nan(),
            XPathValue::String(s) => !s.is_empty(),
        })
    }
}

impl Matcher<str> for XPathMatcher {
    fn matches(&self, diff: &mut MatchDifference, actual: &str) -> bool {
        if self.is_blank() {
            return true;
        }
        if self.expression.get().is_none() {
            diff.add(format_args!("xpath {} is invalid", self.expression.source()));
            return false;
        }
        let result = match self.evaluate(actual) {
            Ok(result) => result,
            Err(e) => {
                tracing::trace!("xpath evaluation failed: {}", e);
                false
            }
        };
        if !result {
            diff.add(format_args!(
                "xpath match failed expected:\n\n  {}\n\n found:\n\n  {}\n",
                self.expression.source(),
                actual
            ));
        }
        result
    }

    fn is_blank(&self) -> bool {
        self.expression.source().trim().is_empty()
    }
}

/// Convert an XML document to JSON for JSON-family body matchers.
///
/// The root element is unwrapped, attributes become string fields, repeated
/// elements become arrays and text leaves become strings. Mixed text is kept
/// under the `""` key.
pub fn xml_to_json(xml: &str) -> Option<Value> {
    let package = parser::parse(xml).ok()?;
    let document = package.as_document();
    let root = root_element(&document)?;
    Some(element_to_json(&root))
}

fn element_to_json(element: &Element<'_>) -> Value {
    let mut map = Map::new();
    for attribute in element.attributes() {
        map.insert(
            attribute.name().local_part().to_string(),
            Value::String(attribute.value().to_string()),
        );
    }
    let mut text = String::new();
    for child in element.children() {
        match child {
            ChildOfElement::Element(child) => {
                let name = child.name().local_part().to_string();
                let value = element_to_json(&child);
                match map.get_mut(&name) {
                    Some(Value::Array(items)) => items.push(value),
                    Some(existing) => {
                        let first = existing.take();
                        *existing = Value::Array(vec![first, value]);
                    }
                    None => {
                        map.insert(name, value);
                    }
                }
            }
            ChildOfElement::Text(t) => text.push_str(t.text()),
            _ => {}
        }
    }
    let text = text.trim();
    if map.is_empty() {
        return Value::String(text.to_string());
    }
    if !text.is_empty() {
        map.insert(String::new(), Value::String(text.to_string()));
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::diff::Field;
    use serde_json::json;

    fn xml_matches(expected: &str, actual: &str) -> bool {
        XmlStringMatcher::new(expected).matches(&mut MatchDifference::disabled(), actual)
    }

    #[test]
    fn test_xml_ignores_formatting_and_attribute_order() {
        assert!(xml_matches(
            r#"<order id="1" kind="a"><item>x</item></order>"#,
            "<order kind=\"a\" id=\"1\">\n    <item> x </item>\n</order>"
        ));
        assert!(!xml_matches(
            r#"<order id="1"><item>x</item></order>"#,
            r#"<order id="2"><item>x</item></order>"#
        ));
        assert!(!xml_matches(r#"<order/>"#, "not xml"));
        assert!(xml_matches("", "not xml"));
    }

    #[test]
    fn test_xml_difference_is_a_diff() {
        let matcher = XmlStringMatcher::new("<a><b>1</b></a>");
        let mut diff = MatchDifference::new(true);
        diff.set_current_field(Field::Body);
        assert!(!matcher.matches(&mut diff, "<a><b>2</b></a>"));
        let message = &diff.differences(Field::Body)[0];
        assert!(message.contains("-  <b>1</b>"));
        assert!(message.contains("+  <b>2</b>"));
    }

    #[test]
    fn test_xpath() {
        let mut diff = MatchDifference::disabled();
        let body = "<order><item price=\"5\">a</item><item price=\"15\">b</item></order>";
        assert!(XPathMatcher::new("/order/item[@price > 10]").matches(&mut diff, body));
        assert!(!XPathMatcher::new("/order/item[@price > 20]").matches(&mut diff, body));
        assert!(XPathMatcher::new("count(/order/item) = 2").matches(&mut diff, body));
        assert!(!XPathMatcher::new("/order/item").matches(&mut diff, "not xml"));
        assert!(!XPathMatcher::new("/order/[").matches(&mut diff, body));
    }

    #[test]
    fn test_xml_to_json() {
        let converted = xml_to_json(
            r#"<order id="7"><item>a</item><item>b</item><note>hi</note></order>"#,
        )
        .unwrap();
        assert_eq!(
            converted,
            json!({"id": "7", "item": ["a", "b"], "note": "hi"})
        );
        assert!(xml_to_json("not xml").is_none());
    }
}
