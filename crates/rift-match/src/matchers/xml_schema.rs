//! XML Schema validation for the commonly used XSD subset.
//!
//! The schema document is parsed once into an owned model so the matcher can
//! be shared across threads. Supported: global and local elements (`name`,
//! `type`, `ref`, `minOccurs`, `maxOccurs`), named and anonymous
//! `complexType` with `sequence`, `all` and `choice`, `attribute` with
//! `use="required"`, `simpleContent` extensions, `simpleType` restrictions
//! and the common built-in types. Anything else is accepted permissively.

use super::diff::MatchDifference;
use super::string::full_match_regex;
use super::{Compiled, Matcher};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::collections::HashMap;
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};
use sxd_document::parser;

fn local_name(qualified: &str) -> &str {
    qualified.rsplit(':').next().unwrap_or(qualified)
}

fn child_elements<'d>(element: &Element<'d>) -> Vec<Element<'d>> {
    element
        .children()
        .into_iter()
        .filter_map(|child| match child {
            ChildOfElement::Element(child) => Some(child),
            _ => None,
        })
        .collect()
}

fn text_of(element: &Element<'_>) -> String {
    element
        .children()
        .into_iter()
        .filter_map(|child| match child {
            ChildOfElement::Text(t) => Some(t.text().to_string()),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Occurs {
    min: usize,
    max: Option<usize>,
}

impl Occurs {
    fn of(element: &Element<'_>) -> Self {
        let min = element
            .attribute_value("minOccurs")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        let max = match element.attribute_value("maxOccurs") {
            Some("unbounded") => None,
            Some(v) => Some(v.parse().unwrap_or(1)),
            None => Some(1),
        };
        Self { min, max }
    }

    fn allows_more(&self, count: usize) -> bool {
        self.max.map_or(true, |max| count < max)
    }
}

enum TypeRef {
    Named(String),
    Complex(Box<ComplexType>),
    Simple(SimpleType),
}

struct ElementDecl {
    name: String,
    reference: Option<String>,
    type_ref: TypeRef,
    occurs: Occurs,
}

enum Particle {
    Element(ElementDecl),
    Group(Group),
    Any(Occurs),
}

#[derive(Clone, Copy, PartialEq)]
enum GroupKind {
    Sequence,
    Choice,
    All,
}

struct Group {
    kind: GroupKind,
    particles: Vec<Particle>,
    occurs: Occurs,
}

enum Content {
    Empty,
    Elements(Group),
    Simple(String),
    Open,
}

struct AttributeDecl {
    name: String,
    type_name: String,
    required: bool,
}

struct ComplexType {
    content: Content,
    attributes: Vec<AttributeDecl>,
    mixed: bool,
    open_attributes: bool,
}

#[derive(Default)]
struct SimpleType {
    base: String,
    enumeration: Vec<String>,
    patterns: Vec<Regex>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    min_inclusive: Option<f64>,
    max_inclusive: Option<f64>,
}

/// Parsed schema document.
pub(crate) struct Schema {
    elements: HashMap<String, ElementDecl>,
    complex_types: HashMap<String, ComplexType>,
    simple_types: HashMap<String, SimpleType>,
}

impl Schema {
    pub(crate) fn parse(source: &str) -> Result<Self, String> {
        let package = parser::parse(source).map_err(|e| format!("{e:?}"))?;
        let document = package.as_document();
        let root = document
            .root()
            .children()
            .into_iter()
            .find_map(|child| match child {
                ChildOfRoot::Element(element) => Some(element),
                _ => None,
            })
            .ok_or_else(|| "schema has no root element".to_string())?;
        if root.name().local_part() != "schema" {
            return Err(format!(
                "expected a schema document but found <{}>",
                root.name().local_part()
            ));
        }

        let mut schema = Schema {
            elements: HashMap::new(),
            complex_types: HashMap::new(),
            simple_types: HashMap::new(),
        };
        for child in child_elements(&root) {
            let name = child.attribute_value("name").map(str::to_string);
            match (child.name().local_part(), name) {
                ("element", Some(name)) => {
                    schema.elements.insert(name, parse_element(&child)?);
                }
                ("complexType", Some(name)) => {
                    schema.complex_types.insert(name, parse_complex_type(&child)?);
                }
                ("simpleType", Some(name)) => {
                    schema.simple_types.insert(name, parse_simple_type(&child)?);
                }
                _ => {}
            }
        }
        Ok(schema)
    }

    pub(crate) fn validate(&self, xml: &str) -> Vec<String> {
        let package = match parser::parse(xml) {
            Ok(package) => package,
            Err(e) => return vec![format!("unable to parse xml: {e:?}")],
        };
        let document = package.as_document();
        let Some(root) = document.root().children().into_iter().find_map(|child| match child {
            ChildOfRoot::Element(element) => Some(element),
            _ => None,
        }) else {
            return vec!["document has no root element".to_string()];
        };
        let name = root.name().local_part().to_string();
        let mut errors = Vec::new();
        match self.elements.get(&name) {
            Some(declaration) => {
                self.validate_element(declaration, &root, &format!("/{name}"), &mut errors)
            }
            None => errors.push(format!("no declaration found for root element <{name}>")),
        }
        errors
    }

    fn resolve<'a>(&'a self, declaration: &'a ElementDecl) -> &'a ElementDecl {
        match &declaration.reference {
            Some(reference) => self.elements.get(reference).unwrap_or(declaration),
            None => declaration,
        }
    }

    fn validate_element(
        &self,
        declaration: &ElementDecl,
        element: &Element<'_>,
        path: &str,
        errors: &mut Vec<String>,
    ) {
        let declaration = self.resolve(declaration);
        match &declaration.type_ref {
            TypeRef::Complex(complex) => self.validate_complex(complex, element, path, errors),
            TypeRef::Simple(simple) => self.validate_simple_element(simple, element, path, errors),
            TypeRef::Named(name) => {
                let name = local_name(name);
                if let Some(complex) = self.complex_types.get(name) {
                    self.validate_complex(complex, element, path, errors);
                } else if let Some(simple) = self.simple_types.get(name) {
                    self.validate_simple_element(simple, element, path, errors);
                } else if name != "anyType" {
                    if !child_elements(element).is_empty() {
                        errors.push(format!(
                            "{path}: element of type {name} must not have child elements"
                        ));
                    }
                    let text = text_of(element);
                    if !builtin_accepts(name, text.trim()) {
                        errors.push(format!(
                            "{path}: value \"{}\" is not a valid {name}",
                            text.trim()
                        ));
                    }
                }
            }
        }
    }

    fn validate_simple_element(
        &self,
        simple: &SimpleType,
        element: &Element<'_>,
        path: &str,
        errors: &mut Vec<String>,
    ) {
        if !child_elements(element).is_empty() {
            errors.push(format!("{path}: simple element must not have child elements"));
        }
        let text = text_of(element);
        self.check_simple_value(simple, text.trim(), path, errors);
    }

    fn check_named_value(
        &self,
        type_name: &str,
        value: &str,
        path: &str,
        errors: &mut Vec<String>,
    ) {
        let name = local_name(type_name);
        match self.simple_types.get(name) {
            Some(simple) => self.check_simple_value(simple, value, path, errors),
            None => {
                if !builtin_accepts(name, value) {
                    errors.push(format!("{path}: value \"{value}\" is not a valid {name}"));
                }
            }
        }
    }

    fn check_simple_value(
        &self,
        simple: &SimpleType,
        value: &str,
        path: &str,
        errors: &mut Vec<String>,
    ) {
        let base = local_name(&simple.base);
        let self_referencing = self
            .simple_types
            .get(base)
            .is_some_and(|resolved| std::ptr::eq(resolved, simple));
        if self_referencing {
            if !builtin_accepts(base, value) {
                errors.push(format!("{path}: value \"{value}\" is not a valid {base}"));
            }
        } else {
            self.check_named_value(&simple.base, value, path, errors);
        }
        if !simple.enumeration.is_empty() && !simple.enumeration.iter().any(|v| v == value) {
            errors.push(format!(
                "{path}: value \"{value}\" is not one of [{}]",
                simple.enumeration.join(", ")
            ));
        }
        if !simple.patterns.is_empty() && !simple.patterns.iter().any(|p| p.is_match(value)) {
            errors.push(format!("{path}: value \"{value}\" does not match the required pattern"));
        }
        let length = value.chars().count();
        if simple.min_length.is_some_and(|min| length < min)
            || simple.max_length.is_some_and(|max| length > max)
        {
            errors.push(format!("{path}: value \"{value}\" has invalid length {length}"));
        }
        if simple.min_inclusive.is_some() || simple.max_inclusive.is_some() {
            match value.parse::<f64>() {
                Ok(number) => {
                    if simple.min_inclusive.is_some_and(|min| number < min)
                        || simple.max_inclusive.is_some_and(|max| number > max)
                    {
                        errors.push(format!("{path}: value {value} is out of range"));
                    }
                }
                Err(_) => errors.push(format!("{path}: value \"{value}\" is not numeric")),
            }
        }
    }

    fn validate_complex(
        &self,
        complex: &ComplexType,
        element: &Element<'_>,
        path: &str,
        errors: &mut Vec<String>,
    ) {
        self.validate_attributes(complex, element, path, errors);
        let children = child_elements(element);
        let text = text_of(element);
        match &complex.content {
            Content::Open => {}
            Content::Simple(base) => {
                if !children.is_empty() {
                    errors.push(format!(
                        "{path}: element with simple content must not have child elements"
                    ));
                }
                self.check_named_value(base, text.trim(), path, errors);
            }
            Content::Empty => {
                if !children.is_empty() {
                    errors.push(format!(
                        "{path}: unexpected element <{}>",
                        children[0].name().local_part()
                    ));
                }
                if !complex.mixed && !text.trim().is_empty() {
                    errors.push(format!("{path}: text is not allowed"));
                }
            }
            Content::Elements(group) => {
                if !complex.mixed && !text.trim().is_empty() {
                    errors.push(format!("{path}: text is not allowed in element-only content"));
                }
                match self.consume_group(group, &children, 0, path, errors) {
                    Ok(consumed) if consumed == children.len() => {}
                    Ok(consumed) => errors.push(format!(
                        "{path}: unexpected element <{}>",
                        children[consumed].name().local_part()
                    )),
                    Err(message) => errors.push(message),
                }
            }
        }
    }

    fn validate_attributes(
        &self,
        complex: &ComplexType,
        element: &Element<'_>,
        path: &str,
        errors: &mut Vec<String>,
    ) {
        for declared in &complex.attributes {
            match element.attribute_value(declared.name.as_str()) {
                Some(value) => {
                    let attribute_path = format!("{path}/@{}", declared.name);
                    self.check_named_value(&declared.type_name, value, &attribute_path, errors);
                }
                None if declared.required => {
                    errors.push(format!("{path}: missing required attribute {}", declared.name));
                }
                None => {}
            }
        }
        if complex.open_attributes {
            return;
        }
        for attribute in element.attributes() {
            let name = attribute.name();
            if name.namespace_uri().is_some() {
                continue;
            }
            if !complex.attributes.iter().any(|a| a.name == name.local_part()) {
                errors.push(format!("{path}: attribute {} is not allowed", name.local_part()));
            }
        }
    }

    /// Consume children for a group, honouring its occurrence bounds.
    /// Returns the position after the last consumed child.
    fn consume_group(
        &self,
        group: &Group,
        children: &[Element<'_>],
        start: usize,
        path: &str,
        errors: &mut Vec<String>,
    ) -> Result<usize, String> {
        let mut position = start;
        let mut count = 0;
        while group.occurs.allows_more(count) && position < children.len() {
            match self.consume_group_once(group, children, position, path, errors) {
                Ok(next) if next > position => {
                    position = next;
                    count += 1;
                }
                Ok(_) => break,
                Err(e) if count >= group.occurs.min => {
                    tracing::trace!("stopping group repetition: {}", e);
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        if count < group.occurs.min {
            // a single pass over no children still validates required members
            self.consume_group_once(group, children, position, path, errors)?;
        }
        Ok(position)
    }

    fn consume_group_once(
        &self,
        group: &Group,
        children: &[Element<'_>],
        start: usize,
        path: &str,
        errors: &mut Vec<String>,
    ) -> Result<usize, String> {
        match group.kind {
            GroupKind::Sequence => {
                let mut position = start;
                for particle in &group.particles {
                    position = self.consume_particle(particle, children, position, path, errors)?;
                }
                Ok(position)
            }
            GroupKind::Choice => {
                let mut last_error = None;
                for particle in &group.particles {
                    let mut scratch = Vec::new();
                    match self.consume_particle(particle, children, start, path, &mut scratch) {
                        Ok(next) if next > start || group.particles.len() == 1 => {
                            errors.extend(scratch);
                            return Ok(next);
                        }
                        Ok(_) => {}
                        Err(e) => last_error = Some(e),
                    }
                }
                if group.particles.iter().any(|p| self.particle_min(p) == 0) {
                    return Ok(start);
                }
                Err(last_error.unwrap_or_else(|| {
                    format!("{path}: none of the choices matched")
                }))
            }
            GroupKind::All => {
                let mut seen = vec![false; group.particles.len()];
                let mut position = start;
                while position < children.len() {
                    let name = children[position].name().local_part();
                    let index = group.particles.iter().position(|p| match p {
                        Particle::Element(declaration) => self.resolve(declaration).name == name,
                        _ => false,
                    });
                    match index {
                        Some(index) if !seen[index] => {
                            seen[index] = true;
                            if let Particle::Element(declaration) = &group.particles[index] {
                                let child_path = format!("{path}/{name}");
                                let child = &children[position];
                                self.validate_element(declaration, child, &child_path, errors);
                            }
                            position += 1;
                        }
                        _ => break,
                    }
                }
                for (index, particle) in group.particles.iter().enumerate() {
                    if let Particle::Element(declaration) = particle {
                        if !seen[index] && declaration.occurs.min > 0 {
                            return Err(format!(
                                "{path}: missing required element <{}>",
                                self.resolve(declaration).name
                            ));
                        }
                    }
                }
                Ok(position)
            }
        }
    }

    fn particle_min(&self, particle: &Particle) -> usize {
        match particle {
            Particle::Element(declaration) => declaration.occurs.min,
            Particle::Group(group) => group.occurs.min,
            Particle::Any(occurs) => occurs.min,
        }
    }

    fn consume_particle(
        &self,
        particle: &Particle,
        children: &[Element<'_>],
        start: usize,
        path: &str,
        errors: &mut Vec<String>,
    ) -> Result<usize, String> {
        match particle {
            Particle::Element(declaration) => {
                let name = &self.resolve(declaration).name;
                let mut position = start;
                let mut count = 0;
                while declaration.occurs.allows_more(count)
                    && position < children.len()
                    && children[position].name().local_part() == name
                {
                    let child_path = format!("{path}/{name}");
                    self.validate_element(declaration, &children[position], &child_path, errors);
                    position += 1;
                    count += 1;
                }
                if count < declaration.occurs.min {
                    let found = children
                        .get(position)
                        .map(|child| format!("<{}>", child.name().local_part()))
                        .unwrap_or_else(|| "end of element".to_string());
                    return Err(format!("{path}: expected element <{name}> but found {found}"));
                }
                Ok(position)
            }
            Particle::Group(group) => self.consume_group(group, children, start, path, errors),
            Particle::Any(occurs) => {
                let available = children.len() - start;
                let take = occurs.max.map_or(available, |max| max.min(available));
                if take < occurs.min {
                    return Err(format!("{path}: expected at least {} more elements", occurs.min));
                }
                Ok(start + take)
            }
        }
    }
}

fn builtin_accepts(type_name: &str, value: &str) -> bool {
    match type_name {
        "boolean" => matches!(value, "true" | "false" | "1" | "0"),
        "int" | "integer" | "long" | "short" | "byte" => value.parse::<i64>().is_ok(),
        "nonNegativeInteger" | "unsignedInt" | "unsignedLong" | "unsignedShort"
        | "unsignedByte" => value.parse::<u64>().is_ok(),
        "positiveInteger" => value.parse::<u64>().is_ok_and(|v| v > 0),
        "negativeInteger" => value.parse::<i64>().is_ok_and(|v| v < 0),
        "nonPositiveInteger" => value.parse::<i64>().is_ok_and(|v| v <= 0),
        "decimal" | "double" | "float" => value.parse::<f64>().is_ok(),
        "date" => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        "dateTime" => {
            DateTime::parse_from_rfc3339(value).is_ok()
                || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        }
        _ => true,
    }
}

fn parse_element(element: &Element<'_>) -> Result<ElementDecl, String> {
    let occurs = Occurs::of(element);
    if let Some(reference) = element.attribute_value("ref") {
        let name = local_name(reference).to_string();
        return Ok(ElementDecl {
            name: name.clone(),
            reference: Some(name),
            type_ref: TypeRef::Named("anyType".to_string()),
            occurs,
        });
    }
    let name = element
        .attribute_value("name")
        .ok_or_else(|| "element declaration without name or ref".to_string())?
        .to_string();
    let type_ref = if let Some(type_name) = element.attribute_value("type") {
        TypeRef::Named(type_name.to_string())
    } else {
        let children = child_elements(element);
        if let Some(complex) = children.iter().find(|c| c.name().local_part() == "complexType") {
            TypeRef::Complex(Box::new(parse_complex_type(complex)?))
        } else if let Some(simple) = children
            .iter()
            .find(|c| c.name().local_part() == "simpleType")
        {
            TypeRef::Simple(parse_simple_type(simple)?)
        } else {
            TypeRef::Named("anyType".to_string())
        }
    };
    Ok(ElementDecl {
        name,
        reference: None,
        type_ref,
        occurs,
    })
}

fn parse_attribute(element: &Element<'_>) -> Option<AttributeDecl> {
    let name = element
        .attribute_value("name")
        .or_else(|| element.attribute_value("ref"))
        .map(|n| local_name(n).to_string())?;
    Some(AttributeDecl {
        name,
        type_name: element.attribute_value("type").unwrap_or("string").to_string(),
        required: element.attribute_value("use") == Some("required"),
    })
}

fn parse_group(element: &Element<'_>, kind: GroupKind) -> Result<Group, String> {
    let mut particles = Vec::new();
    for child in child_elements(element) {
        match child.name().local_part() {
            "element" => particles.push(Particle::Element(parse_element(&child)?)),
            "sequence" => {
                particles.push(Particle::Group(parse_group(&child, GroupKind::Sequence)?))
            }
            "choice" => particles.push(Particle::Group(parse_group(&child, GroupKind::Choice)?)),
            "any" => particles.push(Particle::Any(Occurs::of(&child))),
            _ => {}
        }
    }
    Ok(Group {
        kind,
        particles,
        occurs: Occurs::of(element),
    })
}

fn parse_complex_type(element: &Element<'_>) -> Result<ComplexType, String> {
    let mut complex = ComplexType {
        content: Content::Empty,
        attributes: Vec::new(),
        mixed: element.attribute_value("mixed") == Some("true"),
        open_attributes: false,
    };
    for child in child_elements(element) {
        match child.name().local_part() {
            "sequence" => {
                complex.content = Content::Elements(parse_group(&child, GroupKind::Sequence)?)
            }
            "choice" => {
                complex.content = Content::Elements(parse_group(&child, GroupKind::Choice)?)
            }
            "all" => complex.content = Content::Elements(parse_group(&child, GroupKind::All)?),
            "attribute" => complex.attributes.extend(parse_attribute(&child)),
            "anyAttribute" => complex.open_attributes = true,
            "simpleContent" => {
                for derivation in child_elements(&child) {
                    let base = derivation.attribute_value("base").unwrap_or("string").to_string();
                    complex.content = Content::Simple(base);
                    for attribute in child_elements(&derivation) {
                        match attribute.name().local_part() {
                            "attribute" => complex.attributes.extend(parse_attribute(&attribute)),
                            "anyAttribute" => complex.open_attributes = true,
                            _ => {}
                        }
                    }
                }
            }
            "complexContent" => {
                complex.content = Content::Open;
                complex.open_attributes = true;
            }
            _ => {}
        }
    }
    Ok(complex)
}

fn parse_simple_type(element: &Element<'_>) -> Result<SimpleType, String> {
    let mut simple = SimpleType {
        base: "anySimpleType".to_string(),
        ..Default::default()
    };
    let Some(restriction) = child_elements(element)
        .into_iter()
        .find(|c| c.name().local_part() == "restriction")
    else {
        return Ok(simple);
    };
    if let Some(base) = restriction.attribute_value("base") {
        simple.base = base.to_string();
    }
    for facet in child_elements(&restriction) {
        let Some(value) = facet.attribute_value("value") else {
            continue;
        };
        match facet.name().local_part() {
            "enumeration" => simple.enumeration.push(value.to_string()),
            "pattern" => simple.patterns.push(
                full_match_regex(value, false)
                    .map_err(|e| format!("invalid pattern {value}: {e}"))?,
            ),
            "length" => {
                simple.min_length = value.parse().ok();
                simple.max_length = simple.min_length;
            }
            "minLength" => simple.min_length = value.parse().ok(),
            "maxLength" => simple.max_length = value.parse().ok(),
            "minInclusive" => simple.min_inclusive = value.parse().ok(),
            "maxInclusive" => simple.max_inclusive = value.parse().ok(),
            _ => {}
        }
    }
    Ok(simple)
}

/// Validates request bodies against an XSD document.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlSchemaMatcher {
    schema: Compiled<Schema>,
}

impl XmlSchemaMatcher {
    pub fn new(schema: &str) -> Self {
        Self {
            schema: Compiled::build(schema, Schema::parse),
        }
    }
}

impl Matcher<str> for XmlSchemaMatcher {
    fn matches(&self, diff: &mut MatchDifference, actual: &str) -> bool {
        if self.is_blank() {
            return true;
        }
        let Some(schema) = self.schema.get() else {
            diff.add(format_args!("xml schema {} is invalid", self.schema.source()));
            return false;
        };
        let errors = schema.validate(actual);
        if !errors.is_empty() {
            tracing::trace!("xml schema validation failed: {:?}", errors);
            diff.add(format_args!(
                "xml schema match failed expected:\n\n  {}\n\n found:\n\n  {}\
                 \n\n failed because:\n\n  {}\n",
                self.schema.source(),
                actual,
                errors.join(",\n  ")
            ));
        }
        errors.is_empty()
    }

    fn is_blank(&self) -> bool {
        self.schema.source().trim().is_empty()
    }
}
