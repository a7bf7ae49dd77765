//! Structural matcher engine.
//!
//! A [`MatcherNode`] tree describes what an acceptable value looks like. The
//! same tree is used in two directions: [`match_value`] checks an actual value
//! against it and collects every mismatch in one pass, and
//! [`MatcherNode::resolve_example`] synthesizes the concrete example value
//! served by the mock server.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PactError;

/// A node in a matcher tree.
#[derive(Debug, Clone, PartialEq)]
pub enum MatcherNode {
    /// Deep equality with the given value.
    Literal(Value),
    /// Same structural type as the example. Object keys absent from the
    /// example are ignored.
    TypeLike(Value),
    /// An array whose elements all match `element`, with at least `min_items`
    /// entries.
    EachLike {
        /// Template every element is matched against
        element: Box<MatcherNode>,
        /// Minimum array length
        min_items: usize,
    },
    /// A string fully matching `pattern`.
    Regex {
        /// Compiled pattern
        pattern: RegexPattern,
        /// Value served in responses
        example: String,
    },
    /// An object whose listed keys each match their own node.
    Object(BTreeMap<String, MatcherNode>),
    /// A fixed-length array matched element by element.
    Array(Vec<MatcherNode>),
}

/// Matcher variants ordered from least to most specific.
///
/// When more than one matcher targets the same path the highest one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Specificity {
    /// `EachLike`
    EachLike,
    /// `TypeLike`
    TypeLike,
    /// `Regex`
    Regex,
    /// `Literal`
    Literal,
}

/// A regular expression anchored to the whole input.
#[derive(Debug, Clone)]
pub struct RegexPattern {
    source: String,
    compiled: regex::Regex,
}

impl RegexPattern {
    /// Compile `source` so that it must match the entire input.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::InvalidMatcher`] if the pattern does not compile.
    pub fn new(source: impl Into<String>) -> Result<Self, PactError> {
        let source = source.into();
        let compiled = regex::Regex::new(&format!("^(?:{source})$"))
            .map_err(|e| PactError::invalid_matcher(format!("regex /{source}/: {e}")))?;
        Ok(Self { source, compiled })
    }

    /// The pattern as written by the caller.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `input` matches in full.
    #[must_use]
    pub fn is_match(&self, input: &str) -> bool {
        self.compiled.is_match(input)
    }
}

impl PartialEq for RegexPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Display for RegexPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.source)
    }
}

impl MatcherNode {
    /// Build a regex matcher, checking that the example satisfies the pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::InvalidMatcher`] for a pattern that does not
    /// compile or an example it rejects.
    pub fn regex(pattern: impl Into<String>, example: impl Into<String>) -> Result<Self, PactError> {
        let pattern = RegexPattern::new(pattern)?;
        let example = example.into();
        if !pattern.is_match(&example) {
            return Err(PactError::invalid_matcher(format!(
                "example {example:?} does not match {pattern}"
            )));
        }
        Ok(Self::Regex { pattern, example })
    }

    /// Build an array matcher around an element template.
    #[must_use]
    pub fn each_like(element: Self, min_items: usize) -> Self {
        Self::EachLike {
            element: Box::new(element),
            min_items,
        }
    }

    /// Specificity used for tie-breaking; containers have none.
    #[must_use]
    pub const fn specificity(&self) -> Option<Specificity> {
        match self {
            Self::Literal(_) => Some(Specificity::Literal),
            Self::Regex { .. } => Some(Specificity::Regex),
            Self::TypeLike(_) => Some(Specificity::TypeLike),
            Self::EachLike { .. } => Some(Specificity::EachLike),
            Self::Object(_) | Self::Array(_) => None,
        }
    }

    /// Pick the most specific of several matchers competing for one path.
    /// Earlier entries win among equals.
    #[must_use]
    pub fn most_specific(candidates: Vec<Self>) -> Option<Self> {
        let mut best: Option<Self> = None;
        for candidate in candidates {
            let replace = best
                .as_ref()
                .is_none_or(|current| candidate.specificity() > current.specificity());
            if replace {
                best = Some(candidate);
            }
        }
        best
    }

    /// The concrete value this node stands for in a response.
    #[must_use]
    pub fn resolve_example(&self) -> Value {
        match self {
            Self::Literal(value) | Self::TypeLike(value) => value.clone(),
            Self::Regex { example, .. } => Value::String(example.clone()),
            Self::EachLike { element, min_items } => {
                let item = element.resolve_example();
                Value::Array(vec![item; (*min_items).max(1)])
            }
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, node)| (key.clone(), node.resolve_example()))
                    .collect(),
            ),
            Self::Array(items) => Value::Array(items.iter().map(Self::resolve_example).collect()),
        }
    }

    /// Resolve the example and render it as a plain string (headers, paths,
    /// query values).
    #[must_use]
    pub fn resolve_string(&self) -> String {
        value_to_plain_string(&self.resolve_example())
    }
}

/// Why a value failed to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MismatchReason {
    /// Literal values differ
    #[serde(rename = "literal mismatch")]
    LiteralMismatch,
    /// Structural type differs
    #[serde(rename = "type mismatch")]
    TypeMismatch,
    /// Expected key absent
    #[serde(rename = "missing key")]
    MissingKey,
    /// String does not match pattern
    #[serde(rename = "regex mismatch")]
    RegexMismatch,
    /// Array shorter than `min_items`
    #[serde(rename = "too few items")]
    TooFewItems,
    /// Fixed-length array has the wrong length
    #[serde(rename = "length mismatch")]
    LengthMismatch,
    /// HTTP method differs
    #[serde(rename = "method mismatch")]
    MethodMismatch,
    /// Request path differs
    #[serde(rename = "path mismatch")]
    PathMismatch,
    /// Expected header absent
    #[serde(rename = "missing header")]
    MissingHeader,
    /// Expected query parameter absent
    #[serde(rename = "missing query parameter")]
    MissingQueryParameter,
    /// Query parameter not declared by the interaction
    #[serde(rename = "unexpected query parameter")]
    UnexpectedQueryParameter,
    /// Expected body absent
    #[serde(rename = "missing body")]
    MissingBody,
    /// Request could not be decoded
    #[serde(rename = "malformed request")]
    MalformedRequest,
}

impl MismatchReason {
    /// Human-readable reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LiteralMismatch => "literal mismatch",
            Self::TypeMismatch => "type mismatch",
            Self::MissingKey => "missing key",
            Self::RegexMismatch => "regex mismatch",
            Self::TooFewItems => "too few items",
            Self::LengthMismatch => "length mismatch",
            Self::MethodMismatch => "method mismatch",
            Self::PathMismatch => "path mismatch",
            Self::MissingHeader => "missing header",
            Self::MissingQueryParameter => "missing query parameter",
            Self::UnexpectedQueryParameter => "unexpected query parameter",
            Self::MissingBody => "missing body",
            Self::MalformedRequest => "malformed request",
        }
    }
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single path-level difference between expected and actual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    /// JSONPath-like location, e.g. `$.body.items[2].id`
    pub path: String,
    /// What the matcher wanted
    pub expected: String,
    /// What was received
    pub actual: String,
    /// Classification
    pub reason: MismatchReason,
}

impl Mismatch {
    /// Create a mismatch entry.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        reason: MismatchReason,
    ) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
            reason,
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (expected {}, got {})",
            self.path, self.reason, self.expected, self.actual
        )
    }
}

/// Result of matching one value against one tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Every mismatch found, in traversal order
    pub mismatches: Vec<Mismatch>,
}

impl MatchOutcome {
    /// Whether the value matched.
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Match `actual` against `node` with paths rooted at `$`.
#[must_use]
pub fn match_value(node: &MatcherNode, actual: &Value) -> MatchOutcome {
    match_value_at(node, actual, "$")
}

/// Match `actual` against `node` with paths rooted at `root`.
#[must_use]
pub fn match_value_at(node: &MatcherNode, actual: &Value, root: &str) -> MatchOutcome {
    let mut mismatches = Vec::new();
    match_node(node, actual, root, &mut mismatches);
    MatchOutcome { mismatches }
}

fn match_node(node: &MatcherNode, actual: &Value, path: &str, out: &mut Vec<Mismatch>) {
    match node {
        MatcherNode::Literal(expected) => {
            if !values_equal(expected, actual) {
                out.push(Mismatch::new(
                    path,
                    compact(expected),
                    compact(actual),
                    MismatchReason::LiteralMismatch,
                ));
            }
        }
        MatcherNode::TypeLike(example) => match_type(example, actual, path, out),
        MatcherNode::EachLike { element, min_items } => {
            let Value::Array(items) = actual else {
                out.push(Mismatch::new(
                    path,
                    "array",
                    type_name(actual),
                    MismatchReason::TypeMismatch,
                ));
                return;
            };
            if items.len() < *min_items {
                out.push(Mismatch::new(
                    path,
                    format!("at least {min_items} items"),
                    format!("{} items", items.len()),
                    MismatchReason::TooFewItems,
                ));
            }
            for (index, item) in items.iter().enumerate() {
                match_node(element, item, &path::index(path, index), out);
            }
        }
        MatcherNode::Regex { pattern, .. } => match actual {
            Value::String(text) if pattern.is_match(text) => {}
            Value::String(text) => out.push(Mismatch::new(
                path,
                pattern.to_string(),
                format!("{text:?}"),
                MismatchReason::RegexMismatch,
            )),
            other => out.push(Mismatch::new(
                path,
                format!("string matching {pattern}"),
                type_name(other),
                MismatchReason::TypeMismatch,
            )),
        },
        MatcherNode::Object(fields) => {
            let Value::Object(map) = actual else {
                out.push(Mismatch::new(
                    path,
                    "object",
                    type_name(actual),
                    MismatchReason::TypeMismatch,
                ));
                return;
            };
            for (key, child) in fields {
                let child_path = path::key(path, key);
                match map.get(key) {
                    Some(value) => match_node(child, value, &child_path, out),
                    None => out.push(Mismatch::new(
                        child_path,
                        compact(&child.resolve_example()),
                        "<absent>",
                        MismatchReason::MissingKey,
                    )),
                }
            }
        }
        MatcherNode::Array(expected) => {
            let Value::Array(items) = actual else {
                out.push(Mismatch::new(
                    path,
                    "array",
                    type_name(actual),
                    MismatchReason::TypeMismatch,
                ));
                return;
            };
            if items.len() != expected.len() {
                out.push(Mismatch::new(
                    path,
                    format!("{} items", expected.len()),
                    format!("{} items", items.len()),
                    MismatchReason::LengthMismatch,
                ));
            }
            for (index, (child, item)) in expected.iter().zip(items).enumerate() {
                match_node(child, item, &path::index(path, index), out);
            }
        }
    }
}

fn match_type(example: &Value, actual: &Value, path: &str, out: &mut Vec<Mismatch>) {
    match (example, actual) {
        (Value::Object(expected), Value::Object(map)) => {
            for (key, child) in expected {
                let child_path = path::key(path, key);
                match map.get(key) {
                    Some(value) => match_type(child, value, &child_path, out),
                    None => out.push(Mismatch::new(
                        child_path,
                        type_name(child),
                        "<absent>",
                        MismatchReason::MissingKey,
                    )),
                }
            }
        }
        (Value::Array(expected), Value::Array(items)) => {
            let Some(first) = expected.first() else {
                return;
            };
            for (index, item) in items.iter().enumerate() {
                let template = expected.get(index).unwrap_or(first);
                match_type(template, item, &path::index(path, index), out);
            }
        }
        _ if type_name(example) == type_name(actual) => {}
        _ => out.push(Mismatch::new(
            path,
            type_name(example),
            type_name(actual),
            MismatchReason::TypeMismatch,
        )),
    }
}

/// Deep equality that treats `1` and `1.0` as the same number.
fn values_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => expected == actual,
    }
}

/// Integers compare exactly; a float on either side compares as `f64`.
#[allow(clippy::float_cmp)]
fn numbers_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    if a.is_f64() || b.is_f64() {
        return a.as_f64() == b.as_f64();
    }
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x == y,
        _ => a.as_u64().is_some() && a.as_u64() == b.as_u64(),
    }
}

/// JSON type name used in diagnostics.
#[must_use]
pub const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn compact(value: &Value) -> String {
    value.to_string()
}

/// Strings render without quotes, everything else as compact JSON.
#[must_use]
pub fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// JSONPath-like path building shared with the matching-rule codec.
pub(crate) mod path {
    /// Append an object key.
    pub fn key(parent: &str, key: &str) -> String {
        let mut chars = key.chars();
        let simple = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if simple {
            format!("{parent}.{key}")
        } else {
            format!("{parent}['{}']", key.replace('\'', "\\'"))
        }
    }

    /// Append an array index.
    pub fn index(parent: &str, index: usize) -> String {
        format!("{parent}[{index}]")
    }

    /// Append the any-element wildcard.
    pub fn wildcard(parent: &str) -> String {
        format!("{parent}[*]")
    }
}

/// Type-match against `example`.
#[must_use]
pub fn like(example: impl Into<Value>) -> MatcherNode {
    MatcherNode::TypeLike(example.into())
}

/// An array of at least one element type-matching `example`.
#[must_use]
pub fn each_like(example: impl Into<Value>) -> MatcherNode {
    each_like_min(example, 1)
}

/// An array of at least `min_items` elements type-matching `example`.
#[must_use]
pub fn each_like_min(example: impl Into<Value>, min_items: usize) -> MatcherNode {
    MatcherNode::each_like(like(example), min_items)
}

/// Exact value.
#[must_use]
pub fn literal(value: impl Into<Value>) -> MatcherNode {
    MatcherNode::Literal(value.into())
}

/// Regex matcher, see [`MatcherNode::regex`].
///
/// # Errors
///
/// Returns [`PactError::InvalidMatcher`] for an invalid pattern or example.
pub fn term(pattern: impl Into<String>, example: impl Into<String>) -> Result<MatcherNode, PactError> {
    MatcherNode::regex(pattern, example)
}

/// Object node from `(key, node)` pairs.
#[must_use]
pub fn object<K, I>(fields: I) -> MatcherNode
where
    K: Into<String>,
    I: IntoIterator<Item = (K, MatcherNode)>,
{
    MatcherNode::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
}

/// Fixed-length array node.
#[must_use]
pub fn array(items: impl IntoIterator<Item = MatcherNode>) -> MatcherNode {
    MatcherNode::Array(items.into_iter().collect())
}
