//! Matching rules: the document representation of matcher trees.
//!
//! A tree is stored as its resolved example plus rules keyed by JSONPath.
//! Encoding and decoding are inverse for trees built with the matcher helpers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::PactError;
use crate::matcher::{MatcherNode, path, value_to_plain_string};

/// One matching rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "lowercase")]
pub enum MatchingRule {
    /// Exact equality with the example
    Equality,
    /// Full-string regex
    Regex {
        /// Pattern
        regex: String,
    },
    /// Type match; `min` marks an each-like array
    Type {
        /// Minimum array length
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<usize>,
    },
}

/// Rules applying to one location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleList {
    /// Matchers in declaration order
    pub matchers: Vec<MatchingRule>,
}

impl RuleList {
    fn single(rule: MatchingRule) -> Self {
        Self {
            matchers: vec![rule],
        }
    }
}

/// Matching rules of a request or response, grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingRules {
    /// Rules for the request path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<RuleList>,
    /// Rules per query parameter
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, RuleList>,
    /// Rules per header
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub header: BTreeMap<String, RuleList>,
    /// Body rules keyed by JSONPath rooted at `$`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub body: BTreeMap<String, RuleList>,
}

impl MatchingRules {
    /// Whether no rule is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.query.is_empty() && self.header.is_empty() && self.body.is_empty()
    }
}

/// Rule for the request path, if it needs one.
#[must_use]
pub fn encode_flat(node: &MatcherNode) -> Option<RuleList> {
    encode_body(node).remove("$")
}

/// Add the rules of one header or query parameter to its category.
///
/// The value itself is keyed by `name`, nested locations by `name` followed
/// by their JSONPath suffix, so an each-like parameter `tag` yields `tag` and
/// `tag[*]`.
pub fn encode_named(name: &str, node: &MatcherNode, category: &mut BTreeMap<String, RuleList>) {
    for (at, list) in encode_body(node) {
        let suffix = at.strip_prefix('$').unwrap_or(&at);
        category.insert(format!("{name}{suffix}"), list);
    }
}

/// Rebuild one header or query parameter from its example and the rules of
/// its category.
///
/// # Errors
///
/// Returns [`PactError::InvalidMatcher`] for a regex rule the example violates.
pub fn decode_named(
    name: &str,
    example: &Value,
    category: &BTreeMap<String, RuleList>,
) -> Result<MatcherNode, PactError> {
    decode_tree(example, "$", &scoped(name, category))
}

/// Whether the rules of `name` describe a sequence of values rather than one.
#[must_use]
pub fn names_sequence(name: &str, category: &BTreeMap<String, RuleList>) -> bool {
    let rules = scoped(name, category);
    rules.keys().any(|at| at != "$")
        || rules.get("$").is_some_and(|list| {
            list.matchers
                .iter()
                .any(|rule| matches!(rule, MatchingRule::Equality | MatchingRule::Type { min: Some(_) }))
        })
}

/// Rules of `name` re-rooted at `$`.
fn scoped(name: &str, category: &BTreeMap<String, RuleList>) -> BTreeMap<String, RuleList> {
    category
        .iter()
        .filter_map(|(key, list)| {
            let suffix = key.strip_prefix(name)?;
            (suffix.is_empty() || suffix.starts_with('[') || suffix.starts_with('.'))
                .then(|| (format!("${suffix}"), list.clone()))
        })
        .collect()
}

/// Rules for a body tree, keyed by JSONPath.
#[must_use]
pub fn encode_body(node: &MatcherNode) -> BTreeMap<String, RuleList> {
    let mut rules = BTreeMap::new();
    encode_tree(node, "$", &mut rules);
    rules
}

fn encode_tree(node: &MatcherNode, at: &str, rules: &mut BTreeMap<String, RuleList>) {
    match node {
        MatcherNode::Literal(value) => {
            if value.is_object() || value.is_array() {
                rules.insert(at.to_string(), RuleList::single(MatchingRule::Equality));
            }
        }
        MatcherNode::TypeLike(_) => {
            rules.insert(at.to_string(), RuleList::single(MatchingRule::Type { min: None }));
        }
        MatcherNode::Regex { pattern, .. } => {
            rules.insert(
                at.to_string(),
                RuleList::single(MatchingRule::Regex {
                    regex: pattern.as_str().to_string(),
                }),
            );
        }
        MatcherNode::EachLike { element, min_items } => {
            rules.insert(
                at.to_string(),
                RuleList::single(MatchingRule::Type {
                    min: Some(*min_items),
                }),
            );
            encode_tree(element, &path::wildcard(at), rules);
        }
        MatcherNode::Object(fields) => {
            for (key, child) in fields {
                encode_tree(child, &path::key(at, key), rules);
            }
        }
        MatcherNode::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                encode_tree(child, &path::index(at, index), rules);
            }
        }
    }
}

/// Rebuild a flat matcher from its example and optional rules.
///
/// # Errors
///
/// Returns [`PactError::InvalidMatcher`] for a regex rule the example violates.
pub fn decode_flat(example: Value, rules: Option<&RuleList>) -> Result<MatcherNode, PactError> {
    let mut by_path = BTreeMap::new();
    if let Some(rules) = rules {
        by_path.insert("$".to_string(), rules.clone());
    }
    decode_tree(&example, "$", &by_path)
}

/// Rebuild a body tree from its example and JSONPath-keyed rules.
///
/// # Errors
///
/// Returns [`PactError::InvalidMatcher`] for a regex rule the example violates.
pub fn decode_body(example: &Value, rules: &BTreeMap<String, RuleList>) -> Result<MatcherNode, PactError> {
    decode_tree(example, "$", rules)
}

fn decode_tree(
    example: &Value,
    at: &str,
    rules: &BTreeMap<String, RuleList>,
) -> Result<MatcherNode, PactError> {
    if let Some(list) = rules.get(at).filter(|list| !list.matchers.is_empty()) {
        let mut candidates = Vec::with_capacity(list.matchers.len());
        for rule in &list.matchers {
            candidates.push(decode_rule(rule, example, at, rules)?);
        }
        if candidates.len() > 1 {
            warn!(path = %at, rules = candidates.len(), "Ambiguous matching rules, applying the most specific");
        }
        if let Some(node) = MatcherNode::most_specific(candidates) {
            return Ok(node);
        }
    }

    match example {
        Value::Object(map) => {
            let mut fields = BTreeMap::new();
            for (key, child) in map {
                fields.insert(key.clone(), decode_tree(child, &path::key(at, key), rules)?);
            }
            Ok(MatcherNode::Object(fields))
        }
        Value::Array(items) => {
            let mut nodes = Vec::with_capacity(items.len());
            for (index, child) in items.iter().enumerate() {
                nodes.push(decode_tree(child, &path::index(at, index), rules)?);
            }
            Ok(MatcherNode::Array(nodes))
        }
        scalar => Ok(MatcherNode::Literal(scalar.clone())),
    }
}

fn decode_rule(
    rule: &MatchingRule,
    example: &Value,
    at: &str,
    rules: &BTreeMap<String, RuleList>,
) -> Result<MatcherNode, PactError> {
    match rule {
        MatchingRule::Equality => Ok(MatcherNode::Literal(example.clone())),
        MatchingRule::Regex { regex } => MatcherNode::regex(regex, value_to_plain_string(example)),
        MatchingRule::Type { min: Some(min) } => {
            let template = match example {
                Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
                other => other.clone(),
            };
            let element = decode_tree(&template, &path::wildcard(at), rules)?;
            Ok(MatcherNode::each_like(element, *min))
        }
        MatchingRule::Type { min: None } => Ok(MatcherNode::TypeLike(example.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{each_like, like, literal, object, term};
    use serde_json::json;

    #[test]
    fn test_encode_body_paths() {
        let node = object([
            ("id", term(r"\d+", "10").unwrap()),
            ("items", each_like(json!({"sku": "A"}))),
            ("kind", literal("card")),
        ]);
        let rules = encode_body(&node);

        let keys: Vec<_> = rules.keys().cloned().collect();
        assert_eq!(keys, vec!["$.id", "$.items", "$.items[*]"]);
        assert_eq!(
            rules["$.items"].matchers,
            vec![MatchingRule::Type { min: Some(1) }]
        );
    }

    #[test]
    fn test_body_tree_survives_encode_decode() {
        let node = object([
            ("id", term(r"\d+", "10").unwrap()),
            ("items", each_like(json!({"sku": "A"}))),
            ("meta", like(json!({"page": 1}))),
            ("kind", literal("card")),
            ("exact", literal(json!({"a": [1, 2]}))),
        ]);
        let rules = encode_body(&node);
        let decoded = decode_body(&node.resolve_example(), &rules).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_ambiguous_rules_use_most_specific() {
        let mut rules = BTreeMap::new();
        rules.insert(
            "$.id".to_string(),
            RuleList {
                matchers: vec![
                    MatchingRule::Type { min: None },
                    MatchingRule::Regex {
                        regex: r"\d+".to_string(),
                    },
                ],
            },
        );
        let decoded = decode_body(&json!({"id": "10"}), &rules).unwrap();
        let MatcherNode::Object(fields) = decoded else {
            panic!("expected object node");
        };
        assert!(matches!(fields["id"], MatcherNode::Regex { .. }));
    }

    #[test]
    fn test_flat_rules() {
        let node = term(r"/product/\d+", "/product/10").unwrap();
        let rules = encode_flat(&node);
        assert_eq!(decode_flat(json!("/product/10"), rules.as_ref()).unwrap(), node);

        assert!(encode_flat(&literal("application/json")).is_none());
        assert_eq!(
            decode_flat(json!("application/json"), None).unwrap(),
            literal("application/json")
        );
    }

    #[test]
    fn test_named_rules_keep_each_like_element() {
        let node = each_like("credit");
        let mut category = BTreeMap::new();
        encode_named("tag", &node, &mut category);
        encode_named("type", &like("CARD"), &mut category);

        let keys: Vec<_> = category.keys().cloned().collect();
        assert_eq!(keys, vec!["tag", "tag[*]", "type"]);
        assert!(names_sequence("tag", &category));
        assert!(!names_sequence("type", &category));

        let decoded = decode_named("tag", &json!(["credit"]), &category).unwrap();
        assert_eq!(decoded, node);
        assert_eq!(decode_named("type", &json!("CARD"), &category).unwrap(), like("CARD"));
    }

    #[test]
    fn test_regex_rule_rejects_inconsistent_example() {
        let rules = RuleList::single(MatchingRule::Regex {
            regex: r"\d+".to_string(),
        });
        assert!(decode_flat(json!("abc"), Some(&rules)).is_err());
    }

    #[test]
    fn test_rule_serialization_shape() {
        let json = serde_json::to_value(RuleList::single(MatchingRule::Type { min: Some(2) })).unwrap();
        assert_eq!(json, json!({"matchers": [{"match": "type", "min": 2}]}));
    }
}
