//! Shared proptest generators.
//!
//! JSON values, matcher trees and request paths used by the property suites.

use contract_pact::MatcherNode;
use contract_pact::matcher::{each_like_min, like, literal, object};
use proptest::prelude::*;
use serde_json::{Map, Value};

/// Generate JSON scalars (null, bool, number, string).
pub fn json_scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::String),
    ]
}

/// Generate object keys that need no quoting in JSONPath.
pub fn json_key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}"
}

/// Generate JSON values nested up to three levels.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    json_scalar_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(json_key_strategy(), inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Generate flat JSON objects with at least one key.
pub fn json_object_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(json_key_strategy(), json_scalar_strategy(), 1..6)
        .prop_map(|map| map.into_iter().collect())
}

/// Generate matcher trees built from the DSL helpers.
pub fn matcher_tree_strategy() -> impl Strategy<Value = MatcherNode> {
    let leaf = prop_oneof![
        json_scalar_strategy().prop_map(literal),
        json_scalar_strategy().prop_map(like),
        (json_object_strategy(), 0usize..3)
            .prop_map(|(example, min)| each_like_min(Value::Object(example), min)),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop::collection::btree_map(json_key_strategy(), inner, 1..4)
            .prop_map(object)
    })
}

/// Generate numeric product ids.
pub fn product_id_strategy() -> impl Strategy<Value = u32> {
    1u32..100_000
}

/// Generate request paths of one to three segments.
pub fn request_path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z][a-z0-9-]{0,10}", 1..4)
        .prop_map(|segments| format!("/{}", segments.join("/")))
}

/// Generate HTTP methods.
pub fn http_method_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("GET".to_string()),
        Just("POST".to_string()),
        Just("PUT".to_string()),
        Just("PATCH".to_string()),
        Just("DELETE".to_string()),
    ]
}
