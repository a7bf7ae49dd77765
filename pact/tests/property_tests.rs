//! Property-based tests for the contract engine.

use contract_pact::matcher::{each_like_min, like, literal};
use contract_pact::rules::{decode_body, encode_body};
use contract_pact::{
    ContractDocumentBuilder, HttpRequest, InteractionId, InteractionRegistry, InteractionSpec,
    MismatchReason, match_value,
};
use proptest::prelude::*;
use serde_json::{Value, json};
use test_utils::{
    http_method_strategy, json_key_strategy, json_object_strategy, json_scalar_strategy,
    json_value_strategy, matcher_tree_strategy, request_path_strategy,
};

/// A value of a different JSON type than `value`.
fn other_type(value: &Value) -> Value {
    match value {
        Value::String(_) => json!(1),
        Value::Number(_) => json!("1"),
        Value::Bool(_) => json!(null),
        Value::Null => json!(true),
        Value::Array(_) => json!({}),
        Value::Object(_) => json!([]),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_literal_matches_itself(value in json_value_strategy()) {
        prop_assert!(match_value(&literal(value.clone()), &value).is_match());
    }

    #[test]
    fn prop_matcher_tree_accepts_own_example(tree in matcher_tree_strategy()) {
        let outcome = match_value(&tree, &tree.resolve_example());
        prop_assert!(outcome.is_match(), "{:?}", outcome.mismatches);
    }

    #[test]
    fn prop_type_like_ignores_extra_keys(
        example in json_object_strategy(),
        extra_key in "x_[a-z]{1,6}",
        extra_value in json_scalar_strategy(),
    ) {
        let mut actual = example.clone();
        actual.insert(extra_key, extra_value);
        prop_assert!(match_value(&like(Value::Object(example)), &Value::Object(actual)).is_match());
    }

    #[test]
    fn prop_type_like_reports_missing_key(example in json_object_strategy(), pick in any::<prop::sample::Index>()) {
        let keys: Vec<String> = example.keys().cloned().collect();
        let removed = pick.get(&keys).clone();
        let mut actual = example.clone();
        actual.remove(&removed);

        let outcome = match_value(&like(Value::Object(example)), &Value::Object(actual));
        prop_assert_eq!(outcome.mismatches.len(), 1);
        prop_assert_eq!(outcome.mismatches[0].reason, MismatchReason::MissingKey);
    }

    #[test]
    fn prop_type_like_reports_type_change(example in json_object_strategy(), pick in any::<prop::sample::Index>()) {
        let keys: Vec<String> = example.keys().cloned().collect();
        let changed = pick.get(&keys).clone();
        let mut actual = example.clone();
        let replacement = other_type(&actual[&changed]);
        actual.insert(changed, replacement);

        let outcome = match_value(&like(Value::Object(example)), &Value::Object(actual));
        prop_assert!(!outcome.is_match());
        prop_assert!(outcome.mismatches.iter().all(|m| m.reason == MismatchReason::TypeMismatch));
    }

    #[test]
    fn prop_each_like_enforces_minimum(
        element in json_object_strategy(),
        min in 1usize..4,
        len in 0usize..8,
    ) {
        let node = each_like_min(Value::Object(element.clone()), min);
        let actual = Value::Array(vec![Value::Object(element); len]);
        let outcome = match_value(&node, &actual);
        if len >= min {
            prop_assert!(outcome.is_match());
        } else {
            prop_assert_eq!(outcome.mismatches.len(), 1);
            prop_assert_eq!(outcome.mismatches[0].reason, MismatchReason::TooFewItems);
        }
    }

    #[test]
    fn prop_body_rules_restore_tree(tree in matcher_tree_strategy()) {
        let rules = encode_body(&tree);
        let restored = decode_body(&tree.resolve_example(), &rules).unwrap();
        prop_assert_eq!(restored, tree);
    }

    #[test]
    fn prop_exact_request_matches_its_interaction(
        method in http_method_strategy(),
        path in request_path_strategy(),
        header_value in "[a-z0-9/]{1,12}",
        key in json_key_strategy(),
    ) {
        let spec = InteractionSpec::builder("generated")
            .with_request(|r| r.method(&method).path(path.clone()).header("X-Test", header_value.clone()))
            .build();
        let mut request = HttpRequest::new(&method, path.clone()).with_header("x-test", header_value);
        prop_assert!(spec.request.compare(&request).is_empty());

        request = request.with_query(key, "1");
        prop_assert!(spec.request.compare(&request).is_empty(), "undeclared query is unconstrained");
    }

    #[test]
    fn prop_document_order_is_registration_order(order in Just((0..6).collect::<Vec<usize>>()).prop_shuffle()) {
        let registry = InteractionRegistry::new();
        for i in 0..6 {
            registry
                .register(
                    InteractionSpec::builder(format!("interaction {i}"))
                        .id(format!("i{i}"))
                        .with_request(|r| r.get(format!("/items/{i}")))
                        .build(),
                )
                .unwrap();
        }
        for i in &order {
            registry.mark_exercised(&InteractionId::new(format!("i{i}")));
        }

        let document = ContractDocumentBuilder::new("web", "catalog").build(&registry).unwrap();
        let paths: Vec<String> = document.interactions.iter().map(|i| i.request.path.clone()).collect();
        let expected: Vec<String> = (0..6).map(|i| format!("/items/{i}")).collect();
        prop_assert_eq!(paths, expected);
    }
}
