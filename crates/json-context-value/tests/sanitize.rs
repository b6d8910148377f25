use json_context_value::{deep_clone, is_meta, obtain, Value};
use proptest::prelude::*;
use serde_json::json;

/// Reference implementation: strip metadata fields from a plain JSON tree.
fn strip(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Array(arr) => serde_json::Value::Array(arr.iter().map(strip).collect()),
        serde_json::Value::Object(obj) => serde_json::Value::Object(
            obj.iter()
                .filter(|(k, _)| !is_meta(k))
                .map(|(k, v)| (k.clone(), strip(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn arb_json() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z]{0,6}".prop_map(serde_json::Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(serde_json::Value::Array),
            prop::collection::vec(("\\$?[a-z]{1,4}", inner), 0..5)
                .prop_map(|fields| serde_json::Value::Object(fields.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn obtain_of_clone_strips_meta_everywhere(source in arb_json()) {
        let value = Value::from(source.clone());
        let sanitized = obtain(&deep_clone(&value));
        prop_assert_eq!(sanitized.to_json(), strip(&source));
    }

    #[test]
    fn obtain_is_idempotent(source in arb_json()) {
        let once = obtain(&Value::from(source));
        let twice = obtain(&once);
        prop_assert!(once == twice);
    }

    #[test]
    fn obtain_never_aliases_nodes(source in arb_json()) {
        let value = Value::from(source);
        let copy = obtain(&value);
        if value.is_node() {
            prop_assert!(!copy.same(&value));
        }
    }
}

#[test]
fn test_meta_survives_repeated_deep_clone() {
    let value = Value::from(json!({"id": 1, "$binding": {"x": 1}}));
    let copy = deep_clone(&deep_clone(&value));
    assert_eq!(copy.get("$binding").unwrap(), json!({"x": 1}));
}
