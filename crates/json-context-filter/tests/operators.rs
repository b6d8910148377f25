use json_context_filter::{matches, matches_field};
use json_context_query::{Filters, Scope};
use json_context_value::Value;
use serde_json::{json, Value as Json};

fn check(root: Json, candidate: Json, pattern: Json) -> bool {
    let root = Value::from(root);
    let filters = Filters::new().with("isEven", |input, _| {
        Value::Bool(input.to_number().is_some_and(|n| n % 2.0 == 0.0))
    });
    let scope = Scope::new(&root, &filters);
    matches(&Value::from(candidate), &Value::from(pattern), &scope)
}

#[test]
fn test_any_and_match_any() {
    assert!(check(json!({}), json!({"type": "page"}), json!({"type": {"$any": ["page", "post"]}})));
    assert!(!check(json!({}), json!({"type": "link"}), json!({"type": {"$any": ["page", "post"]}})));
    assert!(check(
        json!({}),
        json!({"n": 4}),
        json!({"$matchAny": [{"n": 1}, {"n": {"$test": ":isEven"}}]})
    ));
}

#[test]
fn test_not() {
    assert!(check(json!({}), json!({"type": "page"}), json!({"type": {"$not": "evil_page"}})));
    assert!(!check(json!({}), json!({"type": "evil_page"}), json!({"type": {"$not": "evil_page"}})));
}

#[test]
fn test_contains_excludes_only() {
    let tags = json!({"tags": ["a", "b", "c"], "title": "hello world"});
    assert!(check(json!({}), tags.clone(), json!({"tags": {"$contains": "b"}})));
    assert!(check(json!({}), tags.clone(), json!({"tags": {"$contains": ["a", "c"]}})));
    assert!(!check(json!({}), tags.clone(), json!({"tags": {"$contains": ["a", "z"]}})));
    assert!(check(json!({}), tags.clone(), json!({"tags": {"$excludes": "z"}})));
    assert!(!check(json!({}), tags.clone(), json!({"tags": {"$excludes": ["z", "a"]}})));
    assert!(check(json!({}), tags.clone(), json!({"tags": {"$only": ["a", "b", "c", "d"]}})));
    assert!(!check(json!({}), tags.clone(), json!({"tags": {"$only": ["a"]}})));
    assert!(check(json!({}), tags, json!({"title": {"$contains": "world"}})));
}

#[test]
fn test_query_compares_against_candidate_context() {
    let root = json!({"current_post": "abc123"});
    assert!(check(root.clone(), json!({"post_id": "abc123"}), json!({"post_id": {"$query": "current_post"}})));
    assert!(!check(root.clone(), json!({"post_id": "zzz"}), json!({"post_id": {"$query": "current_post"}})));
    assert!(check(root, json!({"a": 1, "b": 1}), json!({"a": {"$query": ".b"}})));
}

#[test]
fn test_query_parse_error_never_matches() {
    assert!(!check(json!({}), json!({"a": 1}), json!({"a": {"$query": "x["}})));
}

#[test]
fn test_named_predicate_via_test() {
    assert!(check(json!({}), json!({"n": 2}), json!({"n": {"$test": ":isEven"}})));
    assert!(!check(json!({}), json!({"n": 3}), json!({"n": {"$test": ":isEven"}})));
}

#[test]
fn test_regex() {
    assert!(check(json!({}), json!({"id": "link42"}), json!({"id": {"$regex": "^link\\d+$"}})));
    assert!(!check(json!({}), json!({"id": "page1"}), json!({"id": {"$regex": "^link"}})));
    assert!(!check(json!({}), json!({"id": "x"}), json!({"id": {"$regex": "("}})));
}

#[test]
fn test_loose_number_string_equality() {
    assert!(check(json!({}), json!({"id": "125"}), json!({"id": 125})));
}

#[test]
fn test_matches_field_uses_outer_candidate() {
    let root = Value::from(json!({}));
    let filters = Filters::new();
    let scope = Scope::new(&root, &filters);
    let candidate = Value::from(json!({"a": 5, "b": 5}));
    let pattern = Value::from(json!({"$query": ".b"}));
    assert!(matches_field(&Value::from(5), &pattern, &candidate, &scope));
}
