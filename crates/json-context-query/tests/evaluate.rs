use json_context_query::{Filters, Query, QueryParser, Scope};
use json_context_value::{Key, Value};
use serde_json::json;

fn parse(expr: &str) -> Query {
    QueryParser::parse(expr).unwrap()
}

fn blog() -> Value {
    Value::from(json!({
        "post": {"_id": "abc123", "type": "post", "title": "A Blog Post"},
        "users": {"abc234": {"_id": "abc234", "type": "user", "role": "admin"}},
        "current_user_id": "abc234",
        "comments": [
            {"_id": "cba123", "type": "comment", "post_id": "abc123"},
            {"_id": "cba234", "type": "comment", "post_id": "abc123", "user_id": "abc234"}
        ]
    }))
}

#[test]
fn test_root_field() {
    let root = blog();
    let filters = Filters::new();
    let scope = Scope::new(&root, &filters);
    let result = scope.query(&parse("post"), None);
    assert_eq!(result.value.unwrap().get("title").unwrap(), json!("A Blog Post"));
    assert!(result.parent.unwrap().same(&root));
    assert_eq!(result.key, Some(Key::from("post")));
}

#[test]
fn test_where_with_context_operand() {
    let root = blog();
    let filters = Filters::new();
    let scope = Scope::new(&root, &filters);
    let candidate = Value::from(json!({"_id": "cba234"}));
    let result = scope.query(&parse("comments[_id={._id}]"), Some(&candidate));
    assert_eq!(result.key, Some(Key::Index(1)));
    assert!(result.value.unwrap().same(&root.get("comments").unwrap().as_array().unwrap().get(1).unwrap()));
}

#[test]
fn test_where_miss_reports_append_slot() {
    let root = blog();
    let filters = Filters::new();
    let scope = Scope::new(&root, &filters);
    let candidate = Value::from(json!({"_id": "nope"}));
    let result = scope.query(&parse("comments[_id={._id}]"), Some(&candidate));
    assert!(!result.found());
    assert_eq!(result.key, Some(Key::Index(2)));
}

#[test]
fn test_dynamic_key_into_mapping() {
    let root = blog();
    let filters = Filters::new();
    let scope = Scope::new(&root, &filters);
    let result = scope.query(&parse("users[{current_user_id}]"), None);
    assert_eq!(result.value.unwrap().get("role").unwrap(), json!("admin"));
    assert_eq!(result.key, Some(Key::from("abc234")));
}

#[test]
fn test_nested_condition_path_and_literals() {
    let root = Value::from(json!({"items": [
        {"id": 1, "meta": {"rank": 1}},
        {"id": 2, "meta": {"rank": 5}, "done": true}
    ]}));
    let filters = Filters::new();
    let scope = Scope::new(&root, &filters);
    assert_eq!(scope.get(&parse("items[meta.rank>2].id"), None).unwrap(), json!(2));
    assert_eq!(scope.get(&parse("items[!done].id"), None).unwrap(), json!(1));
    assert_eq!(scope.get(&parse("items[id='2']"), None).unwrap().get("id").unwrap(), json!(2));
    assert!(scope.get(&parse("items[id=3]"), None).is_none());
}

#[test]
fn test_each_fans_out_across_collections() {
    let root = Value::from(json!({"lists": {
        "todo": [{"id": 1}],
        "done": [{"id": 2}]
    }}));
    let filters = Filters::new();
    let scope = Scope::new(&root, &filters);
    let candidate = Value::from(json!({"id": 2}));
    let result = scope.query(&parse("lists[*][id={.id}]"), Some(&candidate));
    assert!(result.found());
    assert!(result.parent.unwrap().same(&root.get("lists").unwrap().get("done").unwrap()));
}

#[test]
fn test_filter_receives_context_and_args() {
    let root = blog();
    let filters = Filters::new().with("hasRole", |input, args| {
        let role = args.first().and_then(|r| r.as_str().map(str::to_string));
        Value::Bool(input.get("role").and_then(|r| r.as_str().map(str::to_string)) == role)
    });
    let scope = Scope::new(&root, &filters);
    let user = scope.get(&parse("users[{current_user_id}]"), None).unwrap();
    assert_eq!(scope.get(&parse(":hasRole(admin)"), Some(&user)), Some(Value::Bool(true)));
    assert_eq!(scope.get(&parse(":hasRole('guest')"), Some(&user)), Some(Value::Bool(false)));
    assert_eq!(
        scope.get(&parse("users[{current_user_id}]:hasRole(admin)"), None),
        Some(Value::Bool(true))
    );
}

#[test]
fn test_unknown_filter_resolves_nothing() {
    let root = blog();
    let filters = Filters::new();
    let scope = Scope::new(&root, &filters);
    assert!(scope.get(&parse(":missing"), Some(&root)).is_none());
}

#[test]
fn test_context_self() {
    let root = blog();
    let filters = Filters::new();
    let scope = Scope::new(&root, &filters);
    let ctx = Value::from(json!({"a": 1}));
    assert!(scope.get(&parse("."), Some(&ctx)).unwrap().same(&ctx));
}

#[test]
fn test_force_into_sequence_and_mapping() {
    let root = Value::from(json!({"pages": [], "users": {}}));
    let filters = Filters::new();
    let scope = Scope::new(&root, &filters);

    let page = Value::from(json!({"id": 1}));
    let result = scope.force(&parse("pages[id={.id}]"), Some(&page), &page);
    assert_eq!(result.key, Some(Key::Index(0)));
    assert!(root.get("pages").unwrap().as_array().unwrap().get(0).unwrap().same(&page));

    let user = Value::from(json!({"_id": "u1"}));
    let result = scope.force(&parse("users[{._id}]"), Some(&user), &user);
    assert_eq!(result.key, Some(Key::from("u1")));
    assert!(root.get("users").unwrap().get("u1").unwrap().same(&user));
}

#[test]
fn test_force_keeps_existing_value() {
    let root = Value::from(json!({"post": {"id": 1}}));
    let filters = Filters::new();
    let scope = Scope::new(&root, &filters);
    let existing = root.get("post").unwrap();
    let result = scope.force(&parse("post"), None, &Value::from(json!({"id": 2})));
    assert!(result.value.unwrap().same(&existing));
}

#[test]
fn test_force_creates_intermediate_mappings() {
    let root = Value::from(json!({}));
    let filters = Filters::new();
    let scope = Scope::new(&root, &filters);
    let item = Value::from(json!({"id": "x"}));
    scope.force(&parse("projects.p1.pages[{.id}]"), Some(&item), &item);
    assert_eq!(root, json!({"projects": {"p1": {"pages": {"x": {"id": "x"}}}}}));
}

#[test]
fn test_query_str_reports_parse_errors() {
    let root = blog();
    let filters = Filters::new();
    let scope = Scope::new(&root, &filters);
    assert!(scope.query_str("comments[", None).is_err());
    assert!(scope.query_str("current_user_id", None).unwrap().found());
}
