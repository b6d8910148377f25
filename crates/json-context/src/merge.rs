//! In-place structural merge.

use json_context_value::{is_meta, ArrayRef, ObjectRef, Value};

/// Sequence elements the merge added or dropped.
#[derive(Debug, Default, Clone)]
pub struct MergeResult {
    pub added_items: Vec<Value>,
    pub removed_items: Vec<Value>,
}

/// Merges `changed` into `original` without replacing `original` itself.
///
/// Nodes of the same kind are merged recursively so that references held
/// elsewhere stay valid. Fields `changed` lacks are deleted unless they are
/// metadata or named in `preserve_keys` (top level only).
///
/// ```
/// use json_context::merge_into;
/// use json_context_value::Value;
/// use serde_json::json;
///
/// let original = Value::from(json!({"id": 1, "tags": ["a"], "$seen": true, "old": 1}));
/// let tags = original.get("tags").unwrap();
///
/// merge_into(&original, &Value::from(json!({"id": 1, "tags": ["a", "b"]})), &[]);
///
/// assert_eq!(original, json!({"id": 1, "tags": ["a", "b"], "$seen": true}));
/// assert!(original.get("tags").unwrap().same(&tags));
/// ```
pub fn merge_into(original: &Value, changed: &Value, preserve_keys: &[String]) -> MergeResult {
    let mut result = MergeResult::default();
    merge(original, changed, preserve_keys, &mut result);
    result
}

fn merge(original: &Value, changed: &Value, preserve_keys: &[String], out: &mut MergeResult) {
    if original.same(changed) {
        return;
    }
    match (original, changed) {
        (Value::Object(target), Value::Object(source)) => {
            merge_object(target, source, preserve_keys, out)
        }
        (Value::Array(target), Value::Array(source)) => merge_array(target, source, out),
        _ => {}
    }
}

fn merge_object(target: &ObjectRef, source: &ObjectRef, preserve_keys: &[String], out: &mut MergeResult) {
    for (key, incoming) in source.entries() {
        if is_meta(&key) {
            continue;
        }
        match target.get(&key) {
            Some(existing) if same_kind(&existing, &incoming) => merge(&existing, &incoming, &[], out),
            Some(existing) if existing.same(&incoming) => {}
            _ => {
                target.insert(key, incoming);
            }
        }
    }

    let stale: Vec<String> = target
        .keys()
        .into_iter()
        .filter(|key| !is_meta(key) && !preserve_keys.contains(key) && !source.contains_key(key))
        .collect();
    for key in stale {
        target.remove(&key);
    }
}

fn merge_array(target: &ArrayRef, source: &ArrayRef, out: &mut MergeResult) {
    let incoming = source.to_vec();
    let existing_len = target.len();

    for (i, item) in incoming.iter().enumerate() {
        match target.get(i) {
            Some(existing) if same_kind(&existing, item) => merge(&existing, item, &[], out),
            Some(existing) if existing.same(item) => {}
            Some(_) => target.borrow_mut()[i] = item.clone(),
            None => {
                target.push(item.clone());
                out.added_items.push(item.clone());
            }
        }
    }

    if existing_len > incoming.len() {
        let removed: Vec<Value> = target.borrow_mut().drain(incoming.len()..).collect();
        out.removed_items.extend(removed);
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Object(_), Value::Object(_)) | (Value::Array(_), Value::Array(_))
    )
}
