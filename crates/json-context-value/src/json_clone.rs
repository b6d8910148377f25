//! Deep copies of document values.

use crate::meta::is_meta;
use crate::value::{Map, Value};

/// Creates a detached deep copy, keeping metadata fields.
pub fn deep_clone(value: &Value) -> Value {
    copy(value, false)
}

/// Creates a detached deep copy with every metadata field removed.
///
/// This is what crosses a trust boundary: values handed to callers for
/// editing, change snapshots and serialized replication payloads.
///
/// ```
/// use json_context_value::{obtain, Value};
/// use serde_json::json;
///
/// let v = Value::from(json!({"id": 1, "$view": {"open": true}, "tags": [{"$x": 1, "n": "a"}]}));
/// assert_eq!(obtain(&v), json!({"id": 1, "tags": [{"n": "a"}]}));
/// ```
pub fn obtain(value: &Value) -> Value {
    copy(value, true)
}

fn copy(value: &Value, strip_meta: bool) -> Value {
    match value {
        Value::Array(arr) => Value::array(arr.borrow().iter().map(|v| copy(v, strip_meta)).collect()),
        Value::Object(obj) => {
            let obj = obj.borrow();
            let mut map = Map::with_capacity(obj.len());
            for (key, val) in obj.iter() {
                if strip_meta && is_meta(key) {
                    continue;
                }
                map.insert(key.clone(), copy(val, strip_meta));
            }
            Value::object(map)
        }
        scalar => scalar.clone(),
    }
}
