//! Structural equality.

use crate::value::Value;

/// Performs a deep equality check between two values.
///
/// Nodes are compared element by element and field by field (field order
/// does not matter). Numbers compare numerically, so `1` equals `1.0`.
///
/// ```
/// use json_context_value::{deep_equal, Value};
/// use serde_json::json;
///
/// let a = Value::from(json!({"foo": [1, 2, 3]}));
/// let b = Value::from(json!({"foo": [1, 2, 3]}));
/// let c = Value::from(json!({"foo": [1, 2, 4]}));
///
/// assert!(deep_equal(&a, &b));
/// assert!(!deep_equal(&a, &c));
/// ```
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(arr_a), Value::Array(arr_b)) => {
            if arr_a.ptr_eq(arr_b) {
                return true;
            }
            let arr_a = arr_a.borrow();
            let arr_b = arr_b.borrow();
            arr_a.len() == arr_b.len() && arr_a.iter().zip(arr_b.iter()).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(obj_a), Value::Object(obj_b)) => {
            if obj_a.ptr_eq(obj_b) {
                return true;
            }
            let obj_a = obj_a.borrow();
            let obj_b = obj_b.borrow();
            obj_a.len() == obj_b.len()
                && obj_a
                    .iter()
                    .all(|(key, val_a)| obj_b.get(key).is_some_and(|val_b| deep_equal(val_a, val_b)))
        }
        _ => scalar_equal(a, b),
    }
}

/// Value equality for scalars. Nodes are never scalar-equal.
pub fn scalar_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b || a.as_f64() == b.as_f64(),
        (Value::String(a), Value::String(b)) => a == b,
        _ => false,
    }
}
