//! The document node type.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Number;

use crate::json_equal::{deep_equal, scalar_equal};
use crate::key::Key;

/// Field storage of a mapping node. Insertion order is preserved.
pub type Map = IndexMap<String, Value>;

/// A JSON-like value. Sequences and mappings are shared handles.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(ArrayRef),
    Object(ObjectRef),
}

// ── Sequence node ────────────────────────────────────────────────────────

/// Shared handle to a sequence node.
#[derive(Clone, Default)]
pub struct ArrayRef(Rc<RefCell<Vec<Value>>>);

impl ArrayRef {
    pub fn new(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Vec<Value>> {
        self.0.borrow_mut()
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    pub fn push(&self, value: Value) {
        self.0.borrow_mut().push(value);
    }

    /// Inserts at `index`, clamped to the current length.
    pub fn insert(&self, index: usize, value: Value) {
        let mut items = self.0.borrow_mut();
        let index = index.min(items.len());
        items.insert(index, value);
    }

    pub fn remove(&self, index: usize) -> Option<Value> {
        let mut items = self.0.borrow_mut();
        if index < items.len() {
            Some(items.remove(index))
        } else {
            None
        }
    }

    /// Index of the first element that is [`Value::same`] as `value`.
    pub fn position(&self, value: &Value) -> Option<usize> {
        self.0.borrow().iter().position(|item| item.same(value))
    }

    /// Snapshot of the element handles.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }
}

// ── Mapping node ─────────────────────────────────────────────────────────

/// Shared handle to a mapping node.
#[derive(Clone, Default)]
pub struct ObjectRef(Rc<RefCell<Map>>);

impl ObjectRef {
    pub fn new(map: Map) -> Self {
        Self(Rc::new(RefCell::new(map)))
    }

    pub fn borrow(&self) -> Ref<'_, Map> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Map> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.borrow_mut().insert(key.into(), value)
    }

    /// Removes a field, keeping the order of the remaining ones.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().shift_remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    /// Snapshot of `(field, handle)` pairs.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

// ── Value ────────────────────────────────────────────────────────────────

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(ArrayRef::new(items))
    }

    pub fn object(map: Map) -> Self {
        Value::Object(ObjectRef::new(map))
    }

    pub fn empty_array() -> Self {
        Self::array(Vec::new())
    }

    pub fn empty_object() -> Self {
        Self::object(Map::new())
    }

    /// Builds a number, preferring an integer representation for whole values.
    /// Non-finite input yields `Null`.
    pub fn from_f64(n: f64) -> Self {
        if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
            return Value::Number(Number::from(n as i64));
        }
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// `true` for sequence and mapping nodes.
    pub fn is_node(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Numeric view of numbers and numeric strings.
    ///
    /// ```
    /// use json_context_value::Value;
    ///
    /// assert_eq!(Value::from("2.5").to_number(), Some(2.5));
    /// assert_eq!(Value::from(3).to_number(), Some(3.0));
    /// assert_eq!(Value::from("abc").to_number(), None);
    /// ```
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Loose truthiness: `null`, `false`, `0`, `NaN` and `""` are false,
    /// every node is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    /// Identity check: nodes compare by reference, scalars by value.
    ///
    /// This is deliberately shallow. Two structurally equal mappings that
    /// live in different nodes are not the same.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
                false
            }
            _ => scalar_equal(self, other),
        }
    }

    /// Field of a mapping node.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.as_object().and_then(|obj| obj.get(key))
    }

    /// Child at `key` for either node kind.
    pub fn get_key(&self, key: &Key) -> Option<Value> {
        match (self, key) {
            (Value::Object(obj), Key::Name(name)) => obj.get(name),
            (Value::Object(obj), Key::Index(i)) => obj.get(&i.to_string()),
            (Value::Array(arr), key) => key.as_index().and_then(|i| arr.get(i)),
            _ => None,
        }
    }

    /// Sets a field on a mapping node. Returns `false` for any other kind.
    pub fn set(&self, key: impl Into<String>, value: Value) -> bool {
        match self {
            Value::Object(obj) => {
                obj.insert(key, value);
                true
            }
            _ => false,
        }
    }

    /// Removes the child at `key`: splice for sequences, delete for mappings.
    pub fn remove_key(&self, key: &Key) -> Option<Value> {
        match (self, key) {
            (Value::Object(obj), Key::Name(name)) => obj.remove(name),
            (Value::Object(obj), Key::Index(i)) => obj.remove(&i.to_string()),
            (Value::Array(arr), key) => key.as_index().and_then(|i| arr.remove(i)),
            _ => None,
        }
    }

    /// Stores `value` at `key`, replacing what was there.
    pub fn set_key(&self, key: &Key, value: Value) -> bool {
        match (self, key) {
            (Value::Object(obj), key) => {
                obj.insert(key.to_string(), value);
                true
            }
            (Value::Array(arr), key) => match key.as_index() {
                Some(i) => {
                    let mut items = arr.borrow_mut();
                    if i < items.len() {
                        items[i] = value;
                    } else if i == items.len() {
                        items.push(value);
                    } else {
                        return false;
                    }
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Key under which a scalar can address a child (`"a"` or `3`).
    pub fn as_key(&self) -> Option<Key> {
        match self {
            Value::String(s) => Some(Key::Name(s.clone())),
            Value::Number(n) => n
                .as_u64()
                .map(|i| Key::Index(i as usize))
                .or_else(|| n.as_f64().map(|f| Key::Name(f.to_string()))),
            Value::Bool(b) => Some(Key::Name(b.to_string())),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        deep_equal(self, other)
    }
}

impl PartialEq<serde_json::Value> for Value {
    fn eq(&self, other: &serde_json::Value) -> bool {
        deep_equal(self, &Value::from(other.clone()))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clone_shares_node() {
        let a = Value::from(json!({"x": 1}));
        let b = a.clone();
        b.set("y", Value::from(2));
        assert_eq!(a, json!({"x": 1, "y": 2}));
        assert!(a.same(&b));
    }

    #[test]
    fn test_same_is_shallow() {
        let a = Value::from(json!({"x": 1}));
        let b = Value::from(json!({"x": 1}));
        assert_eq!(a, b);
        assert!(!a.same(&b));
        assert!(Value::from(1).same(&Value::from(1.0)));
        assert!(!Value::from("1").same(&Value::from(1)));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from(-1).is_truthy());
        assert!(Value::empty_array().is_truthy());
    }

    #[test]
    fn test_from_f64_prefers_integers() {
        assert_eq!(Value::from_f64(2.0), json!(2));
        assert!(matches!(Value::from_f64(2.0), Value::Number(n) if n.is_i64()));
        assert_eq!(Value::from_f64(2.5), json!(2.5));
        assert!(Value::from_f64(f64::NAN).is_null());
    }

    #[test]
    fn test_remove_key_keeps_field_order() {
        let v = Value::from(json!({"a": 1, "b": 2, "c": 3}));
        v.remove_key(&Key::from("b"));
        assert_eq!(v.as_object().unwrap().keys(), vec!["a", "c"]);
    }

    #[test]
    fn test_array_position_uses_identity() {
        let item = Value::from(json!({"id": 1}));
        let arr = ArrayRef::new(vec![Value::from(json!({"id": 1})), item.clone()]);
        assert_eq!(arr.position(&item), Some(1));
    }
}
