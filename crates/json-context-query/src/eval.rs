//! Query evaluator.

use std::cmp::Ordering;

use json_context_value::{Key, Value};
use tracing::warn;

use crate::filters::Filters;
use crate::parser::{ParseError, QueryParser};
use crate::types::*;

/// Outcome of evaluating a query.
///
/// Mirrors a JSON Pointer reference: the target plus the node holding it
/// and the key it is stored under. When the target is missing, `parent` and
/// `key` describe the vacant slot if one could be identified.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Resolved value. `None` when nothing (or `null`) lives there.
    pub value: Option<Value>,
    /// Node holding the value.
    pub parent: Option<Value>,
    /// Key of the value within `parent`.
    pub key: Option<Key>,
}

impl QueryResult {
    pub fn found(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Clone)]
struct Cursor {
    value: Value,
    parent: Option<Value>,
    key: Option<Key>,
}

enum StepOutcome {
    Found(Vec<Cursor>),
    Vacant { parent: Value, key: Key },
    Missing,
}

/// Evaluation environment: the document root plus the named filters.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    root: &'a Value,
    filters: &'a Filters,
}

impl<'a> Scope<'a> {
    pub fn new(root: &'a Value, filters: &'a Filters) -> Self {
        Self { root, filters }
    }

    pub fn root(&self) -> &'a Value {
        self.root
    }

    pub fn filters(&self) -> &'a Filters {
        self.filters
    }

    /// Evaluate `query`; `context` is what `.field` and `:filter` heads see.
    pub fn query(&self, query: &Query, context: Option<&Value>) -> QueryResult {
        self.walk(query, context, None)
    }

    /// Shorthand for the resolved value of [`Scope::query`].
    pub fn get(&self, query: &Query, context: Option<&Value>) -> Option<Value> {
        self.query(query, context).value
    }

    /// Parse and evaluate in one go.
    pub fn query_str(&self, expr: &str, context: Option<&Value>) -> Result<QueryResult, ParseError> {
        let query = QueryParser::parse(expr)?;
        Ok(self.query(&query, context))
    }

    /// Like [`Scope::query`], but if nothing resolves, `value` is stored at
    /// the location the query names. Missing intermediate fields become
    /// empty mappings; a condition selector that matches nothing appends to
    /// its sequence.
    ///
    /// ```
    /// use json_context_query::{Filters, QueryParser, Scope};
    /// use json_context_value::Value;
    /// use serde_json::json;
    ///
    /// let root = Value::from(json!({}));
    /// let filters = Filters::new();
    /// let scope = Scope::new(&root, &filters);
    ///
    /// let query = QueryParser::parse("lists.todo").unwrap();
    /// let result = scope.force(&query, None, &Value::empty_array());
    /// assert!(result.found());
    /// assert_eq!(root, json!({"lists": {"todo": []}}));
    /// ```
    pub fn force(&self, query: &Query, context: Option<&Value>, value: &Value) -> QueryResult {
        self.walk(query, context, Some(value))
    }

    fn walk(&self, query: &Query, context: Option<&Value>, force: Option<&Value>) -> QueryResult {
        let start = match query.origin {
            Origin::Root => self.root.clone(),
            Origin::Context => context.cloned().unwrap_or_default(),
        };

        let mut cursors = vec![Cursor {
            value: start,
            parent: None,
            key: None,
        }];
        let last = query.steps.len().saturating_sub(1);

        for (i, step) in query.steps.iter().enumerate() {
            let mut next = Vec::new();
            let mut vacancy = None;

            for cursor in &cursors {
                match self.step(step, cursor, context) {
                    StepOutcome::Found(found) => next.extend(found),
                    StepOutcome::Vacant { parent, key } => {
                        if vacancy.is_none() {
                            vacancy = Some((parent, key));
                        }
                    }
                    StepOutcome::Missing => {}
                }
            }

            if next.is_empty() {
                let Some((parent, key)) = vacancy else {
                    return QueryResult::default();
                };
                let Some(value) = force else {
                    return QueryResult {
                        value: None,
                        parent: Some(parent),
                        key: Some(key),
                    };
                };
                let fill = if i == last { value.clone() } else { Value::empty_object() };
                match place(&parent, key, fill.clone()) {
                    Some(key) => next.push(Cursor {
                        value: fill,
                        parent: Some(parent),
                        key: Some(key),
                    }),
                    None => {
                        return QueryResult {
                            value: None,
                            parent: Some(parent),
                            key: None,
                        }
                    }
                }
            }

            cursors = next;
        }

        match cursors.into_iter().next() {
            Some(cursor) => QueryResult {
                value: Some(cursor.value).filter(|v| !v.is_null()),
                parent: cursor.parent,
                key: cursor.key,
            },
            None => QueryResult::default(),
        }
    }

    fn step(&self, step: &Step, cursor: &Cursor, context: Option<&Value>) -> StepOutcome {
        match step {
            Step::Field(name) => field(&cursor.value, name),
            Step::Select(selector) => match selector {
                Selector::Name(name) => field(&cursor.value, name),
                Selector::Index(index) => index_of(&cursor.value, *index),
                Selector::Dynamic(query) => match self.get(query, context).and_then(|k| k.as_key()) {
                    Some(Key::Name(name)) => field(&cursor.value, &name),
                    Some(Key::Index(index)) => index_of(&cursor.value, index),
                    None => StepOutcome::Missing,
                },
                Selector::Each => children(&cursor.value),
                Selector::Where(conditions) => self.select_where(&cursor.value, conditions, context),
            },
            Step::Filter(call) => self.call_filter(call, &cursor.value, context),
        }
    }

    fn select_where(&self, value: &Value, conditions: &[Condition], context: Option<&Value>) -> StepOutcome {
        match value {
            Value::Array(arr) => {
                let items = arr.to_vec();
                let len = items.len();
                for (i, item) in items.into_iter().enumerate() {
                    if self.test_all(&item, conditions, context) {
                        return StepOutcome::Found(vec![Cursor {
                            value: item,
                            parent: Some(value.clone()),
                            key: Some(Key::Index(i)),
                        }]);
                    }
                }
                StepOutcome::Vacant {
                    parent: value.clone(),
                    key: Key::Index(len),
                }
            }
            Value::Object(obj) => {
                for (key, item) in obj.entries() {
                    if self.test_all(&item, conditions, context) {
                        return StepOutcome::Found(vec![Cursor {
                            value: item,
                            parent: Some(value.clone()),
                            key: Some(Key::Name(key)),
                        }]);
                    }
                }
                StepOutcome::Missing
            }
            _ => StepOutcome::Missing,
        }
    }

    fn test_all(&self, item: &Value, conditions: &[Condition], context: Option<&Value>) -> bool {
        conditions.iter().all(|condition| self.test(item, condition, context))
    }

    fn test(&self, item: &Value, condition: &Condition, context: Option<&Value>) -> bool {
        let actual = condition
            .path
            .iter()
            .try_fold(item.clone(), |value, segment| value.get_key(&Key::Name(segment.clone())))
            .unwrap_or_default();

        let result = match &condition.test {
            None => actual.is_truthy(),
            Some((op, operand)) => compare(*op, &actual, &self.operand(operand, context)),
        };
        result != condition.negate
    }

    /// Evaluates a literal or `{query}` operand against `context`.
    pub fn operand(&self, operand: &Operand, context: Option<&Value>) -> Value {
        match operand {
            Operand::Literal(value) => value.clone(),
            Operand::Query(query) => self.get(query, context).unwrap_or_default(),
        }
    }

    fn call_filter(&self, call: &FilterCall, input: &Value, context: Option<&Value>) -> StepOutcome {
        let Some(filter) = self.filters.get(&call.name) else {
            warn!(filter = %call.name, "query references an unknown filter");
            return StepOutcome::Missing;
        };
        let args: Vec<Value> = call.args.iter().map(|arg| self.operand(arg, context)).collect();
        StepOutcome::Found(vec![Cursor {
            value: filter(input, &args),
            parent: None,
            key: None,
        }])
    }
}

fn field(value: &Value, name: &str) -> StepOutcome {
    match value {
        Value::Object(obj) => match obj.get(name) {
            Some(child) if !child.is_null() => StepOutcome::Found(vec![Cursor {
                value: child,
                parent: Some(value.clone()),
                key: Some(Key::Name(name.to_string())),
            }]),
            _ => StepOutcome::Vacant {
                parent: value.clone(),
                key: Key::Name(name.to_string()),
            },
        },
        Value::Array(_) => match name.parse::<usize>() {
            Ok(index) => index_of(value, index),
            Err(_) => StepOutcome::Missing,
        },
        _ => StepOutcome::Missing,
    }
}

fn index_of(value: &Value, index: usize) -> StepOutcome {
    match value {
        Value::Array(arr) => match arr.get(index) {
            Some(child) if !child.is_null() => StepOutcome::Found(vec![Cursor {
                value: child,
                parent: Some(value.clone()),
                key: Some(Key::Index(index)),
            }]),
            _ => StepOutcome::Vacant {
                parent: value.clone(),
                key: Key::Index(index),
            },
        },
        Value::Object(_) => field(value, &index.to_string()),
        _ => StepOutcome::Missing,
    }
}

fn children(value: &Value) -> StepOutcome {
    let found: Vec<Cursor> = match value {
        Value::Array(arr) => arr
            .to_vec()
            .into_iter()
            .enumerate()
            .filter(|(_, child)| !child.is_null())
            .map(|(i, child)| Cursor {
                value: child,
                parent: Some(value.clone()),
                key: Some(Key::Index(i)),
            })
            .collect(),
        Value::Object(obj) => obj
            .entries()
            .into_iter()
            .filter(|(_, child)| !child.is_null())
            .map(|(key, child)| Cursor {
                value: child,
                parent: Some(value.clone()),
                key: Some(Key::Name(key)),
            })
            .collect(),
        _ => Vec::new(),
    };
    if found.is_empty() {
        StepOutcome::Missing
    } else {
        StepOutcome::Found(found)
    }
}

/// Stores `value` in `parent` at `key`; sequence slots past the end append.
/// Returns the key actually used.
fn place(parent: &Value, key: Key, value: Value) -> Option<Key> {
    match (parent, key) {
        (Value::Object(obj), key) => {
            let name = key.to_string();
            obj.insert(name.clone(), value);
            Some(Key::Name(name))
        }
        (Value::Array(arr), Key::Index(index)) => {
            let mut items = arr.borrow_mut();
            if index < items.len() {
                items[index] = value;
                Some(Key::Index(index))
            } else {
                items.push(value);
                Some(Key::Index(items.len() - 1))
            }
        }
        _ => None,
    }
}

/// Equality used by query conditions and filter patterns: identity for
/// nodes, value equality for scalars, and numbers equal to numeric strings.
///
/// ```
/// use json_context_query::loose_equal;
/// use json_context_value::Value;
///
/// assert!(loose_equal(&Value::from(1), &Value::from("1")));
/// assert!(!loose_equal(&Value::from("a"), &Value::from("b")));
/// ```
pub fn loose_equal(a: &Value, b: &Value) -> bool {
    if a.same(b) {
        return true;
    }
    match (a, b) {
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            matches!((a.to_number(), b.to_number()), (Some(x), Some(y)) if x == y)
        }
        _ => false,
    }
}

fn compare(op: CmpOp, a: &Value, b: &Value) -> bool {
    match op {
        CmpOp::Eq => loose_equal(a, b),
        CmpOp::Ne => !loose_equal(a, b),
        _ => {
            let ordering = match (a, b) {
                (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
                _ => match (a.to_number(), b.to_number()) {
                    (Some(x), Some(y)) => x.partial_cmp(&y),
                    _ => None,
                },
            };
            match (op, ordering) {
                (CmpOp::Gt, Some(o)) => o == Ordering::Greater,
                (CmpOp::Lt, Some(o)) => o == Ordering::Less,
                (CmpOp::Ge, Some(o)) => o != Ordering::Less,
                (CmpOp::Le, Some(o)) => o != Ordering::Greater,
                _ => false,
            }
        }
    }
}
