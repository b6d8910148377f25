//! Declarative pattern matching for json-context values.
//!
//! A pattern is itself a JSON value. Mapping patterns test fields of the
//! candidate; scalar patterns test (loose) equality; fields whose name
//! starts with `$` are operators:
//!
//! | operator                  | holds when                                          |
//! |---------------------------|-----------------------------------------------------|
//! | `$present: bool`          | the value exists (or does not)                      |
//! | `$any: [v, ...]`          | the value equals one of the listed values           |
//! | `$matchAny: [p, ...]`     | the value matches one of the listed patterns        |
//! | `$not: p`                 | the value does not match `p`                        |
//! | `$contains: v` / `[v..]`  | a sequence holds every `v`; a string holds substring|
//! | `$excludes: v` / `[v..]`  | a sequence holds none of `v`                        |
//! | `$only: [v, ...]`         | every element of a sequence is listed               |
//! | `$query: "expr"`          | the value equals the query result (candidate as context) |
//! | `$test: "expr"`           | the query, with the value as context, is truthy     |
//! | `$regex: "re"`            | a string value matches the expression               |
//!
//! # Example
//!
//! ```
//! use json_context_filter::matches;
//! use json_context_query::{Filters, Scope};
//! use json_context_value::Value;
//! use serde_json::json;
//!
//! let root = Value::from(json!({"current_user": "u1"}));
//! let filters = Filters::new();
//! let scope = Scope::new(&root, &filters);
//!
//! let pattern = Value::from(json!({"type": "comment", "user_id": {"$query": "current_user"}}));
//! let comment = Value::from(json!({"type": "comment", "user_id": "u1"}));
//! assert!(matches(&comment, &pattern, &scope));
//! assert!(!matches(&Value::from(json!({"type": "comment", "user_id": "u2"})), &pattern, &scope));
//! assert!(!matches(&Value::from(json!({"type": "post"})), &pattern, &scope));
//! ```

mod pattern;

pub use pattern::{matches, matches_field};
