//! Path-expression language over json-context documents.
//!
//! Queries locate a value relative to the document root or to a context
//! value, and report the node holding it and its key there, so callers can
//! splice, replace or delete in place.
//!
//! # Syntax
//!
//! | expression            | meaning                                              |
//! |-----------------------|------------------------------------------------------|
//! | `post`                | root field                                           |
//! | `.id`                 | field of the context value (`.` is the context)      |
//! | `pages[3]`            | sequence index                                       |
//! | `pages['a b']`        | literal key                                          |
//! | `pages[{.id}]`        | key computed by a sub-query                          |
//! | `pages[id={.id}]`     | first child whose `id` equals the context's `id`     |
//! | `pages[type=page&n>2]`| several conditions (`=`, `!=`, `>`, `<`, `>=`, `<=`) |
//! | `pages[!draft]`       | first child whose `draft` is falsy                   |
//! | `lists[*][id=1]`      | try every child, keep the first branch that resolves |
//! | `:name(arg, {query})` | named filter                                         |
//!
//! # Example
//!
//! ```
//! use json_context_query::{Filters, QueryParser, Scope};
//! use json_context_value::{Key, Value};
//! use serde_json::json;
//!
//! let root = Value::from(json!({"pages": [{"id": 1}, {"id": 2}]}));
//! let filters = Filters::new();
//! let scope = Scope::new(&root, &filters);
//!
//! let query = QueryParser::parse("pages[id={.id}]").unwrap();
//! let candidate = Value::from(json!({"id": 2}));
//! let result = scope.query(&query, Some(&candidate));
//!
//! assert_eq!(result.value.unwrap(), json!({"id": 2}));
//! assert_eq!(result.key, Some(Key::Index(1)));
//! assert!(result.parent.unwrap().same(&root.get("pages").unwrap()));
//! ```

mod types;
pub use types::*;

mod parser;
pub use parser::{ParseError, QueryParser};

mod eval;
pub use eval::{loose_equal, QueryResult, Scope};

mod filters;
pub use filters::{FilterFn, Filters};
