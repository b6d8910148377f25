//! json-context-value - shared document nodes for json-context.
//!
//! A document is a tree of [`Value`]s. Scalars are plain values; sequences
//! and mappings are reference-counted, interior-mutable nodes so that the
//! engine can locate a node once and then update it in place while every
//! other holder of the same handle observes the change.
//!
//! # Example
//!
//! ```
//! use json_context_value::{obtain, Value};
//! use serde_json::json;
//!
//! let doc = Value::from(json!({"post": {"id": 1, "$meta": "internal"}}));
//! let post = doc.get("post").unwrap();
//!
//! // Handles share the node.
//! post.set("title", Value::from("Hello"));
//! assert_eq!(doc, json!({"post": {"id": 1, "$meta": "internal", "title": "Hello"}}));
//!
//! // `obtain` hands out a detached copy without metadata.
//! let copy = obtain(&post);
//! assert!(!copy.same(&post));
//! assert_eq!(copy, json!({"id": 1, "title": "Hello"}));
//! ```

mod convert;
pub mod json_clone;
pub mod json_equal;
mod key;
pub mod meta;
mod value;

pub use json_clone::{deep_clone, obtain};
pub use json_equal::{deep_equal, scalar_equal};
pub use key::Key;
pub use meta::{is_meta, META_PREFIX};
pub use value::{ArrayRef, Map, ObjectRef, Value};
