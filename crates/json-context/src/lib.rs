//! Matcher-driven change reconciliation for shared JSON document trees.
//!
//! A [`JsonContext`] owns a document and a list of [`Matcher`]s. Each
//! pushed object is routed to every matcher whose pattern accepts it; the
//! matcher's `item` expression locates the existing entity, which decides
//! whether the push appends, updates in place, or removes (`_deleted`).
//! Permission rules, collection relocation and ordering (relative links or
//! numeric ranks) are applied per matcher, and every accepted mutation is
//! announced to listeners and to any [`ChangeStream`] replicas.
//!
//! # Example
//!
//! ```
//! use json_context::{ContextOptions, JsonContext, PushOptions};
//! use json_context_value::Value;
//! use serde_json::json;
//!
//! let mut ctx = JsonContext::new(
//!     ContextOptions::from_json(json!({
//!         "data": {"pages": []},
//!         "matchers": [{
//!             "match": {"type": "page"},
//!             "item": "pages[id={.id}]",
//!             "collection": "pages",
//!             "allow": {"append": true, "update": ".original.editable"}
//!         }]
//!     }))
//!     .unwrap(),
//! )
//! .unwrap();
//!
//! let page = json!({"type": "page", "id": 1, "title": "Draft", "editable": true});
//! assert!(ctx.push_change(Value::from(page), PushOptions::default()).accepted);
//!
//! let edit = json!({"type": "page", "id": 1, "title": "Final"});
//! let result = ctx.push_change(Value::from(edit), PushOptions::default());
//! assert!(result.accepted);
//! assert_eq!(result.changes[0].changes["title"], json!("Final"));
//!
//! // `editable` was dropped by the last update, so the next one is denied.
//! let edit = json!({"type": "page", "id": 1, "title": "Again"});
//! let result = ctx.push_change(Value::from(edit), PushOptions::default());
//! assert!(!result.accepted);
//! assert_eq!(result.errors.len(), 1);
//! ```

mod change;
mod collection;
mod context;
mod diff;
mod error;
mod matcher;
mod merge;
mod options;
mod permission;
mod sort;
mod stream;

pub use change::{
    Action, Change, Neighbor, Outcome, Position, PushOptions, PushResult, SourceId, DELETED,
};
pub use context::{HistoryEntry, JsonContext, ListenerId, Siblings, Target, WatchId};
pub use diff::field_changes;
pub use error::{ChangeError, ConfigError, StreamError};
pub use matcher::{Allow, Matcher, Permission, SortKind, SortSpec};
pub use merge::{merge_into, MergeResult};
pub use options::ContextOptions;
pub use stream::{ChangeStream, Message, StreamOptions};

pub use json_context_query::{Filters, ParseError, QueryResult};
pub use json_context_value::{obtain, Key, Value};
