//! Error types.

use json_context_query::ParseError;
use thiserror::Error;

use crate::change::Action;

/// Invalid engine configuration. Raised only while building a context.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("matcher {index}: invalid `{field}` expression {expr:?}: {source}")]
    InvalidQuery {
        index: usize,
        field: &'static str,
        expr: String,
        #[source]
        source: ParseError,
    },
    #[error("matcher {0}: missing `item` expression")]
    MissingItem(usize),
    #[error("matcher {0}: `collectionKey` requires `collection`")]
    CollectionKeyWithoutCollection(usize),
    #[error("document root must be a mapping or a sequence")]
    InvalidRoot,
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Non-fatal rejection collected into a push result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChangeError {
    #[error("{action} denied by matcher {matcher}")]
    PermissionDenied { matcher: usize, action: Action },
}

/// Replication stream failures.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream is closed")]
    Closed,
    #[error("undecodable line {line:?}: {source}")]
    Decode {
        line: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}
