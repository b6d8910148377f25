//! Matcher configuration and its compiled form.
//!
//! A matcher is declared as plain JSON:
//!
//! ```json
//! {
//!   "match": {"type": "comment", "post_id": {"$present": true}},
//!   "item": "posts[id={.post_id}].comments[id={.id}]",
//!   "collection": "posts[id={.post_id}].comments",
//!   "sort": {"type": "after", "key": "after"},
//!   "allow": {"append": true, "update": ".original.author"}
//! }
//! ```

use std::rc::Rc;

use json_context_filter::matches;
use json_context_query::{Query, QueryParser, Scope};
use json_context_value::Value;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::permission::CompiledAllow;

/// One routing rule: which candidates it claims and where they live.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matcher {
    /// Pattern a candidate must satisfy. Absent means every candidate.
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Value>,
    /// Locates the candidate's existing entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    /// Locates the collection a new entity is appended to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// For mapping collections: the key to store the entity under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<Allow>,
    /// Top-level fields an update never deletes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preserve_keys: Vec<String>,
}

impl Matcher {
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            item: Some(item.into()),
            ..Self::default()
        }
    }

    /// Parses a matcher from its JSON declaration.
    pub fn from_json(json: serde_json::Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(json)?)
    }

    pub fn with_pattern(mut self, pattern: impl Into<Value>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_collection_key(mut self, key: impl Into<String>) -> Self {
        self.collection_key = Some(key.into());
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_allow(mut self, allow: Allow) -> Self {
        self.allow = Some(allow);
        self
    }

    pub fn preserving(mut self, key: impl Into<String>) -> Self {
        self.preserve_keys.push(key.into());
        self
    }
}

/// Ordering discipline for sequence collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKind {
    /// The sort field names the entity this one sits directly before.
    #[serde(alias = "relative-before")]
    Before,
    /// The sort field names the entity this one sits directly after.
    #[default]
    #[serde(alias = "relative-after")]
    After,
    /// The sort field is a numeric rank.
    #[serde(alias = "numeric", alias = "rank")]
    Float,
}

impl SortKind {
    fn default_key(self) -> &'static str {
        match self {
            SortKind::Before => "before",
            SortKind::After => "after",
            SortKind::Float => "rank",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    #[serde(rename = "type", default)]
    pub kind: SortKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Field identifying the neighbour named by a relative sort value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_key: Option<String>,
    /// Descending order for ranked sorts.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reverse: bool,
}

impl SortSpec {
    pub fn new(kind: SortKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_compare_key(mut self, key: impl Into<String>) -> Self {
        self.compare_key = Some(key.into());
        self
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Field holding the sort value.
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(self.kind.default_key())
    }

    pub fn compare_key(&self) -> &str {
        self.compare_key.as_deref().unwrap_or(DEFAULT_COMPARE_KEY)
    }
}

pub(crate) const DEFAULT_COMPARE_KEY: &str = "id";

/// Per-action permission block.
///
/// `change` is consulted first for every action; the action's own entry is
/// consulted only when `change` did not deny.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Allow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<Permission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append: Option<Permission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<Permission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove: Option<Permission>,
}

impl Allow {
    pub fn all() -> Self {
        Self {
            change: Some(Permission::Flag(true)),
            ..Self::default()
        }
    }
}

/// A literal verdict, or queries evaluated against the change descriptor.
/// A list passes only if every query does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Permission {
    Flag(bool),
    Query(String),
    All(Vec<String>),
}

/// A matcher with every expression parsed.
#[derive(Debug)]
pub(crate) struct MatcherEntry {
    pub(crate) index: usize,
    pub(crate) config: Rc<Matcher>,
    pub(crate) item: Query,
    pub(crate) collection: Option<Query>,
    pub(crate) collection_key: Option<Query>,
    pub(crate) allow: Option<CompiledAllow>,
}

impl MatcherEntry {
    pub(crate) fn compile(index: usize, config: Matcher) -> Result<Self, ConfigError> {
        let item = match &config.item {
            Some(expr) => parse(index, "item", expr)?,
            None => return Err(ConfigError::MissingItem(index)),
        };
        let collection = config
            .collection
            .as_deref()
            .map(|expr| parse(index, "collection", expr))
            .transpose()?;
        let collection_key = config
            .collection_key
            .as_deref()
            .map(|expr| parse(index, "collectionKey", expr))
            .transpose()?;
        if collection_key.is_some() && collection.is_none() {
            return Err(ConfigError::CollectionKeyWithoutCollection(index));
        }
        let allow = config
            .allow
            .as_ref()
            .map(|allow| CompiledAllow::compile(index, allow))
            .transpose()?;

        Ok(Self {
            index,
            config: Rc::new(config),
            item,
            collection,
            collection_key,
            allow,
        })
    }

    pub(crate) fn accepts(&self, candidate: &Value, scope: &Scope<'_>) -> bool {
        match &self.config.pattern {
            Some(pattern) => matches(candidate, pattern, scope),
            None => true,
        }
    }

    /// Seed stored when the collection has to be created.
    pub(crate) fn empty_collection(&self) -> Value {
        if self.collection_key.is_some() {
            Value::empty_object()
        } else {
            Value::empty_array()
        }
    }
}

pub(crate) fn parse(index: usize, field: &'static str, expr: &str) -> Result<Query, ConfigError> {
    QueryParser::parse(expr).map_err(|source| ConfigError::InvalidQuery {
        index,
        field,
        expr: expr.to_string(),
        source,
    })
}

/// Every matcher accepting `candidate`, in declaration order.
pub(crate) fn resolve(
    matchers: &[Rc<MatcherEntry>],
    candidate: &Value,
    scope: &Scope<'_>,
) -> Vec<Rc<MatcherEntry>> {
    matchers
        .iter()
        .filter(|entry| entry.accepts(candidate, scope))
        .cloned()
        .collect()
}
