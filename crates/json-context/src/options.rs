//! Context configuration.

use std::str::FromStr;

use json_context_query::Filters;
use json_context_value::Value;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::matcher::Matcher;

/// Everything needed to build a [`JsonContext`](crate::JsonContext).
///
/// Deserializes from the same JSON shape a context snapshot uses:
///
/// ```
/// use json_context::ContextOptions;
/// use serde_json::json;
///
/// let options = ContextOptions::from_json(json!({
///     "data": {"items": []},
///     "matchers": [{"match": {"type": "item"}, "item": "items[id={.id}]", "collection": "items"}],
///     "defaultAllow": false,
///     "historyLimit": 100
/// }))
/// .unwrap();
/// assert_eq!(options.matchers.len(), 1);
/// assert!(!options.default_allow);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextOptions {
    #[serde(default = "Value::empty_object")]
    pub data: Value,
    #[serde(default)]
    pub matchers: Vec<Matcher>,
    /// Verdict for matchers without an `allow` block.
    #[serde(default = "default_allow")]
    pub default_allow: bool,
    /// Accepted changes kept for `since` backfill. Zero keeps none.
    #[serde(default)]
    pub history_limit: usize,
    #[serde(skip)]
    pub filters: Filters,
}

fn default_allow() -> bool {
    true
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            data: Value::empty_object(),
            matchers: Vec::new(),
            default_allow: default_allow(),
            history_limit: 0,
            filters: Filters::new(),
        }
    }
}

impl ContextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: serde_json::Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(json)?)
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matchers.push(matcher);
        self
    }

    pub fn with_filter<F>(mut self, name: impl Into<String>, filter: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Value + 'static,
    {
        self.filters.insert(name, filter);
        self
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Deny changes routed to matchers without an `allow` block.
    pub fn strict(mut self) -> Self {
        self.default_allow = false;
        self
    }
}

impl FromStr for ContextOptions {
    type Err = ConfigError;

    fn from_str(json: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(json)?)
    }
}
