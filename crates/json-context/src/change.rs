//! Change descriptors and push options.

use std::fmt;
use std::rc::Rc;

use json_context_value::{obtain, Key, Map, Value};
use serde::Serialize;

use crate::error::ChangeError;
use crate::matcher::Matcher;

/// What a candidate asks of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Append,
    Update,
    Remove,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Append => "append",
            Action::Update => "update",
            Action::Remove => "remove",
        }
    }

    /// A truthy `_deleted` asks for removal, an existing entity for an
    /// update, anything else for an append.
    pub fn classify(candidate: &Value, existing: Option<&Value>) -> Self {
        if candidate.get(DELETED).is_some_and(|v| v.is_truthy()) {
            Action::Remove
        } else if existing.is_some() {
            Action::Update
        } else {
            Action::Append
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field that marks a candidate (and a removed entity) as deleted.
pub const DELETED: &str = "_deleted";

/// How one matcher's evaluation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Applied and announced to listeners.
    Accepted,
    /// Denied by the permission check. Nothing changed.
    Rejected,
    /// Permitted but nothing to do: removal of an unknown entity, or a
    /// location that could not be resolved.
    Skipped,
}

/// Neighbour reported by the ordering engine.
#[derive(Debug, Clone)]
pub enum Neighbor {
    Start,
    End,
    Entity(Value),
}

impl Neighbor {
    pub fn entity(&self) -> Option<&Value> {
        match self {
            Neighbor::Entity(value) => Some(value),
            _ => None,
        }
    }
}

/// Explicit placement requested by the pusher. Overrides the matcher's sort.
#[derive(Debug, Clone)]
pub enum Position {
    Start,
    /// Directly after this entity, found by identity or by the sort's
    /// comparison field.
    After(Value),
}

/// Identifies a replication stream so its own changes are not echoed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub(crate) u64);

impl SourceId {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Skip the permission check.
    pub verified_change: bool,
    /// Route to this matcher index instead of resolving.
    pub matcher: Option<usize>,
    pub after: Option<Position>,
    pub source: Option<SourceId>,
    /// The change arrives from a replica; duplicate suppression is off.
    pub external: bool,
    /// Timestamp in milliseconds. Defaults to now.
    pub time: Option<i64>,
}

impl PushOptions {
    pub fn verified() -> Self {
        Self {
            verified_change: true,
            ..Self::default()
        }
    }

    pub fn with_matcher(mut self, index: usize) -> Self {
        self.matcher = Some(index);
        self
    }

    pub fn with_after(mut self, position: Position) -> Self {
        self.after = Some(position);
        self
    }

    pub fn from_source(mut self, source: SourceId) -> Self {
        self.source = Some(source);
        self.external = true;
        self
    }

    pub fn at(mut self, time: i64) -> Self {
        self.time = Some(time);
        self
    }
}

/// Everything known about one matcher's evaluation of a candidate.
#[derive(Debug, Clone)]
pub struct Change {
    pub action: Action,
    pub outcome: Outcome,
    pub matcher: Rc<Matcher>,
    pub matcher_index: usize,
    /// The candidate as pushed.
    pub object: Value,
    /// The node in the tree the change landed on.
    pub entity: Option<Value>,
    /// Sanitized snapshot of the entity before the change.
    pub original: Option<Value>,
    pub collection: Option<Value>,
    pub key: Option<Key>,
    /// Set when the entity moved to another collection.
    pub original_collection: Option<Value>,
    pub original_key: Option<Key>,
    /// Fields the change sets, `null` for fields it clears.
    pub changes: Map,
    pub verified_change: bool,
    pub before: Option<Neighbor>,
    pub after: Option<Neighbor>,
    pub added_items: Vec<Value>,
    pub removed_items: Vec<Value>,
    /// A different entity this one replaced under its mapping key. It is
    /// announced as removed ahead of this change.
    pub displaced: Option<Value>,
    pub source: Option<SourceId>,
    pub external: bool,
    pub time: i64,
}

impl Change {
    pub(crate) fn new(
        action: Action,
        object: &Value,
        matcher: Rc<Matcher>,
        matcher_index: usize,
        options: &PushOptions,
        time: i64,
    ) -> Self {
        Self {
            action,
            outcome: Outcome::Skipped,
            matcher,
            matcher_index,
            object: object.clone(),
            entity: None,
            original: None,
            collection: None,
            key: None,
            original_collection: None,
            original_key: None,
            changes: Map::new(),
            verified_change: options.verified_change,
            before: None,
            after: None,
            added_items: Vec::new(),
            removed_items: Vec::new(),
            displaced: None,
            source: options.source,
            external: options.external,
            time,
        }
    }

    pub fn accepted(&self) -> bool {
        self.outcome == Outcome::Accepted
    }

    /// Sanitized copy of the entity as it now stands.
    pub fn snapshot(&self) -> Option<Value> {
        self.entity.as_ref().map(obtain)
    }

    /// The descriptor as a document, the context permission queries see.
    ///
    /// Nodes are shared, not copied.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("action".into(), Value::from(self.action.as_str()));
        map.insert("object".into(), self.object.clone());
        map.insert("original".into(), self.original.clone().unwrap_or_default());
        map.insert("changes".into(), Value::object(self.changes.clone()));
        map.insert("collection".into(), self.collection.clone().unwrap_or_default());
        map.insert("key".into(), key_value(self.key.as_ref()));
        map.insert("verifiedChange".into(), Value::from(self.verified_change));
        map.insert("external".into(), Value::from(self.external));
        map.insert("time".into(), Value::from(self.time));
        Value::object(map)
    }
}

fn key_value(key: Option<&Key>) -> Value {
    match key {
        Some(Key::Index(i)) => Value::from(*i),
        Some(Key::Name(name)) => Value::from(name.as_str()),
        None => Value::Null,
    }
}

/// Aggregate of a push across every routed matcher.
#[derive(Debug, Default)]
pub struct PushResult {
    /// At least one matcher applied the change.
    pub accepted: bool,
    pub changes: Vec<Change>,
    pub errors: Vec<ChangeError>,
}

impl PushResult {
    /// No matcher claimed the candidate.
    pub fn unmatched(&self) -> bool {
        self.changes.is_empty()
    }
}
