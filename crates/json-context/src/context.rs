//! The change coordinator.

use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use chrono::Utc;
use json_context_filter::matches;
use json_context_query::{Filters, ParseError, QueryResult, Scope};
use json_context_value::{obtain, Key, Value};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::change::{Action, Change, Outcome, PushOptions, PushResult, SourceId, DELETED};
use crate::collection::{append, ensure_correct_collection};
use crate::diff::field_changes;
use crate::error::{ChangeError, ConfigError};
use crate::matcher::{resolve, Matcher, MatcherEntry};
use crate::merge::merge_into;
use crate::options::ContextOptions;
use crate::permission::check_allowed;
use crate::sort::{assign_rank, ensure_correct_position};

pub type ListenerId = u64;
pub type WatchId = u64;

type Listener = Box<dyn FnMut(&Change)>;

struct Watcher {
    pattern: Value,
    callback: Listener,
}

/// An accepted change kept for backfill.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub time: i64,
    /// Sanitized snapshot of the entity after the change.
    pub object: Value,
    pub source: Option<SourceId>,
}

/// Entities on either side of an entity in its sequence.
#[derive(Debug, Clone, Default)]
pub struct Siblings {
    pub previous: Option<Value>,
    pub next: Option<Value>,
}

/// What [`JsonContext::update`] starts from.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// Resolved with the update fields as context.
    Query(&'a str),
    Object(&'a Value),
}

impl<'a> From<&'a str> for Target<'a> {
    fn from(expr: &'a str) -> Self {
        Target::Query(expr)
    }
}

impl<'a> From<&'a Value> for Target<'a> {
    fn from(value: &'a Value) -> Self {
        Target::Object(value)
    }
}

#[derive(Serialize)]
struct Snapshot<'a> {
    data: serde_json::Value,
    matchers: Vec<&'a Matcher>,
}

/// A document tree plus the matchers that route changes into it.
pub struct JsonContext {
    data: Value,
    matchers: Vec<Rc<MatcherEntry>>,
    filters: Rc<Filters>,
    default_allow: bool,
    history: VecDeque<HistoryEntry>,
    history_limit: usize,
    next_listener_id: u64,
    listeners: BTreeMap<ListenerId, Listener>,
    next_watch_id: u64,
    watchers: BTreeMap<WatchId, Watcher>,
    next_source_id: u64,
}

impl JsonContext {
    /// Builds a context, compiling every matcher expression up front.
    ///
    /// ```
    /// use json_context::{ContextOptions, JsonContext, Matcher, PushOptions};
    /// use json_context_value::Value;
    /// use serde_json::json;
    ///
    /// let mut ctx = JsonContext::new(
    ///     ContextOptions::new()
    ///         .with_data(json!({"pages": []}))
    ///         .with_matcher(Matcher::new("pages[id={.id}]").with_collection("pages")),
    /// )
    /// .unwrap();
    ///
    /// let result = ctx.push_change(Value::from(json!({"id": 1})), PushOptions::default());
    /// assert!(result.accepted);
    /// assert_eq!(*ctx.data(), json!({"pages": [{"id": 1}]}));
    /// ```
    pub fn new(options: ContextOptions) -> Result<Self, ConfigError> {
        if !options.data.is_node() {
            return Err(ConfigError::InvalidRoot);
        }
        let matchers = options
            .matchers
            .into_iter()
            .enumerate()
            .map(|(index, matcher)| MatcherEntry::compile(index, matcher).map(Rc::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            data: options.data,
            matchers,
            filters: Rc::new(options.filters),
            default_allow: options.default_allow,
            history: VecDeque::new(),
            history_limit: options.history_limit,
            next_listener_id: 1,
            listeners: BTreeMap::new(),
            next_watch_id: 1,
            watchers: BTreeMap::new(),
            next_source_id: 1,
        })
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn matchers(&self) -> impl Iterator<Item = &Matcher> {
        self.matchers.iter().map(|entry| entry.config.as_ref())
    }

    fn scope(&self) -> Scope<'_> {
        Scope::new(&self.data, &self.filters)
    }

    pub fn query(&self, expr: &str, context: Option<&Value>) -> Result<QueryResult, ParseError> {
        self.scope().query_str(expr, context)
    }

    pub fn get(&self, expr: &str, context: Option<&Value>) -> Result<Option<Value>, ParseError> {
        Ok(self.query(expr, context)?.value)
    }

    /// Sanitized deep copy of what `expr` resolves to.
    pub fn obtain(&self, expr: &str, context: Option<&Value>) -> Result<Option<Value>, ParseError> {
        Ok(self.get(expr, context)?.as_ref().map(obtain))
    }

    /// Configured matchers whose pattern accepts `object`.
    pub fn matchers_for(&self, object: &Value) -> Vec<&Matcher> {
        let scope = self.scope();
        self.matchers
            .iter()
            .filter(|entry| entry.accepts(object, &scope))
            .map(|entry| entry.config.as_ref())
            .collect()
    }

    /// Neighbours of `object` in the sequence its first matcher keeps it in.
    pub fn siblings(&self, object: &Value) -> Siblings {
        let scope = self.scope();
        let Some(entry) = self.matchers.iter().find(|entry| entry.accepts(object, &scope)) else {
            return Siblings::default();
        };
        let found = scope.query(&entry.item, Some(object));
        match (found.parent, found.key.as_ref().and_then(Key::as_index)) {
            (Some(Value::Array(items)), Some(index)) => Siblings {
                previous: index.checked_sub(1).and_then(|i| items.get(i)),
                next: items.get(index + 1),
            },
            _ => Siblings::default(),
        }
    }

    /// Obtains a copy of `target`, overlays `fields` and pushes the result.
    pub fn update<'a>(
        &mut self,
        target: impl Into<Target<'a>>,
        fields: &Value,
        options: PushOptions,
    ) -> Result<PushResult, ParseError> {
        let copy = match target.into() {
            Target::Query(expr) => self.obtain(expr, Some(fields))?,
            Target::Object(object) => Some(obtain(object)),
        }
        .filter(Value::is_object)
        .unwrap_or_else(Value::empty_object);

        if let Some(fields) = fields.as_object() {
            for (key, value) in fields.entries() {
                copy.set(key, value);
            }
        }
        Ok(self.push_change(copy, options))
    }

    /// The document (sanitized) and matcher configuration, in the shape
    /// [`ContextOptions::from_json`] reads back.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(Snapshot {
            data: self.data.to_json_sanitized(),
            matchers: self.matchers().collect(),
        })
    }

    /// Registers a listener for every accepted change.
    pub fn on_change<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&Change) + 'static,
    {
        let id = self.next_listener_id;
        self.next_listener_id = self.next_listener_id.saturating_add(1);
        self.listeners.insert(id, Box::new(listener));
        id
    }

    pub fn off_change(&mut self, listener_id: ListenerId) -> bool {
        self.listeners.remove(&listener_id).is_some()
    }

    /// Registers a callback for accepted changes whose candidate matches
    /// `pattern`. Runs after the document-wide listeners.
    pub fn watch<F>(&mut self, pattern: impl Into<Value>, callback: F) -> WatchId
    where
        F: FnMut(&Change) + 'static,
    {
        let id = self.next_watch_id;
        self.next_watch_id = self.next_watch_id.saturating_add(1);
        self.watchers.insert(
            id,
            Watcher {
                pattern: pattern.into(),
                callback: Box::new(callback),
            },
        );
        id
    }

    pub fn unwatch(&mut self, watch_id: WatchId) -> bool {
        self.watchers.remove(&watch_id).is_some()
    }

    pub(crate) fn next_source_id(&mut self) -> SourceId {
        let id = SourceId(self.next_source_id);
        self.next_source_id = self.next_source_id.saturating_add(1);
        id
    }

    /// Recorded changes newer than `since`, oldest first.
    pub fn changes_since(&self, since: i64) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter().filter(move |entry| entry.time > since)
    }

    /// Routes `object` through every matcher that accepts it.
    ///
    /// Each matcher is handled independently: one may apply the change
    /// while another rejects it. Nothing here fails; denials are reported
    /// in [`PushResult::errors`].
    pub fn push_change(&mut self, object: Value, options: PushOptions) -> PushResult {
        let data = self.data.clone();
        let filters = Rc::clone(&self.filters);
        let scope = Scope::new(&data, &filters);

        let routed = match options.matcher {
            Some(index) => match self.matchers.get(index) {
                Some(entry) => vec![Rc::clone(entry)],
                None => {
                    warn!(matcher = index, "push routed to unknown matcher");
                    Vec::new()
                }
            },
            None => resolve(&self.matchers, &object, &scope),
        };
        let mut result = PushResult::default();
        if routed.is_empty() {
            trace!("no matcher accepts change");
            return result;
        }

        let watching: Vec<WatchId> = self
            .watchers
            .iter()
            .filter(|(_, watcher)| matches(&object, &watcher.pattern, &scope))
            .map(|(id, _)| *id)
            .collect();
        let time = options.time.unwrap_or_else(|| Utc::now().timestamp_millis());

        for entry in routed {
            let change = self.apply(&entry, &object, &options, time, &scope);
            match change.outcome {
                Outcome::Accepted => {
                    result.accepted = true;
                    if let Some(previous) = &change.displaced {
                        let removal = displaced_removal(&change, previous);
                        self.record(&removal);
                        self.emit(&removal, &watching);
                        result.changes.push(removal);
                    }
                    self.record(&change);
                    self.emit(&change, &watching);
                }
                Outcome::Rejected => result.errors.push(ChangeError::PermissionDenied {
                    matcher: entry.index,
                    action: change.action,
                }),
                Outcome::Skipped => {}
            }
            result.changes.push(change);
        }
        result
    }

    fn apply(
        &self,
        entry: &MatcherEntry,
        object: &Value,
        options: &PushOptions,
        time: i64,
        scope: &Scope<'_>,
    ) -> Change {
        let found = scope.query(&entry.item, Some(object));
        let existing = found.value.clone();
        let action = Action::classify(object, existing.as_ref());

        let mut change = Change::new(action, object, Rc::clone(&entry.config), entry.index, options, time);
        change.original = existing.as_ref().map(obtain);
        if existing.is_some() {
            change.collection = found.parent.clone();
            change.key = found.key.clone();
        }
        change.changes = field_changes(
            action,
            object,
            change.original.as_ref(),
            entry.config.pattern.as_ref(),
        );
        change.verified_change = check_allowed(entry.allow.as_ref(), &change, scope, self.default_allow);
        debug!(
            matcher = entry.index,
            %action,
            verified = change.verified_change,
            "classified change"
        );

        if !change.verified_change {
            change.outcome = Outcome::Rejected;
            return change;
        }

        match action {
            Action::Append => {
                let Some(placement) = append(entry, scope, object) else {
                    trace!(matcher = entry.index, "no location for new entity");
                    return change;
                };
                change.collection = Some(placement.collection);
                change.key = Some(placement.key);
                change.displaced = placement.displaced;
                self.position(entry, &mut change, object, options);
                if let (Some(Value::Array(items)), Some(sort)) = (&change.collection, &entry.config.sort) {
                    if let Some(rank) = assign_rank(object, items, sort) {
                        debug!(matcher = entry.index, rank, "assigned rank");
                    }
                }
                change.entity = Some(object.clone());
            }
            Action::Update => {
                let (Some(entity), Some(_), Some(_)) = (existing, &change.collection, &change.key) else {
                    trace!(matcher = entry.index, "update target has no location");
                    return change;
                };
                let merged = merge_into(&entity, object, &entry.config.preserve_keys);
                change.added_items = merged.added_items;
                change.removed_items = merged.removed_items;
                if let Some(placement) = ensure_correct_collection(entry, scope, &entity) {
                    if let Some((collection, key)) = placement.moved_from {
                        debug!(matcher = entry.index, from = %key, to = %placement.key, "moved entity");
                        change.original_collection = Some(collection);
                        change.original_key = Some(key);
                    }
                    change.collection = Some(placement.collection);
                    change.key = Some(placement.key);
                    change.displaced = placement.displaced;
                }
                self.position(entry, &mut change, &entity, options);
                change.entity = Some(entity);
            }
            Action::Remove => {
                let (Some(entity), Some(collection), Some(key)) = (existing, &change.collection, &change.key) else {
                    trace!(matcher = entry.index, "nothing to remove");
                    return change;
                };
                collection.remove_key(key);
                entity.set(DELETED, Value::Bool(true));
                change.entity = Some(entity);
            }
        }

        change.outcome = Outcome::Accepted;
        change
    }

    fn position(&self, entry: &MatcherEntry, change: &mut Change, entity: &Value, options: &PushOptions) {
        let Some(Value::Array(items)) = &change.collection else {
            return;
        };
        let moved = ensure_correct_position(
            entity,
            items,
            entry.config.sort.as_ref(),
            options.after.as_ref(),
            !options.external,
        );
        if let Some(outcome) = moved {
            debug!(matcher = entry.index, index = outcome.index, "repositioned entity");
            change.key = Some(Key::Index(outcome.index));
            change.before = outcome.before;
            change.after = outcome.after;
        }
    }

    fn record(&mut self, change: &Change) {
        if self.history_limit == 0 {
            return;
        }
        let Some(object) = change.snapshot() else {
            return;
        };
        if self.history.len() == self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(HistoryEntry {
            time: change.time,
            object,
            source: change.source,
        });
    }

    fn emit(&mut self, change: &Change, watching: &[WatchId]) {
        for listener in self.listeners.values_mut() {
            listener(change);
        }
        for id in watching {
            if let Some(watcher) = self.watchers.get_mut(id) {
                (watcher.callback)(change);
            }
        }
    }
}

/// Remove change for an entity overwritten under a mapping key.
fn displaced_removal(change: &Change, previous: &Value) -> Change {
    let options = PushOptions {
        verified_change: change.verified_change,
        source: change.source,
        external: change.external,
        ..PushOptions::default()
    };
    let mut removal = Change::new(
        Action::Remove,
        previous,
        Rc::clone(&change.matcher),
        change.matcher_index,
        &options,
        change.time,
    );
    removal.original = Some(obtain(previous));
    previous.set(DELETED, Value::Bool(true));
    removal.collection = change.collection.clone();
    removal.key = change.key.clone();
    removal.entity = Some(previous.clone());
    removal.outcome = Outcome::Accepted;
    debug!(matcher = change.matcher_index, key = ?removal.key, "entity displaced");
    removal
}

impl std::fmt::Debug for JsonContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonContext")
            .field("data", &self.data)
            .field("matchers", &self.matchers.len())
            .field("listeners", &self.listeners.len())
            .field("watchers", &self.watchers.len())
            .finish()
    }
}
