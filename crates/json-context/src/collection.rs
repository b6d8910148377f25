//! Collection membership: appending, relocating and removing entities.

use json_context_query::Scope;
use json_context_value::{ArrayRef, Key, ObjectRef, Value};
use tracing::{debug, trace};

use crate::matcher::MatcherEntry;

/// Where an entity ended up.
#[derive(Debug, Clone)]
pub(crate) struct Placement {
    pub(crate) collection: Value,
    pub(crate) key: Key,
    /// Previous home when the entity was moved.
    pub(crate) moved_from: Option<(Value, Key)>,
    /// A different entity that was stored under the same mapping key.
    pub(crate) displaced: Option<Value>,
}

/// Slot a new member will take in its collection.
enum Slot {
    End(ArrayRef),
    Named(ObjectRef, String),
}

/// Collection `entity` belongs in, created when missing.
fn target_collection(entry: &MatcherEntry, scope: &Scope<'_>, entity: &Value) -> Option<Value> {
    let query = entry.collection.as_ref()?;
    scope
        .force(query, Some(entity), &entry.empty_collection())
        .value
}

/// Works out where `entity` goes in `collection` without touching it.
fn slot(entry: &MatcherEntry, scope: &Scope<'_>, collection: &Value, entity: &Value) -> Option<Slot> {
    match collection {
        Value::Array(items) => Some(Slot::End(items.clone())),
        Value::Object(fields) => {
            let Some(name) = entry
                .collection_key
                .as_ref()
                .and_then(|query| scope.get(query, Some(entity)))
                .and_then(|key| key.as_key())
                .map(|key| key.to_string())
            else {
                debug!(matcher = entry.index, "collection key does not resolve");
                return None;
            };
            Some(Slot::Named(fields.clone(), name))
        }
        _ => {
            debug!(matcher = entry.index, "collection is not a node");
            None
        }
    }
}

fn store(slot: Slot, collection: Value, entity: &Value) -> Placement {
    let (key, displaced) = match slot {
        Slot::End(items) => {
            items.push(entity.clone());
            (Key::Index(items.len() - 1), None)
        }
        Slot::Named(fields, name) => {
            let displaced = fields
                .insert(name.clone(), entity.clone())
                .filter(|previous| !previous.same(entity));
            (Key::Name(name), displaced)
        }
    };
    Placement {
        collection,
        key,
        moved_from: None,
        displaced,
    }
}

/// Stores a new entity. Returns `None` when its location cannot be
/// resolved.
pub(crate) fn append(entry: &MatcherEntry, scope: &Scope<'_>, entity: &Value) -> Option<Placement> {
    if entry.collection.is_none() {
        let result = scope.force(&entry.item, Some(entity), entity);
        return Some(Placement {
            collection: result.parent?,
            key: result.key?,
            moved_from: None,
            displaced: None,
        });
    }

    let collection = target_collection(entry, scope, entity)?;
    let slot = slot(entry, scope, &collection, entity)?;
    Some(store(slot, collection, entity))
}

/// Moves `entity` when its fields now route it to another collection.
///
/// Returns the entity's current placement, or `None` when the matcher has
/// no collection or the entity cannot be located. An entity whose new home
/// cannot take it stays where it is.
pub(crate) fn ensure_correct_collection(
    entry: &MatcherEntry,
    scope: &Scope<'_>,
    entity: &Value,
) -> Option<Placement> {
    entry.collection.as_ref()?;
    let current = scope.query(&entry.item, Some(entity));
    let (collection, key) = (current.parent?, current.key?);
    let stay = |collection: Value, key: Key| Placement {
        collection,
        key,
        moved_from: None,
        displaced: None,
    };

    let Some(target) = target_collection(entry, scope, entity) else {
        debug!(matcher = entry.index, "no target collection, entity stays");
        return Some(stay(collection, key));
    };
    if collection.same(&target) {
        return Some(stay(collection, key));
    }
    let Some(slot) = slot(entry, scope, &target, entity) else {
        debug!(matcher = entry.index, at = %key, "entity stays in its collection");
        return Some(stay(collection, key));
    };

    trace!(matcher = entry.index, from = %key, "relocating entity");
    collection.remove_key(&key);
    let mut placement = store(slot, target, entity);
    placement.moved_from = Some((collection, key));
    Some(placement)
}
