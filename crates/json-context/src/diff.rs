//! Field-level change summaries.

use json_context_value::{deep_equal, is_meta, Map, Value};

use crate::change::{Action, DELETED};

/// Summarises which fields `candidate` sets relative to `original`.
///
/// Appends report every field except metadata and those the matcher's
/// pattern already pins down. Updates and removals report each field whose
/// value differs; a field the candidate drops is reported as `null`.
pub fn field_changes(
    action: Action,
    candidate: &Value,
    original: Option<&Value>,
    pattern: Option<&Value>,
) -> Map {
    let mut changes = Map::new();
    let Some(fields) = candidate.as_object() else {
        return changes;
    };

    match (action, original) {
        (Action::Append, _) | (_, None) => {
            let pinned = pattern.and_then(Value::as_object);
            for (key, value) in fields.entries() {
                if is_meta(&key) || pinned.is_some_and(|p| p.contains_key(&key)) {
                    continue;
                }
                changes.insert(key, value);
            }
        }
        (_, Some(original)) => {
            let mut keys = original.as_object().map(|o| o.keys()).unwrap_or_default();
            for key in fields.keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
            for key in keys {
                if is_meta(&key) || key == DELETED {
                    continue;
                }
                let before = original.get(&key).unwrap_or_default();
                let after = candidate.get(&key).unwrap_or_default();
                if !deep_equal(&before, &after) {
                    changes.insert(key, after);
                }
            }
        }
    }
    changes
}
