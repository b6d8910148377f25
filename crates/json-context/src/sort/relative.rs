//! Relative sort: an entity names the neighbour it sits before or after.
//!
//! The sort value `-1` stands for the end of the sequence (for `before`) or
//! the start (for `after`).

use json_context_value::{ArrayRef, Value};
use tracing::trace;

use super::{move_to, next, previous, SortOutcome};
use crate::matcher::{SortKind, SortSpec};

pub(super) fn sort(entity: &Value, items: &ArrayRef, spec: &SortSpec, avoid_duplicates: bool) -> Option<SortOutcome> {
    let target_id = entity.get(spec.key()).filter(Value::is_truthy)?;
    let index = items.position(entity)?;
    let compare_key = spec.compare_key();
    let sentinel = is_sentinel(&target_id);

    if in_place(items, index, spec.kind, &target_id, compare_key, sentinel) {
        return None;
    }

    let target = if sentinel {
        match spec.kind {
            SortKind::Before => items.len(),
            _ => 0,
        }
    } else {
        let found = find(items, entity, &target_id, compare_key)?;
        match spec.kind {
            SortKind::Before => found,
            _ => found + 1,
        }
    };

    if avoid_duplicates && !sentinel && conflicts(entity, items, target, spec) {
        trace!(%target_id, "neighbour already claims this slot");
        return None;
    }

    let index = move_to(items, index, target);
    Some(match spec.kind {
        SortKind::Before => SortOutcome {
            index,
            before: Some(next(items, index)),
            after: None,
        },
        _ => SortOutcome {
            index,
            before: None,
            after: Some(previous(items, index)),
        },
    })
}

fn is_sentinel(value: &Value) -> bool {
    matches!(value, Value::Number(_)) && value.to_number() == Some(-1.0)
}

fn identifies(item: &Value, target_id: &Value, compare_key: &str) -> bool {
    item.get(compare_key).is_some_and(|id| id.same(target_id))
}

fn in_place(
    items: &ArrayRef,
    index: usize,
    kind: SortKind,
    target_id: &Value,
    compare_key: &str,
    sentinel: bool,
) -> bool {
    match kind {
        SortKind::Before if sentinel => index + 1 == items.len(),
        SortKind::Before => items
            .get(index + 1)
            .is_some_and(|item| identifies(&item, target_id, compare_key)),
        _ if sentinel => index == 0,
        _ => index
            .checked_sub(1)
            .and_then(|i| items.get(i))
            .is_some_and(|item| identifies(&item, target_id, compare_key)),
    }
}

fn find(items: &ArrayRef, entity: &Value, target_id: &Value, compare_key: &str) -> Option<usize> {
    items
        .to_vec()
        .iter()
        .position(|item| !item.same(entity) && identifies(item, target_id, compare_key))
}

/// Another entity at the destination already names the same neighbour.
fn conflicts(entity: &Value, items: &ArrayRef, target: usize, spec: &SortSpec) -> bool {
    let occupant = match spec.kind {
        SortKind::Before => target.checked_sub(1).and_then(|i| items.get(i)),
        _ => items.get(target),
    };
    let key = spec.key();
    occupant.is_some_and(|other| {
        !other.same(entity)
            && match (other.get(key), entity.get(key)) {
                (Some(a), Some(b)) => a.same(&b),
                _ => false,
            }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Neighbor;
    use serde_json::json;

    fn items(json: serde_json::Value) -> ArrayRef {
        Value::from(json).as_array().cloned().unwrap()
    }

    fn ids(items: &ArrayRef) -> Vec<String> {
        items
            .to_vec()
            .iter()
            .map(|v| v.get("_id").and_then(|id| id.as_str().map(String::from)).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_before_sentinel_moves_to_end() {
        let list = items(json!([
            {"_id": "A", "before": -1},
            {"_id": "B"},
            {"_id": "C"}
        ]));
        let spec = SortSpec::new(SortKind::Before).with_compare_key("_id");
        let entity = list.get(0).unwrap();
        let outcome = sort(&entity, &list, &spec, true).unwrap();
        assert_eq!(ids(&list), ["B", "C", "A"]);
        assert_eq!(outcome.index, 2);
        assert!(matches!(outcome.before, Some(Neighbor::End)));
    }

    #[test]
    fn test_after_named_neighbour() {
        let list = items(json!([
            {"_id": "A", "after": "C"},
            {"_id": "B"},
            {"_id": "C"},
            {"_id": "D"}
        ]));
        let spec = SortSpec::new(SortKind::After).with_compare_key("_id");
        let entity = list.get(0).unwrap();
        let outcome = sort(&entity, &list, &spec, true).unwrap();
        assert_eq!(ids(&list), ["B", "C", "A", "D"]);
        let after = outcome.after.unwrap();
        assert_eq!(after.entity().unwrap().get("_id").unwrap(), json!("C"));
    }

    #[test]
    fn test_before_named_neighbour_moving_backwards() {
        let list = items(json!([
            {"_id": "A"},
            {"_id": "B"},
            {"_id": "C", "before": "A"}
        ]));
        let spec = SortSpec::new(SortKind::Before).with_compare_key("_id");
        let entity = list.get(2).unwrap();
        sort(&entity, &list, &spec, true).unwrap();
        assert_eq!(ids(&list), ["C", "A", "B"]);
    }

    #[test]
    fn test_already_in_place_is_untouched() {
        let list = items(json!([{"_id": "A"}, {"_id": "B", "after": "A"}]));
        let spec = SortSpec::new(SortKind::After).with_compare_key("_id");
        assert!(sort(&list.get(1).unwrap(), &list, &spec, true).is_none());
        let list = items(json!([{"_id": "A", "after": -1}, {"_id": "B"}]));
        assert!(sort(&list.get(0).unwrap(), &list, &spec, true).is_none());
    }

    #[test]
    fn test_unknown_neighbour_leaves_order() {
        let list = items(json!([{"_id": "A", "after": "Z"}, {"_id": "B"}]));
        let spec = SortSpec::new(SortKind::After).with_compare_key("_id");
        assert!(sort(&list.get(0).unwrap(), &list, &spec, true).is_none());
        assert_eq!(ids(&list), ["A", "B"]);
    }

    #[test]
    fn test_duplicate_claim_only_suppressed_locally() {
        let json = json!([
            {"_id": "A"},
            {"_id": "B", "after": "A"},
            {"_id": "C", "after": "A"}
        ]);
        let spec = SortSpec::new(SortKind::After).with_compare_key("_id");

        let list = items(json.clone());
        assert!(sort(&list.get(2).unwrap(), &list, &spec, true).is_none());
        assert_eq!(ids(&list), ["A", "B", "C"]);

        let list = items(json);
        assert!(sort(&list.get(2).unwrap(), &list, &spec, false).is_some());
        assert_eq!(ids(&list), ["A", "C", "B"]);
    }
}
