//! Ranked sort on a numeric field.

use json_context_value::{ArrayRef, Value};

use super::{move_to, previous, SortOutcome};
use crate::matcher::{SortKind, SortSpec};

fn rank_of(item: &Value, key: &str) -> Option<f64> {
    item.get(key).and_then(|v| v.to_number())
}

pub(super) fn sort(entity: &Value, items: &ArrayRef, spec: &SortSpec) -> Option<SortOutcome> {
    let key = spec.key();
    let rank = rank_of(entity, key)?;
    let index = items.position(entity)?;
    let list = items.to_vec();

    // Unranked neighbours sort as zero.
    let ordered = |a: f64, b: f64| if spec.reverse { a >= b } else { a <= b };
    let prev_ok = index == 0 || ordered(rank_of(&list[index - 1], key).unwrap_or(0.0), rank);
    let next_ok = index + 1 >= list.len() || ordered(rank, rank_of(&list[index + 1], key).unwrap_or(0.0));
    if prev_ok && next_ok {
        return None;
    }

    let target = list
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .find(|(_, item)| {
            let other = rank_of(item, key).unwrap_or(0.0);
            if spec.reverse {
                other < rank
            } else {
                other > rank
            }
        })
        .map_or(list.len(), |(i, _)| i);

    let index = move_to(items, index, target);
    Some(SortOutcome {
        index,
        before: None,
        after: Some(previous(items, index)),
    })
}

/// Gives an unranked entity at `index` a rank between its neighbours.
///
/// Returns the assigned rank, or `None` if the entity already had one or
/// the sort is not ranked.
pub(crate) fn assign_rank(entity: &Value, items: &ArrayRef, spec: &SortSpec) -> Option<f64> {
    if spec.kind != SortKind::Float {
        return None;
    }
    let key = spec.key();
    if entity.get(key).is_some_and(|v| !v.is_null()) {
        return None;
    }
    let index = items.position(entity)?;
    let prev = index
        .checked_sub(1)
        .and_then(|i| items.get(i))
        .and_then(|v| rank_of(&v, key));
    let next = items.get(index + 1).and_then(|v| rank_of(&v, key));
    let step = if spec.reverse { -1.0 } else { 1.0 };

    let rank = match (prev, next) {
        (Some(p), Some(n)) => (p + n) / 2.0,
        (Some(p), None) => p + step,
        (None, Some(n)) => n - step,
        (None, None) => 0.0,
    };
    entity.set(key, Value::from_f64(rank));
    Some(rank)
}
