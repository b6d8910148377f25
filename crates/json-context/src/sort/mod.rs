//! Ordering of entities inside sequence collections.
//!
//! Three disciplines are supported: relative (`before` / `after` naming a
//! neighbour), ranked (a numeric field), and an explicit position supplied
//! with the push. Each one first checks whether the entity is already in an
//! acceptable spot and only moves it when it is not.

mod forced;
mod rank;
mod relative;

use json_context_value::{ArrayRef, Value};

use crate::change::{Neighbor, Position};
use crate::matcher::{SortKind, SortSpec, DEFAULT_COMPARE_KEY};

pub(crate) use rank::assign_rank;

/// Result of a move.
#[derive(Debug, Clone)]
pub(crate) struct SortOutcome {
    pub(crate) index: usize,
    pub(crate) before: Option<Neighbor>,
    pub(crate) after: Option<Neighbor>,
}

/// Brings `entity` into position within `items`. Returns `None` when
/// nothing moved.
pub(crate) fn ensure_correct_position(
    entity: &Value,
    items: &ArrayRef,
    sort: Option<&SortSpec>,
    forced: Option<&Position>,
    avoid_duplicates: bool,
) -> Option<SortOutcome> {
    if let Some(position) = forced {
        let compare_key = sort.map_or(DEFAULT_COMPARE_KEY, SortSpec::compare_key);
        return forced::place(entity, items, position, compare_key, avoid_duplicates);
    }
    let sort = sort?;
    match sort.kind {
        SortKind::Float => rank::sort(entity, items, sort),
        SortKind::Before | SortKind::After => relative::sort(entity, items, sort, avoid_duplicates),
    }
}

/// Moves the element at `from` so it lands where index `to` pointed before
/// the move. Returns its final index.
fn move_to(items: &ArrayRef, from: usize, to: usize) -> usize {
    let Some(value) = items.remove(from) else {
        return from;
    };
    let to = if to > from { to - 1 } else { to };
    items.insert(to, value);
    to
}

/// The element just before `index`, or the start marker.
fn previous(items: &ArrayRef, index: usize) -> Neighbor {
    match index.checked_sub(1).and_then(|i| items.get(i)) {
        Some(value) => Neighbor::Entity(value),
        None => Neighbor::Start,
    }
}

/// The element just after `index`, or the end marker.
fn next(items: &ArrayRef, index: usize) -> Neighbor {
    match items.get(index + 1) {
        Some(value) => Neighbor::Entity(value),
        None => Neighbor::End,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_to_accounts_for_removal() {
        let items = ArrayRef::new((0..5).map(Value::from).collect());
        assert_eq!(move_to(&items, 0, 3), 2);
        assert_eq!(Value::Array(items.clone()), serde_json::json!([1, 2, 0, 3, 4]));
        assert_eq!(move_to(&items, 4, 0), 0);
        assert_eq!(Value::Array(items.clone()), serde_json::json!([4, 1, 2, 0, 3]));
        assert_eq!(move_to(&items, 1, 5), 4);
        assert_eq!(Value::Array(items), serde_json::json!([4, 2, 0, 3, 1]));
    }
}
