//! Explicit placement requested with a push.

use json_context_value::{ArrayRef, Value};
use tracing::trace;

use super::{move_to, previous, SortOutcome};
use crate::change::{Neighbor, Position};

pub(super) fn place(
    entity: &Value,
    items: &ArrayRef,
    position: &Position,
    compare_key: &str,
    avoid_duplicates: bool,
) -> Option<SortOutcome> {
    let index = items.position(entity)?;
    let target = match position {
        Position::Start if index == 0 => return None,
        Position::Start => 0,
        Position::After(anchor) => {
            if anchor.same(entity) {
                return None;
            }
            if avoid_duplicates && same_identity(anchor, entity, compare_key) {
                trace!(compare_key, "anchor is a copy of the moving entity");
                return None;
            }
            let found = find(items, entity, anchor, compare_key)?;
            if found + 1 == index {
                return None;
            }
            found + 1
        }
    };

    let index = move_to(items, index, target);
    Some(SortOutcome {
        index,
        before: None,
        after: Some(match position {
            Position::Start => Neighbor::Start,
            Position::After(_) => previous(items, index),
        }),
    })
}

fn same_identity(a: &Value, b: &Value, compare_key: &str) -> bool {
    match (a.get(compare_key), b.get(compare_key)) {
        (Some(x), Some(y)) => !x.is_null() && x.same(&y),
        _ => false,
    }
}

/// Anchor's index: by identity first, then by the comparison field.
fn find(items: &ArrayRef, entity: &Value, anchor: &Value, compare_key: &str) -> Option<usize> {
    let list = items.to_vec();
    list.iter().position(|item| item.same(anchor)).or_else(|| {
        list.iter()
            .position(|item| !item.same(entity) && same_identity(item, anchor, compare_key))
    })
}
