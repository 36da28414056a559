//! Fractional ordering for drag-and-drop reordering.
//!
//! Items carry a sparse integer `order`. Moving one item normally rewrites
//! only that item's order, placed between its new neighbours. When the
//! neighbours are adjacent integers there is no room left and every item in
//! the list is renumbered to `(index + 1) * REORDER_SPACING`.

use crate::models::{Todo, TodoUpdate};

/// Gap left between neighbours on renumber and at either end of the list.
pub const REORDER_SPACING: i64 = 1000;
/// Neighbours must differ by more than `MIN_GAP + 1` to fit a midpoint.
pub const MIN_GAP: i64 = 1;

/// The outcome of a drop, computed before anything is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderPlan {
    /// Position of the moved item in the full sequence before the move.
    pub from: usize,
    /// Position of the moved item in the full sequence after the move.
    pub to: usize,
    /// `(id, order)` pairs to write: one normally, every item on renumber.
    pub updates: Vec<(String, i64)>,
    pub renumbered: bool,
}

impl ReorderPlan {
    /// The optimistic sequence: the item spliced into place with the new
    /// order values applied.
    pub fn apply(&self, todos: &[Todo]) -> Vec<Todo> {
        let mut reordered = todos.to_vec();
        move_item(&mut reordered, self.from, self.to);
        for (id, order) in &self.updates {
            if let Some(todo) = reordered.iter_mut().find(|t| &t.id == id) {
                todo.order = *order;
            }
        }
        reordered
    }

    /// The batch to send to the item store.
    pub fn to_todo_updates(&self) -> Vec<TodoUpdate> {
        self.updates
            .iter()
            .map(|(id, order)| TodoUpdate::order(id.as_str(), *order))
            .collect()
    }
}

/// Moves the element at `from` to `to`, shifting the elements in between.
/// Both indices are clamped to the vector's bounds.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if items.is_empty() {
        return;
    }
    let last = items.len() - 1;
    let from = from.min(last);
    let to = to.min(last);
    if from == to {
        return;
    }
    let item = items.remove(from);
    items.insert(to, item);
}

/// Plans a drop of the visible item at `previous_index` onto `current_index`.
///
/// Indices address the visible (filtered) sequence; they are mapped to the
/// full sequence through item ids so hidden items keep their positions.
/// Returns `None` when the drop changes nothing.
pub fn plan_reorder(
    all: &[Todo],
    visible: &[Todo],
    previous_index: usize,
    current_index: usize,
) -> Option<ReorderPlan> {
    if previous_index == current_index || all.len() < 2 {
        return None;
    }

    let moved = visible.get(previous_index)?;
    let target = visible.get(current_index)?;
    let from = all.iter().position(|t| t.id == moved.id)?;
    let to = all.iter().position(|t| t.id == target.id)?;
    if from == to {
        return None;
    }

    let mut reordered: Vec<&Todo> = all.iter().collect();
    move_item(&mut reordered, from, to);
    let position = reordered.iter().position(|t| t.id == moved.id)?;
    let last = reordered.len() - 1;

    let single = |order: i64| ReorderPlan {
        from,
        to,
        updates: vec![(moved.id.clone(), order)],
        renumbered: false,
    };

    let plan = if position == 0 {
        single(reordered[1].order - REORDER_SPACING)
    } else if position == last {
        single(reordered[last - 1].order + REORDER_SPACING)
    } else {
        let prev = reordered[position - 1].order;
        let next = reordered[position + 1].order;
        if next - prev > MIN_GAP + 1 {
            single((prev + next).div_euclid(2))
        } else {
            ReorderPlan {
                from,
                to,
                updates: reordered
                    .iter()
                    .zip(1..)
                    .map(|(todo, n)| (todo.id.clone(), n * REORDER_SPACING))
                    .collect(),
                renumbered: true,
            }
        }
    };

    Some(plan)
}
