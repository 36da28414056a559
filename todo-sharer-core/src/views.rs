//! Derived read views over the store's state.
//!
//! All of these are pure recomputations over the current lists and items,
//! cheap enough to run on every state change.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{List, Todo};

/// Item counts shown next to a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TodoCounts {
    pub total: usize,
    pub active: usize,
}

/// How close an item's due date is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueStatus {
    None,
    DueSoon,
    Overdue,
}

/// Items due within this many days count as due soon.
pub const DUE_SOON_DAYS: i64 = 2;

/// Visible items: matching `search_term` case-insensitively, and not
/// completed when `hide_completed` is set.
pub fn filter_todos(todos: &[Todo], search_term: &str, hide_completed: bool) -> Vec<Todo> {
    let term = search_term.to_lowercase();
    todos
        .iter()
        .filter(|todo| term.is_empty() || todo.text.to_lowercase().contains(&term))
        .filter(|todo| !hide_completed || !todo.completed)
        .cloned()
        .collect()
}

pub fn filter_lists(lists: &[List], search_term: &str) -> Vec<List> {
    let term = search_term.to_lowercase();
    if term.is_empty() {
        return lists.to_vec();
    }
    lists
        .iter()
        .filter(|list| list.name.to_lowercase().contains(&term))
        .cloned()
        .collect()
}

pub fn find_list<'a>(lists: &'a [List], list_id: Option<&str>) -> Option<&'a List> {
    let list_id = list_id?;
    lists.iter().find(|list| list.id == list_id)
}

pub fn is_filtered(search_term: &str, hide_completed: bool) -> bool {
    !search_term.is_empty() || hide_completed
}

pub fn has_completed(todos: &[Todo]) -> bool {
    todos.iter().any(|todo| todo.completed)
}

pub fn todo_counts(todos: &[Todo]) -> TodoCounts {
    TodoCounts {
        total: todos.len(),
        active: todos.iter().filter(|todo| !todo.completed).count(),
    }
}

/// Due-date proximity relative to `now`. Completed items are never flagged.
pub fn due_status(todo: &Todo, now: DateTime<Utc>) -> DueStatus {
    let due = match todo.due_date {
        Some(due) if !todo.completed => due,
        _ => return DueStatus::None,
    };

    // Whole days, rounded up.
    let millis = (due - now).num_milliseconds();
    let days = millis.div_euclid(86_400_000) + i64::from(millis.rem_euclid(86_400_000) != 0);

    if days < 0 {
        DueStatus::Overdue
    } else if days <= DUE_SOON_DAYS {
        DueStatus::DueSoon
    } else {
        DueStatus::None
    }
}
