//! Item actions. Everything except adding is optimistic.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{Outcome, TodoStore, JUST_ADDED_FLASH};
use crate::models::{Todo, TodoUpdate};
use crate::notify::Notification;
use crate::ordering;
use crate::state::BusyFlag;

const TOGGLE: Outcome = Outcome {
    success: None,
    error: "Failed to update to-do status. Please try again.",
};

const EDIT_TEXT: Outcome = Outcome {
    success: Some("To-do updated."),
    error: "Failed to save to-do. Please try again.",
};

const DUE_DATE: Outcome = Outcome {
    success: Some("Due date updated."),
    error: "Failed to update due date. Please try again.",
};

const DELETE: Outcome = Outcome {
    success: Some("To-do deleted."),
    error: "Failed to delete to-do. Please try again.",
};

const CLEAR_COMPLETED: Outcome = Outcome {
    success: Some("Completed to-dos cleared."),
    error: "Failed to clear completed to-dos.",
};

const DELETE_ALL: Outcome = Outcome {
    success: Some("All to-dos deleted."),
    error: "Failed to delete to-dos. Please try again.",
};

const REORDER: Outcome = Outcome {
    success: None,
    error: "Could not save new order. Please try again.",
};

fn with_update_applied(todos: &[Todo], update: &TodoUpdate) -> Vec<Todo> {
    todos
        .iter()
        .cloned()
        .map(|mut todo| {
            if todo.id == update.id {
                update.changes.apply_to(&mut todo);
            }
            todo
        })
        .collect()
}

impl TodoStore {
    /// Adds an item with the trimmed `new_todo_text` to the selected list.
    ///
    /// Not optimistic: the item appears once the items query emits it.
    pub async fn add_todo(&self) {
        let (list_id, text) = self
            .shared
            .read(|s| (s.selected_list_id.clone(), s.new_todo_text.trim().to_string()));
        let (Some(list_id), Some(user)) = (list_id, self.shared.current_user()) else {
            return;
        };
        if text.is_empty() {
            return;
        }

        let created = self
            .with_loading(
                BusyFlag::AddingTodo,
                self.shared.items.create_item(&list_id, &user.uid, &text),
            )
            .await;

        match created {
            Ok(todo_id) => {
                tracing::debug!(list_id = %list_id, todo_id = %todo_id, "Added to-do");
                let flagged = todo_id.clone();
                self.shared.update(|s| {
                    s.new_todo_text.clear();
                    s.just_added_todo_id = Some(flagged);
                });
                self.clear_just_added_later(todo_id);
            }
            Err(e) => {
                tracing::error!(error = %e, list_id = %list_id, "Failed to add to-do");
                self.shared.notify(Notification::error(
                    "Failed to add to-do. Please try again.",
                    crate::notify::ERROR_DURATION,
                ));
            }
        }
    }

    fn clear_just_added_later(&self, todo_id: String) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(JUST_ADDED_FLASH).await;
            shared.state.send_if_modified(|s| {
                if s.just_added_todo_id.as_deref() != Some(todo_id.as_str()) {
                    return false;
                }
                s.just_added_todo_id = None;
                true
            });
        });
    }

    /// Commits a single-item update optimistically, then sends it.
    async fn update_todo(&self, update: TodoUpdate, outcome: &Outcome) -> bool {
        let Some(list_id) = self.selected_list_id() else {
            return false;
        };
        let Some((original, ())) = self.commit_optimistic(|s| {
            s.find_todo(&update.id)?;
            Some((with_update_applied(&s.todos, &update), ()))
        }) else {
            return false;
        };

        let result = self.shared.items.update_item(&list_id, update).await;
        self.settle_optimistic(original, result, outcome)
    }

    pub async fn toggle_todo_completion(&self, todo_id: &str, completed: bool) {
        self.update_todo(TodoUpdate::completed(todo_id, completed), &TOGGLE)
            .await;
    }

    /// Saves `editing_todo_text` onto the item being edited.
    ///
    /// Leaves edit mode without a remote call when the text is unchanged.
    pub async fn save_edited_todo_text(&self) {
        let (todo_id, text, current) = self.shared.read(|s| {
            let todo_id = s.editing_todo_id.clone();
            let current = todo_id
                .as_deref()
                .and_then(|id| s.find_todo(id))
                .map(|t| t.text.clone());
            (todo_id, s.editing_todo_text.trim().to_string(), current)
        });
        let Some(todo_id) = todo_id else {
            return;
        };
        if text.is_empty() {
            return;
        }
        if current.as_deref() == Some(text.as_str()) {
            self.clear_editing_todo();
            return;
        }

        let saved = self
            .with_loading(
                BusyFlag::SavingTodo,
                self.update_todo(TodoUpdate::text(todo_id, text), &EDIT_TEXT),
            )
            .await;
        if saved {
            self.clear_editing_todo();
        }
    }

    pub async fn update_due_date(&self, todo_id: &str, due_date: Option<DateTime<Utc>>) {
        self.update_todo(TodoUpdate::due_date(todo_id, due_date), &DUE_DATE)
            .await;
    }

    pub fn start_delete_todo(&self, todo_id: impl Into<String>) {
        let todo_id = todo_id.into();
        self.shared.update(|s| s.confirming_delete_todo_id = Some(todo_id));
    }

    pub fn cancel_delete_todo(&self) {
        self.shared.update(|s| s.confirming_delete_todo_id = None);
    }

    /// Deletes the item awaiting confirmation.
    pub async fn confirm_delete_todo(&self) {
        let (list_id, todo_id) = self.shared.read(|s| {
            (s.selected_list_id.clone(), s.confirming_delete_todo_id.clone())
        });
        self.cancel_delete_todo();
        let (Some(list_id), Some(todo_id)) = (list_id, todo_id) else {
            return;
        };

        let Some((original, ())) = self.commit_optimistic(|s| {
            s.find_todo(&todo_id)?;
            let remaining = s.todos.iter().filter(|t| t.id != todo_id).cloned().collect();
            Some((remaining, ()))
        }) else {
            return;
        };

        let result = self.shared.items.delete_item(&list_id, &todo_id).await;
        self.settle_optimistic(original, result, &DELETE);
    }

    /// Asks for confirmation before clearing completed items, or says there
    /// are none.
    pub fn start_clear_completed(&self) {
        if !self.has_completed_todos() {
            self.shared
                .notify(Notification::info("No completed to-dos to clear."));
            return;
        }
        self.shared.update(|s| s.confirming_clear_completed = true);
    }

    pub fn cancel_clear_completed(&self) {
        self.shared.update(|s| s.confirming_clear_completed = false);
    }

    pub async fn confirm_clear_completed(&self) {
        self.cancel_clear_completed();
        let Some(list_id) = self.selected_list_id() else {
            return;
        };

        let Some((original, completed_ids)) = self.commit_optimistic(|s| {
            let (completed, active): (Vec<Todo>, Vec<Todo>) =
                s.todos.iter().cloned().partition(|t| t.completed);
            if completed.is_empty() {
                return None;
            }
            let ids: Vec<String> = completed.into_iter().map(|t| t.id).collect();
            Some((active, ids))
        }) else {
            return;
        };

        let result = self
            .shared
            .items
            .batch_delete_items(&list_id, &completed_ids)
            .await;
        self.settle_optimistic(original, result, &CLEAR_COMPLETED);
    }

    /// Deletes every item in the selected list.
    pub async fn delete_all_todos(&self) {
        let Some(list_id) = self.selected_list_id() else {
            return;
        };
        let Some((original, ())) = self.commit_optimistic(|s| {
            if s.todos.is_empty() {
                return None;
            }
            Some((Vec::new(), ()))
        }) else {
            return;
        };

        let result = self.shared.items.delete_all_items(&list_id).await;
        self.settle_optimistic(original, result, &DELETE_ALL);
    }

    /// Moves the visible item at `previous_index` to `current_index`.
    ///
    /// Writes a single order value when the neighbours leave room for one,
    /// otherwise renumbers the whole list in one batch. No-op drops never
    /// reach the item store.
    pub async fn drop_todo(&self, previous_index: usize, current_index: usize) {
        let Some(list_id) = self.selected_list_id() else {
            return;
        };

        let Some((original, plan)) = self.commit_optimistic(|s| {
            let plan = ordering::plan_reorder(
                &s.todos,
                &s.visible_todos(),
                previous_index,
                current_index,
            )?;
            Some((plan.apply(&s.todos), plan))
        }) else {
            return;
        };

        tracing::debug!(
            list_id = %list_id,
            updates = plan.updates.len(),
            renumbered = plan.renumbered,
            "Reordering to-dos"
        );
        let result = self
            .shared
            .items
            .batch_update_items(&list_id, plan.to_todo_updates())
            .await;
        self.settle_optimistic(original, result, &REORDER);
    }
}
