//! The todo store: the client-side reconciliation engine.
//!
//! Owns the in-memory projection of the signed-in user's lists and the
//! selected list's items. Two pipelines keep it in step with the remote
//! stores:
//!
//! ```text
//! current user ──▶ lists query ──▶ lists (+ auto-selection)
//! (selected list, sort) ──▶ items query ──▶ todos
//! ```
//!
//! Each pipeline follows the latest input only: when the input changes the
//! previous live query is dropped before the next one is polled, so a slow
//! stale response can never land after a newer query started.
//!
//! Actions mutate items optimistically: the new item sequence is committed
//! immediately, the remote call runs, and on failure the sequence captured
//! just before the commit is restored. Two optimistic actions in flight at
//! once are not serialized; the last one to settle wins.

mod list_actions;
mod pipeline;
mod todo_actions;

#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::error::StoreResult;
use crate::models::{List, SortBy, Todo, User};
use crate::notify::{Notification, Notifier, SHORT_DURATION};
use crate::remote::{IdentityProvider, ItemStore, ListStore};
use crate::state::{BusyFlag, TodoState};
use crate::views::TodoCounts;

/// How long a freshly added item stays flagged as just added.
pub const JUST_ADDED_FLASH: Duration = Duration::from_millis(1500);

/// State and collaborators shared between the store and its pipeline tasks.
pub(crate) struct Shared {
    state: watch::Sender<TodoState>,
    user: watch::Receiver<Option<User>>,
    lists: Arc<dyn ListStore>,
    items: Arc<dyn ItemStore>,
    notifier: Notifier,
}

impl Shared {
    /// Replaces the state through `f` and notifies subscribers.
    fn update(&self, f: impl FnOnce(&mut TodoState)) {
        self.state.send_modify(f);
    }

    fn read<R>(&self, f: impl FnOnce(&TodoState) -> R) -> R {
        f(&self.state.borrow())
    }

    fn current_user(&self) -> Option<User> {
        self.user.borrow().clone()
    }

    fn notify(&self, notification: Notification) {
        self.notifier.publish(notification);
    }
}

/// Raises a busy flag and lowers it when dropped, even if the action's
/// future is dropped before it completes.
struct BusyGuard<'a> {
    shared: &'a Shared,
    flag: BusyFlag,
}

impl<'a> BusyGuard<'a> {
    fn raise(shared: &'a Shared, flag: BusyFlag) -> Self {
        shared.update(|s| s.set_busy(flag, true));
        Self { shared, flag }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let flag = self.flag;
        self.shared.update(|s| s.set_busy(flag, false));
    }
}

/// Messages reported when an optimistic item action settles.
struct Outcome {
    success: Option<&'static str>,
    error: &'static str,
}

pub struct TodoStore {
    shared: Arc<Shared>,
    pipelines: Vec<JoinHandle<()>>,
}

impl TodoStore {
    /// Creates the store and starts its pipelines on the current tokio runtime.
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        lists: Arc<dyn ListStore>,
        items: Arc<dyn ItemStore>,
    ) -> Self {
        let (state, _) = watch::channel(TodoState::default());
        let user = identity.current_user();
        let shared = Arc::new(Shared {
            state,
            user: user.clone(),
            lists,
            items,
            notifier: Notifier::new(),
        });

        let pipelines = vec![
            tokio::spawn(pipeline::run_lists(Arc::clone(&shared), user)),
            tokio::spawn(pipeline::run_items(Arc::clone(&shared))),
        ];

        Self { shared, pipelines }
    }

    // --- Read views ---

    /// A live view of the whole state.
    pub fn subscribe(&self) -> watch::Receiver<TodoState> {
        self.shared.state.subscribe()
    }

    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.shared.notifier.subscribe()
    }

    pub fn snapshot(&self) -> TodoState {
        self.shared.read(TodoState::clone)
    }

    pub fn current_user(&self) -> Option<User> {
        self.shared.current_user()
    }

    pub fn lists(&self) -> Vec<List> {
        self.shared.read(|s| s.lists.clone())
    }

    pub fn selected_list_id(&self) -> Option<String> {
        self.shared.read(|s| s.selected_list_id.clone())
    }

    pub fn selected_list(&self) -> Option<List> {
        self.shared.read(|s| s.selected_list().cloned())
    }

    pub fn filtered_lists(&self) -> Vec<List> {
        self.shared.read(TodoState::filtered_lists)
    }

    /// Every item of the selected list, ignoring filters.
    pub fn all_todos(&self) -> Vec<Todo> {
        self.shared.read(|s| s.todos.clone())
    }

    /// The visible items.
    pub fn todos(&self) -> Vec<Todo> {
        self.shared.read(TodoState::visible_todos)
    }

    pub fn is_filtered(&self) -> bool {
        self.shared.read(TodoState::is_filtered)
    }

    pub fn has_completed_todos(&self) -> bool {
        self.shared.read(TodoState::has_completed_todos)
    }

    pub fn todo_counts(&self) -> TodoCounts {
        self.shared.read(TodoState::todo_counts)
    }

    pub fn sort_by(&self) -> SortBy {
        self.shared.read(|s| s.sort_by)
    }

    /// The current moment, read fresh on every call.
    pub fn today(&self) -> DateTime<Utc> {
        Utc::now()
    }

    // --- UI bindings ---

    pub fn set_new_todo_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.shared.update(|s| s.new_todo_text = text);
    }

    pub fn set_new_list_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.shared.update(|s| s.new_list_text = text);
    }

    pub fn set_editing_list_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.shared.update(|s| s.editing_list_text = text);
    }

    pub fn set_share_email(&self, email: impl Into<String>) {
        let email = email.into();
        self.shared.update(|s| s.share_email = email);
    }

    pub fn set_search_term(&self, term: impl Into<String>) {
        let term = term.into();
        self.shared.update(|s| s.search_term = term);
    }

    pub fn set_list_search_term(&self, term: impl Into<String>) {
        let term = term.into();
        self.shared.update(|s| s.list_search_term = term);
    }

    pub fn set_sort_by(&self, sort_by: SortBy) {
        self.shared.update(|s| s.sort_by = sort_by);
    }

    pub fn set_hide_completed(&self, hide_completed: bool) {
        self.shared.update(|s| s.hide_completed = hide_completed);
    }

    pub fn set_selected_list_id(&self, list_id: Option<String>) {
        self.shared.update(|s| s.selected_list_id = list_id);
    }

    pub fn set_editing_todo_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.shared.update(|s| s.editing_todo_text = text);
    }

    pub fn start_editing_todo(&self, todo_id: impl Into<String>, initial_text: impl Into<String>) {
        let (todo_id, text) = (todo_id.into(), initial_text.into());
        self.shared.update(|s| {
            s.editing_todo_id = Some(todo_id);
            s.editing_todo_text = text;
        });
    }

    pub fn clear_editing_todo(&self) {
        self.shared.update(|s| {
            s.editing_todo_id = None;
            s.editing_todo_text.clear();
        });
    }

    // --- Helpers for actions ---

    async fn with_loading<T>(&self, flag: BusyFlag, operation: impl Future<Output = T>) -> T {
        let _busy = BusyGuard::raise(&self.shared, flag);
        operation.await
    }

    /// Commits an optimistic item sequence computed from the current state.
    ///
    /// `prepare` returns the new sequence plus anything the caller needs for
    /// the remote call, or `None` to leave the state untouched. Capture and
    /// commit happen in one state transition. Returns the sequence as it was
    /// before the commit.
    fn commit_optimistic<T>(
        &self,
        prepare: impl FnOnce(&TodoState) -> Option<(Vec<Todo>, T)>,
    ) -> Option<(Vec<Todo>, T)> {
        let mut committed = None;
        self.shared.state.send_if_modified(|s| match prepare(s) {
            Some((todos, extra)) => {
                let original = std::mem::replace(&mut s.todos, todos);
                committed = Some((original, extra));
                true
            }
            None => false,
        });
        committed
    }

    /// Keeps the optimistic sequence on success; restores `original` on failure.
    fn settle_optimistic(&self, original: Vec<Todo>, result: StoreResult<()>, outcome: &Outcome) -> bool {
        match result {
            Ok(()) => {
                if let Some(message) = outcome.success {
                    self.shared.notify(Notification::success(message, SHORT_DURATION));
                }
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "{}", outcome.error);
                self.shared
                    .notify(Notification::error(outcome.error, crate::notify::ERROR_DURATION));
                self.shared.update(|s| s.todos = original);
                false
            }
        }
    }
}

impl Drop for TodoStore {
    fn drop(&mut self) {
        for pipeline in &self.pipelines {
            pipeline.abort();
        }
    }
}
