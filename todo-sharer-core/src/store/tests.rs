use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::time::timeout;

use super::*;
use crate::error::StoreError;
use crate::memory::MemoryBackend;
use crate::models::{QueryResult, SharedWith, SortDirection, TodoUpdate};
use crate::notify::Level;
use crate::remote::LiveQuery;

const WAIT: Duration = Duration::from_secs(5);

fn ann() -> User {
    User::new("ann", "ann@example.com")
}

fn bob() -> User {
    User::new("bob", "bob@example.com")
}

/// Ann owns "Groceries" (a) and "Chores" (b); Groceries has three items.
fn seeded_backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.seed_user(ann());
    backend.seed_user(bob());
    backend.seed_list(
        List::new("a", "Groceries", "ann").with_created_at(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
    );
    backend.seed_list(
        List::new("b", "Chores", "ann").with_created_at(Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap()),
    );
    backend.seed_todo("a", Todo::new("t1", "Buy milk", "ann").with_order(1000));
    backend.seed_todo("a", Todo::new("t2", "Buy bread", "ann").with_order(2000));
    backend.seed_todo(
        "a",
        Todo::new("t3", "Return bottles", "ann")
            .with_order(3000)
            .with_completed(true),
    );
    backend.set_current_user(Some(ann()));
    backend
}

fn store_on(backend: &MemoryBackend) -> TodoStore {
    let backend = Arc::new(backend.clone());
    TodoStore::new(backend.clone(), backend.clone(), backend)
}

/// Waits until lists are loaded and the items match the current query.
async fn settled(store: &TodoStore) -> TodoState {
    wait_until(store, |s| !s.lists_loading && s.todos_settled()).await
}

async fn wait_until(store: &TodoStore, condition: impl FnMut(&TodoState) -> bool) -> TodoState {
    let mut rx = store.subscribe();
    let state = timeout(WAIT, rx.wait_for(condition))
        .await
        .expect("timed out waiting for state")
        .expect("store dropped");
    state.clone()
}

async fn next_notification(rx: &mut broadcast::Receiver<Notification>) -> Notification {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("notifier closed")
}

/// Polls `count` until it reaches `expected`.
async fn wait_for_count(count: impl Fn() -> usize, expected: usize) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while count() < expected {
        assert!(tokio::time::Instant::now() < deadline, "expected {} queries", expected);
        tokio::task::yield_now().await;
    }
}

fn ids(todos: &[Todo]) -> Vec<&str> {
    todos.iter().map(|t| t.id.as_str()).collect()
}

#[tokio::test]
async fn test_loads_lists_and_selects_first() {
    let backend = seeded_backend();
    let store = store_on(&backend);

    let state = settled(&store).await;
    assert_eq!(state.current_user, Some(ann()));
    assert_eq!(state.lists.len(), 2);
    assert_eq!(state.selected_list_id.as_deref(), Some("a"));
    assert_eq!(ids(&state.todos), vec!["t1", "t2", "t3"]);
    assert_eq!(state.lists[0].owner_email, "ann@example.com");
}

#[tokio::test]
async fn test_selected_list_removed_upstream_moves_selection() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;

    backend.delete_list_cascade("a").await.unwrap();

    let state = wait_until(&store, |s| s.lists.len() == 1).await;
    assert_eq!(state.selected_list_id.as_deref(), Some("b"));
    let state = settled(&store).await;
    assert!(state.todos.is_empty());
}

#[tokio::test]
async fn test_sign_out_clears_everything() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;

    backend.set_current_user(None);

    let state = wait_until(&store, |s| s.current_user.is_none() && s.todos_settled()).await;
    assert!(state.lists.is_empty());
    assert!(!state.lists_loading);
    assert_eq!(state.selected_list_id, None);
    assert!(state.todos.is_empty());
}

#[tokio::test]
async fn test_switching_lists_reloads_items() {
    let backend = seeded_backend();
    backend.seed_todo("b", Todo::new("c1", "Vacuum", "ann"));
    let store = store_on(&backend);
    settled(&store).await;

    store.set_selected_list_id(Some("b".to_string()));

    let state = settled(&store).await;
    assert_eq!(ids(&state.todos), vec!["c1"]);
}

#[tokio::test]
async fn test_failed_toggle_reverts_to_snapshot() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    let before = settled(&store).await.todos;
    let mut notifications = store.notifications();

    backend.set_fail_mutations(true);
    store.toggle_todo_completion("t1", true).await;

    assert_eq!(store.all_todos(), before);
    let notification = next_notification(&mut notifications).await;
    assert_eq!(notification.level, Level::Error);
    assert_eq!(
        notification.message,
        "Failed to update to-do status. Please try again."
    );
}

#[tokio::test]
async fn test_failed_clear_completed_restores_items() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    let before = settled(&store).await.todos;

    backend.set_fail_mutations(true);
    store.start_clear_completed();
    assert!(store.snapshot().confirming_clear_completed);
    store.confirm_clear_completed().await;

    assert!(!store.snapshot().confirming_clear_completed);
    assert_eq!(store.all_todos(), before);
}

#[tokio::test]
async fn test_failed_edit_keeps_edit_mode() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    let before = settled(&store).await.todos;
    let mut notifications = store.notifications();

    backend.set_fail_mutations(true);
    store.start_editing_todo("t1", "Buy milk");
    store.set_editing_todo_text("Buy oat milk");
    store.save_edited_todo_text().await;

    assert_eq!(store.all_todos(), before);
    let state = store.snapshot();
    assert!(!state.is_saving_todo);
    assert_eq!(state.editing_todo_id.as_deref(), Some("t1"));
    assert_eq!(state.editing_todo_text, "Buy oat milk");
    let notification = next_notification(&mut notifications).await;
    assert_eq!(notification.level, Level::Error);
    assert_eq!(notification.message, "Failed to save to-do. Please try again.");
}

#[tokio::test]
async fn test_failed_due_date_reverts() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    let before = settled(&store).await.todos;
    let mut notifications = store.notifications();
    let due = Utc.with_ymd_and_hms(2025, 3, 9, 0, 0, 0).unwrap();

    backend.set_fail_mutations(true);
    store.update_due_date("t2", Some(due)).await;

    assert_eq!(store.all_todos(), before);
    assert_eq!(backend.todos("a")[1].due_date, None);
    let notification = next_notification(&mut notifications).await;
    assert_eq!(notification.level, Level::Error);
    assert_eq!(
        notification.message,
        "Failed to update due date. Please try again."
    );
}

#[tokio::test]
async fn test_failed_delete_todo_restores_it() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    let before = settled(&store).await.todos;
    let mut notifications = store.notifications();

    backend.set_fail_mutations(true);
    store.start_delete_todo("t2");
    store.confirm_delete_todo().await;

    assert_eq!(store.snapshot().confirming_delete_todo_id, None);
    assert_eq!(store.all_todos(), before);
    let notification = next_notification(&mut notifications).await;
    assert_eq!(notification.level, Level::Error);
    assert_eq!(notification.message, "Failed to delete to-do. Please try again.");
}

#[tokio::test]
async fn test_failed_delete_all_restores_items() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    let before = settled(&store).await.todos;
    let mut notifications = store.notifications();

    backend.set_fail_mutations(true);
    store.delete_all_todos().await;

    assert_eq!(store.all_todos(), before);
    assert_eq!(backend.todos("a").len(), 3);
    let notification = next_notification(&mut notifications).await;
    assert_eq!(notification.level, Level::Error);
    assert_eq!(notification.message, "Failed to delete to-dos. Please try again.");
}

#[tokio::test]
async fn test_clear_completed_without_completed_items() {
    let backend = MemoryBackend::new();
    backend.seed_user(ann());
    backend.seed_list(List::new("a", "Groceries", "ann"));
    backend.seed_todo("a", Todo::new("t1", "Buy milk", "ann"));
    backend.set_current_user(Some(ann()));
    let store = store_on(&backend);
    settled(&store).await;
    let mut notifications = store.notifications();

    store.start_clear_completed();

    assert!(!store.snapshot().confirming_clear_completed);
    let notification = next_notification(&mut notifications).await;
    assert_eq!(notification.level, Level::Info);
    assert_eq!(notification.message, "No completed to-dos to clear.");
}

#[tokio::test]
async fn test_clear_completed_deletes_only_completed() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;

    store.start_clear_completed();
    store.confirm_clear_completed().await;

    assert_eq!(ids(&store.all_todos()), vec!["t1", "t2"]);
    assert_eq!(ids(&backend.todos("a")), vec!["t1", "t2"]);
}

#[tokio::test]
async fn test_filters_compose() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;

    store.set_search_term("buy");
    store.set_hide_completed(true);
    backend.update_item("a", TodoUpdate::completed("t1", true)).await.unwrap();

    let state = wait_until(&store, |s| s.find_todo("t1").is_some_and(|t| t.completed)).await;
    assert_eq!(ids(&state.visible_todos()), vec!["t2"]);
    assert!(state.is_filtered());
    assert_eq!(state.todo_counts().active, 1);
}

#[tokio::test]
async fn test_noop_drop_makes_no_remote_call() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    let before = settled(&store).await.todos;
    let calls = backend.mutation_count();

    store.drop_todo(1, 1).await;

    assert_eq!(backend.mutation_count(), calls);
    assert_eq!(store.all_todos(), before);
}

#[tokio::test]
async fn test_drop_with_room_sends_one_update() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;

    store.drop_todo(2, 0).await;

    let log = backend.batch_update_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0], vec![TodoUpdate::order("t3", 0)]);
    assert_eq!(ids(&store.all_todos()), vec!["t3", "t1", "t2"]);
}

#[tokio::test]
async fn test_drop_without_room_renumbers_all() {
    let backend = MemoryBackend::new();
    backend.seed_user(ann());
    backend.seed_list(List::new("a", "Groceries", "ann"));
    backend.seed_todo("a", Todo::new("t1", "one", "ann").with_order(1000));
    backend.seed_todo("a", Todo::new("t2", "two", "ann").with_order(1001));
    backend.seed_todo("a", Todo::new("t3", "three", "ann").with_order(5000));
    backend.set_current_user(Some(ann()));
    let store = store_on(&backend);
    settled(&store).await;

    store.drop_todo(2, 1).await;

    let log = backend.batch_update_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].len(), 3);
    let stored: Vec<(String, i64)> = backend
        .todos("a")
        .into_iter()
        .map(|t| (t.id, t.order))
        .collect();
    assert_eq!(
        stored,
        vec![
            ("t1".to_string(), 1000),
            ("t3".to_string(), 2000),
            ("t2".to_string(), 3000),
        ]
    );
}

#[tokio::test]
async fn test_failed_drop_reverts_order() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    let before = settled(&store).await.todos;
    let mut notifications = store.notifications();

    backend.set_fail_mutations(true);
    store.drop_todo(0, 2).await;

    assert_eq!(store.all_todos(), before);
    let notification = next_notification(&mut notifications).await;
    assert_eq!(notification.message, "Could not save new order. Please try again.");
}

#[tokio::test]
async fn test_share_with_owner_is_rejected_locally() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;
    let mut notifications = store.notifications();
    let calls = backend.mutation_count();

    store.start_sharing();
    store.set_share_email(" ann@example.com ");
    store.share_list().await;

    assert_eq!(backend.mutation_count(), calls);
    assert!(backend.list("a").unwrap().shared_with.is_empty());
    let notification = next_notification(&mut notifications).await;
    assert!(notification.is_error());
    assert_eq!(notification.message, StoreError::ShareWithOwner.to_string());
    assert!(store.snapshot().is_sharing);
    assert!(!store.snapshot().is_sharing_list);
}

#[tokio::test]
async fn test_share_with_unknown_email() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;
    let mut notifications = store.notifications();

    store.set_share_email("zed@example.com");
    store.share_list().await;

    let notification = next_notification(&mut notifications).await;
    assert_eq!(
        notification.message,
        "User with email \"zed@example.com\" not found."
    );
}

#[tokio::test]
async fn test_share_and_unshare() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;
    let mut notifications = store.notifications();

    store.start_sharing();
    store.set_share_email("bob@example.com");
    store.share_list().await;

    assert!(backend.list("a").unwrap().is_shared_with("bob"));
    let notification = next_notification(&mut notifications).await;
    assert_eq!(notification.message, "List shared with bob@example.com!");
    let state = wait_until(&store, |s| {
        s.selected_list()
            .and_then(|l| l.collaborators.as_ref())
            .is_some_and(|c| !c.is_empty())
    })
    .await;
    assert!(!state.is_sharing);
    assert!(state.share_email.is_empty());

    store.unshare_list("bob@example.com").await;

    assert!(!backend.list("a").unwrap().is_shared_with("bob"));
    assert_eq!(store.snapshot().unsharing_email, None);
    let notification = next_notification(&mut notifications).await;
    assert_eq!(notification.message, "Stopped sharing list with bob@example.com.");
}

#[tokio::test]
async fn test_add_list_selects_it() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;

    store.set_new_list_text("  Hardware  ");
    store.add_list().await;

    let state = store.snapshot();
    assert!(state.new_list_text.is_empty());
    assert!(!state.is_adding_list);
    let selected = state.selected_list_id.expect("new list selected");
    assert_eq!(backend.list(&selected).unwrap().name, "Hardware");

    let state = wait_until(&store, |s| s.lists.len() == 3).await;
    assert_eq!(state.selected_list_id.as_deref(), Some(selected.as_str()));
}

#[tokio::test]
async fn test_blank_names_are_ignored() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;
    let calls = backend.mutation_count();

    store.set_new_list_text("   ");
    store.add_list().await;
    store.set_new_todo_text("");
    store.add_todo().await;

    assert_eq!(backend.mutation_count(), calls);
}

#[tokio::test]
async fn test_confirm_delete_list_cascades() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;
    let mut notifications = store.notifications();

    store.start_delete_list();
    assert_eq!(store.snapshot().confirming_delete_list_id.as_deref(), Some("a"));
    store.confirm_delete_list().await;

    assert!(backend.list("a").is_none());
    assert!(backend.todos("a").is_empty());
    assert_eq!(next_notification(&mut notifications).await.message, "List deleted.");
    let state = wait_until(&store, |s| s.lists.len() == 1).await;
    assert_eq!(state.selected_list_id.as_deref(), Some("b"));
    assert_eq!(state.confirming_delete_list_id, None);
}

#[tokio::test]
async fn test_rename_list() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;

    store.start_edit_list();
    assert_eq!(store.snapshot().editing_list_text, "Groceries");
    store.set_editing_list_text("Food");
    store.save_edit_list().await;

    assert!(!store.snapshot().is_editing_list);
    assert_eq!(backend.list("a").unwrap().name, "Food");
}

#[tokio::test]
async fn test_edit_todo_text() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;

    store.start_editing_todo("t1", "Buy milk");
    store.set_editing_todo_text("Buy oat milk");
    store.save_edited_todo_text().await;

    let state = store.snapshot();
    assert_eq!(state.editing_todo_id, None);
    assert!(!state.is_saving_todo);
    assert_eq!(state.find_todo("t1").unwrap().text, "Buy oat milk");
}

#[tokio::test]
async fn test_unchanged_edit_skips_remote_call() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;
    let calls = backend.mutation_count();

    store.start_editing_todo("t1", "Buy milk");
    store.set_editing_todo_text(" Buy milk ");
    store.save_edited_todo_text().await;

    assert_eq!(backend.mutation_count(), calls);
    assert_eq!(store.snapshot().editing_todo_id, None);
}

#[tokio::test]
async fn test_due_date_update() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;
    let due = Utc.with_ymd_and_hms(2025, 3, 9, 0, 0, 0).unwrap();

    store.update_due_date("t2", Some(due)).await;
    assert_eq!(store.snapshot().find_todo("t2").unwrap().due_date, Some(due));

    store.update_due_date("t2", None).await;
    assert_eq!(store.snapshot().find_todo("t2").unwrap().due_date, None);
    assert_eq!(backend.todos("a")[1].due_date, None);
}

#[tokio::test]
async fn test_confirm_delete_todo() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;

    store.start_delete_todo("t2");
    store.confirm_delete_todo().await;

    assert_eq!(store.snapshot().confirming_delete_todo_id, None);
    assert_eq!(ids(&store.all_todos()), vec!["t1", "t3"]);
    assert_eq!(ids(&backend.todos("a")), vec!["t1", "t3"]);
}

#[tokio::test]
async fn test_delete_all_todos() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;

    store.delete_all_todos().await;

    assert!(store.all_todos().is_empty());
    assert!(backend.todos("a").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_added_todo_flagged_briefly() {
    let backend = seeded_backend();
    let store = store_on(&backend);
    settled(&store).await;

    store.set_new_todo_text("  Buy eggs ");
    store.add_todo().await;

    let state = store.snapshot();
    assert!(state.new_todo_text.is_empty());
    let added = state.just_added_todo_id.expect("flagged");
    let stored = backend.todos("a");
    let todo = stored.iter().find(|t| t.id == added).unwrap();
    assert_eq!(todo.text, "Buy eggs");
    assert!(!todo.completed);
    assert_eq!(todo.owner_uid, "ann");

    tokio::time::sleep(JUST_ADDED_FLASH + Duration::from_millis(100)).await;
    assert_eq!(store.snapshot().just_added_todo_id, None);
}

// --- Optimistic state is visible before the remote call settles ---

/// Delegates to a memory backend, holding item updates until released.
struct GatedItems {
    backend: MemoryBackend,
    gate: Arc<Notify>,
}

#[async_trait]
impl ItemStore for GatedItems {
    fn subscribe_items(&self, list_id: &str, sort_by: SortBy, direction: SortDirection) -> LiveQuery<Todo> {
        self.backend.subscribe_items(list_id, sort_by, direction)
    }

    async fn create_item(&self, list_id: &str, owner_uid: &str, text: &str) -> StoreResult<String> {
        self.backend.create_item(list_id, owner_uid, text).await
    }

    async fn update_item(&self, list_id: &str, update: TodoUpdate) -> StoreResult<()> {
        self.gate.notified().await;
        self.backend.update_item(list_id, update).await
    }

    async fn delete_item(&self, list_id: &str, todo_id: &str) -> StoreResult<()> {
        self.backend.delete_item(list_id, todo_id).await
    }

    async fn batch_update_items(&self, list_id: &str, updates: Vec<TodoUpdate>) -> StoreResult<()> {
        self.backend.batch_update_items(list_id, updates).await
    }

    async fn batch_delete_items(&self, list_id: &str, todo_ids: &[String]) -> StoreResult<()> {
        self.backend.batch_delete_items(list_id, todo_ids).await
    }

    async fn delete_all_items(&self, list_id: &str) -> StoreResult<()> {
        self.backend.delete_all_items(list_id).await
    }
}

#[tokio::test]
async fn test_optimistic_toggle_visible_before_remote_settles() {
    let backend = seeded_backend();
    let gate = Arc::new(Notify::new());
    let shared = Arc::new(backend.clone());
    let store = TodoStore::new(
        shared.clone(),
        shared,
        Arc::new(GatedItems {
            backend: backend.clone(),
            gate: Arc::clone(&gate),
        }),
    );
    settled(&store).await;

    let (_, seen_early) = tokio::join!(store.toggle_todo_completion("t1", true), async {
        let seen = wait_until(&store, |s| s.find_todo("t1").is_some_and(|t| t.completed))
            .await
            .find_todo("t1")
            .is_some_and(|t| t.completed);
        let stored_early = backend.todos("a")[0].completed;
        gate.notify_one();
        seen && !stored_early
    });

    assert!(seen_early);
    assert!(backend.todos("a")[0].completed);
}

// --- Switch-latest ---

type Emitter = mpsc::UnboundedSender<QueryResult<Todo>>;

/// Item store whose live queries emit only what the test pushes.
#[derive(Default)]
struct ScriptedItems {
    queries: Mutex<Vec<(String, Emitter)>>,
}

impl ScriptedItems {
    fn emitter(&self, index: usize) -> (String, Emitter) {
        self.queries.lock().unwrap()[index].clone()
    }

    fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl ItemStore for ScriptedItems {
    fn subscribe_items(&self, list_id: &str, _sort_by: SortBy, _direction: SortDirection) -> LiveQuery<Todo> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.queries.lock().unwrap().push((list_id.to_string(), tx));
        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|result| (result, rx)) }).boxed()
    }

    async fn create_item(&self, _: &str, _: &str, _: &str) -> StoreResult<String> {
        Err(StoreError::Backend("scripted".to_string()))
    }

    async fn update_item(&self, _: &str, _: TodoUpdate) -> StoreResult<()> {
        Err(StoreError::Backend("scripted".to_string()))
    }

    async fn delete_item(&self, _: &str, _: &str) -> StoreResult<()> {
        Err(StoreError::Backend("scripted".to_string()))
    }

    async fn batch_update_items(&self, _: &str, _: Vec<TodoUpdate>) -> StoreResult<()> {
        Err(StoreError::Backend("scripted".to_string()))
    }

    async fn batch_delete_items(&self, _: &str, _: &[String]) -> StoreResult<()> {
        Err(StoreError::Backend("scripted".to_string()))
    }

    async fn delete_all_items(&self, _: &str) -> StoreResult<()> {
        Err(StoreError::Backend("scripted".to_string()))
    }
}

#[tokio::test]
async fn test_stale_items_result_never_lands() {
    let backend = seeded_backend();
    let items = Arc::new(ScriptedItems::default());
    let shared = Arc::new(backend.clone());
    let store = TodoStore::new(shared.clone(), shared, items.clone());

    // First query: list a, still pending.
    wait_until(&store, |s| s.todos_query.as_ref().and_then(|q| q.list_id.as_deref()) == Some("a")).await;
    assert!(store.snapshot().todos_loading);

    // Second query: list b supersedes it.
    store.set_selected_list_id(Some("b".to_string()));
    wait_until(&store, |s| s.todos_query.as_ref().and_then(|q| q.list_id.as_deref()) == Some("b")).await;
    wait_for_count(|| items.query_count(), 2).await;

    let (list_b, newer) = items.emitter(1);
    assert_eq!(list_b, "b");
    newer
        .send(QueryResult::ready(vec![Todo::new("c1", "Vacuum", "ann")]))
        .unwrap();
    let state = settled(&store).await;
    assert_eq!(ids(&state.todos), vec!["c1"]);

    // The first query resolves late: its stream is gone, nothing changes.
    let (list_a, stale) = items.emitter(0);
    assert_eq!(list_a, "a");
    assert!(stale
        .send(QueryResult::ready(vec![Todo::new("t1", "Buy milk", "ann")]))
        .is_err());
    tokio::task::yield_now().await;
    let state = store.snapshot();
    assert_eq!(ids(&state.todos), vec!["c1"]);
    assert_eq!(state.selected_list_id.as_deref(), Some("b"));
}

type ListEmitter = mpsc::UnboundedSender<QueryResult<List>>;

/// List store whose live queries emit only what the test pushes.
#[derive(Default)]
struct ScriptedLists {
    queries: Mutex<Vec<(String, ListEmitter)>>,
}

impl ScriptedLists {
    fn emitter(&self, index: usize) -> (String, ListEmitter) {
        self.queries.lock().unwrap()[index].clone()
    }

    fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl ListStore for ScriptedLists {
    fn subscribe_lists(&self, user: &User) -> LiveQuery<List> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.queries.lock().unwrap().push((user.uid.clone(), tx));
        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|result| (result, rx)) }).boxed()
    }

    async fn create_list(&self, _: &str, _: &str, _: SharedWith) -> StoreResult<String> {
        Err(StoreError::Backend("scripted".to_string()))
    }

    async fn rename_list(&self, _: &str, _: &str) -> StoreResult<()> {
        Err(StoreError::Backend("scripted".to_string()))
    }

    async fn delete_list(&self, _: &str) -> StoreResult<()> {
        Err(StoreError::Backend("scripted".to_string()))
    }

    async fn delete_list_cascade(&self, _: &str) -> StoreResult<()> {
        Err(StoreError::Backend("scripted".to_string()))
    }

    async fn share_list(&self, _: &str, _: &str) -> StoreResult<()> {
        Err(StoreError::Backend("scripted".to_string()))
    }

    async fn unshare_list(&self, _: &str, _: &str) -> StoreResult<()> {
        Err(StoreError::Backend("scripted".to_string()))
    }

    async fn resolve_user_by_email(&self, _: &str) -> StoreResult<Option<User>> {
        Ok(None)
    }

    async fn fetch_profiles(&self, _: &[String]) -> StoreResult<Vec<User>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_stale_lists_result_never_lands() {
    let backend = seeded_backend();
    let lists = Arc::new(ScriptedLists::default());
    let shared = Arc::new(backend.clone());
    let store = TodoStore::new(shared.clone(), lists.clone(), shared);

    // Ann's query is issued and stays pending.
    wait_for_count(|| lists.query_count(), 1).await;
    let state = wait_until(&store, |s| s.current_user == Some(ann())).await;
    assert!(state.lists_loading);

    // Bob signs in before it resolves.
    backend.set_current_user(Some(bob()));
    wait_until(&store, |s| s.current_user == Some(bob())).await;
    wait_for_count(|| lists.query_count(), 2).await;

    let (uid, newer) = lists.emitter(1);
    assert_eq!(uid, "bob");
    newer
        .send(QueryResult::ready(vec![List::new("g", "Garden", "bob")]))
        .unwrap();
    let state = wait_until(&store, |s| !s.lists_loading && s.lists.len() == 1).await;
    assert_eq!(state.selected_list_id.as_deref(), Some("g"));

    // Ann's query resolves late: its stream is gone, nothing changes.
    let (uid, stale) = lists.emitter(0);
    assert_eq!(uid, "ann");
    assert!(stale
        .send(QueryResult::ready(vec![List::new("a", "Groceries", "ann")]))
        .is_err());
    tokio::task::yield_now().await;
    let state = store.snapshot();
    assert_eq!(state.lists.len(), 1);
    assert_eq!(state.lists[0].id, "g");
    assert_eq!(state.selected_list_id.as_deref(), Some("g"));

    // Signing out collapses everything and drops Bob's query too.
    backend.set_current_user(None);
    let state = wait_until(&store, |s| s.current_user.is_none() && !s.lists_loading).await;
    assert!(state.lists.is_empty());
    assert_eq!(state.selected_list_id, None);
    assert!(newer
        .send(QueryResult::ready(vec![List::new("g", "Garden", "bob")]))
        .is_err());
    tokio::task::yield_now().await;
    let state = store.snapshot();
    assert!(state.lists.is_empty());
    assert_eq!(state.selected_list_id, None);
    assert_eq!(lists.query_count(), 2);
}
