//! An in-process backend holding lists, items and profiles in memory.
//!
//! Implements all three remote contracts. Every successful mutation bumps a
//! revision counter; live queries re-read their slice of the data on each
//! bump, so subscribers see changes the same way they would from a real
//! document store. Used for tests and for embedding the store without a
//! database.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    List, QueryResult, SharedWith, SortBy, SortDirection, Todo, TodoUpdate, User,
};
use crate::remote::{Credentials, IdentityProvider, ItemStore, ListStore, LiveQuery};

#[derive(Debug, Default)]
struct Data {
    users: BTreeMap<String, User>,
    lists: BTreeMap<String, List>,
    items: HashMap<String, BTreeMap<String, Todo>>,
}

impl Data {
    fn list(&self, list_id: &str) -> StoreResult<&List> {
        self.lists
            .get(list_id)
            .ok_or_else(|| StoreError::ListNotFound(list_id.to_string()))
    }

    fn list_mut(&mut self, list_id: &str) -> StoreResult<&mut List> {
        self.lists
            .get_mut(list_id)
            .ok_or_else(|| StoreError::ListNotFound(list_id.to_string()))
    }

    fn visible_lists(&self, uid: &str) -> Vec<List> {
        let mut lists: Vec<List> = self
            .lists
            .values()
            .filter(|list| list.is_visible_to(uid))
            .cloned()
            .collect();
        lists.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        lists
    }

    fn sorted_items(&self, list_id: &str, sort_by: SortBy, direction: SortDirection) -> Vec<Todo> {
        let mut items: Vec<Todo> = self
            .items
            .get(list_id)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default();
        items.sort_by(|a, b| {
            let ordering = match sort_by {
                SortBy::Order => a.order.cmp(&b.order),
                SortBy::DueDate => a.due_date.cmp(&b.due_date),
                SortBy::CreatedAt => a.created_at.cmp(&b.created_at),
            }
            .then_with(|| a.id.cmp(&b.id));
            match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
        items
    }
}

struct Inner {
    data: Mutex<Data>,
    revision: watch::Sender<u64>,
    user: watch::Sender<Option<User>>,
    fail_mutations: AtomicBool,
    mutations: AtomicUsize,
    batch_updates: Mutex<Vec<Vec<TodoUpdate>>>,
}

impl Inner {
    fn data(&self) -> MutexGuard<'_, Data> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        let (user, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                data: Mutex::new(Data::default()),
                revision,
                user,
                fail_mutations: AtomicBool::new(false),
                mutations: AtomicUsize::new(0),
                batch_updates: Mutex::new(Vec::new()),
            }),
        }
    }

    // --- Seeding and inspection ---

    pub fn seed_user(&self, user: User) {
        self.inner.data().users.insert(user.uid.clone(), user);
        self.bump();
    }

    pub fn seed_list(&self, list: List) {
        self.inner.data().lists.insert(list.id.clone(), list);
        self.bump();
    }

    pub fn seed_todo(&self, list_id: &str, todo: Todo) {
        self.inner
            .data()
            .items
            .entry(list_id.to_string())
            .or_default()
            .insert(todo.id.clone(), todo);
        self.bump();
    }

    /// Switches the signed-in user directly, bypassing sign-in.
    pub fn set_current_user(&self, user: Option<User>) {
        self.inner.user.send_replace(user);
    }

    /// Makes every mutation fail with a backend error until turned off.
    pub fn set_fail_mutations(&self, fail: bool) {
        self.inner.fail_mutations.store(fail, Ordering::SeqCst);
    }

    /// Mutation calls received so far, failed ones included.
    pub fn mutation_count(&self) -> usize {
        self.inner.mutations.load(Ordering::SeqCst)
    }

    /// Every batch passed to `batch_update_items`, in call order.
    pub fn batch_update_log(&self) -> Vec<Vec<TodoUpdate>> {
        self.inner
            .batch_updates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn list(&self, list_id: &str) -> Option<List> {
        self.inner.data().lists.get(list_id).cloned()
    }

    pub fn todos(&self, list_id: &str) -> Vec<Todo> {
        self.inner
            .data()
            .sorted_items(list_id, SortBy::Order, SortDirection::Asc)
    }

    fn bump(&self) {
        self.inner.revision.send_modify(|revision| *revision += 1);
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Data) -> StoreResult<R>) -> StoreResult<R> {
        self.inner.mutations.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_mutations.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated failure".to_string()));
        }

        let result = f(&mut self.inner.data());
        if result.is_ok() {
            self.bump();
        }
        result
    }

    /// A live query that re-reads `read` on every revision.
    fn live<T, F>(&self, read: F) -> LiveQuery<T>
    where
        T: Send + 'static,
        F: Fn(&Data) -> Vec<T> + Send + Sync + 'static,
    {
        let read = Arc::new(read);
        let inner = Arc::clone(&self.inner);
        let revisions = self.inner.revision.subscribe();

        stream::unfold((inner, revisions, true), move |(inner, mut revisions, first)| {
            let read = Arc::clone(&read);
            async move {
                if !first {
                    revisions.changed().await.ok()?;
                }
                let data = read(&inner.data());
                Some((QueryResult::ready(data), (inner, revisions, false)))
            }
        })
        .boxed()
    }
}

#[async_trait]
impl ListStore for MemoryBackend {
    fn subscribe_lists(&self, user: &User) -> LiveQuery<List> {
        let uid = user.uid.clone();
        let backend = self.clone();
        self.live(move |data| data.visible_lists(&uid))
            .then(move |result| {
                let backend = backend.clone();
                async move { QueryResult::ready(backend.enrich_lists_with_profiles(result.data).await) }
            })
            .boxed()
    }

    async fn create_list(
        &self,
        owner_uid: &str,
        name: &str,
        shared_with: SharedWith,
    ) -> StoreResult<String> {
        let id = Uuid::new_v4().to_string();
        let list = List::new(id.clone(), name, owner_uid).with_shared_with(shared_with);
        self.mutate(|data| {
            data.lists.insert(id.clone(), list);
            Ok(())
        })?;
        Ok(id)
    }

    async fn rename_list(&self, list_id: &str, name: &str) -> StoreResult<()> {
        self.mutate(|data| {
            data.list_mut(list_id)?.name = name.to_string();
            Ok(())
        })
    }

    async fn delete_list(&self, list_id: &str) -> StoreResult<()> {
        self.mutate(|data| {
            data.list(list_id)?;
            data.lists.remove(list_id);
            Ok(())
        })
    }

    async fn delete_list_cascade(&self, list_id: &str) -> StoreResult<()> {
        self.mutate(|data| {
            data.list(list_id)?;
            data.lists.remove(list_id);
            data.items.remove(list_id);
            Ok(())
        })
    }

    async fn share_list(&self, list_id: &str, uid: &str) -> StoreResult<()> {
        self.mutate(|data| {
            let list = data.list_mut(list_id)?;
            if list.is_owned_by(uid) {
                return Err(StoreError::ShareWithOwner);
            }
            list.shared_with.insert(uid.to_string(), true);
            Ok(())
        })
    }

    async fn unshare_list(&self, list_id: &str, uid: &str) -> StoreResult<()> {
        self.mutate(|data| {
            data.list_mut(list_id)?.shared_with.remove(uid);
            Ok(())
        })
    }

    async fn resolve_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .inner
            .data()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn fetch_profiles(&self, uids: &[String]) -> StoreResult<Vec<User>> {
        let data = self.inner.data();
        Ok(uids.iter().filter_map(|uid| data.users.get(uid).cloned()).collect())
    }
}

#[async_trait]
impl ItemStore for MemoryBackend {
    fn subscribe_items(
        &self,
        list_id: &str,
        sort_by: SortBy,
        direction: SortDirection,
    ) -> LiveQuery<Todo> {
        let list_id = list_id.to_string();
        self.live(move |data| data.sorted_items(&list_id, sort_by, direction))
    }

    async fn create_item(&self, list_id: &str, owner_uid: &str, text: &str) -> StoreResult<String> {
        let id = Uuid::new_v4().to_string();
        let todo = Todo::new(id.clone(), text, owner_uid);
        self.mutate(|data| {
            data.list(list_id)?;
            data.items
                .entry(list_id.to_string())
                .or_default()
                .insert(id.clone(), todo);
            Ok(())
        })?;
        Ok(id)
    }

    async fn update_item(&self, list_id: &str, update: TodoUpdate) -> StoreResult<()> {
        self.mutate(|data| {
            let todo = data
                .items
                .get_mut(list_id)
                .and_then(|items| items.get_mut(&update.id))
                .ok_or_else(|| StoreError::TodoNotFound(update.id.clone()))?;
            update.changes.apply_to(todo);
            todo.updated_at = Some(Utc::now());
            Ok(())
        })
    }

    async fn delete_item(&self, list_id: &str, todo_id: &str) -> StoreResult<()> {
        self.mutate(|data| {
            data.items
                .get_mut(list_id)
                .and_then(|items| items.remove(todo_id))
                .map(|_| ())
                .ok_or_else(|| StoreError::TodoNotFound(todo_id.to_string()))
        })
    }

    async fn batch_update_items(&self, list_id: &str, updates: Vec<TodoUpdate>) -> StoreResult<()> {
        self.inner
            .batch_updates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(updates.clone());

        self.mutate(|data| {
            let items = data
                .items
                .get_mut(list_id)
                .ok_or_else(|| StoreError::ListNotFound(list_id.to_string()))?;
            // All or nothing.
            if let Some(missing) = updates.iter().find(|u| !items.contains_key(&u.id)) {
                return Err(StoreError::TodoNotFound(missing.id.clone()));
            }
            let now = Utc::now();
            for update in &updates {
                if let Some(todo) = items.get_mut(&update.id) {
                    update.changes.apply_to(todo);
                    todo.updated_at = Some(now);
                }
            }
            Ok(())
        })
    }

    async fn batch_delete_items(&self, list_id: &str, todo_ids: &[String]) -> StoreResult<()> {
        self.mutate(|data| {
            if let Some(items) = data.items.get_mut(list_id) {
                for id in todo_ids {
                    items.remove(id);
                }
            }
            Ok(())
        })
    }

    async fn delete_all_items(&self, list_id: &str) -> StoreResult<()> {
        self.mutate(|data| {
            data.items.remove(list_id);
            Ok(())
        })
    }
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    fn current_user(&self) -> watch::Receiver<Option<User>> {
        self.inner.user.subscribe()
    }

    async fn sign_in(&self, credentials: Credentials) -> StoreResult<User> {
        let user = {
            let mut data = self.inner.data();
            let existing = data
                .users
                .values()
                .find(|u| u.email == credentials.email)
                .map(|u| u.uid.clone());
            let uid = existing.unwrap_or_else(|| Uuid::new_v4().to_string());
            let user = User {
                uid: uid.clone(),
                email: credentials.email,
                display_name: credentials.display_name,
                photo_url: credentials.photo_url,
            };
            data.users.insert(uid, user.clone());
            user
        };
        self.bump();
        self.inner.user.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> StoreResult<()> {
        self.inner.user.send_replace(None);
        Ok(())
    }
}
