//! Durable local backend: the remote store contracts over SQLite.
//!
//! Every write broadcasts on the change hub; live queries re-fetch from
//! the database whenever their topic changes.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use sqlx::SqlitePool;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use uuid::Uuid;

use todo_sharer_core::{
    Credentials, IdentityProvider, ItemStore, List, ListStore, LiveQuery, QueryResult,
    SharedWith, SortBy, SortDirection, StoreError, StoreResult, Todo, TodoUpdate, User,
};

use crate::db::{BatchOutcome, ListRepository, TodoRepository, UserRepository};
use crate::hub::{ChangeEvent, ChangeHub, Topic};

fn backend_error(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[derive(Clone)]
pub struct SqliteBackend {
    users: Arc<UserRepository>,
    lists: Arc<ListRepository>,
    todos: Arc<TodoRepository>,
    hub: Arc<ChangeHub>,
    current_user: Arc<watch::Sender<Option<User>>>,
}

impl SqliteBackend {
    /// Wraps a migrated pool and restores the persisted session, if any.
    pub async fn open(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        let users = UserRepository::new(pool.clone());
        let signed_in = users.current_session().await?;
        if let Some(user) = &signed_in {
            tracing::debug!(uid = %user.uid, "Restored session");
        }
        let (current_user, _) = watch::channel(signed_in);

        Ok(Self {
            users: Arc::new(users),
            lists: Arc::new(ListRepository::new(pool.clone())),
            todos: Arc::new(TodoRepository::new(pool)),
            hub: Arc::new(ChangeHub::new()),
            current_user: Arc::new(current_user),
        })
    }

    async fn changed(&self, topic: Topic) {
        self.hub.broadcast(&topic, ChangeEvent::Updated).await;
    }

    /// A live query over `topic`.
    ///
    /// Subscribes before the first fetch so no change is missed. A failed
    /// fetch is logged and emitted as an empty, settled result.
    fn live<T, F, Fut>(&self, topic: Topic, fetch: F) -> LiveQuery<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StoreResult<Vec<T>>> + Send + 'static,
    {
        let hub = Arc::clone(&self.hub);
        let fetch = Arc::new(fetch);

        stream::unfold((hub, topic, None::<tokio::sync::broadcast::Receiver<ChangeEvent>>), move |(hub, topic, changes)| {
            let fetch = Arc::clone(&fetch);
            async move {
                let changes = match changes {
                    None => hub.subscribe(topic.clone()).await,
                    Some(mut changes) => match changes.recv().await {
                        Ok(ChangeEvent::Updated) | Err(RecvError::Lagged(_)) => changes,
                        Err(RecvError::Closed) => return None,
                    },
                };

                let data = match fetch().await {
                    Ok(data) => data,
                    Err(e) => {
                        tracing::warn!(error = %e, topic = ?topic, "Live query fetch failed");
                        Vec::new()
                    }
                };
                Some((QueryResult::ready(data), (hub, topic, Some(changes))))
            }
        })
        .boxed()
    }
}

#[async_trait]
impl ListStore for SqliteBackend {
    fn subscribe_lists(&self, user: &User) -> LiveQuery<List> {
        let backend = self.clone();
        let uid = user.uid.clone();
        self.live(Topic::Lists, move || {
            let backend = backend.clone();
            let uid = uid.clone();
            async move {
                let lists = backend
                    .lists
                    .list_for_user(&uid)
                    .await
                    .map_err(backend_error)?;
                Ok(backend.enrich_lists_with_profiles(lists).await)
            }
        })
    }

    async fn create_list(
        &self,
        owner_uid: &str,
        name: &str,
        shared_with: SharedWith,
    ) -> StoreResult<String> {
        let list = List::new(Uuid::new_v4().to_string(), name, owner_uid).with_shared_with(shared_with);
        self.lists.create(&list).await.map_err(backend_error)?;
        self.changed(Topic::Lists).await;
        Ok(list.id)
    }

    async fn rename_list(&self, list_id: &str, name: &str) -> StoreResult<()> {
        if !self.lists.rename(list_id, name).await.map_err(backend_error)? {
            return Err(StoreError::ListNotFound(list_id.to_string()));
        }
        self.changed(Topic::Lists).await;
        Ok(())
    }

    async fn delete_list(&self, list_id: &str) -> StoreResult<()> {
        if !self.lists.delete(list_id).await.map_err(backend_error)? {
            return Err(StoreError::ListNotFound(list_id.to_string()));
        }
        self.changed(Topic::Lists).await;
        Ok(())
    }

    async fn delete_list_cascade(&self, list_id: &str) -> StoreResult<()> {
        if !self.lists.delete_cascade(list_id).await.map_err(backend_error)? {
            return Err(StoreError::ListNotFound(list_id.to_string()));
        }
        self.changed(Topic::Lists).await;
        self.changed(Topic::Items(list_id.to_string())).await;
        Ok(())
    }

    async fn share_list(&self, list_id: &str, uid: &str) -> StoreResult<()> {
        let list = self
            .lists
            .get(list_id)
            .await
            .map_err(backend_error)?
            .ok_or_else(|| StoreError::ListNotFound(list_id.to_string()))?;
        if list.is_owned_by(uid) {
            return Err(StoreError::ShareWithOwner);
        }
        self.lists.share(list_id, uid).await.map_err(backend_error)?;
        self.changed(Topic::Lists).await;
        Ok(())
    }

    async fn unshare_list(&self, list_id: &str, uid: &str) -> StoreResult<()> {
        self.lists.unshare(list_id, uid).await.map_err(backend_error)?;
        self.changed(Topic::Lists).await;
        Ok(())
    }

    async fn resolve_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.users.find_by_email(email).await.map_err(backend_error)
    }

    async fn fetch_profiles(&self, uids: &[String]) -> StoreResult<Vec<User>> {
        self.users.get_many(uids).await.map_err(backend_error)
    }
}

#[async_trait]
impl ItemStore for SqliteBackend {
    fn subscribe_items(
        &self,
        list_id: &str,
        sort_by: SortBy,
        direction: SortDirection,
    ) -> LiveQuery<Todo> {
        let todos = Arc::clone(&self.todos);
        let list_id = list_id.to_string();
        self.live(Topic::Items(list_id.clone()), move || {
            let todos = Arc::clone(&todos);
            let list_id = list_id.clone();
            async move {
                todos
                    .list(&list_id, sort_by, direction)
                    .await
                    .map_err(backend_error)
            }
        })
    }

    async fn create_item(&self, list_id: &str, owner_uid: &str, text: &str) -> StoreResult<String> {
        if self.lists.get(list_id).await.map_err(backend_error)?.is_none() {
            return Err(StoreError::ListNotFound(list_id.to_string()));
        }
        let todo = Todo::new(Uuid::new_v4().to_string(), text, owner_uid);
        self.todos.create(list_id, &todo).await.map_err(backend_error)?;
        self.changed(Topic::Items(list_id.to_string())).await;
        Ok(todo.id)
    }

    async fn update_item(&self, list_id: &str, update: TodoUpdate) -> StoreResult<()> {
        if !self.todos.update(list_id, &update).await.map_err(backend_error)? {
            return Err(StoreError::TodoNotFound(update.id));
        }
        self.changed(Topic::Items(list_id.to_string())).await;
        Ok(())
    }

    async fn delete_item(&self, list_id: &str, todo_id: &str) -> StoreResult<()> {
        if !self.todos.delete(list_id, todo_id).await.map_err(backend_error)? {
            return Err(StoreError::TodoNotFound(todo_id.to_string()));
        }
        self.changed(Topic::Items(list_id.to_string())).await;
        Ok(())
    }

    async fn batch_update_items(&self, list_id: &str, updates: Vec<TodoUpdate>) -> StoreResult<()> {
        match self
            .todos
            .batch_update(list_id, &updates)
            .await
            .map_err(backend_error)?
        {
            BatchOutcome::Applied => {
                self.changed(Topic::Items(list_id.to_string())).await;
                Ok(())
            }
            BatchOutcome::Missing(id) => Err(StoreError::TodoNotFound(id)),
        }
    }

    async fn batch_delete_items(&self, list_id: &str, todo_ids: &[String]) -> StoreResult<()> {
        self.todos
            .batch_delete(list_id, todo_ids)
            .await
            .map_err(backend_error)?;
        self.changed(Topic::Items(list_id.to_string())).await;
        Ok(())
    }

    async fn delete_all_items(&self, list_id: &str) -> StoreResult<()> {
        self.todos.delete_all(list_id).await.map_err(backend_error)?;
        self.changed(Topic::Items(list_id.to_string())).await;
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for SqliteBackend {
    fn current_user(&self) -> watch::Receiver<Option<User>> {
        self.current_user.subscribe()
    }

    async fn sign_in(&self, credentials: Credentials) -> StoreResult<User> {
        let profile = User {
            uid: Uuid::new_v4().to_string(),
            email: credentials.email,
            display_name: credentials.display_name,
            photo_url: credentials.photo_url,
        };
        let user = self.users.upsert(&profile).await.map_err(backend_error)?;
        self.users
            .start_session(&user.uid)
            .await
            .map_err(backend_error)?;

        tracing::info!(uid = %user.uid, email = %user.email, "Signed in");
        // Profile changes show up in list enrichment.
        self.changed(Topic::Lists).await;
        self.current_user.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> StoreResult<()> {
        self.users.end_session().await.map_err(backend_error)?;
        tracing::info!("Signed out");
        self.current_user.send_replace(None);
        Ok(())
    }
}
