//! Contracts of the external collaborators the todo store consumes.
//!
//! - [`ListStore`]: list documents, sharing, profile lookups
//! - [`ItemStore`]: to-do items scoped to a list
//! - [`IdentityProvider`]: the signed-in user as a live value
//!
//! Live queries are plain streams of [`QueryResult`]s. Dropping the stream
//! ends the subscription, which is how the store discards a superseded query.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::sync::watch;

use crate::error::StoreResult;
use crate::models::{
    List, QueryResult, SharedWith, SortBy, SortDirection, Todo, TodoUpdate, User, DEFAULT_AVATAR,
    UNKNOWN_OWNER_EMAIL,
};

/// Maximum number of values a single profile lookup may ask for.
pub const PROFILE_CHUNK_SIZE: usize = 30;

/// A live query: every emission replaces the previous one.
pub type LiveQuery<T> = BoxStream<'static, QueryResult<T>>;

#[async_trait]
pub trait ListStore: Send + Sync {
    /// Lists the user owns or that are shared with them, enriched with profiles.
    fn subscribe_lists(&self, user: &User) -> LiveQuery<List>;

    async fn create_list(
        &self,
        owner_uid: &str,
        name: &str,
        shared_with: SharedWith,
    ) -> StoreResult<String>;

    async fn rename_list(&self, list_id: &str, name: &str) -> StoreResult<()>;

    /// Deletes the list document only.
    async fn delete_list(&self, list_id: &str) -> StoreResult<()>;

    /// Deletes the list and every item in it in one batch.
    async fn delete_list_cascade(&self, list_id: &str) -> StoreResult<()>;

    /// Marks `uid` as a collaborator. Rejects the list's owner.
    async fn share_list(&self, list_id: &str, uid: &str) -> StoreResult<()>;

    async fn unshare_list(&self, list_id: &str, uid: &str) -> StoreResult<()>;

    async fn resolve_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Looks up profiles by uid. Callers keep `uids` within [`PROFILE_CHUNK_SIZE`].
    async fn fetch_profiles(&self, uids: &[String]) -> StoreResult<Vec<User>>;

    /// Fills owner and collaborator display fields.
    ///
    /// Profiles are fetched in chunks of [`PROFILE_CHUNK_SIZE`]. A failed lookup
    /// leaves the lists as they were rather than breaking the live query.
    async fn enrich_lists_with_profiles(&self, lists: Vec<List>) -> Vec<List> {
        if lists.is_empty() {
            return lists;
        }

        let uids: BTreeSet<String> = lists
            .iter()
            .flat_map(|list| {
                std::iter::once(list.owner_uid.clone())
                    .chain(list.collaborator_uids().map(str::to_string))
            })
            .collect();
        let uids: Vec<String> = uids.into_iter().collect();

        let mut profiles: HashMap<String, User> = HashMap::new();
        for chunk in uids.chunks(PROFILE_CHUNK_SIZE) {
            match self.fetch_profiles(chunk).await {
                Ok(users) => {
                    for user in users {
                        profiles.entry(user.uid.clone()).or_insert(user);
                    }
                }
                Err(e) => {
                    tracing::warn!("Error enriching lists with profile data: {}", e);
                    return lists;
                }
            }
        }

        lists
            .into_iter()
            .map(|mut list| {
                let owner = profiles.get(&list.owner_uid);
                list.owner_email = owner
                    .map(|u| u.email.clone())
                    .unwrap_or_else(|| UNKNOWN_OWNER_EMAIL.to_string());
                list.owner_photo_url = owner
                    .and_then(|u| u.photo_url.clone())
                    .unwrap_or_else(|| DEFAULT_AVATAR.to_string());
                list.collaborators = Some(
                    list.collaborator_uids()
                        .filter_map(|uid| profiles.get(uid).cloned())
                        .collect(),
                );
                list
            })
            .collect()
    }
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Items of one list, sorted server-side.
    fn subscribe_items(
        &self,
        list_id: &str,
        sort_by: SortBy,
        direction: SortDirection,
    ) -> LiveQuery<Todo>;

    /// Creates an incomplete item with no due date, seeded with the current
    /// time as its order.
    async fn create_item(&self, list_id: &str, owner_uid: &str, text: &str) -> StoreResult<String>;

    /// Applies a partial update and stamps `updated_at`.
    async fn update_item(&self, list_id: &str, update: TodoUpdate) -> StoreResult<()>;

    async fn delete_item(&self, list_id: &str, todo_id: &str) -> StoreResult<()>;

    async fn batch_update_items(&self, list_id: &str, updates: Vec<TodoUpdate>) -> StoreResult<()>;

    async fn batch_delete_items(&self, list_id: &str, todo_ids: &[String]) -> StoreResult<()>;

    async fn delete_all_items(&self, list_id: &str) -> StoreResult<()>;
}

/// What a sign-in produces before the profile is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: None,
            photo_url: None,
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user. `None` while signed out; may change at any time.
    fn current_user(&self) -> watch::Receiver<Option<User>>;

    /// Signs in and stores the profile so other users can resolve it by email.
    async fn sign_in(&self, credentials: Credentials) -> StoreResult<User>;

    async fn sign_out(&self) -> StoreResult<()>;
}
