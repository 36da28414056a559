//! One command's view of the todo store.
//!
//! Opens the database, starts a `TodoStore` over the SQLite backend and
//! waits for its live queries before the command reads or acts.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};

use todo_sharer_core::{IdentityProvider, List, Notification, Todo, TodoStore, User};

use crate::backend::SqliteBackend;
use crate::config::Config;
use crate::db::init_db;

pub struct Session {
    store: TodoStore,
    backend: SqliteBackend,
    notifications: broadcast::Receiver<Notification>,
    settle_timeout: Duration,
}

impl Session {
    /// Opens the configured database and starts the store with the
    /// configured sort and hide-completed defaults.
    pub async fn open(config: &Config) -> Result<Self, SessionError> {
        let pool = init_db(&config.database_path.value).await?;
        let backend = SqliteBackend::open(pool).await?;

        let remote = Arc::new(backend.clone());
        let store = TodoStore::new(remote.clone(), remote.clone(), remote);
        store.set_sort_by(config.sort_by.value);
        store.set_hide_completed(config.hide_completed.value);
        let notifications = store.notifications();

        Ok(Self {
            store,
            backend,
            notifications,
            settle_timeout: config.settle_timeout(),
        })
    }

    pub fn store(&self) -> &TodoStore {
        &self.store
    }

    pub fn identity(&self) -> &dyn IdentityProvider {
        &self.backend
    }

    /// Waits until the store reflects the signed-in user, its lists, and
    /// the items of the selected list under the current sort.
    pub async fn settle(&self) -> Result<(), SessionError> {
        let expected = self.backend.current_user().borrow().clone();
        let mut state = self.store.subscribe();
        let settled = state.wait_for(|s| {
            s.current_user == expected && !s.lists_loading && s.todos_settled()
        });

        let result = match tokio::time::timeout(self.settle_timeout, settled).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(SessionError::StoreClosed),
            Err(_) => Err(SessionError::Timeout(self.settle_timeout)),
        };
        result
    }

    pub fn require_user(&self) -> Result<User, SessionError> {
        self.store.current_user().ok_or(SessionError::NotSignedIn)
    }

    /// Selects a list by id or case-insensitive name, or keeps the
    /// automatic selection when `selector` is `None`.
    pub async fn select_list(&self, selector: Option<&str>) -> Result<List, SessionError> {
        self.settle().await?;
        self.require_user()?;

        if let Some(selector) = selector {
            let lists = self.store.lists();
            let found = lists
                .iter()
                .find(|l| l.id == selector)
                .or_else(|| lists.iter().find(|l| l.name.eq_ignore_ascii_case(selector)))
                .ok_or_else(|| SessionError::ListNotFound(selector.to_string()))?;

            self.store.set_selected_list_id(Some(found.id.clone()));
            self.settle().await?;
        }

        self.store.selected_list().ok_or(SessionError::NoLists)
    }

    /// The visible item at a 1-based `position`, with its 0-based index.
    pub fn visible_todo(&self, position: usize) -> Result<(usize, Todo), SessionError> {
        let visible = self.store.todos();
        position
            .checked_sub(1)
            .and_then(|index| visible.get(index).cloned().map(|todo| (index, todo)))
            .ok_or(SessionError::NoSuchPosition(position, visible.len()))
    }

    /// Prints pending notifications. The first error notification becomes
    /// the command's error.
    pub fn finish(&mut self) -> Result<(), SessionError> {
        let mut failure: Option<String> = None;

        loop {
            match self.notifications.try_recv() {
                Ok(notification) if notification.is_error() => {
                    if failure.is_none() {
                        failure = Some(notification.message);
                    } else {
                        eprintln!("{}", notification);
                    }
                }
                Ok(notification) => println!("{}", notification),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notifications dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        match failure {
            Some(message) => Err(SessionError::ActionFailed(message)),
            None => Ok(()),
        }
    }
}

#[derive(Debug)]
pub enum SessionError {
    Database(sqlx::Error),
    Timeout(Duration),
    StoreClosed,
    NotSignedIn,
    NoLists,
    ListNotFound(String),
    NoSuchPosition(usize, usize),
    InvalidDate(String),
    ActionFailed(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Database(e) => write!(f, "Database error: {}", e),
            SessionError::Timeout(after) => {
                write!(f, "Timed out after {}s waiting for data to load", after.as_secs())
            }
            SessionError::StoreClosed => write!(f, "The todo store stopped unexpectedly"),
            SessionError::NotSignedIn => {
                write!(f, "Not signed in. Run 'todo-sharer login <email>' first")
            }
            SessionError::NoLists => {
                write!(f, "No lists yet. Create one with 'todo-sharer list create <name>'")
            }
            SessionError::ListNotFound(selector) => write!(f, "List not found: {}", selector),
            SessionError::NoSuchPosition(position, len) => write!(
                f,
                "No to-do at position {} (the list shows {})",
                position, len
            ),
            SessionError::InvalidDate(value) => {
                write!(f, "Invalid date: {} (expected YYYY-MM-DD)", value)
            }
            SessionError::ActionFailed(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<sqlx::Error> for SessionError {
    fn from(e: sqlx::Error) -> Self {
        SessionError::Database(e)
    }
}
