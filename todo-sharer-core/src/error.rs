//! Errors crossing the remote store boundary.

use thiserror::Error;

/// Errors returned by the remote list, item and identity stores.
///
/// The `Display` text is what the store surfaces to users in error
/// notifications, so it is written as a sentence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("User not logged in.")]
    NotSignedIn,

    #[error("List not found.")]
    ListNotFound(String),

    #[error("To-do not found.")]
    TodoNotFound(String),

    #[error("User with email \"{email}\" not found.")]
    UserNotFound { email: String },

    #[error("You cannot share a list with its owner.")]
    ShareWithOwner,

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
