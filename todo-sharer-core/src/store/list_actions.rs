//! List-level actions: create, rename, delete, share.

use super::{Shared, TodoStore};
use crate::error::{StoreError, StoreResult};
use crate::models::{List, SharedWith};
use crate::notify::{Notification, DEFAULT_DURATION, LONG_ERROR_DURATION};
use crate::state::BusyFlag;

/// Clears `unsharing_email` when an unshare settles or is abandoned.
struct UnsharingGuard<'a>(&'a Shared);

impl Drop for UnsharingGuard<'_> {
    fn drop(&mut self) {
        self.0.update(|s| s.unsharing_email = None);
    }
}

/// Surfaces sharing errors: store-provided messages as is, backend
/// failures with a generic fallback.
fn sharing_message(error: &StoreError, fallback: &str) -> String {
    match error {
        StoreError::Backend(_) => fallback.to_string(),
        other => other.to_string(),
    }
}

impl TodoStore {
    /// Creates a list named after the trimmed `new_list_text` and selects it.
    pub async fn add_list(&self) {
        let name = self.shared.read(|s| s.new_list_text.trim().to_string());
        let Some(user) = self.shared.current_user() else {
            return;
        };
        if name.is_empty() {
            return;
        }

        let created = self
            .with_loading(
                BusyFlag::AddingList,
                self.shared.lists.create_list(&user.uid, &name, SharedWith::new()),
            )
            .await;

        match created {
            Ok(list_id) => {
                tracing::info!(list_id = %list_id, "Created list");
                self.shared.update(|s| {
                    s.selected_list_id = Some(list_id);
                    s.new_list_text.clear();
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to create list");
                self.shared.notify(Notification::error(
                    "Failed to create list. Please try again.",
                    crate::notify::ERROR_DURATION,
                ));
            }
        }
    }

    pub fn start_edit_list(&self) {
        self.shared.update(|s| {
            let Some(name) = s.selected_list().map(|l| l.name.clone()) else {
                return;
            };
            s.editing_list_text = name;
            s.is_editing_list = true;
            s.is_sharing = false;
        });
    }

    pub fn cancel_edit_list(&self) {
        self.shared.update(|s| {
            s.is_editing_list = false;
            s.editing_list_text.clear();
        });
    }

    /// Renames the selected list to the trimmed `editing_list_text`.
    pub async fn save_edit_list(&self) {
        let (list_id, name) = self.shared.read(|s| {
            (s.selected_list_id.clone(), s.editing_list_text.trim().to_string())
        });
        let Some(list_id) = list_id else {
            return;
        };
        if name.is_empty() {
            return;
        }

        let renamed = self
            .with_loading(BusyFlag::SavingList, self.shared.lists.rename_list(&list_id, &name))
            .await;

        match renamed {
            Ok(()) => self.shared.update(|s| s.is_editing_list = false),
            Err(e) => {
                tracing::error!(error = %e, list_id = %list_id, "Failed to rename list");
                self.shared.notify(Notification::error(
                    "Failed to rename list. Please try again.",
                    crate::notify::ERROR_DURATION,
                ));
            }
        }
    }

    /// Asks for confirmation before deleting the selected list.
    pub fn start_delete_list(&self) {
        self.shared.update(|s| s.confirming_delete_list_id = s.selected_list_id.clone());
    }

    pub fn cancel_delete_list(&self) {
        self.shared.update(|s| s.confirming_delete_list_id = None);
    }

    /// Deletes the list awaiting confirmation together with all of its items.
    ///
    /// The selection moves on when the lists query drops the deleted list.
    pub async fn confirm_delete_list(&self) {
        let Some(list_id) = self.shared.read(|s| s.confirming_delete_list_id.clone()) else {
            return;
        };

        let deleted = self
            .with_loading(
                BusyFlag::DeletingList,
                self.shared.lists.delete_list_cascade(&list_id),
            )
            .await;

        self.shared.update(|s| s.confirming_delete_list_id = None);
        match deleted {
            Ok(()) => {
                tracing::info!(list_id = %list_id, "Deleted list");
                self.shared.update(|s| s.is_editing_list = false);
                self.shared
                    .notify(Notification::success("List deleted.", DEFAULT_DURATION));
            }
            Err(e) => {
                tracing::error!(error = %e, list_id = %list_id, "Failed to delete list");
                self.shared.notify(Notification::error(
                    "Failed to delete list. Please try again.",
                    crate::notify::ERROR_DURATION,
                ));
            }
        }
    }

    pub fn start_sharing(&self) {
        self.shared.update(|s| {
            s.is_sharing = true;
            s.is_editing_list = false;
            s.share_email.clear();
        });
    }

    pub fn cancel_sharing(&self) {
        self.shared.update(|s| {
            s.is_sharing = false;
            s.share_email.clear();
        });
    }

    /// Shares the selected list with the user whose email is in `share_email`.
    pub async fn share_list(&self) {
        let (list, email) = self
            .shared
            .read(|s| (s.selected_list().cloned(), s.share_email.trim().to_string()));
        let Some(list) = list else {
            return;
        };
        if email.is_empty() {
            return;
        }

        let shared = self
            .with_loading(BusyFlag::SharingList, self.share_with(&list, &email))
            .await;

        match shared {
            Ok(()) => {
                tracing::info!(list_id = %list.id, email = %email, "Shared list");
                self.shared.notify(Notification::success(
                    format!("List shared with {}!", email),
                    DEFAULT_DURATION,
                ));
                self.cancel_sharing();
            }
            Err(e) => {
                tracing::error!(error = %e, list_id = %list.id, "Error sharing list");
                self.shared.notify(Notification::error(
                    sharing_message(&e, "Could not share the list. Please try again."),
                    LONG_ERROR_DURATION,
                ));
            }
        }
    }

    async fn share_with(&self, list: &List, email: &str) -> StoreResult<()> {
        let user = self
            .shared
            .lists
            .resolve_user_by_email(email)
            .await?
            .ok_or_else(|| StoreError::UserNotFound {
                email: email.to_string(),
            })?;
        if list.is_owned_by(&user.uid) {
            return Err(StoreError::ShareWithOwner);
        }
        self.shared.lists.share_list(&list.id, &user.uid).await
    }

    /// Stops sharing the selected list with a collaborator, given by email or uid.
    pub async fn unshare_list(&self, email_or_uid: &str) {
        let Some(list) = self.selected_list() else {
            return;
        };

        let who = email_or_uid.to_string();
        self.shared.update(|s| s.unsharing_email = Some(who));
        let _unsharing = UnsharingGuard(&self.shared);

        let result = match self.collaborator_uid(&list, email_or_uid).await {
            Ok(uid) => self.shared.lists.unshare_list(&list.id, &uid).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                tracing::info!(list_id = %list.id, who = %email_or_uid, "Unshared list");
                self.shared.notify(Notification::success(
                    format!("Stopped sharing list with {}.", email_or_uid),
                    DEFAULT_DURATION,
                ));
            }
            Err(e) => {
                tracing::error!(error = %e, list_id = %list.id, "Error unsharing list");
                self.shared.notify(Notification::error(
                    sharing_message(&e, "Could not unshare the list. Please try again."),
                    LONG_ERROR_DURATION,
                ));
            }
        }
    }

    async fn collaborator_uid(&self, list: &List, email_or_uid: &str) -> StoreResult<String> {
        if !email_or_uid.contains('@') {
            return Ok(email_or_uid.to_string());
        }

        let known = list
            .collaborators
            .iter()
            .flatten()
            .find(|u| u.email.eq_ignore_ascii_case(email_or_uid));
        if let Some(user) = known {
            return Ok(user.uid.clone());
        }

        self.shared
            .lists
            .resolve_user_by_email(email_or_uid)
            .await?
            .map(|u| u.uid)
            .ok_or_else(|| StoreError::UserNotFound {
                email: email_or_uid.to_string(),
            })
    }
}
