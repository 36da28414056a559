use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::user::User;

/// Collaborator uids of a list, each mapped to `true`.
///
/// A map rather than an array so a single collaborator can be added or
/// removed without rewriting the whole field.
pub type SharedWith = BTreeMap<String, bool>;

/// Owner email shown when the owner's profile cannot be found.
pub const UNKNOWN_OWNER_EMAIL: &str = "Unknown";
/// Avatar shown when the owner has no photo.
pub const DEFAULT_AVATAR: &str = "assets/default-avatar.png";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: String,
    pub name: String,
    pub owner_uid: String,
    #[serde(default)]
    pub owner_email: String,
    #[serde(default, rename = "ownerPhotoURL")]
    pub owner_photo_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub shared_with: SharedWith,
    /// Profiles of the collaborators, filled in by enrichment. Display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaborators: Option<Vec<User>>,
}

impl List {
    pub fn new(id: impl Into<String>, name: impl Into<String>, owner_uid: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner_uid: owner_uid.into(),
            owner_email: String::new(),
            owner_photo_url: String::new(),
            created_at: Utc::now(),
            shared_with: SharedWith::new(),
            collaborators: None,
        }
    }

    pub fn with_shared_with(mut self, shared_with: SharedWith) -> Self {
        self.shared_with = shared_with;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.owner_uid == uid
    }

    pub fn is_shared_with(&self, uid: &str) -> bool {
        self.shared_with.get(uid).copied().unwrap_or(false)
    }

    /// A list is visible to its owner and to every collaborator.
    pub fn is_visible_to(&self, uid: &str) -> bool {
        self.is_owned_by(uid) || self.is_shared_with(uid)
    }

    pub fn collaborator_uids(&self) -> impl Iterator<Item = &str> {
        self.shared_with
            .iter()
            .filter(|(_, shared)| **shared)
            .map(|(uid, _)| uid.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_owner_or_collaborator() {
        let mut shared = SharedWith::new();
        shared.insert("bob".to_string(), true);
        shared.insert("carol".to_string(), false);
        let list = List::new("l1", "Groceries", "ann").with_shared_with(shared);

        assert!(list.is_visible_to("ann"));
        assert!(list.is_visible_to("bob"));
        assert!(!list.is_visible_to("carol"));
        assert!(!list.is_visible_to("dave"));
        assert_eq!(list.collaborator_uids().collect::<Vec<_>>(), vec!["bob"]);
    }

    #[test]
    fn test_list_json_field_names() {
        let list = List::new("l1", "Chores", "ann");
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json["ownerUid"], "ann");
        assert!(json.get("ownerPhotoURL").is_some());
        assert!(json.get("collaborators").is_none());
    }
}
