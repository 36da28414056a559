use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single to-do item, always a child of exactly one list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    /// Sort key for manual ordering. Neighbours need strictly increasing
    /// values; uniqueness is not required.
    pub order: i64,
    pub owner_uid: String,
}

impl Todo {
    pub fn new(id: impl Into<String>, text: impl Into<String>, owner_uid: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            text: text.into(),
            completed: false,
            created_at: now,
            updated_at: None,
            due_date: None,
            order: now.timestamp_millis(),
            owner_uid: owner_uid.into(),
        }
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

impl fmt::Display for Todo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.completed { "x" } else { " " };
        write!(f, "[{}] {}", mark, self.text)?;
        if let Some(due) = self.due_date {
            write!(f, " (due {})", due.format("%b %-d"))?;
        }
        Ok(())
    }
}

/// The fields of a partial item update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TodoChanges {
    pub text: Option<String>,
    pub completed: Option<bool>,
    /// `Some(None)` clears the due date.
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub order: Option<i64>,
}

impl TodoChanges {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.completed.is_none()
            && self.due_date.is_none()
            && self.order.is_none()
    }

    pub fn apply_to(&self, todo: &mut Todo) {
        if let Some(text) = &self.text {
            todo.text = text.clone();
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
        if let Some(due_date) = self.due_date {
            todo.due_date = due_date;
        }
        if let Some(order) = self.order {
            todo.order = order;
        }
    }
}

/// A partial update addressed to one item.
#[derive(Debug, Clone, PartialEq)]
pub struct TodoUpdate {
    pub id: String,
    pub changes: TodoChanges,
}

impl TodoUpdate {
    pub fn new(id: impl Into<String>, changes: TodoChanges) -> Self {
        Self {
            id: id.into(),
            changes,
        }
    }

    pub fn completed(id: impl Into<String>, completed: bool) -> Self {
        Self::new(
            id,
            TodoChanges {
                completed: Some(completed),
                ..Default::default()
            },
        )
    }

    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            id,
            TodoChanges {
                text: Some(text.into()),
                ..Default::default()
            },
        )
    }

    pub fn due_date(id: impl Into<String>, due_date: Option<DateTime<Utc>>) -> Self {
        Self::new(
            id,
            TodoChanges {
                due_date: Some(due_date),
                ..Default::default()
            },
        )
    }

    pub fn order(id: impl Into<String>, order: i64) -> Self {
        Self::new(
            id,
            TodoChanges {
                order: Some(order),
                ..Default::default()
            },
        )
    }
}
