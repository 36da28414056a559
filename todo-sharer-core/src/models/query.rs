use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One emission of a live query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    pub loading: bool,
    pub data: Vec<T>,
}

impl<T> QueryResult<T> {
    /// The value committed while a query is in flight.
    pub fn pending() -> Self {
        Self {
            loading: true,
            data: Vec::new(),
        }
    }

    pub fn ready(data: Vec<T>) -> Self {
        Self {
            loading: false,
            data,
        }
    }

    /// The settled result of a query that was never issued.
    pub fn empty() -> Self {
        Self::ready(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Item sort criterion. The direction is fixed per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    Order,
    DueDate,
    CreatedAt,
}

impl SortBy {
    pub fn direction(&self) -> SortDirection {
        match self {
            SortBy::Order | SortBy::DueDate => SortDirection::Asc,
            SortBy::CreatedAt => SortDirection::Desc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Order => "order",
            SortBy::DueDate => "dueDate",
            SortBy::CreatedAt => "createdAt",
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" => Ok(SortBy::Order),
            "dueDate" | "due-date" | "due_date" => Ok(SortBy::DueDate),
            "createdAt" | "created-at" | "created_at" => Ok(SortBy::CreatedAt),
            other => Err(format!(
                "Invalid sort key '{}'. Expected one of: order, dueDate, createdAt",
                other
            )),
        }
    }
}

/// Input key of the item pipeline: a fresh query runs whenever it changes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemsQuery {
    pub list_id: Option<String>,
    pub sort_by: SortBy,
}
