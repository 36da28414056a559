//! Todo Sharer Core Library
//!
//! The reactive todo store shared by Todo Sharer front ends: models, the
//! contracts of the remote stores it consumes, and the store itself.

pub mod error;
pub mod memory;
pub mod models;
pub mod notify;
pub mod ordering;
pub mod remote;
pub mod state;
pub mod store;
pub mod views;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryBackend;
pub use models::{
    ItemsQuery, List, QueryResult, SharedWith, SortBy, SortDirection, Todo, TodoChanges,
    TodoUpdate, User,
};
pub use notify::{Level, Notification, Notifier};
pub use ordering::{plan_reorder, ReorderPlan, REORDER_SPACING};
pub use remote::{Credentials, IdentityProvider, ItemStore, ListStore, LiveQuery};
pub use state::{BusyFlag, TodoState};
pub use store::TodoStore;
pub use views::{DueStatus, TodoCounts};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
