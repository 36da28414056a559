mod list;
mod query;
mod todo;
mod user;

pub use list::{List, SharedWith, DEFAULT_AVATAR, UNKNOWN_OWNER_EMAIL};
pub use query::{ItemsQuery, QueryResult, SortBy, SortDirection};
pub use todo::{Todo, TodoChanges, TodoUpdate};
pub use user::User;
