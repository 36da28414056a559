use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use todo_sharer_core::{SortBy, SortDirection, Todo, TodoUpdate};

use super::{parse_optional_timestamp, parse_timestamp};

pub struct TodoRepository {
    pool: SqlitePool,
}

/// Result of a batch update.
#[derive(Debug, PartialEq, Eq)]
pub enum BatchOutcome {
    Applied,
    /// Nothing was written because this item does not exist in the list.
    Missing(String),
}

#[derive(sqlx::FromRow)]
struct TodoRow {
    id: String,
    text: String,
    completed: bool,
    created_at: String,
    updated_at: Option<String>,
    due_date: Option<String>,
    sort_order: i64,
    owner_uid: String,
}

impl From<TodoRow> for Todo {
    fn from(row: TodoRow) -> Self {
        Todo {
            id: row.id,
            text: row.text,
            completed: row.completed,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_optional_timestamp(row.updated_at.as_deref()),
            due_date: parse_optional_timestamp(row.due_date.as_deref()),
            order: row.sort_order,
            owner_uid: row.owner_uid,
        }
    }
}

fn sort_column(sort_by: SortBy) -> &'static str {
    match sort_by {
        SortBy::Order => "sort_order",
        SortBy::DueDate => "due_date",
        SortBy::CreatedAt => "created_at",
    }
}

/// Applies the present fields of `update` and stamps `updated_at`.
/// Returns false when the item does not exist in `list_id`.
async fn apply_update(
    conn: &mut SqliteConnection,
    list_id: &str,
    update: &TodoUpdate,
    updated_at: &str,
) -> Result<bool, sqlx::Error> {
    let changes = &update.changes;
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE todos SET updated_at = ");
    builder.push_bind(updated_at.to_string());
    if let Some(text) = &changes.text {
        builder.push(", text = ").push_bind(text.clone());
    }
    if let Some(completed) = changes.completed {
        builder.push(", completed = ").push_bind(completed);
    }
    if let Some(due_date) = changes.due_date {
        builder
            .push(", due_date = ")
            .push_bind(due_date.map(|d| d.to_rfc3339()));
    }
    if let Some(order) = changes.order {
        builder.push(", sort_order = ").push_bind(order);
    }
    builder
        .push(" WHERE id = ")
        .push_bind(update.id.clone())
        .push(" AND list_id = ")
        .push_bind(list_id.to_string());

    let result = builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected() > 0)
}

impl TodoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, list_id: &str, todo: &Todo) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO todos (id, list_id, text, completed, created_at, updated_at, due_date, sort_order, owner_uid)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&todo.id)
        .bind(list_id)
        .bind(&todo.text)
        .bind(todo.completed)
        .bind(todo.created_at.to_rfc3339())
        .bind(todo.updated_at.map(|d| d.to_rfc3339()))
        .bind(todo.due_date.map(|d| d.to_rfc3339()))
        .bind(todo.order)
        .bind(&todo.owner_uid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Todo>, sqlx::Error> {
        let row: Option<TodoRow> = sqlx::query_as("SELECT * FROM todos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Todo::from))
    }

    /// Items of a list sorted by `sort_by`, ties broken by id.
    pub async fn list(
        &self,
        list_id: &str,
        sort_by: SortBy,
        direction: SortDirection,
    ) -> Result<Vec<Todo>, sqlx::Error> {
        let sql = format!(
            "SELECT * FROM todos WHERE list_id = ? ORDER BY {column} {dir}, id {dir}",
            column = sort_column(sort_by),
            dir = direction.as_sql(),
        );
        let rows: Vec<TodoRow> = sqlx::query_as(&sql)
            .bind(list_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Todo::from).collect())
    }

    pub async fn update(&self, list_id: &str, update: &TodoUpdate) -> Result<bool, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        apply_update(&mut conn, list_id, update, &Utc::now().to_rfc3339()).await
    }

    /// Applies every update or none.
    pub async fn batch_update(
        &self,
        list_id: &str,
        updates: &[TodoUpdate],
    ) -> Result<BatchOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let updated_at = Utc::now().to_rfc3339();

        for update in updates {
            if !apply_update(&mut tx, list_id, update, &updated_at).await? {
                tx.rollback().await?;
                return Ok(BatchOutcome::Missing(update.id.clone()));
            }
        }

        tx.commit().await?;
        Ok(BatchOutcome::Applied)
    }

    pub async fn delete(&self, list_id: &str, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ? AND list_id = ?")
            .bind(id)
            .bind(list_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn batch_delete(&self, list_id: &str, ids: &[String]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM todos WHERE id = ? AND list_id = ?")
                .bind(id)
                .bind(list_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await
    }

    pub async fn delete_all(&self, list_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM todos WHERE list_id = ?")
            .bind(list_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
