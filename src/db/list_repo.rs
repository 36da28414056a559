use sqlx::SqlitePool;
use todo_sharer_core::{List, SharedWith};

use super::parse_timestamp;

pub struct ListRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct ListRow {
    id: String,
    name: String,
    owner_uid: String,
    created_at: String,
}

#[derive(sqlx::FromRow)]
struct ShareRow {
    uid: String,
}

impl ListRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, list: &List) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO lists (id, name, owner_uid, created_at) VALUES (?, ?, ?, ?)")
            .bind(&list.id)
            .bind(&list.name)
            .bind(&list.owner_uid)
            .bind(list.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;

        for uid in list.collaborator_uids() {
            sqlx::query("INSERT INTO list_shares (list_id, uid) VALUES (?, ?)")
                .bind(&list.id)
                .bind(uid)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await
    }

    pub async fn get(&self, id: &str) -> Result<Option<List>, sqlx::Error> {
        let row: Option<ListRow> = sqlx::query_as("SELECT * FROM lists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => self.hydrate_list(row).await.map(Some),
            None => Ok(None),
        }
    }

    /// Lists owned by or shared with `uid`, oldest first.
    pub async fn list_for_user(&self, uid: &str) -> Result<Vec<List>, sqlx::Error> {
        let rows: Vec<ListRow> = sqlx::query_as(
            r#"
            SELECT * FROM lists
            WHERE owner_uid = ?
               OR id IN (SELECT list_id FROM list_shares WHERE uid = ?)
            ORDER BY created_at, id
            "#,
        )
        .bind(uid)
        .bind(uid)
        .fetch_all(&self.pool)
        .await?;

        let mut lists = Vec::with_capacity(rows.len());
        for row in rows {
            lists.push(self.hydrate_list(row).await?);
        }
        Ok(lists)
    }

    /// Returns false when no such list exists.
    pub async fn rename(&self, id: &str, name: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE lists SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes the list row; its items stay behind.
    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        // CASCADE will handle shares
        let result = sqlx::query("DELETE FROM lists WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes the list and all of its items in one transaction.
    pub async fn delete_cascade(&self, id: &str) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM todos WHERE list_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM lists WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn share(&self, list_id: &str, uid: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO list_shares (list_id, uid) VALUES (?, ?)")
            .bind(list_id)
            .bind(uid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn unshare(&self, list_id: &str, uid: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM list_shares WHERE list_id = ? AND uid = ?")
            .bind(list_id)
            .bind(uid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn hydrate_list(&self, row: ListRow) -> Result<List, sqlx::Error> {
        let shares: Vec<ShareRow> =
            sqlx::query_as("SELECT uid FROM list_shares WHERE list_id = ? ORDER BY uid")
                .bind(&row.id)
                .fetch_all(&self.pool)
                .await?;

        let shared_with: SharedWith = shares.into_iter().map(|s| (s.uid, true)).collect();

        Ok(List::new(row.id, row.name, row.owner_uid)
            .with_created_at(parse_timestamp(&row.created_at))
            .with_shared_with(shared_with))
    }
}
