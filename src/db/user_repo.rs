use sqlx::SqlitePool;
use todo_sharer_core::User;

/// Profiles and the signed-in session.
pub struct UserRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    uid: String,
    email: String,
    display_name: Option<String>,
    photo_url: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            uid: row.uid,
            email: row.email,
            display_name: row.display_name,
            photo_url: row.photo_url,
        }
    }
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Stores a profile. An existing profile with the same email keeps its uid.
    pub async fn upsert(&self, user: &User) -> Result<User, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (uid, email, display_name, photo_url)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(email) DO UPDATE SET
                display_name = COALESCE(excluded.display_name, users.display_name),
                photo_url = COALESCE(excluded.photo_url, users.photo_url)
            "#,
        )
        .bind(&user.uid)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.photo_url)
        .execute(&self.pool)
        .await?;

        self.find_by_email(&user.email)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get(&self, uid: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE uid = ?")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    /// Profiles for `uids`; unknown uids are skipped.
    pub async fn get_many(&self, uids: &[String]) -> Result<Vec<User>, sqlx::Error> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; uids.len()].join(", ");
        let sql = format!("SELECT * FROM users WHERE uid IN ({})", placeholders);
        let mut query = sqlx::query_as::<_, UserRow>(&sql);
        for uid in uids {
            query = query.bind(uid);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    pub async fn current_session(&self) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT users.* FROM session JOIN users ON users.uid = session.uid WHERE session.id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    pub async fn start_session(&self, uid: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO session (id, uid) VALUES (1, ?) ON CONFLICT(id) DO UPDATE SET uid = excluded.uid",
        )
        .bind(uid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn end_session(&self) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM session").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use tempfile::TempDir;

    struct TestContext {
        repo: UserRepository,
        _temp_dir: TempDir,
    }

    async fn setup_repo() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        TestContext {
            repo: UserRepository::new(pool),
            _temp_dir: temp_dir,
        }
    }

    #[tokio::test]
    async fn test_upsert_keeps_uid_for_known_email() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let first = repo.upsert(&User::new("u1", "ann@example.com")).await.unwrap();
        assert_eq!(first.uid, "u1");

        let again = repo
            .upsert(&User::new("u2", "ann@example.com").with_display_name("Ann"))
            .await
            .unwrap();
        assert_eq!(again.uid, "u1");
        assert_eq!(again.display_name.as_deref(), Some("Ann"));
    }

    #[tokio::test]
    async fn test_get_many_skips_unknown() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;
        repo.upsert(&User::new("u1", "ann@example.com")).await.unwrap();
        repo.upsert(&User::new("u2", "bob@example.com")).await.unwrap();

        let users = repo
            .get_many(&["u1".to_string(), "nobody".to_string()])
            .await
            .unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "ann@example.com");
        assert!(repo.get_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_roundtrip() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;
        let user = repo.upsert(&User::new("u1", "ann@example.com")).await.unwrap();

        assert!(repo.current_session().await.unwrap().is_none());
        repo.start_session(&user.uid).await.unwrap();
        assert_eq!(repo.current_session().await.unwrap(), Some(user));
        repo.end_session().await.unwrap();
        assert!(repo.current_session().await.unwrap().is_none());
    }
}
