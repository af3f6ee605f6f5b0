use sqlx::SqlitePool;

use crate::error::Result;

/// Local mirror of platform users, refreshed opportunistically on every score
/// computation. Exists so the rescan job has something to enumerate.
#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, id: &str, username: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET username = excluded.username
            "#,
        )
        .bind(id)
        .bind(username)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All known user ids in a stable order, for cursor-based batch walks.
    pub async fn all_ids(&self) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}
