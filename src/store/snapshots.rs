use sqlx::SqlitePool;

use crate::error::Result;
use crate::store::models::SnapshotRow;

/// Append-only base-score history plus the per-user last-update marker.
/// Rate-limit enforcement lives with the caller; `append` is unconditional.
#[derive(Clone)]
pub struct SnapshotStore {
    pool: SqlitePool,
}

impl SnapshotStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Epoch millis of the last snapshot write for this user, if any.
    pub async fn last_update(&self, user_id: &str) -> Result<Option<i64>> {
        let marker: Option<i64> =
            sqlx::query_scalar("SELECT updated_at FROM last_score_update WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(marker)
    }

    pub async fn set_last_update(&self, user_id: &str, timestamp: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO last_score_update (user_id, updated_at) VALUES (?, ?)
            ON CONFLICT(user_id) DO UPDATE SET updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn append(
        &self,
        user_id: &str,
        username: &str,
        credit_score: i64,
        timestamp: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO score_snapshots (user_id, username, credit_score, timestamp)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(username)
        .bind(credit_score)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All snapshots for a user. Read order is not guaranteed; presentation
    /// code sorts by timestamp.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<SnapshotRow>> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            "SELECT user_id, username, credit_score, timestamp FROM score_snapshots WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
