use sqlx::SqlitePool;

use crate::error::Result;

/// Persisted batch-job cursors, one row per job name.
#[derive(Clone)]
pub struct CronStore {
    pool: SqlitePool,
}

impl CronStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn cursor(&self, job_name: &str) -> Result<Option<i64>> {
        let idx: Option<i64> =
            sqlx::query_scalar("SELECT last_index FROM cron_progress WHERE job_name = ?")
                .bind(job_name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(idx)
    }

    pub async fn set_cursor(&self, job_name: &str, last_index: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cron_progress (job_name, last_index) VALUES (?, ?)
            ON CONFLICT(job_name) DO UPDATE SET last_index = excluded.last_index
            "#,
        )
        .bind(job_name)
        .bind(last_index)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_pool;

    #[tokio::test]
    async fn cursor_roundtrip() {
        let store = CronStore::new(test_pool().await);

        assert_eq!(store.cursor("job").await.unwrap(), None);
        store.set_cursor("job", 42).await.unwrap();
        assert_eq!(store.cursor("job").await.unwrap(), Some(42));
        store.set_cursor("job", 0).await.unwrap();
        assert_eq!(store.cursor("job").await.unwrap(), Some(0));
    }
}
