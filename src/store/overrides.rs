use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::store::models::OverrideRow;
use crate::types::OverrideEvent;

/// Durable store of administrator-entered score adjustments, keyed by
/// `(user_id, timestamp)`. Records are never mutated in place; "update" at
/// the admin layer is delete-old + append-fresh.
#[derive(Clone)]
pub struct OverrideStore {
    pool: SqlitePool,
}

impl OverrideStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new override. A `(user_id, timestamp)` collision maps to
    /// `Conflict` and leaves the existing record untouched.
    pub async fn append(&self, event: &OverrideEvent) -> Result<()> {
        let res = sqlx::query(
            r#"
            INSERT INTO score_overrides
                (user_id, username, modifier, url, description, date_of_infraction, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.user_id)
        .bind(&event.username)
        .bind(event.modifier)
        .bind(&event.url)
        .bind(&event.description)
        .bind(event.date_of_infraction)
        .bind(event.timestamp)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(e) if AppError::is_unique_violation(&e) => Err(AppError::Conflict(format!(
                "override already exists for user {} at {}",
                event.user_id, event.timestamp
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, user_id: &str, timestamp: i64) -> Result<Option<OverrideEvent>> {
        let row = sqlx::query_as::<_, OverrideRow>(
            r#"
            SELECT user_id, username, modifier, url, description, date_of_infraction, timestamp
            FROM score_overrides WHERE user_id = ? AND timestamp = ?
            "#,
        )
        .bind(user_id)
        .bind(timestamp)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<OverrideEvent>> {
        let rows = sqlx::query_as::<_, OverrideRow>(
            r#"
            SELECT user_id, username, modifier, url, description, date_of_infraction, timestamp
            FROM score_overrides WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Delete by key. Returns false when no such record existed; the admin
    /// handler decides whether that is a 404.
    pub async fn delete(&self, user_id: &str, timestamp: i64) -> Result<bool> {
        let res = sqlx::query("DELETE FROM score_overrides WHERE user_id = ? AND timestamp = ?")
            .bind(user_id)
            .bind(timestamp)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_pool;

    fn event(user_id: &str, timestamp: i64, modifier: i64) -> OverrideEvent {
        OverrideEvent {
            user_id: user_id.to_string(),
            username: "alice".to_string(),
            modifier,
            url: "https://example.com/case/1".to_string(),
            description: "test infraction".to_string(),
            date_of_infraction: timestamp - 500,
            timestamp,
        }
    }

    #[tokio::test]
    async fn append_and_list() {
        let store = OverrideStore::new(test_pool().await);

        store.append(&event("u1", 1000, -50)).await.unwrap();
        store.append(&event("u1", 2000, 25)).await.unwrap();
        store.append(&event("u2", 1000, -10)).await.unwrap();

        let events = store.list_for_user("u1").await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.user_id == "u1"));
    }

    #[tokio::test]
    async fn duplicate_key_is_conflict_and_preserves_original() {
        let store = OverrideStore::new(test_pool().await);

        store.append(&event("u1", 1000, -50)).await.unwrap();
        let err = store.append(&event("u1", 1000, 99)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "got {err:?}");

        let kept = store.get("u1", 1000).await.unwrap().unwrap();
        assert_eq!(kept.modifier, -50);
    }

    #[tokio::test]
    async fn delete_reports_whether_key_existed() {
        let store = OverrideStore::new(test_pool().await);

        store.append(&event("u1", 1000, -50)).await.unwrap();
        assert!(store.delete("u1", 1000).await.unwrap());
        assert!(!store.delete("u1", 1000).await.unwrap());
        assert!(store.get("u1", 1000).await.unwrap().is_none());
    }
}
