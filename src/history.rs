//! Score history read path: raw base-score snapshots with overrides replayed
//! as-of each snapshot's own moment. Backdated overrides therefore reshape
//! history consistently, and points always reflect what the score would have
//! shown at that time.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::score::apply_overrides;
use crate::store::{OverrideStore, SnapshotStore};
use crate::types::HistoryPoint;

pub async fn score_history(pool: &SqlitePool, user_id: &str) -> Result<Vec<HistoryPoint>> {
    let snapshots = SnapshotStore::new(pool.clone()).list_for_user(user_id).await?;
    let overrides = OverrideStore::new(pool.clone()).list_for_user(user_id).await?;

    let mut points: Vec<HistoryPoint> = snapshots
        .into_iter()
        .map(|snap| HistoryPoint {
            credit_score: apply_overrides(snap.credit_score, &overrides, snap.timestamp),
            user_id: snap.user_id,
            username: snap.username,
            timestamp: snap.timestamp,
        })
        .collect();

    points.sort_by_key(|p| p.timestamp);
    Ok(points)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_pool;
    use crate::types::OverrideEvent;

    fn event(modifier: i64, date_of_infraction: i64, timestamp: i64) -> OverrideEvent {
        OverrideEvent {
            user_id: "u1".to_string(),
            username: "alice".to_string(),
            modifier,
            url: String::new(),
            description: String::new(),
            date_of_infraction,
            timestamp,
        }
    }

    #[tokio::test]
    async fn overrides_replay_as_of_each_snapshot() {
        let pool = test_pool().await;
        let snapshots = SnapshotStore::new(pool.clone());
        let overrides = OverrideStore::new(pool.clone());

        let t0 = 1_000_000;
        snapshots.append("u1", "alice", 500, t0).await.unwrap();

        // Effective just before t0 — counts. Effective just after — doesn't,
        // even though both records were created later.
        overrides.append(&event(50, t0 - 1, t0 + 9_000_000)).await.unwrap();
        overrides.append(&event(-100, t0 + 1, t0 + 9_000_001)).await.unwrap();

        let points = score_history(&pool, "u1").await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].credit_score, 550);
    }

    #[tokio::test]
    async fn history_is_ascending_and_clamped() {
        let pool = test_pool().await;
        let snapshots = SnapshotStore::new(pool.clone());
        let overrides = OverrideStore::new(pool.clone());

        snapshots.append("u1", "alice", 980, 3000).await.unwrap();
        snapshots.append("u1", "alice", 400, 1000).await.unwrap();
        snapshots.append("u1", "alice", 600, 2000).await.unwrap();
        overrides.append(&event(100, 2500, 9_000_000)).await.unwrap();

        let points = score_history(&pool, "u1").await.unwrap();
        let stamps: Vec<i64> = points.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![1000, 2000, 3000]);

        // Override effective at 2500 touches only the last point, clamped to 1000.
        let scores: Vec<i64> = points.iter().map(|p| p.credit_score).collect();
        assert_eq!(scores, vec![400, 600, 1000]);
    }

    #[tokio::test]
    async fn empty_history_for_unknown_user() {
        let pool = test_pool().await;
        assert!(score_history(&pool, "nobody").await.unwrap().is_empty());
    }
}
