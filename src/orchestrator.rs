//! Request-time score pipeline: resolve the user, fan out the platform
//! fetches, run the formula, write the historical snapshot when the
//! rate-limit window allows, then apply overrides for the response.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::{BANK_USER_ID, MAX_LEAGUE_RANK, SNAPSHOT_WINDOW_MS};
use crate::error::{AppError, Result};
use crate::manifold::ManifoldClient;
use crate::score::{self, MmrInputs};
use crate::store::{OverrideStore, SnapshotStore, UserStore};
use crate::types::{AuxData, LookupTarget, ScoreResponse, UserLookup, UserProfile};

const DAY_MS: f64 = 86_400_000.0;

pub async fn score_user(
    client: &ManifoldClient,
    pool: &SqlitePool,
    target: &LookupTarget,
) -> Result<ScoreResponse> {
    let profile = match client.resolve_user(target).await {
        UserLookup::Found(p) => p,
        UserLookup::NotFound => return Ok(ScoreResponse::not_found(target.query())),
        UserLookup::Failed(e) => {
            warn!("user resolution failed for {:?}: {e}", target.query());
            return Ok(match target {
                LookupTarget::Username(name) => ScoreResponse::fetch_failed(name, ""),
                LookupTarget::UserId(id) => ScoreResponse::fetch_failed("", id),
            });
        }
    };

    // Keep the local user index fresh for the rescan job. Best effort only.
    if let Err(e) = UserStore::new(pool.clone())
        .upsert(&profile.id, &profile.username)
        .await
    {
        warn!("user index upsert failed for {}: {e}", profile.id);
    }

    // Four independent fetches, awaited jointly. Portfolio is required;
    // the rest degrade to defaults.
    let (portfolio, rank, bet_count, loan_txns) = tokio::join!(
        client.portfolio(&profile.id),
        client.league_rank(&profile.id),
        client.bet_count(&profile.username),
        client.loan_txns(&profile.id),
    );

    let portfolio = match portfolio {
        Ok(p) => p,
        Err(e) => {
            warn!("portfolio fetch failed for {}: {e}", profile.id);
            return Ok(ScoreResponse::fetch_failed(&profile.username, &profile.id));
        }
    };

    let rank = match rank {
        Ok(r) => r.unwrap_or(MAX_LEAGUE_RANK),
        Err(e) => {
            warn!("league fetch failed for {}, defaulting rank: {e}", profile.id);
            MAX_LEAGUE_RANK
        }
    };
    let txn_count = match bet_count {
        Ok(n) => n,
        Err(e) => {
            warn!("bet count fetch failed for {}, defaulting to 0: {e}", profile.id);
            0
        }
    };
    let loan_txns = match loan_txns {
        Ok(t) => t,
        Err(e) => {
            warn!("loan txn fetch failed for {}, defaulting to none: {e}", profile.id);
            Vec::new()
        }
    };
    let aux = AuxData { rank, txn_count, loan_txns };

    let now = now_ms();
    let net_loan = score::net_loan_balance(&profile.id, &aux.loan_txns, BANK_USER_ID);
    let mmr = score::compute_mmr(MmrInputs {
        balance: portfolio.balance,
        profit: portfolio.calculated_profit(),
        age_days: age_days(profile.created_time, now),
        rank: aux.rank,
        txn_count: aux.txn_count,
        net_loan_balance: net_loan,
    });
    let base_score = score::map_to_credit_score(mmr);

    // Snapshot first: history records the base score, never the
    // override-adjusted one.
    let snapshots = SnapshotStore::new(pool.clone());
    let saved = record_snapshot_if_due(&snapshots, &profile, base_score, now).await?;
    if saved {
        info!(
            user_id = %profile.id,
            username = %profile.username,
            base_score,
            "historical snapshot written"
        );
    }

    let overrides = OverrideStore::new(pool.clone())
        .list_for_user(&profile.id)
        .await?;
    let credit_score = score::apply_overrides(base_score, &overrides, now);

    Ok(ScoreResponse {
        username: profile.username,
        user_id: profile.id,
        credit_score,
        user_exists: true,
        fetch_success: true,
        user_deleted: profile.user_deleted,
        historical_data_saved: saved,
        override_events: overrides,
        latest_rank: aux.rank,
        outstanding_debt_impact: net_loan,
        calculated_profit: portfolio.calculated_profit(),
        balance: portfolio.balance,
        raw_mmr: mmr,
        fee_tier: score::fee_tier(Some(credit_score)),
    })
}

/// A new snapshot is due when no marker exists or the last one is a full
/// rate-limit window old.
pub fn should_snapshot(marker: Option<i64>, now: i64) -> bool {
    match marker {
        None => true,
        Some(last) => now - last >= SNAPSHOT_WINDOW_MS,
    }
}

/// Write a base-score snapshot and advance the marker if the window allows.
/// Platform-deleted users are never snapshotted. Returns whether a write
/// happened.
pub(crate) async fn record_snapshot_if_due(
    snapshots: &SnapshotStore,
    profile: &UserProfile,
    base_score: i64,
    now: i64,
) -> Result<bool> {
    if profile.user_deleted {
        return Ok(false);
    }
    let marker = snapshots.last_update(&profile.id).await?;
    if !should_snapshot(marker, now) {
        return Ok(false);
    }
    match snapshots
        .append(&profile.id, &profile.username, base_score, now)
        .await
    {
        Ok(()) => {}
        // A concurrent request for the same user landed in this same
        // millisecond and already wrote the snapshot. Accepted race.
        Err(AppError::Database(db)) if AppError::is_unique_violation(&db) => return Ok(false),
        Err(e) => return Err(e),
    }
    snapshots.set_last_update(&profile.id, now).await?;
    Ok(true)
}

/// Account age in days. Unknown creation time counts as zero age.
fn age_days(created_time: Option<i64>, now: i64) -> f64 {
    let created = created_time.unwrap_or(now);
    ((now - created).max(0) as f64) / DAY_MS
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_pool;

    fn profile(id: &str, deleted: bool) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            username: "alice".to_string(),
            created_time: Some(0),
            user_deleted: deleted,
        }
    }

    #[test]
    fn snapshot_window_decision() {
        assert!(should_snapshot(None, 1_000_000));
        assert!(!should_snapshot(Some(1_000_000), 1_000_000));
        assert!(!should_snapshot(Some(1_000_000), 1_000_000 + SNAPSHOT_WINDOW_MS - 1));
        assert!(should_snapshot(Some(1_000_000), 1_000_000 + SNAPSHOT_WINDOW_MS));
        assert!(should_snapshot(Some(1_000_000), 1_000_000 + SNAPSHOT_WINDOW_MS * 3));
    }

    #[test]
    fn unknown_creation_time_scores_zero_age() {
        assert_eq!(age_days(None, 1_700_000_000_000), 0.0);
        assert_eq!(age_days(Some(1_700_000_000_000 - 86_400_000), 1_700_000_000_000), 1.0);
        // Clock skew never yields negative age
        assert_eq!(age_days(Some(1_700_000_000_000 + 60_000), 1_700_000_000_000), 0.0);
    }

    #[tokio::test]
    async fn rate_limit_allows_one_snapshot_per_window() {
        let snapshots = SnapshotStore::new(test_pool().await);
        let p = profile("u1", false);
        let t0 = 1_000_000;

        assert!(record_snapshot_if_due(&snapshots, &p, 500, t0).await.unwrap());
        assert!(!record_snapshot_if_due(&snapshots, &p, 510, t0 + 60_000).await.unwrap());

        let t1 = t0 + SNAPSHOT_WINDOW_MS;
        assert!(record_snapshot_if_due(&snapshots, &p, 520, t1).await.unwrap());

        let rows = snapshots.list_for_user("u1").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(snapshots.last_update("u1").await.unwrap(), Some(t1));
    }

    #[tokio::test]
    async fn same_millisecond_duplicate_write_is_tolerated() {
        let snapshots = SnapshotStore::new(test_pool().await);
        let p = profile("u1", false);
        let t0 = 1_000_000;

        // A concurrent request wrote the snapshot after our marker read but
        // before our insert, in the same millisecond.
        snapshots.append("u1", "alice", 500, t0).await.unwrap();

        let saved = record_snapshot_if_due(&snapshots, &p, 505, t0).await.unwrap();
        assert!(!saved);
        assert_eq!(snapshots.list_for_user("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleted_users_are_never_snapshotted() {
        let snapshots = SnapshotStore::new(test_pool().await);
        let p = profile("u1", true);

        assert!(!record_snapshot_if_due(&snapshots, &p, 500, 1_000_000).await.unwrap());
        assert!(snapshots.list_for_user("u1").await.unwrap().is_empty());
        assert_eq!(snapshots.last_update("u1").await.unwrap(), None);
    }
}
