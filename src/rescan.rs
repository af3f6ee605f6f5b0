//! Recurring batch walk over every known user, re-driving the score pipeline
//! so histories keep accruing even for users nobody looks up. Bounded by a
//! per-pass quota with a persisted cursor, so consecutive passes rotate
//! through the full user set.

use std::time::Duration;

use sqlx::SqlitePool;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::config::{Config, RESCAN_JOB_NAME};
use crate::error::Result;
use crate::manifold::ManifoldClient;
use crate::orchestrator::score_user;
use crate::store::{CronStore, UserStore};
use crate::types::LookupTarget;

pub struct RescanJob {
    cfg: Config,
    client: ManifoldClient,
    pool: SqlitePool,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub processed: usize,
    pub failed: usize,
    pub cursor: i64,
}

impl RescanJob {
    pub fn new(cfg: Config, client: ManifoldClient, pool: SqlitePool) -> Self {
        Self { cfg, client, pool }
    }

    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(self.cfg.rescan_interval_secs));
        ticker.tick().await; // consume immediate first tick

        loop {
            ticker.tick().await;
            match self.run_pass().await {
                Ok(summary) => info!(
                    processed = summary.processed,
                    failed = summary.failed,
                    cursor = summary.cursor,
                    "rescan pass complete"
                ),
                Err(e) => error!("rescan pass failed: {e}"),
            }
        }
    }

    /// One quota-bounded pass. Per-user failures are logged and skipped;
    /// only store-level failures abort the pass.
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let users = UserStore::new(self.pool.clone());
        let cron = CronStore::new(self.pool.clone());

        let ids = users.all_ids().await?;
        if ids.is_empty() {
            return Ok(PassSummary::default());
        }

        let stored = cron.cursor(RESCAN_JOB_NAME).await?.unwrap_or(0);
        let (start, count) = pass_bounds(stored, self.cfg.rescan_quota, ids.len());

        let mut failed = 0usize;
        for id in &ids[start..start + count] {
            let target = LookupTarget::UserId(id.clone());
            match score_user(&self.client, &self.pool, &target).await {
                Ok(resp) if resp.fetch_success => {}
                Ok(_) => {
                    warn!("rescan: fetch failed for {id}, skipping");
                    failed += 1;
                }
                Err(e) => {
                    warn!("rescan: scoring {id} failed, skipping: {e}");
                    failed += 1;
                }
            }
            // Backpressure against the platform's rate limits.
            tokio::time::sleep(Duration::from_millis(self.cfg.rescan_user_delay_ms)).await;
        }

        let cursor = next_cursor(start, count, ids.len());
        cron.set_cursor(RESCAN_JOB_NAME, cursor).await?;

        Ok(PassSummary { processed: count, failed, cursor })
    }
}

/// Effective start index and batch size for a pass. A stored cursor at or
/// past the end of a shrunken user set resets to 0.
fn pass_bounds(stored_cursor: i64, quota: usize, total: usize) -> (usize, usize) {
    let start = match usize::try_from(stored_cursor) {
        Ok(c) if c < total => c,
        _ => 0,
    };
    (start, quota.min(total - start))
}

fn next_cursor(start: usize, processed: usize, total: usize) -> i64 {
    ((start + processed) % total) as i64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
