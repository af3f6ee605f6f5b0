//! Thin client for the Manifold Markets REST API. GET-only, JSON responses,
//! bounded retries with linearly increasing backoff on server-error-class
//! statuses and transport failures. Other 4xx statuses return immediately.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::config::{BET_PAGE_LIMIT, FETCH_BACKOFF_MS, FETCH_RETRIES, TXN_PAGE_LIMIT};
use crate::error::{AppError, Result};
use crate::types::{LoanTxn, LookupTarget, Portfolio, UserLookup, UserProfile};

#[derive(Clone)]
pub struct ManifoldClient {
    http: reqwest::Client,
    base_url: String,
}

enum GetOutcome {
    Json(serde_json::Value),
    /// Non-retryable, non-2xx status (e.g. 404, 401).
    Status(StatusCode),
    /// Retries exhausted, or the body was not valid JSON.
    Failed(String),
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

impl ManifoldClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_with_retry(&self, url: &str) -> GetOutcome {
        let mut last_err = String::new();

        for attempt in 0..=FETCH_RETRIES {
            if attempt > 0 {
                let backoff = Duration::from_millis(FETCH_BACKOFF_MS * u64::from(attempt));
                debug!("retrying {url} in {backoff:?} ({last_err})");
                tokio::time::sleep(backoff).await;
            }

            match self.http.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return match resp.json::<serde_json::Value>().await {
                            Ok(v) => GetOutcome::Json(v),
                            Err(e) => GetOutcome::Failed(format!("malformed JSON: {e}")),
                        };
                    }
                    if is_retryable(status) {
                        last_err = format!("HTTP {status}");
                        continue;
                    }
                    return GetOutcome::Status(status);
                }
                Err(e) => {
                    last_err = e.to_string();
                }
            }
        }

        GetOutcome::Failed(last_err)
    }

    /// Resolve a user by username or platform id. A platform 404 is the
    /// expected "no such user" outcome, not a failure.
    pub async fn resolve_user(&self, target: &LookupTarget) -> UserLookup {
        let url = match target {
            LookupTarget::Username(name) => format!("{}/v0/user/{name}", self.base_url),
            LookupTarget::UserId(id) => format!("{}/v0/user/by-id/{id}", self.base_url),
        };

        match self.get_with_retry(&url).await {
            GetOutcome::Json(v) => match serde_json::from_value::<UserProfile>(v) {
                Ok(profile) => UserLookup::Found(profile),
                Err(e) => UserLookup::Failed(format!("unexpected user shape: {e}")),
            },
            GetOutcome::Status(s) if s == StatusCode::NOT_FOUND => UserLookup::NotFound,
            GetOutcome::Status(s) => UserLookup::Failed(format!("HTTP {s}")),
            GetOutcome::Failed(e) => UserLookup::Failed(e),
        }
    }

    /// The one fetch the score computation cannot proceed without.
    pub async fn portfolio(&self, user_id: &str) -> Result<Portfolio> {
        let url = format!("{}/v0/get-user-portfolio?userId={user_id}", self.base_url);
        match self.get_with_retry(&url).await {
            GetOutcome::Json(v) => serde_json::from_value(v)
                .map_err(|e| AppError::Upstream(format!("unexpected portfolio shape: {e}"))),
            GetOutcome::Status(s) => Err(AppError::Upstream(format!("portfolio fetch: HTTP {s}"))),
            GetOutcome::Failed(e) => Err(AppError::Upstream(format!("portfolio fetch: {e}"))),
        }
    }

    /// Latest-season league rank. None when the user is unranked.
    pub async fn league_rank(&self, user_id: &str) -> Result<Option<u32>> {
        let url = format!("{}/v0/leagues?userId={user_id}", self.base_url);
        match self.get_with_retry(&url).await {
            GetOutcome::Json(v) => Ok(parse_league_rank(&v)),
            GetOutcome::Status(s) => Err(AppError::Upstream(format!("leagues fetch: HTTP {s}"))),
            GetOutcome::Failed(e) => Err(AppError::Upstream(format!("leagues fetch: {e}"))),
        }
    }

    /// Bet count, capped at one page of BET_PAGE_LIMIT.
    pub async fn bet_count(&self, username: &str) -> Result<u32> {
        let url = format!(
            "{}/v0/bets?username={username}&limit={BET_PAGE_LIMIT}",
            self.base_url
        );
        match self.get_with_retry(&url).await {
            GetOutcome::Json(v) => Ok(v.as_array().map_or(0, |a| a.len()) as u32),
            GetOutcome::Status(s) => Err(AppError::Upstream(format!("bets fetch: HTTP {s}"))),
            GetOutcome::Failed(e) => Err(AppError::Upstream(format!("bets fetch: {e}"))),
        }
    }

    /// Mana-payment transfers touching the user, received and sent, each a
    /// separately limited page. Individually malformed records are skipped.
    pub async fn loan_txns(&self, user_id: &str) -> Result<Vec<LoanTxn>> {
        let mut txns = Vec::new();
        for key in ["toId", "fromId"] {
            let url = format!(
                "{}/v0/txns?category=MANA_PAYMENT&{key}={user_id}&limit={TXN_PAGE_LIMIT}",
                self.base_url
            );
            match self.get_with_retry(&url).await {
                GetOutcome::Json(v) => {
                    let Some(items) = v.as_array() else {
                        return Err(AppError::Upstream("txns response was not an array".to_string()));
                    };
                    let before = txns.len();
                    txns.extend(
                        items
                            .iter()
                            .filter_map(|item| serde_json::from_value::<LoanTxn>(item.clone()).ok()),
                    );
                    let skipped = items.len() - (txns.len() - before);
                    if skipped > 0 {
                        warn!("skipped {skipped} malformed txn records for {user_id}");
                    }
                }
                GetOutcome::Status(s) => {
                    return Err(AppError::Upstream(format!("txns fetch: HTTP {s}")))
                }
                GetOutcome::Failed(e) => return Err(AppError::Upstream(format!("txns fetch: {e}"))),
            }
        }
        Ok(txns)
    }
}

/// Pick the rank out of the leagues response: take the newest season's entry.
/// The field arrives as `rank` or `rankSnapshot` depending on season state.
fn parse_league_rank(v: &serde_json::Value) -> Option<u32> {
    let rows = v.as_array()?;
    let latest = rows
        .iter()
        .max_by_key(|row| row.get("season").and_then(|s| s.as_i64()).unwrap_or(0))?;
    latest
        .get("rank")
        .and_then(|r| r.as_u64())
        .or_else(|| latest.get("rankSnapshot").and_then(|r| r.as_u64()))
        .map(|r| r as u32)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
