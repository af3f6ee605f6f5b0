use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Platform-side data (transient, fetched per request)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    /// Epoch millis. Absent for some legacy accounts; treated as "now"
    /// downstream, i.e. zero account age.
    #[serde(default)]
    pub created_time: Option<i64>,
    #[serde(default)]
    pub user_deleted: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub investment_value: f64,
    #[serde(default)]
    pub total_deposits: f64,
}

impl Portfolio {
    pub fn calculated_profit(&self) -> f64 {
        self.investment_value + self.balance - self.total_deposits
    }
}

/// A mana-payment transfer as reported by the txns endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanTxn {
    pub from_id: String,
    pub to_id: String,
    pub amount: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub from_type: String,
    #[serde(default)]
    pub to_type: String,
}

/// How a caller identifies the user to score: display username or the
/// opaque platform-assigned id.
#[derive(Debug, Clone)]
pub enum LookupTarget {
    Username(String),
    UserId(String),
}

impl LookupTarget {
    /// The raw query string, echoed back on not-found responses.
    pub fn query(&self) -> &str {
        match self {
            LookupTarget::Username(s) | LookupTarget::UserId(s) => s,
        }
    }
}

/// Outcome of resolving a user against the platform. "Not found" is an
/// expected lookup result, not an error; only `Failed` means the platform
/// could not be reached after retries.
#[derive(Debug, Clone)]
pub enum UserLookup {
    Found(UserProfile),
    NotFound,
    Failed(String),
}

/// Auxiliary data fetched alongside the portfolio. Each field degrades
/// independently to its default when the corresponding fetch fails.
#[derive(Debug, Clone)]
pub struct AuxData {
    pub rank: u32,
    pub txn_count: u32,
    pub loan_txns: Vec<LoanTxn>,
}

// ---------------------------------------------------------------------------
// Composed results (response-only)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideEvent {
    pub user_id: String,
    pub username: String,
    pub modifier: i64,
    pub url: String,
    pub description: String,
    /// When the real-world event occurred; drives all score-impact math.
    pub date_of_infraction: i64,
    /// When the record was created; uniqueness key component only.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    pub user_id: String,
    pub username: String,
    pub credit_score: i64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    pub username: String,
    pub user_id: String,
    pub credit_score: i64,
    pub user_exists: bool,
    pub fetch_success: bool,
    pub user_deleted: bool,
    pub historical_data_saved: bool,
    pub override_events: Vec<OverrideEvent>,
    pub latest_rank: u32,
    pub outstanding_debt_impact: f64,
    pub calculated_profit: f64,
    pub balance: f64,
    pub raw_mmr: f64,
    pub fee_tier: f64,
}

impl ScoreResponse {
    /// Returned when a required platform fetch failed after retries. Maps to
    /// a 503 at the API layer; "try again later", not "nothing to show".
    /// Existence is only claimed when the profile actually resolved, i.e.
    /// both identifiers are known.
    pub fn fetch_failed(username: &str, user_id: &str) -> Self {
        Self {
            fetch_success: false,
            user_exists: !username.is_empty() && !user_id.is_empty(),
            user_id: user_id.to_string(),
            ..Self::not_found(username)
        }
    }

    /// The fixed shape returned when the platform does not know the user.
    pub fn not_found(query: &str) -> Self {
        Self {
            username: query.to_string(),
            user_id: String::new(),
            credit_score: 0,
            user_exists: false,
            fetch_success: true,
            user_deleted: false,
            historical_data_saved: false,
            override_events: Vec::new(),
            latest_rank: crate::config::MAX_LEAGUE_RANK,
            outstanding_debt_impact: 0.0,
            calculated_profit: 0.0,
            balance: 0.0,
            raw_mmr: 0.0,
            fee_tier: crate::score::fee_tier(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_a_successful_empty_result() {
        let resp = ScoreResponse::not_found("ghost");
        assert!(!resp.user_exists);
        assert!(resp.fetch_success);
        assert_eq!(resp.credit_score, 0);
        assert!(!resp.historical_data_saved);
        assert!(resp.override_events.is_empty());
        assert_eq!(resp.username, "ghost");
        assert_eq!(resp.user_id, "");
        // Unknown users get the worst insurance tier
        assert_eq!(resp.fee_tier, crate::score::fee_tier(None));
    }

    #[test]
    fn fetch_failed_claims_existence_only_for_resolved_users() {
        // Portfolio fetch failed after the profile resolved: both ids known.
        let resp = ScoreResponse::fetch_failed("alice", "u1");
        assert!(!resp.fetch_success);
        assert!(resp.user_exists);
        assert_eq!(resp.username, "alice");
        assert_eq!(resp.user_id, "u1");
        assert_eq!(resp.credit_score, 0);

        // Resolution itself failed: existence is indeterminate, not claimed.
        let by_name = ScoreResponse::fetch_failed("alice", "");
        assert!(!by_name.user_exists);
        let by_id = ScoreResponse::fetch_failed("", "u1");
        assert!(!by_id.user_exists);
        assert_eq!(by_id.user_id, "u1");
        assert_eq!(by_id.username, "");
    }
}
