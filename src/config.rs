use crate::error::{AppError, Result};

pub const MANIFOLD_API_URL: &str = "https://api.manifold.markets";

/// Manifold's house account. Loan transfers touching it are system traffic,
/// not user-to-user debt, and are excluded from loan balance math.
pub const BANK_USER_ID: &str = "IPTOzEqrpkWmEzh6hwvAyY9PqFb2";

/// Minimum interval between historical snapshot writes for one user (24h).
pub const SNAPSHOT_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

/// Retries after the initial attempt for idempotent platform fetches.
pub const FETCH_RETRIES: u32 = 2;

/// Backoff step between retries, multiplied by the attempt number.
pub const FETCH_BACKOFF_MS: u64 = 500;

/// Page caps for the platform list endpoints.
pub const BET_PAGE_LIMIT: usize = 1000;
pub const TXN_PAGE_LIMIT: usize = 100;

/// Worst league rank considered by the rank factor; also the default when
/// the standings fetch fails or the user is unranked.
pub const MAX_LEAGUE_RANK: u32 = 100;

/// MMR normalization bounds for the signed-log score mapping.
pub const MIN_MMR: f64 = -500_000.0;
pub const MAX_MMR: f64 = 2_000_000.0;

/// Key for the rescan job's row in cron_progress.
pub const RESCAN_JOB_NAME: &str = "score_rescan";

#[derive(Debug, Clone)]
pub struct Config {
    pub manifold_api_url: String,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Bearer token required on admin routes (ADMIN_TOKEN).
    pub admin_token: String,
    /// Max users the rescan job processes per pass (RESCAN_DAILY_QUOTA).
    pub rescan_quota: usize,
    /// Seconds between rescan passes (RESCAN_INTERVAL_SECS).
    pub rescan_interval_secs: u64,
    /// Millis to sleep between users within a pass (RESCAN_USER_DELAY_MS).
    pub rescan_user_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let admin_token = std::env::var("ADMIN_TOKEN")
            .map_err(|_| AppError::Config("ADMIN_TOKEN must be set".to_string()))?;
        if admin_token.is_empty() {
            return Err(AppError::Config("ADMIN_TOKEN must not be empty".to_string()));
        }

        Ok(Self {
            manifold_api_url: std::env::var("MANIFOLD_API_URL")
                .unwrap_or_else(|_| MANIFOLD_API_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "risk.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            admin_token,
            rescan_quota: std::env::var("RESCAN_DAILY_QUOTA")
                .unwrap_or_else(|_| "450".to_string())
                .parse::<usize>()
                .unwrap_or(450),
            rescan_interval_secs: std::env::var("RESCAN_INTERVAL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse::<u64>()
                .unwrap_or(86_400),
            rescan_user_delay_ms: std::env::var("RESCAN_USER_DELAY_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse::<u64>()
                .unwrap_or(2000),
        })
    }
}
