mod api;
mod config;
mod error;
mod history;
mod manifold;
mod orchestrator;
mod rescan;
mod score;
mod store;
mod types;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::manifold::ManifoldClient;
use crate::rescan::RescanJob;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", cfg.db_path)).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    let client = ManifoldClient::new(&cfg.manifold_api_url)?;
    info!("Manifold API client targeting {}", cfg.manifold_api_url);

    // --- Scheduled rescan (background) ---
    let rescan = RescanJob::new(cfg.clone(), client.clone(), pool.clone());
    tokio::spawn(async move { rescan.run().await });
    info!(
        "Rescan job scheduled: quota={} interval={}s delay={}ms",
        cfg.rescan_quota, cfg.rescan_interval_secs, cfg.rescan_user_delay_ms
    );

    // --- HTTP API server ---
    let state = ApiState {
        pool,
        client,
        admin_token: cfg.admin_token.clone(),
    };
    let app = router(state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
