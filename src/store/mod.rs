pub mod models;

mod cron;
mod overrides;
mod snapshots;
mod users;

pub use cron::CronStore;
pub use overrides::OverrideStore;
pub use snapshots::SnapshotStore;
pub use users::UserStore;

#[cfg(test)]
pub(crate) async fn test_pool() -> sqlx::SqlitePool {
    // A single connection keeps every test statement on the same in-memory DB.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}
