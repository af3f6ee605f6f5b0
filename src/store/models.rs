//! Database row types used by sqlx for typed queries.

use crate::types::OverrideEvent;

#[derive(Debug, sqlx::FromRow)]
pub struct SnapshotRow {
    pub user_id: String,
    pub username: String,
    pub credit_score: i64,
    pub timestamp: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct OverrideRow {
    pub user_id: String,
    pub username: String,
    pub modifier: i64,
    pub url: String,
    pub description: String,
    pub date_of_infraction: i64,
    pub timestamp: i64,
}

impl From<OverrideRow> for OverrideEvent {
    fn from(r: OverrideRow) -> Self {
        OverrideEvent {
            user_id: r.user_id,
            username: r.username,
            modifier: r.modifier,
            url: r.url,
            description: r.description,
            date_of_infraction: r.date_of_infraction,
            timestamp: r.timestamp,
        }
    }
}
