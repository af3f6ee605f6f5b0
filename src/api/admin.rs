//! Admin override endpoints. All require a bearer token and validate the
//! payload before touching the store. "Update" is delete-old + append-fresh
//! with best-effort compensation; the two steps are not atomic, and a
//! collision on re-insert is reported as a conflict after attempting to
//! restore the deleted record.

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use tracing::{info, warn};

use crate::api::routes::ApiState;
use crate::error::{AppError, Result};
use crate::store::OverrideStore;
use crate::types::OverrideEvent;

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverridePayload {
    pub user_id: String,
    pub username: String,
    pub modifier: i64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    pub date_of_infraction: i64,
    /// Creation-key component. Optional on create (defaults to now);
    /// required on update, where it names the record being replaced.
    pub timestamp: Option<i64>,
}

fn require_admin(state: &ApiState, headers: &HeaderMap) -> Result<()> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match token {
        Some(t) if t == state.admin_token => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

fn validate(payload: &OverridePayload) -> Result<()> {
    if payload.user_id.is_empty() {
        return Err(AppError::Validation("userId must not be empty".to_string()));
    }
    if payload.username.is_empty() {
        return Err(AppError::Validation("username must not be empty".to_string()));
    }
    if payload.date_of_infraction <= 0 {
        return Err(AppError::Validation(
            "dateOfInfraction must be a positive epoch-millis timestamp".to_string(),
        ));
    }
    Ok(())
}

fn to_event(payload: &OverridePayload, timestamp: i64) -> OverrideEvent {
    OverrideEvent {
        user_id: payload.user_id.clone(),
        username: payload.username.clone(),
        modifier: payload.modifier,
        url: payload.url.clone(),
        description: payload.description.clone(),
        date_of_infraction: payload.date_of_infraction,
        timestamp,
    }
}

pub(super) async fn create_override(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(payload): Json<OverridePayload>,
) -> Result<(StatusCode, Json<OverrideEvent>)> {
    require_admin(&state, &headers)?;
    validate(&payload)?;

    let event = to_event(&payload, payload.timestamp.unwrap_or_else(now_ms));
    OverrideStore::new(state.pool.clone()).append(&event).await?;

    info!(
        user_id = %event.user_id,
        modifier = event.modifier,
        "override created"
    );
    Ok((StatusCode::CREATED, Json(event)))
}

pub(super) async fn update_override(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(payload): Json<OverridePayload>,
) -> Result<Json<OverrideEvent>> {
    require_admin(&state, &headers)?;
    validate(&payload)?;

    let old_timestamp = payload.timestamp.ok_or_else(|| {
        AppError::Validation("timestamp of the record being updated is required".to_string())
    })?;

    let store = OverrideStore::new(state.pool.clone());
    let Some(old) = store.get(&payload.user_id, old_timestamp).await? else {
        return Err(AppError::NotFound(format!(
            "no override for user {} at {}",
            payload.user_id, old_timestamp
        )));
    };

    store.delete(&payload.user_id, old_timestamp).await?;

    let fresh = to_event(&payload, now_ms());
    if let Err(e) = store.append(&fresh).await {
        // Compensation: put the deleted record back so the update at least
        // leaves the store where it started. Best effort, not a transaction.
        if let Err(restore) = store.append(&old).await {
            warn!(
                "failed to restore override {}/{} after update collision: {restore}",
                old.user_id, old.timestamp
            );
        }
        return Err(match e {
            AppError::Conflict(m) => AppError::Conflict(format!("update collided: {m}")),
            other => other,
        });
    }

    info!(
        user_id = %fresh.user_id,
        old_timestamp,
        new_timestamp = fresh.timestamp,
        "override updated"
    );
    Ok(Json(fresh))
}

pub(super) async fn delete_override(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((user_id, timestamp)): Path<(String, i64)>,
) -> Result<StatusCode> {
    require_admin(&state, &headers)?;

    let existed = OverrideStore::new(state.pool.clone())
        .delete(&user_id, timestamp)
        .await?;
    if !existed {
        return Err(AppError::NotFound(format!(
            "no override for user {user_id} at {timestamp}"
        )));
    }

    info!(user_id = %user_id, timestamp, "override deleted");
    Ok(StatusCode::NO_CONTENT)
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
