use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::admin;
use crate::error::{AppError, Result};
use crate::history::score_history;
use crate::manifold::ManifoldClient;
use crate::orchestrator::score_user;
use crate::types::{HistoryPoint, LookupTarget, UserLookup};

#[derive(Clone)]
pub struct ApiState {
    pub pool: sqlx::SqlitePool,
    pub client: ManifoldClient,
    pub admin_token: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/score", get(get_score))
        .route("/api/history", get(get_history))
        .route(
            "/api/admin/overrides",
            post(admin::create_override).put(admin::update_override),
        )
        .route(
            "/api/admin/overrides/:user_id/:timestamp",
            delete(admin::delete_override),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub username: Option<String>,
    pub user_id: Option<String>,
}

/// Resolve the lookup target from query params. The opaque id wins when both
/// are supplied, since usernames are mutable.
fn lookup_target(q: &UserQuery) -> Result<LookupTarget> {
    if let Some(id) = q.user_id.as_ref().filter(|s| !s.is_empty()) {
        return Ok(LookupTarget::UserId(id.clone()));
    }
    if let Some(name) = q.username.as_ref().filter(|s| !s.is_empty()) {
        return Ok(LookupTarget::Username(name.clone()));
    }
    Err(AppError::Validation(
        "username or userId query parameter required".to_string(),
    ))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health(State(state): State<ApiState>) -> Result<Json<serde_json::Value>> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.pool)
        .await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// Composed score for one user. "User not found" is a 200 with
/// `userExists: false`; a required fetch failing after retries is a 503 with
/// `fetchSuccess: false` so callers can tell "try later" from "nothing there".
async fn get_score(
    State(state): State<ApiState>,
    Query(params): Query<UserQuery>,
) -> Result<Response> {
    let target = lookup_target(&params)?;
    let resp = score_user(&state.client, &state.pool, &target).await?;

    let status = if resp.fetch_success {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((status, Json(resp)).into_response())
}

/// Override-adjusted score history, ascending by timestamp. A username is
/// resolved to an id first; unknown users get an empty array.
async fn get_history(
    State(state): State<ApiState>,
    Query(params): Query<UserQuery>,
) -> Result<Json<Vec<HistoryPoint>>> {
    let user_id = match lookup_target(&params)? {
        LookupTarget::UserId(id) => id,
        LookupTarget::Username(name) => {
            match state.client.resolve_user(&LookupTarget::Username(name)).await {
                UserLookup::Found(profile) => profile.id,
                UserLookup::NotFound => return Ok(Json(Vec::new())),
                UserLookup::Failed(e) => return Err(AppError::Upstream(e)),
            }
        }
    };

    let points = score_history(&state.pool, &user_id).await?;
    Ok(Json(points))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
