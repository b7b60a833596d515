//! Work session endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::db::{
    self, sessions::SessionFilter, CreateSessionRequest, ListSessionsQuery, Session,
    UpdateSessionRequest,
};
use crate::AppState;

use super::auth::{require_owner_or_admin, CurrentUser};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    parse_id, validate_non_negative, validate_optional_timestamp, validate_status,
    validate_timestamp,
};

fn validate_create_request(req: &CreateSessionRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_timestamp(&req.start_time) {
        errors.add("start_time", &e);
    }

    errors.finish()
}

fn validate_update_request(req: &UpdateSessionRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_status(&req.status) {
        errors.add("status", &e);
    }

    if let Err(e) = validate_optional_timestamp(&req.end_time) {
        errors.add("end_time", &e);
    }

    if let Err(e) = validate_non_negative(req.total_time, "Total time") {
        errors.add("total_time", &e);
    }

    if let Err(e) = validate_non_negative(req.completed_pomodoros, "Completed pomodoros") {
        errors.add("completed_pomodoros", &e);
    }

    errors.finish()
}

/// List the caller's sessions (plus unowned ones) by tag, range or recent days
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<Session>>, ApiError> {
    let filter = SessionFilter::from_query(&query, chrono::Utc::now());
    let sessions = db::sessions::list_for_owner(&state.db, user.id, &filter).await?;
    Ok(Json(sessions))
}

/// Start a session owned by the caller
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    validate_create_request(&req)?;

    let id = db::sessions::create(&state.db, &req.start_time, &req.tags, Some(user.id)).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Session created successfully", "id": id })),
    ))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let id = parse_id(&id, "session").map_err(ApiError::bad_request)?;
    require_owner_or_admin(&state.db, &user, id).await?;

    let session = db::sessions::get(&state.db, id).await?;
    Ok(Json(session))
}

pub async fn update_session(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateSessionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id, "session").map_err(ApiError::bad_request)?;
    validate_update_request(&req)?;
    require_owner_or_admin(&state.db, &user, id).await?;

    db::sessions::update(&state.db, id, &req).await?;

    Ok(Json(json!({ "message": "Session updated successfully" })))
}

/// Delete a session with its pomodoros, breaks and notes
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id, "session").map_err(ApiError::bad_request)?;
    require_owner_or_admin(&state.db, &user, id).await?;

    db::sessions::delete(&state.db, id).await?;

    tracing::info!(session_id = id, user_id = user.id, "Session deleted by user");
    Ok(Json(json!({ "message": "Session deleted successfully" })))
}
