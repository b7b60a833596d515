//! Pomodoro and break endpoints.
//!
//! Access follows the parent session: the caller must own it, it must be
//! unowned, or the caller must be an admin.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::db::{
    self, Break, CreateBreakRequest, CreatePomodoroRequest, Pomodoro, UpdateIntervalRequest,
};
use crate::AppState;

use super::auth::{require_owner_or_admin, CurrentUser};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    parse_id, validate_break_type, validate_non_negative, validate_optional_timestamp,
    validate_pomodoro_number, validate_status, validate_timestamp,
};

fn validate_interval_update(req: &UpdateIntervalRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_status(&req.status) {
        errors.add("status", &e);
    }

    if let Err(e) = validate_optional_timestamp(&req.end_time) {
        errors.add("end_time", &e);
    }

    if let Err(e) = validate_non_negative(req.duration, "Duration") {
        errors.add("duration", &e);
    }

    errors.finish()
}

// -------------------------------------------------------------------------
// Pomodoros
// -------------------------------------------------------------------------

pub async fn create_pomodoro(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreatePomodoroRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_pomodoro_number(req.number) {
        errors.add("number", &e);
    }
    if let Err(e) = validate_timestamp(&req.start_time) {
        errors.add("start_time", &e);
    }
    if let Err(e) = validate_status(&req.status) {
        errors.add("status", &e);
    }
    errors.finish()?;

    require_owner_or_admin(&state.db, &user, req.session_id).await?;
    let id = db::intervals::create_pomodoro(&state.db, &req).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Pomodoro created successfully", "id": id })),
    ))
}

pub async fn list_pomodoros(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<Pomodoro>>, ApiError> {
    let session_id = parse_id(&session_id, "session").map_err(ApiError::bad_request)?;
    require_owner_or_admin(&state.db, &user, session_id).await?;

    let pomodoros = db::intervals::list_pomodoros(&state.db, session_id).await?;
    Ok(Json(pomodoros))
}

pub async fn update_pomodoro(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateIntervalRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id, "pomodoro").map_err(ApiError::bad_request)?;
    validate_interval_update(&req)?;

    let pomodoro = db::intervals::get_pomodoro(&state.db, id).await?;
    require_owner_or_admin(&state.db, &user, pomodoro.session_id).await?;

    db::intervals::update_pomodoro(&state.db, id, &req).await?;
    Ok(Json(json!({ "message": "Pomodoro updated successfully" })))
}

// -------------------------------------------------------------------------
// Breaks
// -------------------------------------------------------------------------

pub async fn create_break(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateBreakRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_break_type(&req.kind) {
        errors.add("type", &e);
    }
    if let Err(e) = validate_timestamp(&req.start_time) {
        errors.add("start_time", &e);
    }
    if let Err(e) = validate_status(&req.status) {
        errors.add("status", &e);
    }
    errors.finish()?;

    require_owner_or_admin(&state.db, &user, req.session_id).await?;
    let id = db::intervals::create_break(&state.db, &req).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Break created successfully", "id": id })),
    ))
}

pub async fn list_breaks(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<Break>>, ApiError> {
    let session_id = parse_id(&session_id, "session").map_err(ApiError::bad_request)?;
    require_owner_or_admin(&state.db, &user, session_id).await?;

    let breaks = db::intervals::list_breaks(&state.db, session_id).await?;
    Ok(Json(breaks))
}

pub async fn update_break(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateIntervalRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id, "break").map_err(ApiError::bad_request)?;
    validate_interval_update(&req)?;

    let existing = db::intervals::get_break(&state.db, id).await?;
    require_owner_or_admin(&state.db, &user, existing.session_id).await?;

    db::intervals::update_break(&state.db, id, &req).await?;
    Ok(Json(json!({ "message": "Break updated successfully" })))
}
