//! Session note endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::db::{self, CreateNoteRequest, Note, UpdateNoteRequest};
use crate::AppState;

use super::auth::{require_owner_or_admin, CurrentUser};
use super::error::ApiError;
use super::validation::parse_id;

fn validate_note_text(text: &str) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::validation_field("note", "Note text is required"));
    }
    Ok(())
}

pub async fn create_note(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    validate_note_text(&req.note)?;
    require_owner_or_admin(&state.db, &user, req.session_id).await?;

    let id = db::notes::create(&state.db, req.session_id, req.pomodoro_id, &req.note).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Note created successfully", "id": id })),
    ))
}

pub async fn list_session_notes(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<Note>>, ApiError> {
    let session_id = parse_id(&session_id, "session").map_err(ApiError::bad_request)?;
    require_owner_or_admin(&state.db, &user, session_id).await?;

    let notes = db::notes::list_for_session(&state.db, session_id).await?;
    Ok(Json(notes))
}

/// Notes on every session visible to the caller; admins see all
pub async fn list_all_notes(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Note>>, ApiError> {
    let visible_to = if user.is_admin { None } else { Some(user.id) };
    let notes = db::notes::list_all(&state.db, visible_to).await?;
    Ok(Json(notes))
}

pub async fn update_note(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateNoteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id, "note").map_err(ApiError::bad_request)?;
    validate_note_text(&req.note)?;

    let note = db::notes::get(&state.db, id).await?;
    require_owner_or_admin(&state.db, &user, note.session_id).await?;

    db::notes::update(&state.db, id, &req.note).await?;
    Ok(Json(json!({ "message": "Note updated successfully" })))
}

pub async fn delete_note(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id, "note").map_err(ApiError::bad_request)?;

    let note = db::notes::get(&state.db, id).await?;
    require_owner_or_admin(&state.db, &user, note.session_id).await?;

    db::notes::delete(&state.db, id).await?;
    Ok(Json(json!({ "message": "Note deleted successfully" })))
}
