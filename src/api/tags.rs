//! Tag catalog endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::db::{self, CreateTagRequest, Tag, UpdateTagRequest};
use crate::AppState;

use super::auth::{AdminUser, CurrentUser};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{parse_id, validate_color, validate_tag_name};

/// Most used first
pub async fn list_tags(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> Result<Json<Vec<Tag>>, ApiError> {
    let tags = db::tags::list(&state.db).await?;
    Ok(Json(tags))
}

pub async fn create_tag(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Json(req): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_tag_name(&req.name) {
        errors.add("name", &e);
    }
    if let Some(color) = req.color.as_deref().filter(|c| !c.is_empty()) {
        if let Err(e) = validate_color(color) {
            errors.add("color", &e);
        }
    }
    errors.finish()?;

    let id = db::tags::create(&state.db, &req.name, req.color.as_deref()).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Tag created successfully", "id": id })),
    ))
}

/// Rename or recolor. Session tag strings keep the old name.
pub async fn update_tag(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateTagRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id, "tag").map_err(ApiError::bad_request)?;

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_tag_name(&req.name) {
        errors.add("name", &e);
    }
    if let Err(e) = validate_color(&req.color) {
        errors.add("color", &e);
    }
    errors.finish()?;

    db::tags::update(&state.db, id, &req.name, &req.color).await?;
    Ok(Json(json!({ "message": "Tag updated successfully" })))
}

/// Delete a tag and strip it from every session that carries it
pub async fn delete_tag(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id, "tag").map_err(ApiError::bad_request)?;

    let sessions_updated = db::tags::delete(&state.db, id).await?;

    Ok(Json(json!({
        "message": "Tag deleted successfully",
        "sessions_updated": sessions_updated,
    })))
}

/// Rebuild every usage count from the session tag strings (admin only)
pub async fn recount_tags(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let changed = db::tags::recount(&state.db).await?;

    tracing::info!(user_id = admin.id, changed, "Tag usage counts rebuilt");
    Ok(Json(json!({
        "message": "Tag usage counts rebuilt",
        "tags_changed": changed,
    })))
}
