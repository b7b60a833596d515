//! User administration endpoints (admin only) and self-service profile edits.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::crypto::{generate_password, GENERATED_PASSWORD_LENGTH};
use crate::db::{self, ProfileUpdateRequest, SetAdminRequest, User, UserInput};
use crate::AppState;

use super::auth::{AdminUser, CurrentUser};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{parse_id, validate_email, validate_password, validate_username};

/// Validate a UserInput; `require_password` on create
fn validate_user_input(input: &UserInput, require_password: bool) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_username(&input.username) {
        errors.add("username", &e);
    }

    if require_password || !input.password.is_empty() {
        if let Err(e) = validate_password(&input.password) {
            errors.add("password", &e);
        }
    }

    if let Err(e) = validate_email(&input.email) {
        errors.add("email", &e);
    }

    errors.finish()
}

/// Admins may not lock themselves out
fn reject_self(admin: &User, target: i64, action: &str) -> Result<(), ApiError> {
    if admin.id == target {
        return Err(ApiError::bad_request(format!("You cannot {} your own account", action)));
    }
    Ok(())
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = db::users::list(&state.db).await?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(input): Json<UserInput>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    validate_user_input(&input, true)?;

    let id = db::users::create(
        &state.db,
        &input.username,
        &input.password,
        input.email.as_deref(),
        input.is_admin,
    )
    .await?;

    info!(user_id = id, by = admin.id, "User created by admin");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created successfully", "id": id })),
    ))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(input): Json<UserInput>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id, "user").map_err(ApiError::bad_request)?;
    validate_user_input(&input, false)?;
    if !input.is_admin {
        reject_self(&admin, id, "demote")?;
    }

    db::users::update(&state.db, id, &input).await?;
    Ok(Json(json!({ "message": "User updated successfully" })))
}

/// Soft delete: the account is deactivated, its row and sessions stay
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id, "user").map_err(ApiError::bad_request)?;
    reject_self(&admin, id, "delete")?;

    db::users::soft_delete(&state.db, id).await?;
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

/// Irreversible removal; owned sessions become unowned
pub async fn purge_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id, "user").map_err(ApiError::bad_request)?;
    reject_self(&admin, id, "delete")?;

    db::users::purge(&state.db, id).await?;
    Ok(Json(json!({ "message": "User permanently deleted" })))
}

pub async fn set_admin(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<SetAdminRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id, "user").map_err(ApiError::bad_request)?;
    if !req.is_admin {
        reject_self(&admin, id, "demote")?;
    }

    db::users::set_admin(&state.db, id, req.is_admin).await?;
    Ok(Json(json!({ "message": "User admin status updated successfully" })))
}

/// Replace the password with a generated one and hand it back once
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id, "user").map_err(ApiError::bad_request)?;

    let password = generate_password(GENERATED_PASSWORD_LENGTH);
    db::users::set_password(&state.db, id, &password).await?;

    info!(user_id = id, by = admin.id, "Password reset by admin");
    Ok(Json(json!({
        "message": "Password reset successfully",
        "password": password,
    })))
}

/// Change the caller's own email and/or password
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ProfileUpdateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_email(&req.email) {
        errors.add("email", &e);
    }
    if !req.new_password.is_empty() {
        if let Err(e) = validate_password(&req.new_password) {
            errors.add("new_password", &e);
        }
    }
    errors.finish()?;

    db::users::update_profile(&state.db, user.id, &req).await?;
    Ok(Json(json!({ "message": "Profile updated successfully" })))
}
