//! Admin maintenance endpoints: database statistics and integrity checks.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::db::{self, DatabaseStats, TagCountMismatch};
use crate::AppState;

use super::auth::AdminUser;
use super::error::ApiError;

#[derive(Debug, Serialize)]
pub struct IntegrityReport {
    pub message: String,
    /// SQLite reported no corruption
    pub database_ok: bool,
    pub database_errors: Vec<String>,
    /// Stored tag usage matches the session tag strings
    pub tags_ok: bool,
    pub tag_mismatches: Vec<TagCountMismatch>,
}

pub async fn database_stats(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<DatabaseStats>, ApiError> {
    let stats = db::stats::database_stats(&state.db).await?;
    Ok(Json(stats))
}

/// Run SQLite's integrity check and audit the tag usage counts
pub async fn check_integrity(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<IntegrityReport>, ApiError> {
    let database_errors = db::stats::integrity_check(&state.db).await?;
    let tag_mismatches = db::tags::audit(&state.db).await?;

    let database_ok = database_errors.is_empty();
    let tags_ok = tag_mismatches.is_empty();

    let message = match (database_ok, tags_ok) {
        (true, true) => "Database integrity check passed!".to_string(),
        (true, false) => format!(
            "Database is intact but {} tag usage count(s) are out of date",
            tag_mismatches.len()
        ),
        (false, _) => "Database integrity check failed. Please backup your data and consider rebuilding the database.".to_string(),
    };

    if !database_ok {
        tracing::error!(errors = ?database_errors, "SQLite integrity check failed");
    } else if !tags_ok {
        tracing::warn!(mismatches = tag_mismatches.len(), "Tag usage counts drifted");
    }

    Ok(Json(IntegrityReport {
        message,
        database_ok,
        database_errors,
        tags_ok,
        tag_mismatches,
    }))
}
