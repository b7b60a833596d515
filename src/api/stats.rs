//! Statistics endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Datelike;
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{self, MonthlyTagStats};
use crate::AppState;

use super::auth::CurrentUser;
use super::error::ApiError;
use super::validation::validate_year;

#[derive(Debug, Deserialize)]
pub struct MonthlyStatsQuery {
    pub year: Option<String>,
}

/// Minutes per tag per month; defaults to the current year
pub async fn monthly_tag_stats(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(query): Query<MonthlyStatsQuery>,
) -> Result<Json<MonthlyTagStats>, ApiError> {
    let year = match query.year.as_deref().map(str::trim).filter(|y| !y.is_empty()) {
        None => chrono::Utc::now().year(),
        Some(raw) => raw
            .parse::<i32>()
            .map_err(|_| ApiError::validation_field("year", "Invalid year parameter"))?,
    };

    if let Err(e) = validate_year(year) {
        return Err(ApiError::validation_field("year", e));
    }

    let stats = db::stats::monthly_tag_stats(&state.db, year).await?;
    Ok(Json(stats))
}
