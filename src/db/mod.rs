mod error;
pub mod intervals;
mod models;
pub mod notes;
pub mod sessions;
pub mod stats;
pub mod tags;
pub mod users;

pub use error::StoreError;
pub use models::*;

use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use std::path::Path;
use tracing::info;

pub type DbPool = SqlitePool;

/// Stored form of client timestamps: UTC, millisecond precision, `Z` suffix.
/// Range filters compare these as strings, so every write goes through it.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Rewrite an RFC 3339 timestamp in its stored UTC form.
pub fn canonical_time(value: &str) -> Result<String, StoreError> {
    chrono::DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&chrono::Utc).format(TIME_FORMAT).to_string())
        .map_err(|_| StoreError::Invalid(format!("Invalid timestamp: {}", value)))
}

/// Like [`canonical_time`], with blank values stored as NULL.
pub fn canonical_end_time(value: Option<&str>) -> Result<Option<String>, StoreError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => canonical_time(v).map(Some),
        None => Ok(None),
    }
}

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

pub async fn init(db_path: &Path) -> Result<DbPool> {
    info!("Initializing database at {}", db_path.display());

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// Open a private in-memory database with the full schema.
///
/// Limited to a single connection: every pooled connection to `:memory:`
/// would otherwise see its own empty database.
pub async fn init_memory() -> Result<DbPool> {
    let options = SqliteConnectOptions::new()
        .filename(":memory:")
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

async fn has_column(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    let found: Option<(String,)> =
        sqlx::query_as("SELECT name FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: Initial schema
    execute_sql(pool, include_str!("../../migrations/001_initial.sql")).await?;

    // Migration 002: Add tags column to sessions (pre-tagging databases)
    if !has_column(pool, "sessions", "tags").await? {
        execute_sql(pool, include_str!("../../migrations/002_session_tags.sql")).await?;
        info!("Migration applied: add tags column to sessions");
    }

    // Migration 003: Add user_id column to sessions for ownership
    if !has_column(pool, "sessions", "user_id").await? {
        execute_sql(pool, include_str!("../../migrations/003_session_owner.sql")).await?;
        info!("Migration applied: add user_id column to sessions");
    }

    // Migration 004: Add account_status column to users
    if !has_column(pool, "users", "account_status").await? {
        execute_sql(pool, include_str!("../../migrations/004_account_status.sql")).await?;
        info!("Migration applied: add account_status column to users");
    }

    execute_sql(pool, include_str!("../../migrations/005_indexes.sql")).await?;

    info!("Migrations completed");
    Ok(())
}
