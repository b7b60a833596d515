//! Read-only aggregates: monthly minutes per tag and database health figures.

use chrono::{DateTime, Datelike};
use sqlx::Row;
use std::collections::BTreeMap;
use tracing::warn;

use super::tags::split_tags;
use super::{DatabaseStats, DbPool, MonthTagMinutes, MonthlyTagStats, StoreError, TableCount};

/// Bucket for minutes of sessions without any tag
pub const UNTAGGED: &str = "Untagged";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const TABLES: [&str; 6] = ["users", "sessions", "pomodoros", "breaks", "notes", "tags"];

/// Split `minutes` evenly over the session's tags, truncating.
///
/// 10 minutes over three tags gives 3 each; the remainder is dropped.
pub fn distribute_minutes(tag_list: &str, minutes: i64) -> Vec<(String, i64)> {
    let names = split_tags(tag_list);
    if names.is_empty() {
        return vec![(UNTAGGED.to_string(), minutes)];
    }
    let share = minutes / names.len() as i64;
    names.into_iter().map(|n| (n.to_string(), share)).collect()
}

/// Minutes per tag for every month of `year`, across all finished sessions.
///
/// Rows that fail to decode or carry an unparsable start time are skipped.
pub async fn monthly_tag_stats(pool: &DbPool, year: i32) -> Result<MonthlyTagStats, StoreError> {
    let mut months: Vec<MonthTagMinutes> = MONTH_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| MonthTagMinutes {
            month: i as u32 + 1,
            name: *name,
            tags: BTreeMap::new(),
        })
        .collect();

    let rows = sqlx::query(
        r#"
        SELECT id, start_time, total_time, tags FROM sessions
        WHERE status IN ('completed', 'stopped')
          AND total_time > 0
          AND start_time LIKE ?
        "#,
    )
    .bind(format!("{:04}-%", year))
    .fetch_all(pool)
    .await?;

    for row in rows {
        let decoded = (
            row.try_get::<String, _>("start_time"),
            row.try_get::<i64, _>("total_time"),
            row.try_get::<String, _>("tags"),
        );
        let (start_time, total_time, tag_list) = match decoded {
            (Ok(s), Ok(t), Ok(g)) => (s, t, g),
            _ => {
                warn!(session_id = ?row.try_get::<i64, _>("id").ok(), "Skipping unreadable session row in monthly stats");
                continue;
            }
        };

        let month = match DateTime::parse_from_rfc3339(&start_time) {
            Ok(start) if start.year() == year => start.month(),
            Ok(_) => continue,
            Err(e) => {
                warn!(start_time = %start_time, error = %e, "Skipping session with unparsable start time");
                continue;
            }
        };

        let bucket = &mut months[month as usize - 1].tags;
        for (name, minutes) in distribute_minutes(&tag_list, total_time / 60) {
            *bucket.entry(name).or_insert(0) += minutes;
        }
    }

    Ok(MonthlyTagStats { year, months })
}

pub async fn database_stats(pool: &DbPool) -> Result<DatabaseStats, StoreError> {
    let mut tables = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        let rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await?;
        tables.push(TableCount { table, rows });
    }

    let size_bytes: i64 = sqlx::query_scalar(
        "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
    )
    .fetch_one(pool)
    .await?;

    Ok(DatabaseStats { tables, size_bytes })
}

/// Run SQLite's integrity check. An empty result means the file is healthy.
pub async fn integrity_check(pool: &DbPool) -> Result<Vec<String>, StoreError> {
    let messages: Vec<String> = sqlx::query_scalar("PRAGMA integrity_check")
        .fetch_all(pool)
        .await?;
    Ok(messages.into_iter().filter(|m| m != "ok").collect())
}
