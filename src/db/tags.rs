//! Tag ledger.
//!
//! A session's comma-separated `tags` column is the source of truth for which
//! tags it carries. The `tags` table caches, per name, how many sessions list
//! that name. Every session write path goes through [`reconcile`] (or the
//! add/remove halves for create/delete) inside the same transaction as the
//! session row change, so the cache never drifts from the strings.
//!
//! Tag lists are treated as sets of trimmed tokens. Never match a tag with a
//! substring search over the whole field: `read` is a substring of `reading`.

use sqlx::{Row, SqliteConnection};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::{DbPool, StoreError, Tag, TagCountMismatch};

/// Colors handed out round-robin to implicitly created tags.
pub const PALETTE: [&str; 10] = [
    "#e74c3c", "#3498db", "#2ecc71", "#f39c12", "#9b59b6", "#1abc9c", "#e67e22", "#34495e",
    "#ff6b81", "#7f8c8d",
];

/// Unique, trimmed, non-empty tokens of a tag list in first-seen order.
pub fn split_tags(list: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = Vec::new();
    for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

/// Canonical storage form of a tag list.
pub fn normalize_tags(list: &str) -> String {
    split_tags(list).join(",")
}

pub fn contains_tag(list: &str, name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && list.split(',').any(|t| t.trim() == name)
}

/// Rewrite a tag list without `name`.
pub fn remove_tag(list: &str, name: &str) -> String {
    let name = name.trim();
    split_tags(list)
        .into_iter()
        .filter(|t| *t != name)
        .collect::<Vec<_>>()
        .join(",")
}

/// Palette entry for the `existing`-th tag.
pub fn palette_color(existing: i64) -> &'static str {
    let len = PALETTE.len() as i64;
    PALETTE[existing.rem_euclid(len) as usize]
}

/// Count one more use of every tag in `list`, creating unknown tags.
pub async fn apply_tags_added(conn: &mut SqliteConnection, list: &str) -> Result<(), sqlx::Error> {
    for name in split_tags(list) {
        let updated = sqlx::query("UPDATE tags SET usage_count = usage_count + 1 WHERE name = ?")
            .bind(name)
            .execute(&mut *conn)
            .await?;

        if updated.rows_affected() == 0 {
            let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags")
                .fetch_one(&mut *conn)
                .await?;
            sqlx::query("INSERT INTO tags (name, color, usage_count) VALUES (?, ?, 1)")
                .bind(name)
                .bind(palette_color(existing))
                .execute(&mut *conn)
                .await?;
            debug!(tag = %name, "Created tag");
        }
    }
    Ok(())
}

/// Count one less use of every tag in `list`, never going below zero.
pub async fn apply_tags_removed(conn: &mut SqliteConnection, list: &str) -> Result<(), sqlx::Error> {
    for name in split_tags(list) {
        sqlx::query("UPDATE tags SET usage_count = MAX(usage_count - 1, 0) WHERE name = ?")
            .bind(name)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Move usage counts from the `old` tag list to the `new` one.
///
/// No-op when the lists are equal, so repeated updates with unchanged tags
/// never touch the counters.
pub async fn reconcile(
    conn: &mut SqliteConnection,
    old: &str,
    new: &str,
) -> Result<(), sqlx::Error> {
    if old == new {
        return Ok(());
    }
    apply_tags_removed(conn, old).await?;
    apply_tags_added(conn, new).await
}

pub async fn list(pool: &DbPool) -> Result<Vec<Tag>, StoreError> {
    let tags = sqlx::query_as::<_, Tag>("SELECT * FROM tags ORDER BY usage_count DESC, name")
        .fetch_all(pool)
        .await?;
    Ok(tags)
}

pub async fn get(pool: &DbPool, id: i64) -> Result<Tag, StoreError> {
    sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound("Tag"))
}

pub async fn find_by_name(pool: &DbPool, name: &str) -> Result<Option<Tag>, StoreError> {
    let tag = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE name = ?")
        .bind(name.trim())
        .fetch_optional(pool)
        .await?;
    Ok(tag)
}

/// Register a tag ahead of use. It starts unused.
pub async fn create(pool: &DbPool, name: &str, color: Option<&str>) -> Result<i64, StoreError> {
    let name = name.trim();
    let mut tx = pool.begin().await?;

    let color = match color.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => c.to_string(),
        None => {
            let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags")
                .fetch_one(&mut *tx)
                .await?;
            palette_color(existing).to_string()
        }
    };

    let id = sqlx::query("INSERT INTO tags (name, color, usage_count) VALUES (?, ?, 0)")
        .bind(name)
        .bind(&color)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::on_unique(e, format!("Tag '{}' already exists", name)))?
        .last_insert_rowid();

    tx.commit().await?;
    info!(tag = %name, id, "Tag created");
    Ok(id)
}

/// Rename and/or recolor a tag. Usage counts and session tag strings are left alone.
pub async fn update(pool: &DbPool, id: i64, name: &str, color: &str) -> Result<(), StoreError> {
    let name = name.trim();
    let result = sqlx::query("UPDATE tags SET name = ?, color = ? WHERE id = ?")
        .bind(name)
        .bind(color)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| StoreError::on_unique(e, format!("Tag '{}' already exists", name)))?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound("Tag"));
    }
    Ok(())
}

/// Remove a tag and strip its name from every session that lists it.
///
/// Rewrites are best effort per row: a row that cannot be read is skipped
/// and logged rather than aborting the deletion.
pub async fn delete(pool: &DbPool, id: i64) -> Result<usize, StoreError> {
    let mut tx = pool.begin().await?;

    let name: String = sqlx::query_scalar("SELECT name FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("Tag"))?;

    sqlx::query("DELETE FROM tags WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    // instr() only narrows the scan; membership is decided on exact tokens
    let rows = sqlx::query("SELECT id, tags FROM sessions WHERE instr(tags, ?) > 0")
        .bind(&name)
        .fetch_all(&mut *tx)
        .await?;

    let mut rewritten = 0;
    for row in rows {
        let (session_id, tags) = match (row.try_get::<i64, _>("id"), row.try_get::<String, _>("tags")) {
            (Ok(session_id), Ok(tags)) => (session_id, tags),
            (Err(e), _) | (_, Err(e)) => {
                warn!(tag = %name, error = %e, "Skipping unreadable session row during tag removal");
                continue;
            }
        };

        if !contains_tag(&tags, &name) {
            continue;
        }

        sqlx::query("UPDATE sessions SET tags = ? WHERE id = ?")
            .bind(remove_tag(&tags, &name))
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        rewritten += 1;
    }

    tx.commit().await?;
    info!(tag = %name, sessions = rewritten, "Tag deleted");
    Ok(rewritten)
}

/// Usage per tag name as implied by the session tag strings.
async fn actual_usage(conn: &mut SqliteConnection) -> Result<BTreeMap<String, i64>, sqlx::Error> {
    let lists: Vec<String> = sqlx::query_scalar("SELECT tags FROM sessions WHERE tags != ''")
        .fetch_all(&mut *conn)
        .await?;

    let mut usage = BTreeMap::new();
    for list in &lists {
        for name in split_tags(list) {
            *usage.entry(name.to_string()).or_insert(0) += 1;
        }
    }
    Ok(usage)
}

/// Compare stored usage counts against the session tag strings.
pub async fn audit(pool: &DbPool) -> Result<Vec<TagCountMismatch>, StoreError> {
    let mut conn = pool.acquire().await?;
    let mut actual = actual_usage(&mut conn).await?;

    let stored: Vec<(String, i64)> = sqlx::query_as("SELECT name, usage_count FROM tags ORDER BY name")
        .fetch_all(&mut *conn)
        .await?;

    let mut mismatches = Vec::new();
    for (name, stored) in stored {
        let actual = actual.remove(&name).unwrap_or(0);
        if actual != stored {
            mismatches.push(TagCountMismatch { name, stored, actual });
        }
    }
    // Names used by sessions but missing from the catalog
    for (name, actual) in actual {
        mismatches.push(TagCountMismatch { name, stored: 0, actual });
    }
    Ok(mismatches)
}

/// Rebuild every usage count from the session tag strings. Returns how many tags changed.
pub async fn recount(pool: &DbPool) -> Result<usize, StoreError> {
    let mut tx = pool.begin().await?;
    let actual = actual_usage(&mut tx).await?;

    let stored: Vec<(String, i64)> = sqlx::query_as("SELECT name, usage_count FROM tags")
        .fetch_all(&mut *tx)
        .await?;

    let mut changed = 0;
    for (name, count) in &stored {
        let want = actual.get(name).copied().unwrap_or(0);
        if want != *count {
            sqlx::query("UPDATE tags SET usage_count = ? WHERE name = ?")
                .bind(want)
                .bind(name)
                .execute(&mut *tx)
                .await?;
            changed += 1;
        }
    }

    let mut existing = stored.len() as i64;
    for (name, count) in &actual {
        if stored.iter().any(|(n, _)| n == name) {
            continue;
        }
        sqlx::query("INSERT INTO tags (name, color, usage_count) VALUES (?, ?, ?)")
            .bind(name)
            .bind(palette_color(existing))
            .bind(count)
            .execute(&mut *tx)
            .await?;
        existing += 1;
        changed += 1;
    }

    tx.commit().await?;
    if changed > 0 {
        warn!(changed, "Tag usage counts rebuilt from session tags");
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    async fn usage(pool: &DbPool, name: &str) -> Option<i64> {
        find_by_name(pool, name).await.unwrap().map(|t| t.usage_count)
    }

    #[test]
    fn test_split_tags_is_a_set_of_trimmed_tokens() {
        assert_eq!(split_tags(" focus, reading ,,focus,"), vec!["focus", "reading"]);
        assert!(split_tags("").is_empty());
        assert!(split_tags(" , ").is_empty());
        assert_eq!(normalize_tags("b , a, b"), "b,a");
    }

    #[test]
    fn test_contains_tag_matches_whole_tokens_only() {
        assert!(contains_tag("work, reading", "reading"));
        assert!(!contains_tag("work,reading", "read"));
        assert!(!contains_tag("deepwork", "work"));
        assert!(!contains_tag("work", ""));
    }

    #[test]
    fn test_remove_tag_keeps_similar_names() {
        assert_eq!(remove_tag("read, reading, focus", "read"), "reading,focus");
        assert_eq!(remove_tag("read", "read"), "");
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(palette_color(0), PALETTE[0]);
        assert_eq!(palette_color(PALETTE.len() as i64 + 2), PALETTE[2]);
    }

    #[tokio::test]
    async fn test_added_creates_then_increments() {
        let pool = init_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        apply_tags_added(&mut conn, "focus,reading").await.unwrap();
        apply_tags_added(&mut conn, "focus").await.unwrap();
        apply_tags_added(&mut conn, "").await.unwrap();
        drop(conn);

        assert_eq!(usage(&pool, "focus").await, Some(2));
        assert_eq!(usage(&pool, "reading").await, Some(1));

        let tags = list(&pool).await.unwrap();
        assert_eq!(tags.len(), 2);
        let reading = tags.iter().find(|t| t.name == "reading").unwrap();
        assert_eq!(reading.color, PALETTE[1]);
    }

    #[tokio::test]
    async fn test_removed_floors_at_zero() {
        let pool = init_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        apply_tags_added(&mut conn, "focus").await.unwrap();
        apply_tags_removed(&mut conn, "focus").await.unwrap();
        apply_tags_removed(&mut conn, "focus, unknown").await.unwrap();
        drop(conn);

        assert_eq!(usage(&pool, "focus").await, Some(0));
        assert_eq!(usage(&pool, "unknown").await, None);
    }

    #[tokio::test]
    async fn test_reconcile_unchanged_is_noop() {
        let pool = init_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        apply_tags_added(&mut conn, "a,b").await.unwrap();
        for _ in 0..3 {
            reconcile(&mut conn, "a,b", "a,b").await.unwrap();
        }
        reconcile(&mut conn, "a,b", "b,c").await.unwrap();
        drop(conn);

        assert_eq!(usage(&pool, "a").await, Some(0));
        assert_eq!(usage(&pool, "b").await, Some(1));
        assert_eq!(usage(&pool, "c").await, Some(1));
    }

    #[tokio::test]
    async fn test_create_and_update_tag() {
        let pool = init_memory().await.unwrap();

        let id = create(&pool, " writing ", None).await.unwrap();
        let tag = get(&pool, id).await.unwrap();
        assert_eq!(tag.name, "writing");
        assert_eq!(tag.usage_count, 0);
        assert_eq!(tag.color, PALETTE[0]);

        assert!(matches!(
            create(&pool, "writing", Some("#000000")).await,
            Err(StoreError::Conflict(_))
        ));

        update(&pool, id, "drafting", "#123456").await.unwrap();
        let tag = get(&pool, id).await.unwrap();
        assert_eq!(tag.name, "drafting");
        assert_eq!(tag.color, "#123456");

        assert!(matches!(
            update(&pool, 999, "x", "#fff").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_strips_exact_token_from_sessions() {
        let pool = init_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO sessions (start_time, status, tags) VALUES
             ('2024-01-01T09:00:00.000Z', 'completed', 'read,focus'),
             ('2024-01-02T09:00:00.000Z', 'completed', 'reading'),
             ('2024-01-03T09:00:00.000Z', 'completed', 'read')",
        )
        .execute(&pool)
        .await
        .unwrap();
        let mut conn = pool.acquire().await.unwrap();
        apply_tags_added(&mut conn, "read,focus").await.unwrap();
        apply_tags_added(&mut conn, "reading").await.unwrap();
        apply_tags_added(&mut conn, "read").await.unwrap();
        drop(conn);

        let read = find_by_name(&pool, "read").await.unwrap().unwrap();
        let rewritten = delete(&pool, read.id).await.unwrap();
        assert_eq!(rewritten, 2);

        let lists: Vec<String> = sqlx::query_scalar("SELECT tags FROM sessions ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(lists, vec!["focus", "reading", ""]);
        assert!(find_by_name(&pool, "read").await.unwrap().is_none());
        assert!(audit(&pool).await.unwrap().is_empty());

        assert!(matches!(delete(&pool, read.id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_audit_and_recount_repair_drift() {
        let pool = init_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO sessions (start_time, status, tags) VALUES
             ('2024-01-01T09:00:00.000Z', 'completed', 'a,b'),
             ('2024-01-02T09:00:00.000Z', 'completed', 'a')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO tags (name, color, usage_count) VALUES ('a', '#fff', 5), ('z', '#fff', 1)")
            .execute(&pool)
            .await
            .unwrap();

        let mismatches = audit(&pool).await.unwrap();
        assert_eq!(
            mismatches,
            vec![
                TagCountMismatch { name: "a".into(), stored: 5, actual: 2 },
                TagCountMismatch { name: "z".into(), stored: 1, actual: 0 },
                TagCountMismatch { name: "b".into(), stored: 0, actual: 1 },
            ]
        );

        assert_eq!(recount(&pool).await.unwrap(), 3);
        assert!(audit(&pool).await.unwrap().is_empty());
        assert_eq!(usage(&pool, "b").await, Some(1));
    }
}
