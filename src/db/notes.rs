//! Free-text notes attached to a session and optionally to one of its pomodoros.

use chrono::Utc;

use super::{DbPool, Note, StoreError};

pub async fn create(
    pool: &DbPool,
    session_id: i64,
    pomodoro_id: Option<i64>,
    text: &str,
) -> Result<i64, StoreError> {
    if let Some(pomodoro_id) = pomodoro_id {
        let owning_session: Option<i64> =
            sqlx::query_scalar("SELECT session_id FROM pomodoros WHERE id = ?")
                .bind(pomodoro_id)
                .fetch_optional(pool)
                .await?;
        if owning_session != Some(session_id) {
            return Err(StoreError::Invalid(
                "Pomodoro does not belong to this session".to_string(),
            ));
        }
    }

    let result = sqlx::query(
        "INSERT INTO notes (session_id, pomodoro_id, note, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(pomodoro_id)
    .bind(text)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get(pool: &DbPool, id: i64) -> Result<Note, StoreError> {
    sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound("Note"))
}

pub async fn list_for_session(pool: &DbPool, session_id: i64) -> Result<Vec<Note>, StoreError> {
    let notes = sqlx::query_as::<_, Note>(
        "SELECT * FROM notes WHERE session_id = ? ORDER BY created_at ASC, id ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(notes)
}

/// Every note, newest first. With `visible_to` set, only notes on sessions
/// owned by that user or unowned.
pub async fn list_all(pool: &DbPool, visible_to: Option<i64>) -> Result<Vec<Note>, StoreError> {
    let notes = match visible_to {
        None => {
            sqlx::query_as::<_, Note>("SELECT * FROM notes ORDER BY created_at DESC, id DESC")
                .fetch_all(pool)
                .await?
        }
        Some(user_id) => {
            sqlx::query_as::<_, Note>(
                r#"
                SELECT n.* FROM notes n
                JOIN sessions s ON s.id = n.session_id
                WHERE s.user_id = ? OR s.user_id IS NULL
                ORDER BY n.created_at DESC, n.id DESC
                "#,
            )
            .bind(user_id)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(notes)
}

pub async fn update(pool: &DbPool, id: i64, text: &str) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE notes SET note = ? WHERE id = ?")
        .bind(text)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound("Note"));
    }
    Ok(())
}

pub async fn delete(pool: &DbPool, id: i64) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM notes WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound("Note"));
    }
    Ok(())
}
