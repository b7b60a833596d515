//! Pomodoros and breaks recorded inside a session.

use super::{canonical_end_time, canonical_time};
use super::{
    Break, BreakKind, CreateBreakRequest, CreatePomodoroRequest, DbPool, Pomodoro, StoreError,
    TimerStatus, UpdateIntervalRequest,
};

fn parse_status(status: &str) -> Result<TimerStatus, StoreError> {
    status.parse().map_err(StoreError::Invalid)
}

fn check_transition(current: &str, next: TimerStatus) -> Result<(), StoreError> {
    match current.parse::<TimerStatus>() {
        Ok(current) if !current.can_transition_to(next) => Err(StoreError::Invalid(format!(
            "Interval is already {} and cannot become {}",
            current, next
        ))),
        _ => Ok(()),
    }
}

pub async fn create_pomodoro(pool: &DbPool, req: &CreatePomodoroRequest) -> Result<i64, StoreError> {
    let status = parse_status(&req.status)?;
    let start_time = canonical_time(&req.start_time)?;

    let result = sqlx::query(
        r#"
        INSERT INTO pomodoros (session_id, number, start_time, duration, status)
        VALUES (?, ?, ?, 0, ?)
        "#,
    )
    .bind(req.session_id)
    .bind(req.number)
    .bind(&start_time)
    .bind(status.as_str())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_pomodoro(pool: &DbPool, id: i64) -> Result<Pomodoro, StoreError> {
    sqlx::query_as::<_, Pomodoro>("SELECT * FROM pomodoros WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound("Pomodoro"))
}

pub async fn list_pomodoros(pool: &DbPool, session_id: i64) -> Result<Vec<Pomodoro>, StoreError> {
    let pomodoros = sqlx::query_as::<_, Pomodoro>(
        "SELECT * FROM pomodoros WHERE session_id = ? ORDER BY number ASC, id ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(pomodoros)
}

pub async fn update_pomodoro(
    pool: &DbPool,
    id: i64,
    req: &UpdateIntervalRequest,
) -> Result<(), StoreError> {
    let next = parse_status(&req.status)?;
    let current = get_pomodoro(pool, id).await?;
    check_transition(&current.status, next)?;
    let end_time = canonical_end_time(req.end_time.as_deref())?;

    sqlx::query("UPDATE pomodoros SET end_time = ?, duration = ?, status = ? WHERE id = ?")
        .bind(&end_time)
        .bind(req.duration)
        .bind(next.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn create_break(pool: &DbPool, req: &CreateBreakRequest) -> Result<i64, StoreError> {
    let kind: BreakKind = req.kind.parse().map_err(StoreError::Invalid)?;
    let status = parse_status(&req.status)?;
    let start_time = canonical_time(&req.start_time)?;

    let owning_session: Option<i64> =
        sqlx::query_scalar("SELECT session_id FROM pomodoros WHERE id = ?")
            .bind(req.pomodoro_id)
            .fetch_optional(pool)
            .await?;
    match owning_session {
        None => return Err(StoreError::NotFound("Pomodoro")),
        Some(session_id) if session_id != req.session_id => {
            return Err(StoreError::Invalid(
                "Pomodoro does not belong to this session".to_string(),
            ))
        }
        Some(_) => {}
    }

    let result = sqlx::query(
        r#"
        INSERT INTO breaks (session_id, pomodoro_id, type, start_time, duration, status)
        VALUES (?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(req.session_id)
    .bind(req.pomodoro_id)
    .bind(match kind {
        BreakKind::Short => "short",
        BreakKind::Long => "long",
    })
    .bind(&start_time)
    .bind(status.as_str())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_break(pool: &DbPool, id: i64) -> Result<Break, StoreError> {
    sqlx::query_as::<_, Break>("SELECT * FROM breaks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound("Break"))
}

pub async fn list_breaks(pool: &DbPool, session_id: i64) -> Result<Vec<Break>, StoreError> {
    let breaks = sqlx::query_as::<_, Break>(
        "SELECT * FROM breaks WHERE session_id = ? ORDER BY start_time ASC, id ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(breaks)
}

pub async fn update_break(
    pool: &DbPool,
    id: i64,
    req: &UpdateIntervalRequest,
) -> Result<(), StoreError> {
    let next = parse_status(&req.status)?;
    let current = get_break(pool, id).await?;
    check_transition(&current.status, next)?;
    let end_time = canonical_end_time(req.end_time.as_deref())?;

    sqlx::query("UPDATE breaks SET end_time = ?, duration = ?, status = ? WHERE id = ?")
        .bind(&end_time)
        .bind(req.duration)
        .bind(next.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
