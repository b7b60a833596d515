//! Session repository.
//!
//! Owns the `sessions` rows and cascades deletes to pomodoros, breaks and
//! notes. Every write that changes a session's tag list runs the tag ledger
//! inside the same transaction as the row change.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use tracing::info;

use super::tags;
use super::{canonical_end_time, canonical_time, TIME_FORMAT};
use super::{DbPool, ListSessionsQuery, Session, StoreError, TimerStatus, UpdateSessionRequest};

/// Look-back window used when a listing names neither a tag nor a range.
pub const DEFAULT_RECENT_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFilter {
    /// Sessions whose tag set contains this exact name
    Tag(String),
    /// Sessions starting within `[start, end]`
    DateRange { start: String, end: String },
    /// Sessions starting at or after this instant
    Since(String),
}

impl SessionFilter {
    /// Pick the filter from query parameters: tag first, then named range, then day window.
    pub fn from_query(query: &ListSessionsQuery, now: DateTime<Utc>) -> Self {
        if let Some(tag) = query.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return Self::Tag(tag.to_string());
        }

        if let Some(range) = query.range.as_deref().filter(|r| !r.is_empty()) {
            let (start, end) = date_range(range, now);
            return Self::DateRange {
                start: start.format(TIME_FORMAT).to_string(),
                end: end.format(TIME_FORMAT).to_string(),
            };
        }

        let days = query
            .days
            .as_deref()
            .and_then(|d| d.trim().parse::<i64>().ok())
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_RECENT_DAYS);
        let since = days_before(now, days);
        Self::Since(since.format(TIME_FORMAT).to_string())
    }
}

/// Earliest instant any listing looks back to.
fn history_floor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// `now` minus `days`, clamped to the history floor when the window cannot be represented.
fn days_before(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or_else(history_floor)
}

/// Bounds for a named range. The end is always the last millisecond of today.
pub fn date_range(range: &str, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive();
    let end = today
        .and_hms_milli_opt(23, 59, 59, 999)
        .map(|t| Utc.from_utc_datetime(&t))
        .unwrap_or(now);

    let start_of = |date: Option<NaiveDate>| {
        date.and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| Utc.from_utc_datetime(&t))
            .unwrap_or(now)
    };

    let start = match range {
        "7days" => days_before(now, 7),
        "90days" => days_before(now, 90),
        "year" => start_of(NaiveDate::from_ymd_opt(today.year(), 1, 1)),
        "all" => history_floor(),
        // "30days" and anything unrecognised
        _ => days_before(now, 30),
    };

    (start, end)
}

/// Start a session in the `running` state and count its tags.
pub async fn create(
    pool: &DbPool,
    start_time: &str,
    tag_list: &str,
    owner: Option<i64>,
) -> Result<i64, StoreError> {
    let start_time = canonical_time(start_time)?;
    let tag_list = tags::normalize_tags(tag_list);
    let mut tx = pool.begin().await?;

    let id = sqlx::query(
        r#"
        INSERT INTO sessions (start_time, total_time, status, completed_pomodoros, tags, user_id)
        VALUES (?, 0, ?, 0, ?, ?)
        "#,
    )
    .bind(&start_time)
    .bind(TimerStatus::Running.as_str())
    .bind(&tag_list)
    .bind(owner)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tags::apply_tags_added(&mut tx, &tag_list).await?;
    tx.commit().await?;

    info!(session_id = id, user_id = ?owner, tags = %tag_list, "Session created");
    Ok(id)
}

pub async fn get(pool: &DbPool, id: i64) -> Result<Session, StoreError> {
    sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound("Session"))
}

/// Replace a session's mutable fields, moving tag counts from the old list to the new one.
pub async fn update(pool: &DbPool, id: i64, req: &UpdateSessionRequest) -> Result<(), StoreError> {
    let next: TimerStatus = req.status.parse().map_err(StoreError::Invalid)?;
    let end_time = canonical_end_time(req.end_time.as_deref())?;
    let new_tags = tags::normalize_tags(&req.tags);

    let mut tx = pool.begin().await?;

    let (old_tags, old_status): (String, String) =
        sqlx::query_as("SELECT tags, status FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound("Session"))?;

    if let Ok(current) = old_status.parse::<TimerStatus>() {
        if !current.can_transition_to(next) {
            return Err(StoreError::Invalid(format!(
                "Session is already {} and cannot become {}",
                current, next
            )));
        }
    }

    tags::reconcile(&mut tx, &old_tags, &new_tags).await?;

    sqlx::query(
        r#"
        UPDATE sessions
        SET end_time = ?, total_time = ?, status = ?, completed_pomodoros = ?, tags = ?
        WHERE id = ?
        "#,
    )
    .bind(&end_time)
    .bind(req.total_time)
    .bind(next.as_str())
    .bind(req.completed_pomodoros)
    .bind(&new_tags)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Delete a session with its pomodoros, breaks and notes, releasing its tags.
pub async fn delete(pool: &DbPool, id: i64) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    let tag_list: String = sqlx::query_scalar("SELECT tags FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("Session"))?;

    tags::apply_tags_removed(&mut tx, &tag_list).await?;

    // Children first: notes and breaks reference pomodoros
    for statement in [
        "DELETE FROM notes WHERE session_id = ?",
        "DELETE FROM breaks WHERE session_id = ?",
        "DELETE FROM pomodoros WHERE session_id = ?",
        "DELETE FROM sessions WHERE id = ?",
    ] {
        sqlx::query(statement).bind(id).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    info!(session_id = id, "Session deleted");
    Ok(())
}

/// Sessions visible to `user_id` (owned by them or unowned) matching `filter`.
pub async fn list_for_owner(
    pool: &DbPool,
    user_id: i64,
    filter: &SessionFilter,
) -> Result<Vec<Session>, StoreError> {
    const VISIBLE: &str = "SELECT * FROM sessions WHERE (user_id = ? OR user_id IS NULL)";
    const ORDER: &str = "ORDER BY start_time DESC, id DESC";

    let sessions = match filter {
        SessionFilter::Tag(name) => {
            let candidates =
                sqlx::query_as::<_, Session>(&format!("{} AND instr(tags, ?) > 0 {}", VISIBLE, ORDER))
                    .bind(user_id)
                    .bind(name)
                    .fetch_all(pool)
                    .await?;
            candidates
                .into_iter()
                .filter(|s| tags::contains_tag(&s.tags, name))
                .collect()
        }
        SessionFilter::DateRange { start, end } => {
            sqlx::query_as::<_, Session>(&format!(
                "{} AND start_time BETWEEN ? AND ? {}",
                VISIBLE, ORDER
            ))
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_all(pool)
            .await?
        }
        SessionFilter::Since(since) => {
            sqlx::query_as::<_, Session>(&format!("{} AND start_time >= ? {}", VISIBLE, ORDER))
                .bind(user_id)
                .bind(since)
                .fetch_all(pool)
                .await?
        }
    };

    Ok(sessions)
}

/// Whether `user_id` may access the session. Unowned sessions are open to everyone.
pub async fn is_owner(pool: &DbPool, session_id: i64, user_id: i64) -> Result<bool, StoreError> {
    let owner: Option<Option<i64>> = sqlx::query_scalar("SELECT user_id FROM sessions WHERE id = ?")
        .bind(session_id)
        .fetch_optional(pool)
        .await?;

    match owner {
        None => Err(StoreError::NotFound("Session")),
        Some(owner) => Ok(owner.map_or(true, |o| o == user_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory, intervals, notes, CreateBreakRequest, CreatePomodoroRequest};

    async fn usage(pool: &DbPool, name: &str) -> Option<i64> {
        tags::find_by_name(pool, name)
            .await
            .unwrap()
            .map(|t| t.usage_count)
    }

    fn update_req(status: &str, tags: &str) -> UpdateSessionRequest {
        UpdateSessionRequest {
            end_time: Some("2024-03-10T10:00:00.000Z".to_string()),
            total_time: 1500,
            status: status.to_string(),
            completed_pomodoros: 1,
            tags: tags.to_string(),
        }
    }

    async fn add_user(pool: &DbPool, name: &str) -> i64 {
        sqlx::query("INSERT INTO users (username, password_hash, created_at) VALUES (?, 'x', '2024-01-01T00:00:00Z')")
            .bind(name)
            .execute(pool)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_tag_counts_follow_session_lifecycle() {
        let pool = init_memory().await.unwrap();

        let id = create(&pool, "2024-03-10T09:00:00.000Z", "focus,reading", None)
            .await
            .unwrap();
        assert_eq!(usage(&pool, "focus").await, Some(1));
        assert_eq!(usage(&pool, "reading").await, Some(1));

        update(&pool, id, &update_req("running", "focus")).await.unwrap();
        assert_eq!(usage(&pool, "focus").await, Some(1));
        assert_eq!(usage(&pool, "reading").await, Some(0));

        delete(&pool, id).await.unwrap();
        assert_eq!(usage(&pool, "focus").await, Some(0));
        assert!(tags::audit(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_update_with_same_tags_keeps_counts() {
        let pool = init_memory().await.unwrap();
        let id = create(&pool, "2024-03-10T09:00:00.000Z", "a, b", None).await.unwrap();

        for _ in 0..3 {
            update(&pool, id, &update_req("running", "a,b")).await.unwrap();
        }
        // Reordered or re-spaced lists are the same set
        update(&pool, id, &update_req("running", " b ,a")).await.unwrap();

        assert_eq!(usage(&pool, "a").await, Some(1));
        assert_eq!(usage(&pool, "b").await, Some(1));
        assert!(tags::audit(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_normalizes_tag_list() {
        let pool = init_memory().await.unwrap();
        let id = create(&pool, "2024-03-10T09:00:00.000Z", " focus,,focus , deep", None)
            .await
            .unwrap();

        let session = get(&pool, id).await.unwrap();
        assert_eq!(session.tags, "focus,deep");
        assert_eq!(session.status, "running");
        assert_eq!(session.completed_pomodoros, 0);
        assert_eq!(usage(&pool, "focus").await, Some(1));
    }

    #[tokio::test]
    async fn test_terminal_session_cannot_restart() {
        let pool = init_memory().await.unwrap();
        let id = create(&pool, "2024-03-10T09:00:00.000Z", "x", None).await.unwrap();

        update(&pool, id, &update_req("completed", "x")).await.unwrap();
        // Editing tags on a finished session is fine
        update(&pool, id, &update_req("completed", "x,y")).await.unwrap();

        let err = update(&pool, id, &update_req("running", "z")).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        // Rolled back: counts still match the stored list
        assert_eq!(get(&pool, id).await.unwrap().tags, "x,y");
        assert_eq!(usage(&pool, "z").await, None);

        let err = update(&pool, id, &update_req("paused", "x")).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_missing_session_is_not_found() {
        let pool = init_memory().await.unwrap();
        assert!(matches!(get(&pool, 42).await, Err(StoreError::NotFound(_))));
        assert!(matches!(delete(&pool, 42).await, Err(StoreError::NotFound(_))));
        assert!(matches!(
            update(&pool, 42, &update_req("running", "")).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(is_owner(&pool, 42, 1).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_children() {
        let pool = init_memory().await.unwrap();
        let id = create(&pool, "2024-03-10T09:00:00.000Z", "work,deep", None)
            .await
            .unwrap();
        let other = create(&pool, "2024-03-10T11:00:00.000Z", "work", None).await.unwrap();

        let pomodoro_id = intervals::create_pomodoro(
            &pool,
            &CreatePomodoroRequest {
                session_id: id,
                number: 1,
                start_time: "2024-03-10T09:00:00.000Z".to_string(),
                status: "running".to_string(),
            },
        )
        .await
        .unwrap();
        intervals::create_break(
            &pool,
            &CreateBreakRequest {
                session_id: id,
                pomodoro_id,
                kind: "short".to_string(),
                start_time: "2024-03-10T09:25:00.000Z".to_string(),
                status: "running".to_string(),
            },
        )
        .await
        .unwrap();
        notes::create(&pool, id, Some(pomodoro_id), "halfway").await.unwrap();

        delete(&pool, id).await.unwrap();

        assert!(intervals::list_pomodoros(&pool, id).await.unwrap().is_empty());
        assert!(intervals::list_breaks(&pool, id).await.unwrap().is_empty());
        assert!(notes::list_for_session(&pool, id).await.unwrap().is_empty());
        assert_eq!(usage(&pool, "work").await, Some(1));
        assert_eq!(usage(&pool, "deep").await, Some(0));
        assert!(get(&pool, other).await.is_ok());
    }

    #[tokio::test]
    async fn test_ownership_and_visibility() {
        let pool = init_memory().await.unwrap();
        let alice = add_user(&pool, "alice").await;
        let bob = add_user(&pool, "bob").await;

        let legacy = create(&pool, "2024-03-10T08:00:00.000Z", "read", None).await.unwrap();
        let mine = create(&pool, "2024-03-10T09:00:00.000Z", "reading", Some(alice))
            .await
            .unwrap();
        let theirs = create(&pool, "2024-03-10T10:00:00.000Z", "read", Some(bob))
            .await
            .unwrap();

        assert!(is_owner(&pool, legacy, alice).await.unwrap());
        assert!(is_owner(&pool, legacy, bob).await.unwrap());
        assert!(is_owner(&pool, mine, alice).await.unwrap());
        assert!(!is_owner(&pool, mine, bob).await.unwrap());

        let filter = SessionFilter::Tag("read".to_string());
        let ids: Vec<i64> = list_for_owner(&pool, alice, &filter)
            .await
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![legacy]);

        let ids: Vec<i64> = list_for_owner(&pool, bob, &filter)
            .await
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![theirs, legacy]);

        let all = SessionFilter::Since("2000-01-01T00:00:00.000Z".to_string());
        let ids: Vec<i64> = list_for_owner(&pool, alice, &all)
            .await
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![mine, legacy]);
    }

    #[tokio::test]
    async fn test_date_range_filter_bounds() {
        let pool = init_memory().await.unwrap();
        let user = add_user(&pool, "carol").await;
        create(&pool, "2024-01-15T09:00:00.000Z", "", Some(user)).await.unwrap();
        let inside = create(&pool, "2024-02-15T09:00:00.000Z", "", Some(user)).await.unwrap();
        create(&pool, "2024-03-15T09:00:00.000Z", "", Some(user)).await.unwrap();

        let filter = SessionFilter::DateRange {
            start: "2024-02-01T00:00:00.000Z".to_string(),
            end: "2024-02-29T23:59:59.999Z".to_string(),
        };
        let sessions = list_for_owner(&pool, user, &filter).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, inside);
    }

    #[tokio::test]
    async fn test_offset_start_lands_in_utc_window() {
        let pool = init_memory().await.unwrap();
        let user = add_user(&pool, "alice").await;

        // 2024-03-01T01:00 local is still February in UTC
        let id = create(&pool, "2024-03-01T01:00:00+02:00", "", Some(user)).await.unwrap();
        let session = get(&pool, id).await.unwrap();
        assert_eq!(session.start_time, "2024-02-29T23:00:00.000Z");

        let february = SessionFilter::DateRange {
            start: "2024-02-01T00:00:00.000Z".to_string(),
            end: "2024-02-29T23:59:59.999Z".to_string(),
        };
        let listed = list_for_owner(&pool, user, &february).await.unwrap();
        assert_eq!(listed.iter().map(|s| s.id).collect::<Vec<_>>(), vec![id]);

        let mut req = update_req("running", "");
        req.end_time = Some(String::new());
        update(&pool, id, &req).await.unwrap();
        assert_eq!(get(&pool, id).await.unwrap().end_time, None);
    }

    #[test]
    fn test_filter_from_query_precedence() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();

        let query = ListSessionsQuery {
            tag: Some(" focus ".to_string()),
            range: Some("year".to_string()),
            days: Some("3".to_string()),
        };
        assert_eq!(SessionFilter::from_query(&query, now), SessionFilter::Tag("focus".into()));

        let query = ListSessionsQuery {
            tag: Some(String::new()),
            range: Some("year".to_string()),
            days: None,
        };
        assert_eq!(
            SessionFilter::from_query(&query, now),
            SessionFilter::DateRange {
                start: "2024-01-01T00:00:00.000Z".into(),
                end: "2024-06-15T23:59:59.999Z".into(),
            }
        );

        let query = ListSessionsQuery {
            days: Some("3".to_string()),
            ..Default::default()
        };
        assert_eq!(
            SessionFilter::from_query(&query, now),
            SessionFilter::Since("2024-06-12T12:00:00.000Z".into())
        );

        let query = ListSessionsQuery {
            days: Some("-4".to_string()),
            ..Default::default()
        };
        assert_eq!(
            SessionFilter::from_query(&query, now),
            SessionFilter::Since("2024-06-08T12:00:00.000Z".into())
        );
    }

    #[test]
    fn test_huge_day_window_clamps_to_floor() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();

        for days in ["100000000", "99999999999999", &i64::MAX.to_string()] {
            let query = ListSessionsQuery {
                days: Some(days.to_string()),
                ..Default::default()
            };
            assert_eq!(
                SessionFilter::from_query(&query, now),
                SessionFilter::Since("2000-01-01T00:00:00.000Z".into()),
                "days={}",
                days
            );
        }
    }

    #[test]
    fn test_unknown_range_defaults_to_thirty_days() {
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 8, 0, 0).unwrap();
        let (start, _) = date_range("fortnight", now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 31, 8, 0, 0).unwrap());
        let (start, _) = date_range("all", now);
        assert_eq!(start, Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
    }
}
