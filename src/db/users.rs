//! User accounts.

use chrono::Utc;
use tracing::info;

use super::{AccountStatus, DbPool, ProfileUpdateRequest, StoreError, User, UserInput};
use crate::crypto;

const DUPLICATE_USER: &str = "Username or email already exists";

/// Empty emails are stored as NULL so they never collide on the unique index.
fn clean_email(email: Option<&str>) -> Option<String> {
    email
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
}

pub async fn get_by_id(pool: &DbPool, id: i64) -> Result<User, StoreError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound("User"))
}

pub async fn get_by_username(pool: &DbPool, username: &str) -> Result<Option<User>, StoreError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// All accounts, soft-deleted ones included.
pub async fn list(pool: &DbPool) -> Result<Vec<User>, StoreError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id ASC")
        .fetch_all(pool)
        .await?;
    Ok(users)
}

pub async fn create(
    pool: &DbPool,
    username: &str,
    password: &str,
    email: Option<&str>,
    is_admin: bool,
) -> Result<i64, StoreError> {
    let password_hash = crypto::hash_password(password)?;

    let id = sqlx::query(
        r#"
        INSERT INTO users (username, password_hash, email, is_admin, account_status, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(username)
    .bind(&password_hash)
    .bind(clean_email(email))
    .bind(is_admin)
    .bind(AccountStatus::Active.as_str())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .map_err(|e| StoreError::on_unique(e, DUPLICATE_USER))?
    .last_insert_rowid();

    info!(user_id = id, username = %username, is_admin, "User created");
    Ok(id)
}

/// Admin edit. An empty password keeps the current one.
pub async fn update(pool: &DbPool, id: i64, input: &UserInput) -> Result<(), StoreError> {
    let result = if input.password.is_empty() {
        sqlx::query("UPDATE users SET username = ?, email = ?, is_admin = ? WHERE id = ?")
            .bind(&input.username)
            .bind(clean_email(input.email.as_deref()))
            .bind(input.is_admin)
            .bind(id)
            .execute(pool)
            .await
    } else {
        let password_hash = crypto::hash_password(&input.password)?;
        sqlx::query(
            "UPDATE users SET username = ?, email = ?, is_admin = ?, password_hash = ? WHERE id = ?",
        )
        .bind(&input.username)
        .bind(clean_email(input.email.as_deref()))
        .bind(input.is_admin)
        .bind(&password_hash)
        .bind(id)
        .execute(pool)
        .await
    }
    .map_err(|e| StoreError::on_unique(e, DUPLICATE_USER))?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound("User"));
    }
    Ok(())
}

pub async fn set_admin(pool: &DbPool, id: i64, is_admin: bool) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE users SET is_admin = ? WHERE id = ?")
        .bind(is_admin)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound("User"));
    }
    info!(user_id = id, is_admin, "Admin flag changed");
    Ok(())
}

pub async fn set_password(pool: &DbPool, id: i64, password: &str) -> Result<(), StoreError> {
    let password_hash = crypto::hash_password(password)?;
    let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound("User"));
    }
    Ok(())
}

/// Mark the account deleted. The row and its sessions are kept.
pub async fn soft_delete(pool: &DbPool, id: i64) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE users SET account_status = ? WHERE id = ?")
        .bind(AccountStatus::Deleted.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound("User"));
    }
    info!(user_id = id, "User deactivated");
    Ok(())
}

/// Remove the row for good. Sessions it owned become unowned.
pub async fn purge(pool: &DbPool, id: i64) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound("User"));
    }
    info!(user_id = id, "User permanently deleted");
    Ok(())
}

pub async fn touch_last_login(pool: &DbPool, id: i64) -> Result<(), StoreError> {
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn count_admins(pool: &DbPool) -> Result<i64, StoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_admin = 1")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Self-service change of email and/or password.
///
/// A new password requires the current one. A new email must not belong to
/// another account. Both checks and writes share one transaction.
pub async fn update_profile(
    pool: &DbPool,
    id: i64,
    req: &ProfileUpdateRequest,
) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    let current_hash: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("User"))?;

    if !req.new_password.is_empty() {
        if !crypto::verify_password(&req.current_password, &current_hash) {
            return Err(StoreError::Invalid("Current password is incorrect".to_string()));
        }
        let password_hash = crypto::hash_password(&req.new_password)?;
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(&password_hash)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(email) = req.email.as_deref() {
        let email = clean_email(Some(email));
        if let Some(email) = &email {
            let taken: Option<i64> =
                sqlx::query_scalar("SELECT id FROM users WHERE email = ? AND id != ?")
                    .bind(email)
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if taken.is_some() {
                return Err(StoreError::Conflict("Email is already in use".to_string()));
            }
        }
        sqlx::query("UPDATE users SET email = ? WHERE id = ?")
            .bind(&email)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}
