//! Input validation for API requests.
//!
//! Each function checks one field and returns a message suitable for the
//! client. Collect several with `ValidationErrorBuilder` from the `error`
//! module.

use chrono::DateTime;
use lazy_static::lazy_static;
use regex::Regex;

use crate::db::{BreakKind, TimerStatus};

lazy_static! {
    /// Usernames: letters, digits, dot, dash and underscore
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap();

    /// Loose email shape check; delivery is never attempted
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();

    /// `#rgb` or `#rrggbb`
    static ref COLOR_REGEX: Regex =
        Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap();
}

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Parse a numeric path id, e.g. `parse_id("12", "session")`
pub fn parse_id(raw: &str, label: &str) -> Result<i64, String> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(format!("Invalid {} ID", label)),
    }
}

pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }

    if username.len() < 3 || username.len() > 32 {
        return Err("Username must be between 3 and 32 characters".to_string());
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err(
            "Username may only contain letters, digits, dots, dashes and underscores".to_string(),
        );
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    Ok(())
}

/// Validate an optional email (empty means none)
pub fn validate_email(email: &Option<String>) -> Result<(), String> {
    match email.as_deref().map(str::trim) {
        None | Some("") => Ok(()),
        Some(e) if e.len() > 254 => Err("Email is too long (max 254 characters)".to_string()),
        Some(e) if EMAIL_REGEX.is_match(e) => Ok(()),
        Some(_) => Err("Invalid email format".to_string()),
    }
}

pub fn validate_status(status: &str) -> Result<(), String> {
    status.parse::<TimerStatus>().map(|_| ())
}

pub fn validate_break_type(kind: &str) -> Result<(), String> {
    kind.parse::<BreakKind>().map(|_| ())
}

pub fn validate_pomodoro_number(number: i64) -> Result<(), String> {
    if number < 1 {
        return Err("Pomodoro number must be at least 1".to_string());
    }
    Ok(())
}

/// Durations, totals and counters
pub fn validate_non_negative(value: i64, label: &str) -> Result<(), String> {
    if value < 0 {
        return Err(format!("{} cannot be negative", label));
    }
    Ok(())
}

pub fn validate_year(year: i32) -> Result<(), String> {
    if !(1970..=9999).contains(&year) {
        return Err("Year must be between 1970 and 9999".to_string());
    }
    Ok(())
}

/// ISO-8601 / RFC 3339 timestamp as produced by `Date.toISOString()`
pub fn validate_timestamp(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("Timestamp is required".to_string());
    }
    DateTime::parse_from_rfc3339(value)
        .map(|_| ())
        .map_err(|_| format!("Invalid timestamp: {}", value))
}

/// Validate an optional end timestamp
pub fn validate_optional_timestamp(value: &Option<String>) -> Result<(), String> {
    match value.as_deref() {
        None | Some("") => Ok(()),
        Some(v) => validate_timestamp(v),
    }
}

pub fn validate_tag_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Tag name is required".to_string());
    }

    if name.contains(',') {
        return Err("Tag name cannot contain commas".to_string());
    }

    if name.chars().count() > 50 {
        return Err("Tag name is too long (max 50 characters)".to_string());
    }

    Ok(())
}

pub fn validate_color(color: &str) -> Result<(), String> {
    if !COLOR_REGEX.is_match(color) {
        return Err("Color must be a hex value like #3498db".to_string());
    }
    Ok(())
}
