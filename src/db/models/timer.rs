//! Work interval (pomodoro) and break models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Pomodoro {
    pub id: i64,
    pub session_id: i64,
    /// 1-based position within the session
    pub number: i64,
    pub start_time: String,
    pub end_time: Option<String>,
    /// Seconds
    pub duration: i64,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakKind {
    Short,
    Long,
}

impl std::str::FromStr for BreakKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(Self::Short),
            "long" => Ok(Self::Long),
            _ => Err(format!("Unknown break type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Break {
    pub id: i64,
    pub session_id: i64,
    /// The pomodoro this break follows
    pub pomodoro_id: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub duration: i64,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePomodoroRequest {
    pub session_id: i64,
    pub number: i64,
    pub start_time: String,
    #[serde(default = "default_running")]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateBreakRequest {
    pub session_id: i64,
    pub pomodoro_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub start_time: String,
    #[serde(default = "default_running")]
    pub status: String,
}

/// Completion payload shared by pomodoros and breaks
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateIntervalRequest {
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub duration: i64,
    pub status: String,
}

fn default_running() -> String {
    "running".to_string()
}
