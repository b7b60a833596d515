//! Work session models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle shared by sessions, pomodoros and breaks.
///
/// `running` may move to either terminal state; terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Running,
    Completed,
    Stopped,
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn can_transition_to(&self, next: TimerStatus) -> bool {
        *self == next || !self.is_terminal()
    }
}

impl std::fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "stopped" => Ok(Self::Stopped),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: i64,
    pub start_time: String,
    pub end_time: Option<String>,
    pub total_time: i64,
    pub status: String,
    pub completed_pomodoros: i64,
    pub tags: String,
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub start_time: String,
    #[serde(default)]
    pub tags: String,
}

/// Full replacement of a session's mutable fields
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSessionRequest {
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub total_time: i64,
    pub status: String,
    #[serde(default)]
    pub completed_pomodoros: i64,
    #[serde(default)]
    pub tags: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListSessionsQuery {
    pub tag: Option<String>,
    pub range: Option<String>,
    pub days: Option<String>,
}
