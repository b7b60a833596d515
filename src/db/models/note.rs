//! Session note models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Note {
    pub id: i64,
    pub session_id: i64,
    pub pomodoro_id: Option<i64>,
    #[serde(rename = "note")]
    #[sqlx(rename = "note")]
    pub text: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub session_id: i64,
    #[serde(default)]
    pub pomodoro_id: Option<i64>,
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
    pub note: String,
}
