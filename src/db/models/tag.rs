//! Tag catalog models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
    /// Number of sessions whose tag list currently contains `name`
    pub usage_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
    /// Auto-assigned from the palette when missing or empty
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTagRequest {
    pub name: String,
    pub color: String,
}

/// A tag whose stored usage count disagrees with the session tag strings
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TagCountMismatch {
    pub name: String,
    pub stored: i64,
    pub actual: i64,
}
