//! User models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Deleted,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub email: Option<String>,
    pub is_admin: bool,
    pub account_status: String,
    pub created_at: String,
    pub last_login: Option<String>,
}

impl User {
    /// Anything other than an explicit `active` marker counts as inactive.
    pub fn is_active(&self) -> bool {
        self.account_status == AccountStatus::Active.as_str()
    }
}

/// Compact identity returned alongside a freshly issued token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: UserSummary,
}

/// Admin-side create/update payload
#[derive(Debug, Clone, Deserialize)]
pub struct UserInput {
    pub username: String,
    /// Empty or missing keeps the current password on update
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

/// Self-service profile change
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdateRequest {
    /// `Some("")` clears the email, `None` leaves it untouched
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_is_never_serialized() {
        let user = User {
            id: 1,
            username: "ada".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            email: None,
            is_admin: true,
            account_status: "active".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            last_login: None,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "ada");

        let summary = serde_json::to_value(UserSummary::from(&user)).unwrap();
        assert_eq!(summary["isAdmin"], true);
    }

    #[test]
    fn test_unknown_status_is_inactive() {
        let mut user = User {
            id: 2,
            username: "bob".to_string(),
            password_hash: String::new(),
            email: None,
            is_admin: false,
            account_status: "deleted".to_string(),
            created_at: String::new(),
            last_login: None,
        };
        assert!(!user.is_active());
        user.account_status = "active".to_string();
        assert!(user.is_active());
    }
}
