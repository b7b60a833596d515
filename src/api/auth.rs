//! Authentication gateway.
//!
//! Login issues a signed token in an HTTP-only cookie. Every authenticated
//! request reloads the user named in the token and re-checks the live admin
//! flag and account status, so demoting or deactivating an account takes
//! effect immediately even though tokens themselves are never revoked.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_password, validate_username};
use crate::config::AuthConfig;
use crate::crypto;
use crate::db::{self, DbPool, LoginRequest, LoginResponse, RegisterRequest, User, UserSummary};
use crate::AppState;

/// Cookie carrying the session token
pub const AUTH_COOKIE: &str = "auth_token";

#[derive(Serialize)]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

/// Check credentials and issue a token.
///
/// Unknown users and wrong passwords yield the same error.
pub async fn authenticate(
    db: &DbPool,
    auth: &AuthConfig,
    username: &str,
    password: &str,
) -> Result<(String, User), ApiError> {
    let user = db::users::get_by_username(db, username)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !user.is_active() {
        return Err(ApiError::account_inactive());
    }

    if !crypto::verify_password(password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    db::users::touch_last_login(db, user.id).await?;

    let token = crypto::issue_token(
        &auth.jwt_secret,
        &user.username,
        user.is_admin,
        auth.token_ttl_hours,
    )?;

    Ok((token, user))
}

/// Resolve a token to a live, active user.
pub async fn resolve_user(db: &DbPool, secret: &str, token: &str) -> Result<User, ApiError> {
    let claims = crypto::verify_token(secret, token)?;

    let user = db::users::get_by_username(db, &claims.name)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    if !user.is_active() {
        return Err(ApiError::unauthorized("Account is not active"));
    }

    Ok(user)
}

/// Allow admins and owners of the session (or anyone, for unowned sessions).
pub async fn require_owner_or_admin(
    db: &DbPool,
    user: &User,
    session_id: i64,
) -> Result<(), ApiError> {
    if user.is_admin {
        return Ok(());
    }

    if db::sessions::is_owner(db, session_id, user.id).await? {
        Ok(())
    } else {
        Err(ApiError::forbidden("You do not have access to this session"))
    }
}

/// Create the default admin account when no admin exists.
///
/// Failures are logged; startup continues.
pub async fn ensure_admin_user(db: &DbPool, auth: &AuthConfig) {
    match db::users::count_admins(db).await {
        Ok(0) => {}
        Ok(_) => return,
        Err(e) => {
            warn!(error = %e, "Could not check for admin users");
            return;
        }
    }

    match db::users::create(
        db,
        &auth.default_admin_username,
        &auth.default_admin_password,
        None,
        true,
    )
    .await
    {
        Ok(id) => info!(
            user_id = id,
            username = %auth.default_admin_username,
            "Created default admin user"
        ),
        Err(e) => warn!(
            error = %e,
            username = %auth.default_admin_username,
            "Failed to create default admin user"
        ),
    }
}

/// Token from the auth cookie, falling back to a bearer header
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(AUTH_COOKIE) {
        return Some(cookie.value().to_string());
    }

    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

fn auth_cookie(token: String, ttl_hours: i64) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(ttl_hours))
        .build()
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let (token, user) =
        authenticate(&state.db, &state.config.auth, &request.username, &request.password).await?;

    info!(user_id = user.id, username = %user.username, "User logged in");

    let jar = jar.add(auth_cookie(token.clone(), state.config.auth.token_ttl_hours));
    Ok((
        jar,
        Json(LoginResponse {
            message: "Login successful".to_string(),
            token,
            user: UserSummary::from(&user),
        }),
    ))
}

/// Logout endpoint
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(AUTH_COOKIE).path("/").build());
    (
        jar,
        Json(serde_json::json!({ "message": "Logged out successfully" })),
    )
}

/// Whether the caller holds a valid token. Never fails.
pub async fn auth_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<AuthStatusResponse> {
    let user = match extract_token(&headers) {
        Some(token) => resolve_user(&state.db, &state.config.auth.jwt_secret, &token)
            .await
            .ok(),
        None => None,
    };

    Json(AuthStatusResponse {
        authenticated: user.is_some(),
        user: user.as_ref().map(UserSummary::from),
    })
}

pub async fn current_user(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

/// Self-registration, when enabled
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if !state.config.auth.allow_registration {
        return Err(ApiError::forbidden("Registration is disabled"));
    }

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_username(&request.username) {
        errors.add("username", &e);
    }
    if let Err(e) = validate_password(&request.password) {
        errors.add("password", &e);
    }
    if let Err(e) = validate_email(&request.email) {
        errors.add("email", &e);
    }
    errors.finish()?;

    let id = db::users::create(
        &state.db,
        &request.username,
        &request.password,
        request.email.as_deref(),
        false,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "Registration successful", "id": id })),
    ))
}

/// Extractor for the authenticated, active user
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        let user = resolve_user(&state.db, &state.config.auth.jwt_secret, &token).await?;
        Ok(CurrentUser(user))
    }
}

/// Extractor for an authenticated user with the admin flag set
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(ApiError::forbidden("Admin access required"));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::db::init_memory;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_authenticate_hides_which_part_was_wrong() {
        let db = init_memory().await.unwrap();
        let auth = auth_config();
        db::users::create(&db, "alice", "correct-horse", None, false)
            .await
            .unwrap();

        let unknown = authenticate(&db, &auth, "nobody", "whatever").await.unwrap_err();
        let wrong = authenticate(&db, &auth, "alice", "battery").await.unwrap_err();
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.message(), wrong.message());
        assert_eq!(unknown.code(), wrong.code());
    }

    #[tokio::test]
    async fn test_authenticate_success_touches_last_login() {
        let db = init_memory().await.unwrap();
        let auth = auth_config();
        let id = db::users::create(&db, "alice", "correct-horse", None, true)
            .await
            .unwrap();

        let (token, user) = authenticate(&db, &auth, "alice", "correct-horse")
            .await
            .unwrap();
        assert_eq!(user.id, id);

        let claims = crypto::verify_token(&auth.jwt_secret, &token).unwrap();
        assert_eq!(claims.name, "alice");
        assert!(claims.admin);
        assert!(db::users::get_by_id(&db, id).await.unwrap().last_login.is_some());
    }

    #[tokio::test]
    async fn test_inactive_account_cannot_log_in() {
        let db = init_memory().await.unwrap();
        let auth = auth_config();
        let id = db::users::create(&db, "alice", "correct-horse", None, false)
            .await
            .unwrap();
        db::users::soft_delete(&db, id).await.unwrap();

        let err = authenticate(&db, &auth, "alice", "correct-horse")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccountInactive);
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_token_stops_working_after_soft_delete() {
        let db = init_memory().await.unwrap();
        let auth = auth_config();
        let id = db::users::create(&db, "alice", "correct-horse", None, false)
            .await
            .unwrap();
        let (token, _) = authenticate(&db, &auth, "alice", "correct-horse")
            .await
            .unwrap();
        assert!(resolve_user(&db, &auth.jwt_secret, &token).await.is_ok());

        db::users::soft_delete(&db, id).await.unwrap();

        let err = resolve_user(&db, &auth.jwt_secret, &token).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_resolve_uses_live_admin_flag() {
        let db = init_memory().await.unwrap();
        let auth = auth_config();
        let id = db::users::create(&db, "root", "correct-horse", None, true)
            .await
            .unwrap();
        let (token, _) = authenticate(&db, &auth, "root", "correct-horse").await.unwrap();

        db::users::set_admin(&db, id, false).await.unwrap();

        let user = resolve_user(&db, &auth.jwt_secret, &token).await.unwrap();
        assert!(!user.is_admin);
    }

    #[tokio::test]
    async fn test_resolve_rejects_foreign_signature() {
        let db = init_memory().await.unwrap();
        db::users::create(&db, "alice", "correct-horse", None, false)
            .await
            .unwrap();
        let forged = crypto::issue_token("other-secret", "alice", true, 1).unwrap();

        let err = resolve_user(&db, "test-secret", &forged).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_owner_or_admin_rules() {
        let db = init_memory().await.unwrap();
        let a = db::users::create(&db, "alice", "pw-alice-1", None, false).await.unwrap();
        let b = db::users::create(&db, "bob", "pw-bob-12", None, false).await.unwrap();
        let admin = db::users::create(&db, "root", "pw-root-1", None, true).await.unwrap();
        let alice = db::users::get_by_id(&db, a).await.unwrap();
        let bob = db::users::get_by_id(&db, b).await.unwrap();
        let root = db::users::get_by_id(&db, admin).await.unwrap();

        let owned = db::sessions::create(&db, "2024-03-10T09:00:00.000Z", "", Some(a))
            .await
            .unwrap();
        let shared = db::sessions::create(&db, "2024-03-10T10:00:00.000Z", "", None)
            .await
            .unwrap();

        assert!(require_owner_or_admin(&db, &alice, owned).await.is_ok());
        assert!(require_owner_or_admin(&db, &root, owned).await.is_ok());
        assert!(require_owner_or_admin(&db, &bob, shared).await.is_ok());

        let err = require_owner_or_admin(&db, &bob, owned).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err = require_owner_or_admin(&db, &bob, 999).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ensure_admin_user_runs_once() {
        let db = init_memory().await.unwrap();
        let auth = auth_config();

        ensure_admin_user(&db, &auth).await;
        ensure_admin_user(&db, &auth).await;

        let users = db::users::list(&db).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "admin");
        assert!(users[0].is_admin);
        assert!(crypto::verify_password(
            &auth.default_admin_password,
            &users[0].password_hash
        ));
    }

    #[test]
    fn test_extract_token_prefers_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer from-header".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));

        headers.insert("Cookie", "theme=dark; auth_token=from-cookie".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));

        assert!(extract_token(&HeaderMap::new()).is_none());
    }
}
