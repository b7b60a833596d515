// Browser pages. Each page is a static HTML stub that boots the client
// application; the server only decides whether the caller may see it.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};

use crate::api::auth::{extract_token, resolve_user};
use crate::config::ServerConfig;
use crate::db::User;
use crate::AppState;

/// Who may open a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Public,
    User,
    Admin,
}

pub fn create_router(server: &ServerConfig) -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(login_page))
        .route("/", get(index_page))
        .route("/history", get(history_page))
        .route("/notes", get(notes_page))
        .route("/activities", get(activities_page))
        .route("/profile", get(profile_page))
        .route("/admin", get(admin_page))
        .route("/admin/users", get(admin_users_page))
        .route_service(
            "/manifest.json",
            ServeFile::new(server.static_dir.join("manifest.json")),
        )
        .nest_service("/static", ServeDir::new(&server.static_dir))
}

async fn current_user(state: &AppState, headers: &HeaderMap) -> Option<User> {
    let token = extract_token(headers)?;
    resolve_user(&state.db, &state.config.auth.jwt_secret, &token)
        .await
        .ok()
}

async fn render_page(state: &AppState, headers: &HeaderMap, file: &str, access: Access) -> Response {
    if access != Access::Public {
        match current_user(state, headers).await {
            None => return Redirect::to("/login").into_response(),
            Some(user) if access == Access::Admin && !user.is_admin => {
                return Redirect::to("/").into_response()
            }
            Some(_) => {}
        }
    }

    read_template(&state.config.server.templates_dir, file).await
}

async fn read_template(dir: &Path, file: &str) -> Response {
    let path = dir.join(file);
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to load page template");
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

async fn login_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    render_page(&state, &headers, "login.html", Access::Public).await
}

async fn index_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    render_page(&state, &headers, "index.html", Access::User).await
}

async fn history_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    render_page(&state, &headers, "history.html", Access::User).await
}

async fn notes_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    render_page(&state, &headers, "notes.html", Access::User).await
}

async fn activities_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    render_page(&state, &headers, "activities.html", Access::User).await
}

async fn profile_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    render_page(&state, &headers, "profile.html", Access::User).await
}

async fn admin_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    render_page(&state, &headers, "admin.html", Access::Admin).await
}

async fn admin_users_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    render_page(&state, &headers, "admin_users.html", Access::Admin).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::crypto;
    use crate::db::{self, init_memory};
    use axum::{body::Body, http::header, http::Request};
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn test_app(templates: &Path) -> (Router, Arc<AppState>) {
        let db = init_memory().await.unwrap();
        let mut config = Config::default();
        config.auth.jwt_secret = "ui-test-secret".to_string();
        config.server.templates_dir = templates.to_path_buf();

        let state = Arc::new(AppState::new(config, db));
        let router = create_router(&state.config.server).with_state(state.clone());
        (router, state)
    }

    fn scratch_templates() -> TempDir {
        let dir = TempDir::new().unwrap();
        for page in ["login.html", "index.html", "admin.html"] {
            std::fs::write(dir.path().join(page), format!("<html>{}</html>", page)).unwrap();
        }
        dir
    }

    async fn get(app: &Router, uri: &str, token: Option<&str>) -> Response {
        let mut builder = Request::get(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("auth_token={}", token));
        }
        app.clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_login_page_is_public() {
        let dir = scratch_templates();
        let (app, _) = test_app(dir.path()).await;

        let response = get(&app, "/login", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_pages_redirect_without_a_valid_cookie() {
        let dir = scratch_templates();
        let (app, _) = test_app(dir.path()).await;

        let response = get(&app, "/", None).await;
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/login");

        let response = get(&app, "/history", Some("not-a-jwt")).await;
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn test_admin_pages_need_an_admin() {
        let dir = scratch_templates();
        let (app, state) = test_app(dir.path()).await;
        db::users::create(&state.db, "alice", "alice-pass", None, false)
            .await
            .unwrap();
        db::users::create(&state.db, "root", "root-pass", None, true)
            .await
            .unwrap();
        let secret = &state.config.auth.jwt_secret;
        let alice = crypto::issue_token(secret, "alice", false, 1).unwrap();
        let root = crypto::issue_token(secret, "root", true, 1).unwrap();

        let response = get(&app, "/", Some(&alice)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = get(&app, "/admin", Some(&alice)).await;
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/");

        let response = get(&app, "/admin", Some(&root)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_template_is_a_server_error() {
        let dir = scratch_templates();
        let (app, state) = test_app(dir.path()).await;
        db::users::create(&state.db, "alice", "alice-pass", None, false)
            .await
            .unwrap();
        let token = crypto::issue_token(&state.config.auth.jwt_secret, "alice", false, 1).unwrap();

        let response = get(&app, "/profile", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
