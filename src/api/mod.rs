pub mod auth;
pub mod error;
mod notes;
mod sessions;
mod stats;
mod system;
mod tags;
mod timers;
mod users;
pub mod validation;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public auth routes
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/register", post(auth::register))
        .route("/auth/status", get(auth::auth_status));

    // Authenticated routes; handlers extract CurrentUser/AdminUser themselves
    let api_routes = Router::new()
        // Current user
        .route("/user/current", get(auth::current_user))
        .route("/user/update", put(users::update_profile))
        // Sessions
        .route(
            "/sessions",
            get(sessions::list_sessions).post(sessions::create_session),
        )
        .route(
            "/sessions/:id",
            get(sessions::get_session)
                .put(sessions::update_session)
                .delete(sessions::delete_session),
        )
        // Pomodoros: GET takes a session id, PUT a pomodoro id
        .route("/pomodoros", post(timers::create_pomodoro))
        .route(
            "/pomodoros/:id",
            get(timers::list_pomodoros).put(timers::update_pomodoro),
        )
        // Breaks: GET takes a session id, PUT a break id
        .route("/breaks", post(timers::create_break))
        .route(
            "/breaks/:id",
            get(timers::list_breaks).put(timers::update_break),
        )
        // Notes: GET takes a session id, PUT/DELETE a note id
        .route(
            "/notes",
            get(notes::list_all_notes).post(notes::create_note),
        )
        .route(
            "/notes/:id",
            get(notes::list_session_notes)
                .put(notes::update_note)
                .delete(notes::delete_note),
        )
        // Tags
        .route("/tags", get(tags::list_tags).post(tags::create_tag))
        .route("/tags/recount", post(tags::recount_tags))
        .route("/tags/:id", put(tags::update_tag).delete(tags::delete_tag))
        // Stats
        .route("/stats/monthly-tags", get(stats::monthly_tag_stats))
        // Admin
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            put(users::update_user).delete(users::delete_user),
        )
        .route("/users/:id/admin", put(users::set_admin))
        .route("/users/:id/reset-password", post(users::reset_password))
        .route("/users/:id/permanent", axum::routing::delete(users::purge_user))
        .route("/db-stats", get(system::database_stats))
        .route("/check-integrity", post(system::check_integrity));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", auth_routes.merge(api_routes))
        .merge(crate::ui::create_router(&state.config.server))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
