use crate::{
    AppState,
    handlers::{articles, auth, dashboard, squad},
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the session middleware, which resolves the
/// `AuthUser` once and leaves it in the request extensions for the handler.
/// Article ownership is checked inside the article handlers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Own Account ---
        .route("/api/auth/me", get(auth::get_me))
        .route("/api/auth/update-details", put(auth::update_details))
        .route("/api/auth/update-password", put(auth::update_password))
        // GET /api/dashboard/stats
        .route("/api/dashboard/stats", get(dashboard::get_dashboard_stats))
        // --- Articles ---
        // Author or admin only for update, delete and image upload.
        .route("/api/articles", post(articles::create_article))
        .route(
            "/api/articles/{id}",
            put(articles::update_article).delete(articles::delete_article),
        )
        .route("/api/articles/{id}/image", put(articles::upload_article_image))
        // --- Squad ---
        .route("/api/players", post(squad::create_player))
        .route(
            "/api/players/{id}",
            put(squad::update_player).delete(squad::delete_player),
        )
        .route("/api/teams", post(squad::create_team))
        .route(
            "/api/teams/{id}",
            put(squad::update_team).delete(squad::delete_team),
        )
        .route("/api/tournaments", post(squad::create_tournament))
        .route(
            "/api/tournaments/{id}",
            put(squad::update_tournament).delete(squad::delete_tournament),
        )
}
