use crate::{
    AppState,
    handlers::{self, articles, auth, bookings, fixtures, merchandise, squad},
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Public Router Module
///
/// Endpoints reachable without a session: every collection read, the trial
/// form, registration and the password recovery flow.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        .route("/health", get(handlers::health))
        // POST /submit-trial
        // The trial form on the public site posts here; `/api/bookings` is the same handler.
        .route("/submit-trial", post(bookings::submit_trial))
        .route("/api/bookings", post(bookings::submit_trial))
        // --- Auth ---
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", get(auth::logout))
        .route("/api/auth/check-auth", get(auth::check_auth))
        .route("/api/auth/verify-email/{token}", get(auth::verify_email))
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/reset-password/{token}", put(auth::reset_password))
        // --- Articles ---
        // Curated views only return published articles; the list itself
        // accepts any filter, `status` included.
        .route("/api/articles", get(articles::get_articles))
        .route("/api/articles/featured", get(articles::get_featured_articles))
        .route("/api/articles/search", get(articles::search_articles))
        .route(
            "/api/articles/category/{category}",
            get(articles::get_articles_by_category),
        )
        .route("/api/articles/slug/{slug}", get(articles::get_article_by_slug))
        .route("/api/articles/{id}", get(articles::get_article))
        // --- Fixtures ---
        .route("/api/fixtures", get(fixtures::get_fixtures))
        .route("/api/fixtures/upcoming", get(fixtures::get_upcoming_fixtures))
        .route("/api/fixtures/results", get(fixtures::get_recent_results))
        .route("/api/fixtures/{id}", get(fixtures::get_fixture))
        // --- Merchandise ---
        .route("/api/merchandise", get(merchandise::get_merchandise))
        .route(
            "/api/merchandise/featured",
            get(merchandise::get_featured_merchandise),
        )
        .route("/api/merchandise/search", get(merchandise::search_merchandise))
        .route(
            "/api/merchandise/category/{category}",
            get(merchandise::get_merchandise_by_category),
        )
        .route(
            "/api/merchandise/slug/{slug}",
            get(merchandise::get_merchandise_by_slug),
        )
        .route("/api/merchandise/{id}", get(merchandise::get_merchandise_item))
        // --- Squad ---
        .route("/api/players", get(squad::get_players))
        .route("/api/players/{id}", get(squad::get_player))
        .route("/api/teams", get(squad::get_teams))
        .route("/api/teams/{id}", get(squad::get_team))
        .route("/api/tournaments", get(squad::get_tournaments))
        .route("/api/tournaments/{id}", get(squad::get_tournament))
}
