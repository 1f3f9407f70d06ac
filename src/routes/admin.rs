use crate::{
    AppState,
    handlers::{auth, bookings, fixtures, merchandise},
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Wrapped in the admin middleware: no session is a 401, any other role a 403.
/// The handlers also take `RequireAdmin`, so the check holds wherever they are
/// mounted.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // --- Fixtures ---
        .route("/api/fixtures", post(fixtures::create_fixture))
        .route(
            "/api/fixtures/{id}",
            put(fixtures::update_fixture).delete(fixtures::delete_fixture),
        )
        .route("/api/fixtures/{id}/result", put(fixtures::update_fixture_result))
        // --- Merchandise ---
        .route("/api/merchandise", post(merchandise::create_merchandise))
        .route(
            "/api/merchandise/{id}",
            put(merchandise::update_merchandise).delete(merchandise::delete_merchandise),
        )
        .route(
            "/api/merchandise/{id}/image",
            put(merchandise::upload_merchandise_image),
        )
        // --- Bookings ---
        .route("/api/bookings", get(bookings::list_bookings))
        .route(
            "/api/bookings/{id}/status",
            put(bookings::update_booking_status),
        )
        // --- Users ---
        .route("/api/auth/users", get(auth::get_users))
        .route(
            "/api/auth/users/{id}",
            get(auth::get_user)
                .put(auth::update_user)
                .delete(auth::delete_user),
        )
}
