use std::{any::Any, path::Path};

use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::any,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod models;
pub mod query;
pub mod repository;
pub mod session;
pub mod storage;

pub mod routes;
use auth::{AuthGate, AuthUser, RequireAdmin};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use mail::{LogMailer, MailerState, MockMailer};
pub use repository::{MemoryStore, PostgresStore, Repository};
pub use session::{MemorySessionStore, PostgresSessionStore, SessionState};
pub use storage::{LocalDiskStorage, MockStorageService, StorageState};

/// ApiDoc
///
/// OpenAPI document for every `/api` endpoint, served at
/// `/api-docs/openapi.json` and browsable under `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::articles::get_articles, handlers::articles::get_featured_articles,
        handlers::articles::get_articles_by_category, handlers::articles::search_articles,
        handlers::articles::get_article, handlers::articles::get_article_by_slug,
        handlers::articles::create_article, handlers::articles::update_article,
        handlers::articles::delete_article, handlers::articles::upload_article_image,
        handlers::fixtures::get_fixtures, handlers::fixtures::get_upcoming_fixtures,
        handlers::fixtures::get_recent_results, handlers::fixtures::get_fixture,
        handlers::fixtures::create_fixture, handlers::fixtures::update_fixture,
        handlers::fixtures::update_fixture_result, handlers::fixtures::delete_fixture,
        handlers::merchandise::get_merchandise, handlers::merchandise::get_featured_merchandise,
        handlers::merchandise::get_merchandise_by_category, handlers::merchandise::search_merchandise,
        handlers::merchandise::get_merchandise_item, handlers::merchandise::get_merchandise_by_slug,
        handlers::merchandise::create_merchandise, handlers::merchandise::update_merchandise,
        handlers::merchandise::delete_merchandise, handlers::merchandise::upload_merchandise_image,
        handlers::squad::get_players, handlers::squad::get_player, handlers::squad::create_player,
        handlers::squad::update_player, handlers::squad::delete_player,
        handlers::squad::get_teams, handlers::squad::get_team, handlers::squad::create_team,
        handlers::squad::update_team, handlers::squad::delete_team,
        handlers::squad::get_tournaments, handlers::squad::get_tournament,
        handlers::squad::create_tournament, handlers::squad::update_tournament,
        handlers::squad::delete_tournament,
        handlers::bookings::submit_trial, handlers::bookings::list_bookings,
        handlers::bookings::update_booking_status,
        handlers::auth::register, handlers::auth::login, handlers::auth::logout,
        handlers::auth::check_auth, handlers::auth::get_me, handlers::auth::verify_email,
        handlers::auth::forgot_password, handlers::auth::reset_password,
        handlers::auth::update_details, handlers::auth::update_password,
        handlers::auth::get_users, handlers::auth::get_user, handlers::auth::update_user,
        handlers::auth::delete_user,
        handlers::dashboard::get_dashboard_stats,
    ),
    components(
        schemas(
            error::FieldError, query::Pagination, query::PageRef,
            models::Article, models::ArticleCategory, models::ArticleStatus,
            models::CreateArticleRequest, models::UpdateArticleRequest,
            models::Fixture, models::FixtureStatus, models::TeamSide, models::FixtureResult,
            models::Tickets, models::Venue, models::ResultUpdate, models::CreateFixtureRequest,
            models::UpdateFixtureRequest, models::UpdateResultRequest,
            models::Merchandise, models::MerchandiseCategory, models::CreateMerchandiseRequest,
            models::Player, models::PlayerRequest, models::Team, models::TeamView,
            models::TeamRequest, models::Tournament, models::TournamentView,
            models::TournamentStatus, models::TournamentRequest,
            models::Booking, models::BookingStatus, models::Position,
            models::UpdateBookingStatusRequest,
            models::Role, models::UserView, models::UserSummary, models::LoginResponse,
            models::SessionUser,
            models::AuthStatus, models::RegisterRequest, models::LoginRequest,
            models::ForgotPasswordRequest, models::ResetPasswordRequest,
            models::UpdateDetailsRequest, models::UpdatePasswordRequest,
            models::AdminUpdateUserRequest,
            handlers::dashboard::DashboardStats, handlers::dashboard::CollectionCounts,
            handlers::dashboard::ArticleStatusCounts, handlers::dashboard::ArticleSummary,
            handlers::dashboard::MerchandiseSummary,
        )
    ),
    tags(
        (name = "fennec-fc", description = "Fennec FC club website and CMS API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The services shared by every request. Each field is an `Arc` or cheap to
/// clone; handlers pull what they need through `State<AppState>` or the
/// `FromRef` impls below.
#[derive(Clone)]
pub struct AppState {
    pub repo: Repository,
    pub sessions: SessionState,
    pub storage: StorageState,
    pub mailer: MailerState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for Repository {
    fn from_ref(app_state: &AppState) -> Repository {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for MailerState {
    fn from_ref(app_state: &AppState) -> MailerState {
        app_state.mailer.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for AuthGate {
    fn from_ref(app_state: &AppState) -> AuthGate {
        AuthGate::new(
            app_state.repo.clone(),
            app_state.sessions.clone(),
            app_state.config.session_ttl(),
        )
    }
}

/// auth_middleware
///
/// Rejects requests without a live session before the handler runs. The
/// resolved `AuthUser` stays in the request extensions, so the handler's own
/// extractor does not hit the session store again.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// admin_middleware
///
/// As `auth_middleware`, plus the admin role check.
async fn admin_middleware(_admin: RequireAdmin, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// Last-resort handler for panics inside a request: logs and answers with the
/// generic 500 envelope.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    AppError::Internal(format!("request handler panicked: {detail}")).into_response()
}

/// create_router
///
/// Assembles the API groups with their gates, the generated docs, the upload
/// directory and the static site, then applies the global layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(AnyOrigin)
        .allow_origin(AnyOrigin)
        .allow_headers(AnyOrigin);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Static site: uploaded files, then any non-API path falls back to the SPA entry page.
    let uploads = ServeDir::new(&state.config.upload_dir);
    let site = ServeDir::new(&state.config.public_dir)
        .not_found_service(ServeFile::new(Path::new(&state.config.public_dir).join("index.html")));

    // 3. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .merge(
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                admin_middleware,
            )),
        )
        // Unmatched API paths answer with the JSON envelope, never the SPA page.
        .route("/api/{*rest}", any(handlers::api_not_found))
        .nest_service("/uploads", uploads)
        .fallback_service(site)
        .with_state(state);

    // 4. Observability, correlation and panic recovery
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(CatchPanicLayer::custom(handle_panic)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, tagged with the `x-request-id` set above so every log
/// line of the request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
