use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::Value;

use super::{ApiJson, ApiQuery, Envelope, LimitParams, QueryPairs, parse_id};
use crate::{
    AppState,
    auth::RequireAdmin,
    error::AppError,
    models::{
        CreateFixtureRequest, FIXTURE_LIST, Fixture, FixtureStatus, UpdateFixtureRequest,
        UpdateResultRequest,
    },
    query::{CompareOp, Filter},
    repository::Collection,
};

const NOT_FOUND: &str = "Fixture not found";
const UPCOMING_LIMIT: u64 = 5;
const RESULTS_LIMIT: u64 = 10;

async fn load(state: &AppState, raw_id: &str) -> Result<Fixture, AppError> {
    let id = parse_id(raw_id, NOT_FOUND)?;
    state
        .repo
        .get::<Fixture>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

async fn store(state: &AppState, fixture: &Fixture) -> Result<(), AppError> {
    if state.repo.save(fixture).await? {
        Ok(())
    } else {
        Err(AppError::NotFound(NOT_FOUND.into()))
    }
}

/// get_fixtures
///
/// [Public Route] Lists fixtures through the shared query grammar; earliest
/// date first by default.
#[utoipa::path(
    get,
    path = "/api/fixtures",
    responses(
        (status = 200, description = "Page of fixtures", body = [Fixture]),
        (status = 400, description = "Malformed query")
    )
)]
pub async fn get_fixtures(
    State(state): State<AppState>,
    ApiQuery(pairs): ApiQuery<QueryPairs>,
) -> Result<Json<Envelope<Vec<Value>>>, AppError> {
    let query = FIXTURE_LIST.translate(&pairs)?;
    let page = state.repo.list(Collection::Fixtures, &query).await?;
    Ok(Envelope::page(page.data, query.pagination(page.total)))
}

/// get_upcoming_fixtures
///
/// [Public Route] The next fixtures still marked upcoming, soonest first.
#[utoipa::path(
    get,
    path = "/api/fixtures/upcoming",
    params(LimitParams),
    responses((status = 200, description = "Upcoming fixtures", body = [Fixture]))
)]
pub async fn get_upcoming_fixtures(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<LimitParams>,
) -> Result<Json<Envelope<Vec<Fixture>>>, AppError> {
    let filter = Filter::new()
        .eq("status", FixtureStatus::Upcoming.as_str())
        .compare("date", CompareOp::Gte, Utc::now());
    let sort = FIXTURE_LIST.sort_keys("date")?;
    let fixtures = state
        .repo
        .find::<Fixture>(&filter, &sort, Some(params.or(UPCOMING_LIMIT)))
        .await?;
    Ok(Envelope::items(fixtures))
}

/// get_recent_results
///
/// [Public Route] Fixtures dated in the past, completed ones first, most
/// recent first within each status.
#[utoipa::path(
    get,
    path = "/api/fixtures/results",
    params(LimitParams),
    responses((status = 200, description = "Recent results", body = [Fixture]))
)]
pub async fn get_recent_results(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<LimitParams>,
) -> Result<Json<Envelope<Vec<Fixture>>>, AppError> {
    let filter = Filter::new().compare("date", CompareOp::Lte, Utc::now());
    let sort = FIXTURE_LIST.sort_keys("status,-date")?;
    let fixtures = state
        .repo
        .find::<Fixture>(&filter, &sort, Some(params.or(RESULTS_LIMIT)))
        .await?;
    Ok(Envelope::items(fixtures))
}

/// get_fixture
///
/// [Public Route] One fixture by id.
#[utoipa::path(
    get,
    path = "/api/fixtures/{id}",
    params(("id" = String, Path, description = "Fixture id")),
    responses(
        (status = 200, description = "Fixture", body = Fixture),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_fixture(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Fixture>>, AppError> {
    Ok(Envelope::data(load(&state, &id).await?))
}

/// create_fixture
///
/// [Admin Route] Schedules a fixture against `opponent`, with the club as
/// the home or away side according to `location`.
#[utoipa::path(
    post,
    path = "/api/fixtures",
    request_body = CreateFixtureRequest,
    responses(
        (status = 201, description = "Created", body = Fixture),
        (status = 400, description = "Invalid date, time or location"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_fixture(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateFixtureRequest>,
) -> Result<(StatusCode, Json<Envelope<Fixture>>), AppError> {
    let fixture = Fixture::create(payload, &state.config.club(), Utc::now())?;
    state.repo.insert(&fixture).await?;
    tracing::info!(fixture_id = %fixture.id, "fixture created");
    Ok((StatusCode::CREATED, Envelope::data(fixture)))
}

/// update_fixture
///
/// [Admin Route] Partial update of a fixture.
#[utoipa::path(
    put,
    path = "/api/fixtures/{id}",
    params(("id" = String, Path, description = "Fixture id")),
    request_body = UpdateFixtureRequest,
    responses(
        (status = 200, description = "Updated", body = Fixture),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_fixture(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateFixtureRequest>,
) -> Result<Json<Envelope<Fixture>>, AppError> {
    let mut fixture = load(&state, &id).await?;
    fixture.apply(payload, Utc::now())?;
    store(&state, &fixture).await?;
    Ok(Envelope::data(fixture))
}

/// update_fixture_result
///
/// [Admin Route] Records the score; a `status` in the payload becomes the
/// fixture's status.
#[utoipa::path(
    put,
    path = "/api/fixtures/{id}/result",
    params(("id" = String, Path, description = "Fixture id")),
    request_body = UpdateResultRequest,
    responses(
        (status = 200, description = "Updated", body = Fixture),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_fixture_result(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateResultRequest>,
) -> Result<Json<Envelope<Fixture>>, AppError> {
    let mut fixture = load(&state, &id).await?;
    fixture.record_result(payload.result, Utc::now());
    store(&state, &fixture).await?;
    Ok(Envelope::data(fixture))
}

/// delete_fixture
///
/// [Admin Route] Removes a fixture.
#[utoipa::path(
    delete,
    path = "/api/fixtures/{id}",
    params(("id" = String, Path, description = "Fixture id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_fixture(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, AppError> {
    let id = parse_id(&id, NOT_FOUND)?;
    state
        .repo
        .delete::<Fixture>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;
    Ok(Envelope::message("Fixture deleted successfully"))
}
