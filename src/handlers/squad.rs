//! Players, teams and tournaments.
//!
//! Teams reference players and tournaments reference teams by id. The ids are
//! checked for existence on every write; reads expand them into the records
//! they name, skipping any that have since been deleted.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::{ApiJson, ApiQuery, Envelope, QueryPairs, parse_id};
use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    models::{
        PLAYER_LIST, Player, PlayerRequest, TEAM_LIST, TOURNAMENT_LIST, Team, TeamRequest,
        TeamView, Tournament, TournamentRequest, TournamentView,
    },
    repository::{Collection, Record},
};

const PLAYER_NOT_FOUND: &str = "Player not found";
const TEAM_NOT_FOUND: &str = "Team not found";
const TOURNAMENT_NOT_FOUND: &str = "Tournament not found";

// --- Reference helpers ---

async fn ensure_all_exist(
    state: &AppState,
    collection: Collection,
    ids: &[Uuid],
    message: &str,
) -> Result<(), AppError> {
    if state.repo.all_exist(collection, ids).await? {
        Ok(())
    } else {
        Err(AppError::Validation(message.to_string()))
    }
}

async fn team_views(state: &AppState, teams: Vec<Team>) -> Result<Vec<TeamView>, AppError> {
    let player_ids: Vec<Uuid> = teams.iter().flat_map(|t| t.players.iter().copied()).collect();
    let roster = state.repo.get_many::<Player>(&player_ids).await?;
    Ok(teams
        .into_iter()
        .map(|team| TeamView::assemble(team, &roster))
        .collect())
}

async fn tournament_view(state: &AppState, tournament: Tournament) -> Result<TournamentView, AppError> {
    let teams = state.repo.get_many::<Team>(&tournament.teams).await?;
    let views = team_views(state, teams).await?;
    Ok(TournamentView::assemble(tournament, &views))
}

fn referenced_ids(docs: &[Value], field: &str) -> Vec<Uuid> {
    docs.iter()
        .filter_map(|doc| doc.get(field).and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .filter_map(|id| Uuid::parse_str(id).ok())
        .collect()
}

fn index_by_id<T: Record>(records: &[T]) -> Result<HashMap<String, Value>, AppError> {
    records
        .iter()
        .map(|r| {
            let doc = serde_json::to_value(r).map_err(|e| AppError::Internal(e.to_string()))?;
            Ok((r.id().to_string(), doc))
        })
        .collect()
}

/// Replaces the id array under `field` in each listed document with the
/// documents those ids name. Documents projected without `field` are left alone.
fn expand_ids(docs: &mut [Value], field: &str, index: &HashMap<String, Value>) {
    for doc in docs {
        if let Some(Value::Array(items)) = doc.get_mut(field) {
            let expanded = items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|id| index.get(id).cloned())
                .collect();
            *items = expanded;
        }
    }
}

// --- Players ---

/// get_players
///
/// [Public Route] Lists players through the shared query grammar, ordered by
/// jersey number by default.
#[utoipa::path(
    get,
    path = "/api/players",
    responses(
        (status = 200, description = "Page of players", body = [Player]),
        (status = 400, description = "Malformed query")
    )
)]
pub async fn get_players(
    State(state): State<AppState>,
    ApiQuery(pairs): ApiQuery<QueryPairs>,
) -> Result<Json<Envelope<Vec<Value>>>, AppError> {
    let query = PLAYER_LIST.translate(&pairs)?;
    let page = state.repo.list(Collection::Players, &query).await?;
    Ok(Envelope::page(page.data, query.pagination(page.total)))
}

#[utoipa::path(
    get,
    path = "/api/players/{id}",
    params(("id" = String, Path, description = "Player id")),
    responses(
        (status = 200, description = "Player", body = Player),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Player>>, AppError> {
    let id = parse_id(&id, PLAYER_NOT_FOUND)?;
    let player = state
        .repo
        .get::<Player>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(PLAYER_NOT_FOUND.into()))?;
    Ok(Envelope::data(player))
}

/// create_player
///
/// [Authenticated Route] Adds a player. Jersey numbers are unique; a taken
/// number is a 400 and nothing is written.
#[utoipa::path(
    post,
    path = "/api/players",
    request_body = PlayerRequest,
    responses(
        (status = 201, description = "Created", body = Player),
        (status = 400, description = "Invalid input or jersey number taken")
    )
)]
pub async fn create_player(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<PlayerRequest>,
) -> Result<(StatusCode, Json<Envelope<Player>>), AppError> {
    let player = Player::create(payload, Utc::now())?;
    state.repo.insert(&player).await?;
    Ok((StatusCode::CREATED, Envelope::data(player)))
}

#[utoipa::path(
    put,
    path = "/api/players/{id}",
    params(("id" = String, Path, description = "Player id")),
    request_body = PlayerRequest,
    responses(
        (status = 200, description = "Updated", body = Player),
        (status = 400, description = "Invalid input or jersey number taken"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_player(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<PlayerRequest>,
) -> Result<Json<Envelope<Player>>, AppError> {
    let id = parse_id(&id, PLAYER_NOT_FOUND)?;
    let mut player = state
        .repo
        .get::<Player>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(PLAYER_NOT_FOUND.into()))?;
    player.apply(payload)?;
    if !state.repo.save(&player).await? {
        return Err(AppError::NotFound(PLAYER_NOT_FOUND.into()));
    }
    Ok(Envelope::data(player))
}

#[utoipa::path(
    delete,
    path = "/api/players/{id}",
    params(("id" = String, Path, description = "Player id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_player(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, AppError> {
    let id = parse_id(&id, PLAYER_NOT_FOUND)?;
    state
        .repo
        .delete::<Player>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(PLAYER_NOT_FOUND.into()))?;
    Ok(Envelope::message("Player deleted successfully"))
}

// --- Teams ---

/// get_teams
///
/// [Public Route] Lists teams with their players expanded.
#[utoipa::path(
    get,
    path = "/api/teams",
    responses(
        (status = 200, description = "Page of teams", body = [TeamView]),
        (status = 400, description = "Malformed query")
    )
)]
pub async fn get_teams(
    State(state): State<AppState>,
    ApiQuery(pairs): ApiQuery<QueryPairs>,
) -> Result<Json<Envelope<Vec<Value>>>, AppError> {
    let query = TEAM_LIST.translate(&pairs)?;
    let mut page = state.repo.list(Collection::Teams, &query).await?;

    let roster = state
        .repo
        .get_many::<Player>(&referenced_ids(&page.data, "players"))
        .await?;
    expand_ids(&mut page.data, "players", &index_by_id(&roster)?);

    Ok(Envelope::page(page.data, query.pagination(page.total)))
}

#[utoipa::path(
    get,
    path = "/api/teams/{id}",
    params(("id" = String, Path, description = "Team id")),
    responses(
        (status = 200, description = "Team with players", body = TeamView),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_team(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<TeamView>>, AppError> {
    let id = parse_id(&id, TEAM_NOT_FOUND)?;
    let team = state
        .repo
        .get::<Team>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(TEAM_NOT_FOUND.into()))?;
    let mut views = team_views(&state, vec![team]).await?;
    views
        .pop()
        .map(Envelope::data)
        .ok_or_else(|| AppError::NotFound(TEAM_NOT_FOUND.into()))
}

/// create_team
///
/// [Authenticated Route] Creates a team; every listed player must exist.
#[utoipa::path(
    post,
    path = "/api/teams",
    request_body = TeamRequest,
    responses(
        (status = 201, description = "Created", body = TeamView),
        (status = 400, description = "Invalid input or unknown player ids")
    )
)]
pub async fn create_team(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<TeamRequest>,
) -> Result<(StatusCode, Json<Envelope<TeamView>>), AppError> {
    let team = Team::create(payload, Utc::now())?;
    ensure_all_exist(
        &state,
        Collection::Players,
        &team.players,
        "One or more player IDs are invalid",
    )
    .await?;
    state.repo.insert(&team).await?;

    let mut views = team_views(&state, vec![team]).await?;
    let view = views
        .pop()
        .ok_or_else(|| AppError::Internal("created team vanished".into()))?;
    Ok((StatusCode::CREATED, Envelope::data(view)))
}

#[utoipa::path(
    put,
    path = "/api/teams/{id}",
    params(("id" = String, Path, description = "Team id")),
    request_body = TeamRequest,
    responses(
        (status = 200, description = "Updated", body = TeamView),
        (status = 400, description = "Invalid input or unknown player ids"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_team(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<TeamRequest>,
) -> Result<Json<Envelope<TeamView>>, AppError> {
    let id = parse_id(&id, TEAM_NOT_FOUND)?;
    let mut team = state
        .repo
        .get::<Team>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(TEAM_NOT_FOUND.into()))?;
    if let Some(players) = &payload.players {
        ensure_all_exist(
            &state,
            Collection::Players,
            players,
            "One or more player IDs are invalid",
        )
        .await?;
    }
    team.apply(payload)?;
    if !state.repo.save(&team).await? {
        return Err(AppError::NotFound(TEAM_NOT_FOUND.into()));
    }

    let mut views = team_views(&state, vec![team]).await?;
    views
        .pop()
        .map(Envelope::data)
        .ok_or_else(|| AppError::NotFound(TEAM_NOT_FOUND.into()))
}

#[utoipa::path(
    delete,
    path = "/api/teams/{id}",
    params(("id" = String, Path, description = "Team id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_team(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, AppError> {
    let id = parse_id(&id, TEAM_NOT_FOUND)?;
    state
        .repo
        .delete::<Team>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(TEAM_NOT_FOUND.into()))?;
    Ok(Envelope::message("Team deleted successfully"))
}

// --- Tournaments ---

/// get_tournaments
///
/// [Public Route] Lists tournaments with teams, and the teams' players,
/// expanded. Earliest start first by default.
#[utoipa::path(
    get,
    path = "/api/tournaments",
    responses(
        (status = 200, description = "Page of tournaments", body = [TournamentView]),
        (status = 400, description = "Malformed query")
    )
)]
pub async fn get_tournaments(
    State(state): State<AppState>,
    ApiQuery(pairs): ApiQuery<QueryPairs>,
) -> Result<Json<Envelope<Vec<Value>>>, AppError> {
    let query = TOURNAMENT_LIST.translate(&pairs)?;
    let mut page = state.repo.list(Collection::Tournaments, &query).await?;

    let teams = state
        .repo
        .get_many::<Team>(&referenced_ids(&page.data, "teams"))
        .await?;
    let views = team_views(&state, teams).await?;
    let index = views
        .iter()
        .map(|v| {
            serde_json::to_value(v)
                .map(|doc| (v.id.to_string(), doc))
                .map_err(|e| AppError::Internal(e.to_string()))
        })
        .collect::<Result<HashMap<_, _>, _>>()?;
    expand_ids(&mut page.data, "teams", &index);

    Ok(Envelope::page(page.data, query.pagination(page.total)))
}

#[utoipa::path(
    get,
    path = "/api/tournaments/{id}",
    params(("id" = String, Path, description = "Tournament id")),
    responses(
        (status = 200, description = "Tournament with teams", body = TournamentView),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_tournament(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<TournamentView>>, AppError> {
    let id = parse_id(&id, TOURNAMENT_NOT_FOUND)?;
    let tournament = state
        .repo
        .get::<Tournament>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(TOURNAMENT_NOT_FOUND.into()))?;
    Ok(Envelope::data(tournament_view(&state, tournament).await?))
}

/// create_tournament
///
/// [Authenticated Route] Creates a tournament; every listed team must exist
/// and the list may not exceed `maxTeams` (16 unless given).
#[utoipa::path(
    post,
    path = "/api/tournaments",
    request_body = TournamentRequest,
    responses(
        (status = 201, description = "Created", body = TournamentView),
        (status = 400, description = "Invalid input or unknown team ids")
    )
)]
pub async fn create_tournament(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<TournamentRequest>,
) -> Result<(StatusCode, Json<Envelope<TournamentView>>), AppError> {
    let tournament = Tournament::create(payload, Utc::now())?;
    ensure_all_exist(
        &state,
        Collection::Teams,
        &tournament.teams,
        "One or more team IDs are invalid",
    )
    .await?;
    state.repo.insert(&tournament).await?;
    let view = tournament_view(&state, tournament).await?;
    Ok((StatusCode::CREATED, Envelope::data(view)))
}

#[utoipa::path(
    put,
    path = "/api/tournaments/{id}",
    params(("id" = String, Path, description = "Tournament id")),
    request_body = TournamentRequest,
    responses(
        (status = 200, description = "Updated", body = TournamentView),
        (status = 400, description = "Invalid input or unknown team ids"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_tournament(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<TournamentRequest>,
) -> Result<Json<Envelope<TournamentView>>, AppError> {
    let id = parse_id(&id, TOURNAMENT_NOT_FOUND)?;
    let mut tournament = state
        .repo
        .get::<Tournament>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(TOURNAMENT_NOT_FOUND.into()))?;
    if let Some(teams) = &payload.teams {
        ensure_all_exist(
            &state,
            Collection::Teams,
            teams,
            "One or more team IDs are invalid",
        )
        .await?;
    }
    tournament.apply(payload)?;
    if !state.repo.save(&tournament).await? {
        return Err(AppError::NotFound(TOURNAMENT_NOT_FOUND.into()));
    }
    Ok(Envelope::data(tournament_view(&state, tournament).await?))
}

#[utoipa::path(
    delete,
    path = "/api/tournaments/{id}",
    params(("id" = String, Path, description = "Tournament id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_tournament(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, AppError> {
    let id = parse_id(&id, TOURNAMENT_NOT_FOUND)?;
    state
        .repo
        .delete::<Tournament>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(TOURNAMENT_NOT_FOUND.into()))?;
    Ok(Envelope::message("Tournament deleted successfully"))
}
