use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Violations, required};
use crate::{
    error::AppError,
    query::{FieldKind, ListSpec},
    repository::{Collection, Record},
};

pub const DEFAULT_MAX_TEAMS: u32 = 16;

/// Drops repeated ids, keeping the first occurrence of each.
fn distinct(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

pub const PLAYER_LIST: ListSpec = ListSpec {
    default_sort: "jerseyNumber",
    fields: &[
        ("id", FieldKind::Text),
        ("name", FieldKind::Text),
        ("position", FieldKind::Text),
        ("age", FieldKind::Number),
        ("nationality", FieldKind::Text),
        ("jerseyNumber", FieldKind::Number),
        ("isAvailable", FieldKind::Bool),
        ("createdAt", FieldKind::Date),
    ],
};

pub const TEAM_LIST: ListSpec = ListSpec {
    default_sort: "-createdAt",
    fields: &[
        ("id", FieldKind::Text),
        ("name", FieldKind::Text),
        ("formation", FieldKind::Text),
        ("createdAt", FieldKind::Date),
    ],
};

pub const TOURNAMENT_LIST: ListSpec = ListSpec {
    default_sort: "startDate",
    fields: &[
        ("id", FieldKind::Text),
        ("name", FieldKind::Text),
        ("location", FieldKind::Text),
        ("status", FieldKind::Text),
        ("startDate", FieldKind::Date),
        ("endDate", FieldKind::Date),
        ("maxTeams", FieldKind::Number),
        ("createdAt", FieldKind::Date),
    ],
};

// --- Players ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub position: String,
    pub age: u32,
    pub nationality: String,
    pub jersey_number: u32,
    pub is_available: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl Record for Player {
    const COLLECTION: Collection = Collection::Players;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlayerRequest {
    pub name: Option<String>,
    pub position: Option<String>,
    pub age: Option<u32>,
    pub nationality: Option<String>,
    pub jersey_number: Option<u32>,
    pub is_available: Option<bool>,
}

impl Player {
    pub fn create(req: PlayerRequest, now: DateTime<Utc>) -> Result<Self, AppError> {
        let mut violations = Violations::new();
        let name = required(&mut violations, "name", req.name, "Player name is required");
        let position = required(
            &mut violations,
            "position",
            req.position,
            "Position is required",
        );
        let nationality = required(
            &mut violations,
            "nationality",
            req.nationality,
            "Nationality is required",
        );
        if req.age.is_none() {
            violations.add("age", "Age is required");
        }
        if req.jersey_number.is_none() {
            violations.add("jerseyNumber", "Jersey number is required");
        }
        violations.into_result()?;

        Ok(Player {
            id: Uuid::new_v4(),
            name,
            position,
            age: req.age.unwrap_or_default(),
            nationality,
            jersey_number: req.jersey_number.unwrap_or_default(),
            is_available: req.is_available.unwrap_or(true),
            created_at: now,
        })
    }

    pub fn apply(&mut self, req: PlayerRequest) -> Result<(), AppError> {
        let mut violations = Violations::new();
        for (field, value) in [
            ("name", &req.name),
            ("position", &req.position),
            ("nationality", &req.nationality),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                violations.add(field, format!("{field} cannot be empty"));
            }
        }
        violations.into_result()?;

        if let Some(name) = req.name {
            self.name = name.trim().to_string();
        }
        if let Some(position) = req.position {
            self.position = position.trim().to_string();
        }
        if let Some(nationality) = req.nationality {
            self.nationality = nationality.trim().to_string();
        }
        if let Some(age) = req.age {
            self.age = age;
        }
        if let Some(jersey_number) = req.jersey_number {
            self.jersey_number = jersey_number;
        }
        if let Some(is_available) = req.is_available {
            self.is_available = is_available;
        }
        Ok(())
    }
}

// --- Teams ---

/// Team
///
/// Stored form: players are referenced by id. Reads return [`TeamView`].
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub formation: String,
    pub players: Vec<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl Record for Team {
    const COLLECTION: Collection = Collection::Teams;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TeamView {
    pub id: Uuid,
    pub name: String,
    pub formation: String,
    pub players: Vec<Player>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl TeamView {
    /// Expands `team.players` from `roster`, in the team's order. Ids no
    /// longer present in `roster` are skipped.
    pub fn assemble(team: Team, roster: &[Player]) -> Self {
        let players = team
            .players
            .iter()
            .filter_map(|id| roster.iter().find(|p| p.id == *id).cloned())
            .collect();
        TeamView {
            id: team.id,
            name: team.name,
            formation: team.formation,
            players,
            created_at: team.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TeamRequest {
    pub name: Option<String>,
    pub formation: Option<String>,
    pub players: Option<Vec<Uuid>>,
}

impl Team {
    pub fn create(req: TeamRequest, now: DateTime<Utc>) -> Result<Self, AppError> {
        let mut violations = Violations::new();
        let name = required(&mut violations, "name", req.name, "Team name is required");
        let formation = required(
            &mut violations,
            "formation",
            req.formation,
            "Formation is required",
        );
        violations.into_result()?;

        Ok(Team {
            id: Uuid::new_v4(),
            name,
            formation,
            players: distinct(req.players.unwrap_or_default()),
            created_at: now,
        })
    }

    pub fn apply(&mut self, req: TeamRequest) -> Result<(), AppError> {
        let mut violations = Violations::new();
        if req.name.as_deref().is_some_and(|v| v.trim().is_empty()) {
            violations.add("name", "Team name is required");
        }
        if req.formation.as_deref().is_some_and(|v| v.trim().is_empty()) {
            violations.add("formation", "Formation is required");
        }
        violations.into_result()?;

        if let Some(name) = req.name {
            self.name = name.trim().to_string();
        }
        if let Some(formation) = req.formation {
            self.formation = formation.trim().to_string();
        }
        if let Some(players) = req.players {
            self.players = distinct(players);
        }
        Ok(())
    }
}

// --- Tournaments ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum TournamentStatus {
    #[default]
    Upcoming,
    Ongoing,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Tournament {
    pub id: Uuid,
    pub name: String,
    #[ts(type = "string")]
    pub start_date: DateTime<Utc>,
    #[ts(type = "string")]
    pub end_date: DateTime<Utc>,
    pub location: String,
    pub teams: Vec<Uuid>,
    pub max_teams: u32,
    pub status: TournamentStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl Record for Tournament {
    const COLLECTION: Collection = Collection::Tournaments;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TournamentView {
    pub id: Uuid,
    pub name: String,
    #[ts(type = "string")]
    pub start_date: DateTime<Utc>,
    #[ts(type = "string")]
    pub end_date: DateTime<Utc>,
    pub location: String,
    pub teams: Vec<TeamView>,
    pub max_teams: u32,
    pub status: TournamentStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl TournamentView {
    pub fn assemble(tournament: Tournament, teams: &[TeamView]) -> Self {
        let expanded = tournament
            .teams
            .iter()
            .filter_map(|id| teams.iter().find(|t| t.id == *id).cloned())
            .collect();
        TournamentView {
            id: tournament.id,
            name: tournament.name,
            start_date: tournament.start_date,
            end_date: tournament.end_date,
            location: tournament.location,
            teams: expanded,
            max_teams: tournament.max_teams,
            status: tournament.status,
            created_at: tournament.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TournamentRequest {
    pub name: Option<String>,
    #[ts(type = "string | null")]
    pub start_date: Option<DateTime<Utc>>,
    #[ts(type = "string | null")]
    pub end_date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub teams: Option<Vec<Uuid>>,
    pub max_teams: Option<u32>,
    pub status: Option<TournamentStatus>,
}

fn check_schedule(
    violations: &mut Violations,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    teams: usize,
    max_teams: u32,
) {
    if end < start {
        violations.add("endDate", "End date must not be before the start date");
    }
    if max_teams == 0 {
        violations.add("maxTeams", "maxTeams must be at least 1");
    } else if teams > max_teams as usize {
        violations.add("teams", format!("A tournament takes at most {max_teams} teams"));
    }
}

impl Tournament {
    pub fn create(req: TournamentRequest, now: DateTime<Utc>) -> Result<Self, AppError> {
        let mut violations = Violations::new();
        let name = required(&mut violations, "name", req.name, "Tournament name is required");
        let location = required(
            &mut violations,
            "location",
            req.location,
            "Location is required",
        );
        if req.start_date.is_none() {
            violations.add("startDate", "Start date is required");
        }
        if req.end_date.is_none() {
            violations.add("endDate", "End date is required");
        }
        let teams = distinct(req.teams.unwrap_or_default());
        let max_teams = req.max_teams.unwrap_or(DEFAULT_MAX_TEAMS);
        if let (Some(start), Some(end)) = (req.start_date, req.end_date) {
            check_schedule(&mut violations, start, end, teams.len(), max_teams);
        }
        violations.into_result()?;

        Ok(Tournament {
            id: Uuid::new_v4(),
            name,
            start_date: req.start_date.unwrap_or(now),
            end_date: req.end_date.unwrap_or(now),
            location,
            teams,
            max_teams,
            status: req.status.unwrap_or_default(),
            created_at: now,
        })
    }

    pub fn apply(&mut self, req: TournamentRequest) -> Result<(), AppError> {
        let mut violations = Violations::new();
        if req.name.as_deref().is_some_and(|v| v.trim().is_empty()) {
            violations.add("name", "Tournament name is required");
        }
        if req.location.as_deref().is_some_and(|v| v.trim().is_empty()) {
            violations.add("location", "Location is required");
        }
        let start = req.start_date.unwrap_or(self.start_date);
        let end = req.end_date.unwrap_or(self.end_date);
        let teams = req.teams.map(distinct);
        let team_count = teams.as_ref().map_or(self.teams.len(), Vec::len);
        let max_teams = req.max_teams.unwrap_or(self.max_teams);
        check_schedule(&mut violations, start, end, team_count, max_teams);
        violations.into_result()?;

        if let Some(name) = req.name {
            self.name = name.trim().to_string();
        }
        if let Some(location) = req.location {
            self.location = location.trim().to_string();
        }
        if let Some(teams) = teams {
            self.teams = teams;
        }
        if let Some(status) = req.status {
            self.status = status;
        }
        self.start_date = start;
        self.end_date = end;
        self.max_teams = max_teams;
        Ok(())
    }
}
