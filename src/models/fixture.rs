use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
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

pub const FIXTURE_LIST: ListSpec = ListSpec {
    default_sort: "date",
    fields: &[
        ("id", FieldKind::Text),
        ("date", FieldKind::Date),
        ("competition", FieldKind::Text),
        ("status", FieldKind::Text),
        ("homeTeam.name", FieldKind::Text),
        ("awayTeam.name", FieldKind::Text),
        ("result.homeScore", FieldKind::Number),
        ("result.awayScore", FieldKind::Number),
        ("tickets.available", FieldKind::Bool),
        ("createdAt", FieldKind::Date),
        ("updatedAt", FieldKind::Date),
    ],
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum FixtureStatus {
    #[default]
    Upcoming,
    Completed,
    Postponed,
}

impl FixtureStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FixtureStatus::Upcoming => "upcoming",
            FixtureStatus::Completed => "completed",
            FixtureStatus::Postponed => "postponed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TeamSide {
    pub name: String,
    #[serde(default)]
    pub logo: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FixtureResult {
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Tickets {
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub url: String,
}

/// Fixture
///
/// A scheduled match. `status` is the only lifecycle field; `result` carries
/// the scores alone.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Fixture {
    pub id: Uuid,
    #[ts(type = "string")]
    pub date: DateTime<Utc>,
    pub home_team: TeamSide,
    pub away_team: TeamSide,
    pub competition: String,
    pub status: FixtureStatus,
    pub result: FixtureResult,
    pub tickets: Tickets,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Record for Fixture {
    const COLLECTION: Collection = Collection::Fixtures;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Which side of the fixture the club plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Venue {
    Home,
    Away,
}

/// Result payload; a status here is written to the fixture's own status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ResultUpdate {
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub status: Option<FixtureStatus>,
}

/// CreateFixtureRequest
///
/// Admin form input: the opponent plus whether the club plays at home. Date
/// and time arrive separately as `YYYY-MM-DD` and `HH:mm` and are read as UTC.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateFixtureRequest {
    pub opponent: Option<String>,
    pub opponent_logo: Option<String>,
    pub location: Option<Venue>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub competition: Option<String>,
    pub tickets: Option<Tickets>,
    pub result: Option<ResultUpdate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateFixtureRequest {
    #[ts(type = "string | null")]
    pub date: Option<DateTime<Utc>>,
    pub home_team: Option<TeamSide>,
    pub away_team: Option<TeamSide>,
    pub competition: Option<String>,
    pub status: Option<FixtureStatus>,
    pub result: Option<ResultUpdate>,
    pub tickets: Option<Tickets>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateResultRequest {
    pub result: ResultUpdate,
}

/// The club's own name and badge, as configured.
#[derive(Debug, Clone)]
pub struct ClubIdentity {
    pub name: String,
    pub logo: String,
}

fn kickoff(date: &str, time: &str) -> Option<DateTime<Utc>> {
    if date.len() != 10 || time.len() != 5 {
        return None;
    }
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let at = NaiveTime::parse_from_str(time, "%H:%M").ok()?;
    Some(day.and_time(at).and_utc())
}

impl Fixture {
    pub fn create(
        req: CreateFixtureRequest,
        club: &ClubIdentity,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let (Some(date), Some(time)) = (req.date.as_deref(), req.time.as_deref()) else {
            return Err(AppError::Validation("Date and time are required".into()));
        };
        let date = kickoff(date.trim(), time.trim()).ok_or_else(|| {
            AppError::Validation("Invalid date or time format. Use YYYY-MM-DD and HH:mm".into())
        })?;
        let Some(venue) = req.location else {
            return Err(AppError::Validation(
                "Invalid location. Must be 'home' or 'away'".into(),
            ));
        };

        let mut violations = Violations::new();
        let opponent = required(
            &mut violations,
            "opponent",
            req.opponent,
            "Please add the opponent",
        );
        violations.into_result()?;

        let ours = TeamSide {
            name: club.name.clone(),
            logo: club.logo.clone(),
        };
        let theirs = TeamSide {
            name: opponent,
            logo: req.opponent_logo.unwrap_or_default(),
        };
        let (home_team, away_team) = match venue {
            Venue::Home => (ours, theirs),
            Venue::Away => (theirs, ours),
        };

        let mut fixture = Fixture {
            id: Uuid::new_v4(),
            date,
            home_team,
            away_team,
            competition: req.competition.map(|c| c.trim().to_string()).unwrap_or_default(),
            status: FixtureStatus::Upcoming,
            result: FixtureResult::default(),
            tickets: req.tickets.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        if let Some(result) = req.result {
            fixture.record_result(result, now);
        }
        Ok(fixture)
    }

    pub fn apply(&mut self, req: UpdateFixtureRequest, now: DateTime<Utc>) -> Result<(), AppError> {
        let mut violations = Violations::new();
        for (field, side) in [("homeTeam", &req.home_team), ("awayTeam", &req.away_team)] {
            if side.as_ref().is_some_and(|s| s.name.trim().is_empty()) {
                violations.add(field, "Team name is required");
            }
        }
        violations.into_result()?;

        if let Some(date) = req.date {
            self.date = date;
        }
        if let Some(home) = req.home_team {
            self.home_team = home;
        }
        if let Some(away) = req.away_team {
            self.away_team = away;
        }
        if let Some(competition) = req.competition {
            self.competition = competition.trim().to_string();
        }
        if let Some(status) = req.status {
            self.status = status;
        }
        if let Some(tickets) = req.tickets {
            self.tickets = tickets;
        }
        if let Some(result) = req.result {
            self.record_result(result, now);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Writes the scores that are present and, if given, the status.
    pub fn record_result(&mut self, update: ResultUpdate, now: DateTime<Utc>) {
        if let Some(home) = update.home_score {
            self.result.home_score = Some(home);
        }
        if let Some(away) = update.away_score {
            self.result.away_score = Some(away);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kickoff_requires_exact_formats() {
        assert!(kickoff("2025-03-01", "15:30").is_some());
        assert!(kickoff("2025-3-1", "15:30").is_none());
        assert!(kickoff("2025-03-01", "3pm").is_none());
    }
}
