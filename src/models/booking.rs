use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Violations, is_valid_email};
use crate::{
    error::AppError,
    query::{FieldKind, ListSpec},
    repository::{Collection, Record},
};

pub const MIN_TRIAL_AGE: i64 = 16;
pub const MIN_EXPERIENCE_LENGTH: usize = 20;

pub const BOOKING_LIST: ListSpec = ListSpec {
    default_sort: "-submissionDate",
    fields: &[
        ("id", FieldKind::Text),
        ("name", FieldKind::Text),
        ("email", FieldKind::Text),
        ("age", FieldKind::Number),
        ("position", FieldKind::Text),
        ("status", FieldKind::Text),
        ("submissionDate", FieldKind::Date),
    ],
};

static FULL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+\s+\w+").expect("full name pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl Position {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Goalkeeper" => Some(Position::Goalkeeper),
            "Defender" => Some(Position::Defender),
            "Midfielder" => Some(Position::Midfielder),
            "Forward" => Some(Position::Forward),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum BookingStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
}

/// Booking
///
/// A trial request submitted through the public form.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Booking {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub age: u32,
    pub position: Position,
    pub experience: String,
    pub availability: String,
    pub status: BookingStatus,
    #[ts(type = "string")]
    pub submission_date: DateTime<Utc>,
}

impl Record for Booking {
    const COLLECTION: Collection = Collection::Bookings;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// BookingForm
///
/// Raw form submission. Every field is optional so each missing one can be
/// reported individually; `age` accepts a JSON number or a numeric string
/// since HTML forms post strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<Value>,
    pub position: Option<String>,
    pub experience: Option<String>,
    pub availability: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
}

enum Age {
    Missing,
    Whole(i64),
    Invalid,
}

fn read_age(value: Option<&Value>) -> Age {
    match value {
        None | Some(Value::Null) => Age::Missing,
        Some(Value::Number(n)) => n.as_i64().map_or(Age::Invalid, Age::Whole),
        Some(Value::String(s)) if s.trim().is_empty() => Age::Missing,
        Some(Value::String(s)) => s.trim().parse().map_or(Age::Invalid, Age::Whole),
        Some(_) => Age::Invalid,
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

impl Booking {
    /// submit
    ///
    /// Validates a form submission and builds the `Pending` booking. Every
    /// failing field is reported with one message.
    pub fn submit(form: BookingForm, now: DateTime<Utc>) -> Result<Self, AppError> {
        let mut violations = Violations::new();

        let name = trimmed(form.name);
        if name.is_empty() {
            violations.add("name", "Please enter your full name");
        } else if !FULL_NAME.is_match(&name) {
            violations.add("name", "Please enter your first and last name");
        }

        let email = trimmed(form.email).to_lowercase();
        if email.is_empty() {
            violations.add("email", "Please enter your email address");
        } else if !is_valid_email(&email) {
            violations.add("email", "Please enter a valid email address");
        }

        let age = match read_age(form.age.as_ref()) {
            Age::Missing => {
                violations.add("age", "Please enter your age");
                None
            }
            Age::Invalid => {
                violations.add("age", "Age must be a whole number");
                None
            }
            Age::Whole(years) if years < MIN_TRIAL_AGE => {
                violations.add("age", "You must be at least 16 years old");
                None
            }
            Age::Whole(years) => {
                let age = u32::try_from(years).ok();
                if age.is_none() {
                    violations.add("age", "Please enter a valid age");
                }
                age
            }
        };

        let position_raw = trimmed(form.position);
        let position = Position::parse(&position_raw);
        if position_raw.is_empty() {
            violations.add("position", "Please select your preferred position");
        } else if position.is_none() {
            violations.add("position", "Please select a valid position");
        }

        let experience = trimmed(form.experience);
        if experience.is_empty() {
            violations.add("experience", "Please enter your previous experience");
        } else if experience.chars().count() < MIN_EXPERIENCE_LENGTH {
            violations.add(
                "experience",
                "Please provide more details about your experience",
            );
        }

        let availability = trimmed(form.availability);
        if availability.is_empty() {
            violations.add(
                "availability",
                "Please provide your availability for the trial",
            );
        }

        violations.into_result()?;

        let (Some(age), Some(position)) = (age, position) else {
            return Err(AppError::Internal("booking passed validation without age or position".into()));
        };

        Ok(Booking {
            id: Uuid::new_v4(),
            name,
            email,
            age,
            position,
            experience,
            availability,
            status: BookingStatus::Pending,
            submission_date: now,
        })
    }
}
