use axum::{
    Json,
    extract::{FromRequest, FromRequestParts},
    http::Uri,
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{error::AppError, query::Pagination};

pub mod articles;
pub mod auth;
pub mod bookings;
pub mod dashboard;
pub mod fixtures;
pub mod merchandise;
pub mod squad;
pub mod uploads;

// --- Extractors ---

/// ApiJson
///
/// `axum::Json` whose rejection is rendered as the standard 400 envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// ApiQuery
///
/// `axum::extract::Query` with envelope-shaped rejections.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Raw list-request parameters, in request order.
pub type QueryPairs = Vec<(String, String)>;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchParams {
    /// Text searched for, case-insensitively.
    pub query: Option<String>,
}

impl SearchParams {
    pub fn required(self) -> Result<String, AppError> {
        self.query
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .ok_or_else(|| AppError::Validation("Please provide a search query".into()))
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LimitParams {
    /// Maximum number of items; non-numeric or non-positive values use the default.
    pub limit: Option<String>,
}

impl LimitParams {
    pub fn or(&self, fallback: u64) -> u64 {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse::<u64>().ok())
            .filter(|l| *l > 0)
            .unwrap_or(fallback)
    }
}

// --- Envelope ---

/// Envelope
///
/// The response body shape shared by every endpoint:
/// `{success, count?, pagination?, data?, message?}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    fn ok(data: Option<T>, message: Option<String>) -> Self {
        Self {
            success: true,
            count: None,
            pagination: None,
            data,
            message,
        }
    }

    pub fn data(data: T) -> Json<Self> {
        Json(Self::ok(Some(data), None))
    }

    pub fn data_with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self::ok(Some(data), Some(message.into())))
    }
}

impl<T: Serialize> Envelope<Vec<T>> {
    pub fn items(items: Vec<T>) -> Json<Self> {
        let mut envelope = Self::ok(None, None);
        envelope.count = Some(items.len());
        envelope.data = Some(items);
        Json(envelope)
    }

    pub fn page(items: Vec<T>, pagination: Pagination) -> Json<Self> {
        let mut envelope = Self::ok(None, None);
        envelope.count = Some(items.len());
        envelope.pagination = Some(pagination);
        envelope.data = Some(items);
        Json(envelope)
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self::ok(None, Some(message.into())))
    }
}

/// Parses a path id. A malformed id cannot name a stored entity, so it is a
/// 404 with the entity's own message.
pub fn parse_id(raw: &str, not_found: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::NotFound(not_found.to_string()))
}

// --- Service Endpoints ---

/// health
///
/// [Public Route] Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health() -> Json<Envelope<()>> {
    Envelope::message("OK")
}

/// Fallback for `/api/*` paths no route matches, so API clients get JSON
/// instead of the SPA entry page.
pub async fn api_not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Route {} not found", uri.path()))
}
