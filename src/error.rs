use axum::{
    Json,
    extract::multipart::MultipartRejection,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{query::QueryError, repository::StoreError, session::SessionError};

/// FieldError
///
/// One failed rule on one input field. Returned in the `errors` array of a
/// 400 envelope so forms can highlight the offending input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// AppError
///
/// The single error type every handler returns. Each variant maps onto one
/// HTTP status; the `IntoResponse` impl renders the failure envelope
/// `{success: false, message}` so nothing leaves the server unformatted.
#[derive(Debug, Error)]
pub enum AppError {
    /// 400: missing or malformed input, business-rule violations.
    #[error("{0}")]
    Validation(String),

    /// 400 with per-field details.
    #[error("Validation failed")]
    FieldValidation(Vec<FieldError>),

    /// 400: a unique key (slug, jersey number, username, email) is taken.
    #[error("{0}")]
    Conflict(String),

    /// 401: no session, unknown session or the session's user is gone.
    #[error("{0}")]
    Unauthorized(String),

    /// 401: login failed. Never says which half of the credentials was wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// 403: authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Store(StoreError),

    #[error("Session store error: {0}")]
    Session(#[from] SessionError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::FieldValidation(_) | AppError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store(_) | AppError::Session(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Unique-key violations surface as `Conflict`; everything else the store
/// reports is a server fault.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { field, .. } => AppError::Conflict(conflict_message(field)),
            other => AppError::Store(other),
        }
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

fn conflict_message(field: &str) -> String {
    match field {
        "jerseyNumber" => "Jersey number already taken".to_string(),
        "username" => "Username already exists".to_string(),
        "email" => "Email already exists".to_string(),
        "slug" => "An entry with the same title already exists".to_string(),
        other => format!("Duplicate value for {other}"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            AppError::FieldValidation(errors) => json!({
                "success": false,
                "message": self.to_string(),
                "errors": errors,
            }),
            AppError::Store(_) | AppError::Session(_) | AppError::Internal(_) => {
                // Details stay in the log; clients get the generic message.
                tracing::error!(error = %self, "request failed");
                json!({ "success": false, "message": "Server error" })
            }
            _ => json!({ "success": false, "message": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
