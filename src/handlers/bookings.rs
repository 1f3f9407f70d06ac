use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use serde_json::Value;

use super::{ApiJson, ApiQuery, Envelope, QueryPairs, parse_id};
use crate::{
    AppState,
    auth::RequireAdmin,
    error::AppError,
    mail,
    models::{BOOKING_LIST, Booking, BookingForm, UpdateBookingStatusRequest},
    repository::Collection,
};

const NOT_FOUND: &str = "Booking not found";

/// submit_trial
///
/// [Public Route] Records a trial request from the public form. Every invalid
/// field is reported in `errors`. The confirmation email is best-effort.
#[utoipa::path(
    post,
    path = "/submit-trial",
    responses(
        (status = 200, description = "Booking stored with status Pending", body = Booking),
        (status = 400, description = "Validation failed, with per-field errors")
    )
)]
pub async fn submit_trial(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<BookingForm>,
) -> Result<Json<Envelope<Booking>>, AppError> {
    let booking = Booking::submit(form, Utc::now())?;
    state.repo.insert(&booking).await?;
    tracing::info!(booking_id = %booking.id, position = ?booking.position, "trial booking received");

    let confirmation = mail::trial_confirmation(&booking.email, &booking.name, &state.config.club_name);
    if let Err(e) = state.mailer.send(confirmation).await {
        tracing::warn!(booking_id = %booking.id, error = %e, "trial confirmation not sent");
    }

    Ok(Envelope::data_with_message(
        booking,
        "Thank you for your submission! We will contact you soon about your trial.",
    ))
}

/// list_bookings
///
/// [Admin Route] Trial requests through the shared query grammar, most recent
/// submission first.
#[utoipa::path(
    get,
    path = "/api/bookings",
    responses(
        (status = 200, description = "Page of bookings", body = [Booking]),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_bookings(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiQuery(pairs): ApiQuery<QueryPairs>,
) -> Result<Json<Envelope<Vec<Value>>>, AppError> {
    let query = BOOKING_LIST.translate(&pairs)?;
    let page = state.repo.list(Collection::Bookings, &query).await?;
    Ok(Envelope::page(page.data, query.pagination(page.total)))
}

/// update_booking_status
///
/// [Admin Route] Moves a booking to another status.
#[utoipa::path(
    put,
    path = "/api/bookings/{id}/status",
    params(("id" = String, Path, description = "Booking id")),
    request_body = UpdateBookingStatusRequest,
    responses(
        (status = 200, description = "Updated", body = Booking),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_booking_status(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateBookingStatusRequest>,
) -> Result<Json<Envelope<Booking>>, AppError> {
    let id = parse_id(&id, NOT_FOUND)?;
    let mut booking = state
        .repo
        .get::<Booking>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;

    booking.status = payload.status;
    if !state.repo.save(&booking).await? {
        return Err(AppError::NotFound(NOT_FOUND.into()));
    }
    tracing::info!(booking_id = %booking.id, status = ?booking.status, "booking status changed");
    Ok(Envelope::data(booking))
}
