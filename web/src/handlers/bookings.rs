//! Booking lookup and cancellation endpoints.

use super::json_body;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use booking_core::types::{Booking, CancellationQuote, ConfirmationCode, HotelId};
use serde::Deserialize;

/// Body of `POST /api/bookings/:code/cancel`.
#[derive(Debug, Deserialize)]
pub struct CancelBookingRequest {
    /// Why the booking is cancelled (required, non-blank)
    #[serde(default)]
    pub reason: String,
    /// The caller accepted the quoted penalty
    #[serde(default)]
    pub accepted_penalty: bool,
}

/// `GET /api/bookings/:code`
pub async fn get_booking(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.engine.get_booking(&ConfirmationCode::new(code)).await?;
    Ok(Json(booking))
}

/// `GET /api/hotels/:hotel_id/bookings`
pub async fn list_hotel_bookings(
    State(state): State<AppState>,
    Path(hotel_id): Path<String>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state.engine.list_bookings(&HotelId::new(hotel_id)).await?;
    Ok(Json(bookings))
}

/// `GET /api/bookings/:code/cancellation-quote`
///
/// Terms as of now; nothing is stored.
pub async fn cancellation_quote(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<CancellationQuote>, AppError> {
    let quote = state
        .engine
        .cancellation_quote(&ConfirmationCode::new(code))
        .await?;
    Ok(Json(quote))
}

/// `POST /api/bookings/:code/cancel`
///
/// ```bash
/// curl -X POST http://localhost:8080/api/bookings/BKG-20250101-000001/cancel \
///   -H 'content-type: application/json' \
///   -d '{"reason":"event postponed","accepted_penalty":true}'
/// ```
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(code): Path<String>,
    payload: Result<Json<CancelBookingRequest>, JsonRejection>,
) -> Result<Json<Booking>, AppError> {
    let request = json_body(payload)?;
    let booking = state
        .engine
        .cancel_booking(
            &ConfirmationCode::new(code),
            &request.reason,
            request.accepted_penalty,
        )
        .await?;
    Ok(Json(booking))
}
