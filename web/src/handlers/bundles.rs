//! Bundle wizard endpoints.
//!
//! - POST /api/bundles/start - catalog of a hotel with remaining capacity
//! - POST /api/bundles/validate - per-component verdict, alternatives when short
//! - POST /api/bundles/confirm - price and commit atomically

use super::json_body;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use booking_core::ValidationOutcome;
use booking_core::types::{Booking, BundleRequest, CatalogEntry, DateRange, HotelId};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `POST /api/bundles/start`.
#[derive(Debug, Deserialize)]
pub struct StartBundleRequest {
    /// Hotel to browse
    pub hotel_id: HotelId,
    /// Overall date range of the stay/event
    pub dates: DateRange,
}

/// Catalog returned by `POST /api/bundles/start`.
#[derive(Debug, Serialize)]
pub struct StartBundleResponse {
    /// Hotel browsed
    pub hotel_id: HotelId,
    /// Date range the remaining counts apply to
    pub dates: DateRange,
    /// Every resource of the hotel
    pub catalog: Vec<CatalogEntry>,
}

/// Body of `POST /api/bundles/confirm`.
#[derive(Debug, Deserialize)]
pub struct ConfirmBundleRequest {
    /// Bundle to commit
    pub bundle: BundleRequest,
    /// The caller accepted the booking terms
    #[serde(default)]
    pub accepted_policies: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Lists the hotel's resources with their remaining capacity. Read-only.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/bundles/start \
///   -H 'content-type: application/json' \
///   -d '{"hotel_id":"grand-plaza","dates":{"start":"2025-03-10","end":"2025-03-12"}}'
/// ```
pub async fn start_bundle(
    State(state): State<AppState>,
    payload: Result<Json<StartBundleRequest>, JsonRejection>,
) -> Result<Json<StartBundleResponse>, AppError> {
    let request = json_body(payload)?;
    let catalog = state
        .engine
        .start_bundle(&request.hotel_id, &request.dates)
        .await?;

    Ok(Json(StartBundleResponse {
        hotel_id: request.hotel_id,
        dates: request.dates,
        catalog,
    }))
}

/// Validates a bundle without reserving anything.
///
/// Always 200 for a well-formed bundle: `verdict.all_sufficient` tells whether it can
/// be confirmed, and `alternatives` is present when it cannot.
pub async fn validate_bundle(
    State(state): State<AppState>,
    payload: Result<Json<BundleRequest>, JsonRejection>,
) -> Result<Json<ValidationOutcome>, AppError> {
    let bundle = json_body(payload)?;
    Ok(Json(state.engine.validate_bundle(&bundle).await?))
}

/// Commits a bundle.
///
/// 201 with the booking; 409 when a concurrent commit won (re-validate, then retry);
/// 422 `INSUFFICIENT_CAPACITY` with verdict and alternatives.
pub async fn confirm_bundle(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmBundleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let request = json_body(payload)?;
    let booking = state
        .engine
        .confirm_bundle(&request.bundle, request.accepted_policies)
        .await?;

    tracing::info!(
        code = %booking.confirmation_code,
        hotel = %booking.bundle.hotel_id,
        total = booking.price.total.minor(),
        "bundle confirmed"
    );
    Ok((StatusCode::CREATED, Json(booking)))
}
