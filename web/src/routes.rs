//! Router configuration for the booking API.

use crate::handlers::{bookings, bundles, health};
use crate::middleware::request_id_layer;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - `/health`, `/ready`
/// - `/api/bundles/{start,validate,confirm}`
/// - `/api/bookings/:code`, its cancellation quote and cancel
/// - `/api/hotels/:hotel_id/bookings`
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Bundle wizard
        .route("/bundles/start", post(bundles::start_bundle))
        .route("/bundles/validate", post(bundles::validate_bundle))
        .route("/bundles/confirm", post(bundles::confirm_bundle))
        // Bookings
        .route("/bookings/:code", get(bookings::get_booking))
        .route(
            "/bookings/:code/cancellation-quote",
            get(bookings::cancellation_quote),
        )
        .route("/bookings/:code/cancel", post(bookings::cancel_booking))
        .route(
            "/hotels/:hotel_id/bookings",
            get(bookings::list_hotel_bookings),
        );

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
        .with_state(state)
}
