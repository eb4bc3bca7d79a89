//! Application state for Axum handlers.

use booking_core::BookingEngine;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cheap to clone; every handler works against the same engine (and therefore the
/// same lock table and capacity ledger).
#[derive(Clone)]
pub struct AppState {
    /// The booking engine
    pub engine: Arc<BookingEngine>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(engine: BookingEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}
