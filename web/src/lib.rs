//! Axum HTTP boundary for the booking engine.
//!
//! The handlers are a thin shell: they parse JSON, call [`booking_core::BookingEngine`]
//! and map its errors to status codes. No pricing or policy logic lives here.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │            HTTP shell (axum)             │  ← JSON, request ids, tracing
//! │  - request parsing                       │
//! │  - BookingError → AppError (409, 422…)   │
//! ├──────────────────────────────────────────┤
//! │            booking-core                  │
//! │  - validate / suggest / price            │  ← pure reads and arithmetic
//! │  - commit under per-resource locks       │  ← all-or-nothing
//! │  - cancellation policy                   │
//! └──────────────────────────────────────────┘
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{Config, ServerConfig};
pub use error::AppError;
pub use middleware::{REQUEST_ID_HEADER, RequestId, request_id_layer};
pub use routes::build_router;
pub use state::AppState;
