//! HTTP error mapping.
//!
//! Bridges [`BookingError`] to JSON responses. Status 409 is reserved for commit
//! conflicts so callers can tell "re-validate and retry" apart from ordinary
//! validation failures.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use booking_core::{BookingError, PolicyError};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Application error returned by every handler.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(state): State<AppState>) -> Result<Json<Booking>, AppError> {
///     let booking = state.engine.get_booking(&code).await?;
///     Ok(Json(booking))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Machine-readable code
    code: &'static str,
    /// User-facing message
    message: String,
    /// Structured payload (verdict, alternatives, conflicting components)
    details: Option<Value>,
    /// Internal error, logged but never exposed
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Attach a structured payload.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach an internal source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 400 Bad Request
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// 404 Not Found
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{resource} with id {id} not found"),
        )
    }

    /// 422 Unprocessable Entity
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    /// 500 Internal Server Error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", message)
    }

    /// 503 Service Unavailable
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "AVAILABILITY_UNKNOWN", message)
    }

    /// HTTP status of the error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

fn to_details(value: &impl Serialize) -> Option<Value> {
    serde_json::to_value(value).ok()
}

fn policy_code(error: &PolicyError) -> &'static str {
    match error {
        PolicyError::AlreadyStarted { .. } => "ALREADY_STARTED",
        PolicyError::PenaltyNotAccepted { .. } => "PENALTY_NOT_ACCEPTED",
        PolicyError::MissingReason => "MISSING_REASON",
        PolicyError::AlreadyCancelled(_) => "ALREADY_CANCELLED",
        PolicyError::NotCancellable(_) => "NOT_CANCELLABLE",
    }
}

impl From<BookingError> for AppError {
    fn from(error: BookingError) -> Self {
        let message = error.to_string();
        match error {
            BookingError::Validation(_) => Self::validation(message),
            BookingError::AvailabilityUnknown(_) => Self::unavailable(message),
            BookingError::InsufficientCapacity(details) => {
                let mut err = Self::new(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "INSUFFICIENT_CAPACITY",
                    message,
                );
                err.details = to_details(&*details);
                err
            }
            BookingError::Conflict(conflict) => {
                let mut err = Self::new(StatusCode::CONFLICT, "CONFLICT", message);
                err.details = to_details(&conflict);
                err
            }
            BookingError::Compensation(pending) => {
                let mut err = Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "CAPACITY_UNRECONCILED",
                    message,
                );
                err.details = to_details(&pending);
                err
            }
            BookingError::Policy(policy) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, policy_code(&policy), message)
            }
            BookingError::NotFound(code) => Self::not_found("Booking", code),
            error @ (BookingError::InvalidState(_) | BookingError::Store(_)) => {
                Self::internal("An internal error occurred").with_source(error.into())
            }
        }
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    error = %source,
                    "request failed"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "request failed"
                ),
            }
        } else {
            tracing::debug!(status = %self.status, code = self.code, "request rejected");
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}
