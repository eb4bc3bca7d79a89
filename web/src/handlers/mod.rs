//! HTTP request handlers.
//!
//! This module contains all HTTP handlers organized by domain.

pub mod bookings;
pub mod bundles;
pub mod health;

use crate::error::AppError;
use axum::{Json, extract::rejection::JsonRejection};

/// Unwraps a JSON body, turning axum's rejection into the structured error body.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}
