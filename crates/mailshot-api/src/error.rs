//! Error responses

use axum::{http::StatusCode, Json};
use mailshot_common::Error;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        }),
    )
}

/// Map a domain error onto its HTTP response. Server-side failures are
/// logged and their details withheld.
pub fn from_error(e: Error) -> ApiError {
    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        error!("Request failed: {}", e);
        return api_error(status, &e.code().to_lowercase(), "Internal server error");
    }

    let message = match e {
        Error::Validation(m)
        | Error::NotFound(m)
        | Error::AlreadyExists(m)
        | Error::InvalidState(m) => m,
        other => other.to_string(),
    };
    api_error(status, error_code(status), message)
}

fn error_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::NOT_FOUND => "not_found",
        StatusCode::CONFLICT => "conflict",
        StatusCode::UNPROCESSABLE_ENTITY => "validation_error",
        _ => "bad_request",
    }
}
