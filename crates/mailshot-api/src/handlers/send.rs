//! Send trigger handlers
//!
//! Both triggers only submit a job; delivery outcomes are visible later in
//! the message counters and the delivery log.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use mailshot_common::types::MessageId;
use mailshot_common::Error;
use mailshot_core::addresses::parse_address_list;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{api_error, from_error, ApiError};
use crate::state::AppState;

/// Send accepted response
#[derive(Debug, Serialize, Deserialize)]
pub struct SendAccepted {
    pub message: String,
}

impl SendAccepted {
    fn queued() -> (StatusCode, Json<Self>) {
        (
            StatusCode::ACCEPTED,
            Json(Self {
                message: "Message added to the send queue.".to_string(),
            }),
        )
    }
}

/// Test send request; comma-separated addresses
#[derive(Debug, Deserialize)]
pub struct SendTestRequest {
    pub emails: String,
}

/// Queue a test send to explicit addresses
pub async fn send_test(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<MessageId>,
    Json(req): Json<SendTestRequest>,
) -> Result<(StatusCode, Json<SendAccepted>), ApiError> {
    let emails = parse_address_list(&req.emails).map_err(from_error)?;
    if emails.is_empty() {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation_error",
            "At least one email address is required",
        ));
    }

    state
        .lifecycle
        .request_test_send(message_id, emails)
        .await
        .map_err(|e| from_error(Error::from(e)))?;

    Ok(SendAccepted::queued())
}

/// Real send request
#[derive(Debug, Deserialize)]
pub struct SendNowRequest {
    #[serde(default)]
    pub confirm: bool,
}

/// Queue the real send of a message
pub async fn send_now(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<MessageId>,
    Json(req): Json<SendNowRequest>,
) -> Result<(StatusCode, Json<SendAccepted>), ApiError> {
    if !req.confirm {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation_error",
            "Sending must be confirmed",
        ));
    }

    state
        .lifecycle
        .request_send(message_id)
        .await
        .map_err(|e| from_error(Error::from(e)))?;

    Ok(SendAccepted::queued())
}
