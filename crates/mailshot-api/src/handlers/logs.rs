//! Delivery log handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use mailshot_common::types::MessageId;
use mailshot_storage::models::MessageLog;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{from_error, ApiError};
use crate::handlers::messages::ListQuery;
use crate::state::AppState;

/// Delivery log page with outcome totals
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageLogResponse {
    pub data: Vec<MessageLog>,
    pub total: i64,
    pub succeeded: i64,
    pub failed: i64,
}

/// List the delivery log of a message, newest first
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<MessageId>,
    Query(query): Query<ListQuery>,
) -> Result<Json<MessageLogResponse>, ApiError> {
    state.messages.get(message_id).await.map_err(from_error)?;

    let data = state
        .logs
        .list_by_message(message_id, query.limit(), query.offset())
        .await
        .map_err(from_error)?;
    let total = state
        .logs
        .count_by_message(message_id, None)
        .await
        .map_err(from_error)?;
    let succeeded = state
        .logs
        .count_by_message(message_id, Some(true))
        .await
        .map_err(from_error)?;

    Ok(Json(MessageLogResponse {
        data,
        total,
        succeeded,
        failed: total - succeeded,
    }))
}
