//! Recipient preview and import handlers

use axum::{
    extract::{Path, State},
    Json,
};
use mailshot_common::types::{ContactGroupId, MessageId};
use mailshot_core::addresses::parse_address_lines;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::error::{from_error, ApiError};
use crate::state::AppState;

/// Qualifying members of one contact group
#[derive(Debug, Serialize, Deserialize)]
pub struct GroupPreview {
    pub id: ContactGroupId,
    pub name: String,
    pub members: Vec<String>,
}

/// Who a real send would reach
#[derive(Debug, Serialize, Deserialize)]
pub struct RecipientPreview {
    pub groups: Vec<GroupPreview>,
    pub recipients: Vec<String>,
    pub recipient_count: i64,
}

/// Preview the recipient population of a message
pub async fn preview_recipients(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<MessageId>,
) -> Result<Json<RecipientPreview>, ApiError> {
    state.messages.get(message_id).await.map_err(from_error)?;

    let groups = state
        .resolver
        .group_recipients(message_id)
        .await
        .map_err(from_error)?;
    let recipient_count = state
        .resolver
        .recipient_count(message_id)
        .await
        .map_err(from_error)?;
    let mut recipients = state
        .resolver
        .explicit_recipients(message_id)
        .await
        .map_err(from_error)?;
    recipients.sort();

    Ok(Json(RecipientPreview {
        groups: groups
            .into_iter()
            .map(|g| GroupPreview {
                id: g.group.id,
                name: g.group.name,
                members: g.members,
            })
            .collect(),
        recipients,
        recipient_count,
    }))
}

/// Import or removal request; one address per line
#[derive(Debug, Deserialize)]
pub struct ImportRecipientsRequest {
    pub recipients: String,
    #[serde(default)]
    pub remove: bool,
}

/// Import or removal outcome
#[derive(Debug, Serialize, Deserialize)]
pub struct ImportRecipientsResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<usize>,
}

/// Import or remove explicit recipients
pub async fn import_recipients(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<MessageId>,
    Json(req): Json<ImportRecipientsRequest>,
) -> Result<Json<ImportRecipientsResponse>, ApiError> {
    state.messages.get(message_id).await.map_err(from_error)?;
    let addresses = parse_address_lines(&req.recipients).map_err(from_error)?;

    let response = if req.remove {
        let summary = state
            .importer
            .remove(message_id, &addresses)
            .await
            .map_err(from_error)?;
        ImportRecipientsResponse {
            message: summary.summary_line(),
            added: None,
            existing: None,
            removed: Some(summary.removed),
            missing: Some(summary.missing),
        }
    } else {
        let summary = state
            .importer
            .import(message_id, &addresses)
            .await
            .map_err(from_error)?;
        ImportRecipientsResponse {
            message: summary.summary_line(),
            added: Some(summary.added),
            existing: Some(summary.existing),
            removed: None,
            missing: None,
        }
    };

    info!(message_id = %message_id, "{}", response.message);
    Ok(Json(response))
}
