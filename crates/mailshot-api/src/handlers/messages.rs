//! Message handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    Json,
};
use chrono::{DateTime, Utc};
use mailshot_common::types::{ContactGroupId, ContentType, MessageId};
use mailshot_core::MessageState;
use mailshot_storage::models::{CreateMessage, Message, UpdateMessage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{api_error, from_error, ApiError};
use crate::state::AppState;

/// Pagination query parameters
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Message list response
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageListResponse {
    pub data: Vec<MessageSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Message summary (for list view)
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: MessageId,
    pub subject: String,
    pub content_type: Option<ContentType>,
    pub state: String,
    pub messages_delivered: i32,
    pub messages_failed: i32,
    pub delivered: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<Message> for MessageSummary {
    fn from(msg: Message) -> Self {
        Self {
            state: MessageState::of(&msg).to_string(),
            content_type: msg.content_type_enum(),
            id: msg.id,
            subject: msg.subject,
            messages_delivered: msg.messages_delivered,
            messages_failed: msg.messages_failed,
            delivered: msg.delivered,
            updated_at: msg.updated_at,
        }
    }
}

/// Full message with its lifecycle state
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(flatten)]
    pub message: Message,
    pub state: String,
    pub from_header: String,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            state: MessageState::of(&message).to_string(),
            from_header: message.from_header(),
            message,
        }
    }
}

/// Create message request
#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    #[serde(default)]
    pub content_type: ContentType,
    pub subject: String,
    #[serde(default)]
    pub plain_text: String,
    #[serde(default)]
    pub html_text: String,
    #[serde(default)]
    pub from_name: String,
    pub from_email: String,
    pub reply_to: Option<String>,
}

impl From<CreateMessageRequest> for CreateMessage {
    fn from(req: CreateMessageRequest) -> Self {
        Self {
            content_type: req.content_type,
            subject: req.subject,
            plain_text: req.plain_text,
            html_text: req.html_text,
            from_name: req.from_name,
            from_email: req.from_email,
            reply_to: req.reply_to.filter(|r| !r.trim().is_empty()),
        }
    }
}

/// List messages, most recently modified first
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<MessageListResponse>, ApiError> {
    let (limit, offset) = (query.limit(), query.offset());
    let (messages, total) = state.messages.list(limit, offset).await.map_err(from_error)?;

    Ok(Json(MessageListResponse {
        data: messages.into_iter().map(Into::into).collect(),
        total,
        limit,
        offset,
    }))
}

/// Create a draft message
pub async fn create_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    if req.subject.trim().is_empty() {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation_error",
            "Subject is required",
        ));
    }

    let message = state.messages.create(req.into()).await.map_err(from_error)?;
    Ok((StatusCode::CREATED, Json(message.into())))
}

/// Get a single message
pub async fn get_message(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<MessageId>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = state.messages.get(message_id).await.map_err(from_error)?;
    Ok(Json(message.into()))
}

/// Edit a draft message
pub async fn update_message(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<MessageId>,
    Json(update): Json<UpdateMessage>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = state
        .messages
        .update(message_id, update)
        .await
        .map_err(from_error)?;
    Ok(Json(message.into()))
}

/// Delete a message with its recipients and logs
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<MessageId>,
) -> Result<StatusCode, ApiError> {
    state.messages.delete(message_id).await.map_err(from_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rendered HTML body; only HTML messages have one
pub async fn get_html(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<MessageId>,
) -> Result<Html<String>, ApiError> {
    let message = state.messages.get(message_id).await.map_err(from_error)?;

    if !message.is_html() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            "not_found",
            "Message has no HTML body",
        ));
    }

    Ok(Html(message.html_text))
}

/// Plain-text body
pub async fn get_text(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<MessageId>,
) -> Result<String, ApiError> {
    let message = state.messages.get(message_id).await.map_err(from_error)?;
    Ok(message.plain_text)
}

/// Contact groups of a message
#[derive(Debug, Serialize, Deserialize)]
pub struct ContactGroupsBody {
    pub groups: Vec<ContactGroupId>,
}

pub async fn get_contact_groups(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<MessageId>,
) -> Result<Json<ContactGroupsBody>, ApiError> {
    let groups = state
        .messages
        .contact_groups(message_id)
        .await
        .map_err(from_error)?;
    Ok(Json(ContactGroupsBody { groups }))
}

/// Replace the contact groups of a draft message
pub async fn set_contact_groups(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<MessageId>,
    Json(body): Json<ContactGroupsBody>,
) -> Result<StatusCode, ApiError> {
    let known = state.groups.list_groups().await.map_err(from_error)?;
    if let Some(unknown) = body
        .groups
        .iter()
        .find(|id| !known.iter().any(|g| g.id == **id))
    {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation_error",
            format!("Unknown contact group {}", unknown),
        ));
    }

    state
        .messages
        .set_contact_groups(message_id, &body.groups)
        .await
        .map_err(from_error)?;
    Ok(StatusCode::NO_CONTENT)
}
