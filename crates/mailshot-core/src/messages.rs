//! Message authoring - create, edit and delete messages

use crate::content::{derive_bodies, prepare_for_save};
use crate::lifecycle::MessageState;
use lettre::Address;
use mailshot_common::types::{ContactGroupId, MessageId};
use mailshot_common::{Error, Result};
use mailshot_storage::models::{CreateMessage, Message, UpdateMessage};
use mailshot_storage::repository::MessageRepository;
use std::sync::Arc;
use tracing::info;

/// Message authoring service
#[derive(Clone)]
pub struct MessageService {
    messages: Arc<dyn MessageRepository>,
}

impl MessageService {
    pub fn new(messages: Arc<dyn MessageRepository>) -> Self {
        Self { messages }
    }

    pub async fn get(&self, id: MessageId) -> Result<Message> {
        self.messages
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Message {}", id)))
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Message>, i64)> {
        let messages = self.messages.list(limit, offset).await?;
        let total = self.messages.count().await?;
        Ok((messages, total))
    }

    /// Create a draft message with derived bodies
    pub async fn create(&self, mut input: CreateMessage) -> Result<Message> {
        validate_sender(&input.from_email, input.reply_to.as_deref())?;
        derive_bodies(input.content_type, &mut input.plain_text, &mut input.html_text)?;

        let message = self.messages.create(input).await?;
        info!(message_id = %message.id, "Message created");
        Ok(message)
    }

    /// Edit a draft message
    pub async fn update(&self, id: MessageId, update: UpdateMessage) -> Result<Message> {
        let mut message = self.get(id).await?;

        let state = MessageState::of(&message);
        if state != MessageState::Draft && (update.changes_content() || update.changes_sender()) {
            return Err(Error::InvalidState(format!(
                "Message {} is {} and can no longer be edited",
                id, state
            )));
        }

        update.apply_to(&mut message);
        validate_sender(&message.from_email, message.reply_to.as_deref())?;
        prepare_for_save(&mut message)?;

        self.messages.save(&message).await
    }

    pub async fn delete(&self, id: MessageId) -> Result<()> {
        if !self.messages.delete(id).await? {
            return Err(Error::NotFound(format!("Message {}", id)));
        }
        info!(message_id = %id, "Message deleted");
        Ok(())
    }

    pub async fn contact_groups(&self, id: MessageId) -> Result<Vec<ContactGroupId>> {
        self.get(id).await?;
        self.messages.contact_group_ids(id).await
    }

    /// Replace the contact groups of a draft message
    pub async fn set_contact_groups(&self, id: MessageId, groups: &[ContactGroupId]) -> Result<()> {
        let message = self.get(id).await?;
        let state = MessageState::of(&message);
        if state != MessageState::Draft {
            return Err(Error::InvalidState(format!(
                "Message {} is {}; its contact groups are frozen",
                id, state
            )));
        }

        self.messages.set_contact_groups(id, groups).await
    }
}

fn validate_sender(from_email: &str, reply_to: Option<&str>) -> Result<()> {
    from_email
        .parse::<Address>()
        .map_err(|_| Error::Validation(format!("'{}' is not a valid email address.", from_email)))?;

    if let Some(reply_to) = reply_to.map(str::trim).filter(|r| !r.is_empty()) {
        reply_to
            .parse::<Address>()
            .map_err(|_| Error::Validation(format!("'{}' is not a valid email address.", reply_to)))?;
    }

    Ok(())
}
