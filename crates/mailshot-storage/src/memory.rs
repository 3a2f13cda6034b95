//! In-memory implementation of every repository trait.
//!
//! Used by tests and local runs without PostgreSQL. Semantics mirror the
//! database implementations, including the unique `(message, address)`
//! constraint on recipients and the conditional queued transition.

use crate::models::{
    ContactGroup, ContactGroupMembers, CreateMessage, Message, MessageLog, Recipient,
};
use crate::repository::{
    ContactGroupProvider, MessageLogRepository, MessageRepository, RecipientRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailshot_common::types::{normalize_email, ContactGroupId, MessageId};
use mailshot_common::{Error, Result};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    messages: HashMap<MessageId, Message>,
    recipients: Vec<Recipient>,
    logs: Vec<MessageLog>,
    groups: Vec<(ContactGroup, Vec<String>)>,
    message_groups: HashMap<MessageId, Vec<ContactGroupId>>,
}

/// In-memory store
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a contact group with raw member addresses
    pub async fn add_contact_group(&self, name: &str, members: &[&str]) -> ContactGroupId {
        let id = Uuid::now_v7();
        let group = ContactGroup {
            id,
            name: name.to_string(),
        };
        let members = members.iter().map(|m| m.to_string()).collect();
        self.state.lock().await.groups.push((group, members));
        id
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn create(&self, input: CreateMessage) -> Result<Message> {
        let now = Utc::now();
        let message = Message {
            id: Uuid::now_v7(),
            content_type: input.content_type.code().to_string(),
            subject: input.subject,
            plain_text: input.plain_text,
            html_text: input.html_text,
            from_name: input.from_name,
            from_email: input.from_email,
            reply_to: input.reply_to,
            queued: false,
            sent: false,
            delivered: None,
            messages_delivered: 0,
            messages_failed: 0,
            created_at: now,
            updated_at: now,
        };

        self.state
            .lock()
            .await
            .messages
            .insert(message.id, message.clone());
        Ok(message)
    }

    async fn get(&self, id: MessageId) -> Result<Option<Message>> {
        Ok(self.state.lock().await.messages.get(&id).cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Message>> {
        let state = self.state.lock().await;
        let mut messages: Vec<Message> = state.messages.values().cloned().collect();
        messages.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(messages
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.state.lock().await.messages.len() as i64)
    }

    async fn save(&self, message: &Message) -> Result<Message> {
        let mut state = self.state.lock().await;
        let stored = state
            .messages
            .get_mut(&message.id)
            .ok_or_else(|| Error::NotFound(format!("Message {}", message.id)))?;

        stored.content_type = message.content_type.clone();
        stored.subject = message.subject.clone();
        stored.plain_text = message.plain_text.clone();
        stored.html_text = message.html_text.clone();
        stored.from_name = message.from_name.clone();
        stored.from_email = message.from_email.clone();
        stored.reply_to = message.reply_to.clone();
        stored.updated_at = Utc::now();

        Ok(stored.clone())
    }

    async fn delete(&self, id: MessageId) -> Result<bool> {
        let mut state = self.state.lock().await;
        let existed = state.messages.remove(&id).is_some();
        if existed {
            state.recipients.retain(|r| r.message_id != id);
            state.logs.retain(|l| l.message_id != id);
            state.message_groups.remove(&id);
        }
        Ok(existed)
    }

    async fn try_mark_queued(&self, id: MessageId) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.messages.get_mut(&id) {
            Some(message) if !message.queued && !message.sent => {
                message.queued = true;
                message.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn unmark_queued(&self, id: MessageId) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.messages.get_mut(&id) {
            Some(message) if message.queued && !message.sent => {
                message.queued = false;
                message.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_send(
        &self,
        id: MessageId,
        delivered: i32,
        failed: i32,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let message = state
            .messages
            .get_mut(&id)
            .filter(|m| m.queued && !m.sent)
            .ok_or_else(|| {
                Error::InvalidState(format!(
                    "Message {} is missing, not queued or already sent",
                    id
                ))
            })?;

        message.messages_delivered = delivered;
        message.messages_failed = failed;
        message.delivered = Some(at);
        message.sent = true;
        message.updated_at = Utc::now();
        Ok(())
    }

    async fn contact_group_ids(&self, id: MessageId) -> Result<Vec<ContactGroupId>> {
        Ok(self
            .state
            .lock()
            .await
            .message_groups
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_contact_groups(&self, id: MessageId, groups: &[ContactGroupId]) -> Result<()> {
        let mut unique = groups.to_vec();
        unique.sort();
        unique.dedup();
        self.state.lock().await.message_groups.insert(id, unique);
        Ok(())
    }
}

#[async_trait]
impl RecipientRepository for InMemoryStore {
    async fn add(&self, message_id: MessageId, email: &str) -> Result<Recipient> {
        let to_email = normalize_email(email);
        let mut state = self.state.lock().await;

        if state
            .recipients
            .iter()
            .any(|r| r.message_id == message_id && r.to_email == to_email)
        {
            return Err(Error::AlreadyExists(to_email));
        }

        let recipient = Recipient {
            id: Uuid::now_v7(),
            message_id,
            to_email,
            created_at: Utc::now(),
        };
        state.recipients.push(recipient.clone());
        Ok(recipient)
    }

    async fn remove(&self, message_id: MessageId, email: &str) -> Result<bool> {
        let to_email = normalize_email(email);
        let mut state = self.state.lock().await;
        let before = state.recipients.len();
        state
            .recipients
            .retain(|r| !(r.message_id == message_id && r.to_email == to_email));
        Ok(state.recipients.len() < before)
    }

    async fn list_emails(&self, message_id: MessageId) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .await
            .recipients
            .iter()
            .filter(|r| r.message_id == message_id)
            .map(|r| r.to_email.clone())
            .collect())
    }

    async fn count(&self, message_id: MessageId) -> Result<i64> {
        Ok(self
            .state
            .lock()
            .await
            .recipients
            .iter()
            .filter(|r| r.message_id == message_id)
            .count() as i64)
    }
}

#[async_trait]
impl MessageLogRepository for InMemoryStore {
    async fn record(
        &self,
        message_id: MessageId,
        recipient: &str,
        success: bool,
    ) -> Result<MessageLog> {
        let log = MessageLog {
            id: Uuid::now_v7(),
            message_id,
            recipient: recipient.to_string(),
            success,
            timestamp: Utc::now(),
        };
        self.state.lock().await.logs.push(log.clone());
        Ok(log)
    }

    async fn list_by_message(
        &self,
        message_id: MessageId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageLog>> {
        let state = self.state.lock().await;
        Ok(state
            .logs
            .iter()
            .rev()
            .filter(|l| l.message_id == message_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count_by_message(&self, message_id: MessageId, success: Option<bool>) -> Result<i64> {
        Ok(self
            .state
            .lock()
            .await
            .logs
            .iter()
            .filter(|l| l.message_id == message_id)
            .filter(|l| success.map_or(true, |s| l.success == s))
            .count() as i64)
    }
}

#[async_trait]
impl ContactGroupProvider for InMemoryStore {
    async fn list_groups(&self) -> Result<Vec<ContactGroup>> {
        let mut groups: Vec<ContactGroup> = self
            .state
            .lock()
            .await
            .groups
            .iter()
            .map(|(g, _)| g.clone())
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn groups_for_message(&self, message_id: MessageId) -> Result<Vec<ContactGroupMembers>> {
        let state = self.state.lock().await;
        let Some(ids) = state.message_groups.get(&message_id) else {
            return Ok(Vec::new());
        };

        Ok(state
            .groups
            .iter()
            .filter(|(g, _)| ids.contains(&g.id))
            .map(|(group, members)| ContactGroupMembers {
                group: group.clone(),
                members: members.clone(),
            })
            .collect())
    }
}
