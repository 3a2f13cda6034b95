//! Message lifecycle
//!
//! A message moves `draft -> queued -> sent`. The queued transition is
//! guarded by a conditional update in the store, so two concurrent send
//! requests can never both win. Only a completed real dispatch run moves a
//! message to `sent`. Test sends never change state.

use crate::job::DispatchJob;
use crate::queue::JobQueue;
use mailshot_common::types::{JobId, MessageId};
use mailshot_common::Error;
use mailshot_storage::models::Message;
use mailshot_storage::repository::MessageRepository;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Lifecycle state of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    Draft,
    Queued,
    Sent,
}

impl MessageState {
    pub fn of(message: &Message) -> Self {
        if message.sent {
            MessageState::Sent
        } else if message.queued {
            MessageState::Queued
        } else {
            MessageState::Draft
        }
    }
}

impl std::fmt::Display for MessageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageState::Draft => write!(f, "draft"),
            MessageState::Queued => write!(f, "queued"),
            MessageState::Sent => write!(f, "sent"),
        }
    }
}

/// Reasons a send request is refused
#[derive(Error, Debug)]
pub enum SendRequestError {
    #[error("Message {0} not found")]
    NotFound(MessageId),

    #[error("Message {0} is already queued")]
    AlreadyQueued(MessageId),

    #[error("Message {0} has already been sent")]
    AlreadySent(MessageId),

    #[error(transparent)]
    Store(#[from] Error),
}

impl From<SendRequestError> for Error {
    fn from(e: SendRequestError) -> Self {
        match e {
            SendRequestError::NotFound(id) => Error::NotFound(format!("Message {}", id)),
            SendRequestError::Store(e) => e,
            other => Error::InvalidState(other.to_string()),
        }
    }
}

/// Guards and performs lifecycle transitions
#[derive(Clone)]
pub struct MessageStateMachine {
    messages: Arc<dyn MessageRepository>,
    queue: Arc<dyn JobQueue>,
}

impl MessageStateMachine {
    pub fn new(messages: Arc<dyn MessageRepository>, queue: Arc<dyn JobQueue>) -> Self {
        Self { messages, queue }
    }

    /// Request a real send: `draft -> queued`, then submit the job.
    /// If the job cannot be submitted the message goes back to draft.
    pub async fn request_send(&self, id: MessageId) -> Result<JobId, SendRequestError> {
        if !self.messages.try_mark_queued(id).await? {
            let message = self
                .messages
                .get(id)
                .await?
                .ok_or(SendRequestError::NotFound(id))?;

            return Err(match MessageState::of(&message) {
                MessageState::Sent => SendRequestError::AlreadySent(id),
                _ => SendRequestError::AlreadyQueued(id),
            });
        }

        let job_id = match self.queue.enqueue(DispatchJob::real(id)).await {
            Ok(job_id) => job_id,
            Err(e) => {
                error!(message_id = %id, "Failed to submit dispatch job: {}", e);
                if let Err(rollback) = self.messages.unmark_queued(id).await {
                    error!(message_id = %id, "Failed to return message to draft: {}", rollback);
                }
                return Err(e.into());
            }
        };
        info!(message_id = %id, job_id = %job_id, "Message added to the send queue");
        Ok(job_id)
    }

    /// Request a test send; allowed in every state
    pub async fn request_test_send(
        &self,
        id: MessageId,
        emails: Vec<String>,
    ) -> Result<JobId, SendRequestError> {
        if self.messages.get(id).await?.is_none() {
            return Err(SendRequestError::NotFound(id));
        }

        let job_id = self.queue.enqueue(DispatchJob::test(id, emails)).await?;
        info!(message_id = %id, job_id = %job_id, "Test send added to the send queue");
        Ok(job_id)
    }
}
