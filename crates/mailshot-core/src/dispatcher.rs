//! Message Dispatcher - executes one dispatch run for one message

use crate::content::build_email;
use crate::delivery_log::DeliveryLogger;
use crate::lifecycle::MessageState;
use crate::resolver::RecipientResolver;
use crate::transport::{MailTransport, TransportSession};
use chrono::Utc;
use mailshot_common::types::normalize_email;
use mailshot_common::{Error, Result};
use mailshot_storage::models::Message;
use mailshot_storage::repository::MessageRepository;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Dispatch mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchMode {
    /// Send to the resolved recipient population and finish the message
    Real,
    /// Send to the given addresses only; the message state is untouched
    Test { emails: Vec<String> },
}

/// Outcome counts of a dispatch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchResult {
    pub delivered_count: i32,
    pub failed_count: i32,
}

/// Message dispatcher
#[derive(Clone)]
pub struct MessageDispatcher {
    messages: Arc<dyn MessageRepository>,
    resolver: RecipientResolver,
    logger: DeliveryLogger,
    transport: Arc<dyn MailTransport>,
}

impl MessageDispatcher {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        resolver: RecipientResolver,
        logger: DeliveryLogger,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        Self {
            messages,
            resolver,
            logger,
            transport,
        }
    }

    /// Repository the dispatcher finishes messages in
    pub fn messages(&self) -> &Arc<dyn MessageRepository> {
        &self.messages
    }

    /// Run one dispatch.
    ///
    /// Per-recipient failures are counted and logged, never returned. An
    /// error means the run was aborted: the transport could not be opened or
    /// a log entry could not be persisted. Counters are then left untouched.
    ///
    /// A real run only starts for a queued message; drafts and sent
    /// messages are refused before any transport is opened.
    pub async fn dispatch(&self, message: &Message, mode: DispatchMode) -> Result<DispatchResult> {
        if mode == DispatchMode::Real {
            let stored = self
                .messages
                .get(message.id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Message {}", message.id)))?;
            let state = MessageState::of(&stored);
            if state != MessageState::Queued {
                return Err(Error::InvalidState(format!(
                    "Message {} is {}; only queued messages can be sent",
                    message.id, state
                )));
            }
        }

        let recipients = match &mode {
            DispatchMode::Test { emails } => emails
                .iter()
                .map(|e| normalize_email(e))
                .filter(|e| !e.is_empty())
                .collect::<BTreeSet<_>>(),
            DispatchMode::Real => self.resolver.resolve(message.id).await?,
        };

        let mut result = DispatchResult::default();

        if !recipients.is_empty() {
            debug!(
                message_id = %message.id,
                recipients = recipients.len(),
                "Opening transport session"
            );

            let mut session = self.transport.open().await?;
            let sent = self
                .send_all(message, &recipients, session.as_mut(), &mut result)
                .await;

            if let Err(e) = session.close().await {
                debug!(message_id = %message.id, "Ignoring transport close error: {}", e);
            }
            sent?;
        }

        if mode == DispatchMode::Real {
            self.messages
                .complete_send(
                    message.id,
                    result.delivered_count,
                    result.failed_count,
                    Utc::now(),
                )
                .await?;

            info!(
                message_id = %message.id,
                delivered = result.delivered_count,
                failed = result.failed_count,
                "Message marked as sent"
            );
        }

        Ok(result)
    }

    async fn send_all(
        &self,
        message: &Message,
        recipients: &BTreeSet<String>,
        session: &mut dyn TransportSession,
        result: &mut DispatchResult,
    ) -> Result<()> {
        for recipient in recipients {
            let outcome = match build_email(message, recipient) {
                Ok(email) => session.send(&email).await,
                Err(e) => Err(e),
            };

            let success = match outcome {
                Ok(()) => {
                    result.delivered_count += 1;
                    true
                }
                Err(e) => {
                    warn!(
                        message_id = %message.id,
                        recipient = %recipient,
                        "Delivery failed: {}",
                        e
                    );
                    result.failed_count += 1;
                    false
                }
            };

            self.logger.record(message.id, recipient, success).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedTransport;
    use mailshot_common::types::ContentType;
    use mailshot_storage::models::CreateMessage;
    use mailshot_storage::repository::{MessageLogRepository, RecipientRepository};
    use mailshot_storage::InMemoryStore;
    use pretty_assertions::assert_eq;

    async fn setup(transport: ScriptedTransport) -> (Arc<InMemoryStore>, MessageDispatcher, Message) {
        let store = Arc::new(InMemoryStore::new());
        let dispatcher = MessageDispatcher::new(
            store.clone(),
            RecipientResolver::new(store.clone(), store.clone()),
            DeliveryLogger::new(store.clone()),
            Arc::new(transport),
        );
        let message = MessageRepository::create(
            store.as_ref(),
            CreateMessage {
                content_type: ContentType::PlainText,
                subject: "Spring newsletter".to_string(),
                plain_text: "Hello".to_string(),
                from_email: "news@example.org".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        store.try_mark_queued(message.id).await.unwrap();
        let message = store.get(message.id).await.unwrap().unwrap();
        (store, dispatcher, message)
    }

    #[tokio::test]
    async fn test_empty_recipient_set_finishes_without_transport() {
        let transport = ScriptedTransport::new();
        let (store, dispatcher, message) = setup(transport.clone()).await;

        let result = dispatcher.dispatch(&message, DispatchMode::Real).await.unwrap();
        assert_eq!(result, DispatchResult::default());
        assert_eq!(transport.opens(), 0);

        let stored = store.get(message.id).await.unwrap().unwrap();
        assert!(stored.sent);
        assert!(stored.delivered.is_some());
        assert_eq!(stored.messages_delivered, 0);
        assert_eq!(stored.messages_failed, 0);
        assert_eq!(store.count_by_message(message.id, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_partial_failure_is_counted_and_logged() {
        let transport = ScriptedTransport::failing(&["b@example.com"]);
        let (store, dispatcher, message) = setup(transport.clone()).await;
        for address in ["a@example.com", "b@example.com", "c@example.com"] {
            store.add(message.id, address).await.unwrap();
        }

        let result = dispatcher.dispatch(&message, DispatchMode::Real).await.unwrap();
        assert_eq!(result.delivered_count, 2);
        assert_eq!(result.failed_count, 1);
        assert_eq!(transport.opens(), 1);
        assert_eq!(transport.closes(), 1);

        let stored = store.get(message.id).await.unwrap().unwrap();
        assert!(stored.sent);
        assert_eq!(stored.messages_delivered, 2);
        assert_eq!(stored.messages_failed, 1);

        assert_eq!(store.count_by_message(message.id, None).await.unwrap(), 3);
        assert_eq!(store.count_by_message(message.id, Some(true)).await.unwrap(), 2);
        let failed: Vec<String> = store
            .list_by_message(message.id, 10, 0)
            .await
            .unwrap()
            .into_iter()
            .filter(|l| !l.success)
            .map(|l| l.recipient)
            .collect();
        assert_eq!(failed, vec!["b@example.com"]);
    }

    #[tokio::test]
    async fn test_recipients_are_deduplicated_across_sources() {
        let transport = ScriptedTransport::new();
        let (store, dispatcher, message) = setup(transport.clone()).await;
        store.add(message.id, "A@x.com").await.unwrap();
        let group = store
            .add_contact_group("Members", &[" a@x.com ", "bad@x.com-INVALID", "b@x.com"])
            .await;
        store.set_contact_groups(message.id, &[group]).await.unwrap();

        let result = dispatcher.dispatch(&message, DispatchMode::Real).await.unwrap();
        assert_eq!(result.delivered_count, 2);
        assert_eq!(transport.sent(), vec!["a@x.com", "b@x.com"]);
    }

    #[tokio::test]
    async fn test_test_mode_leaves_state_untouched() {
        let transport = ScriptedTransport::failing(&["fail@example.com"]);
        let (store, dispatcher, message) = setup(transport.clone()).await;
        let mode = DispatchMode::Test {
            emails: vec![
                "Tester@Example.com".to_string(),
                "tester@example.com".to_string(),
                "fail@example.com".to_string(),
            ],
        };

        for _ in 0..2 {
            let result = dispatcher.dispatch(&message, mode.clone()).await.unwrap();
            assert_eq!(result.delivered_count, 1);
            assert_eq!(result.failed_count, 1);
        }

        let stored = store.get(message.id).await.unwrap().unwrap();
        assert!(stored.queued);
        assert!(!stored.sent);
        assert!(stored.delivered.is_none());
        assert_eq!(stored.messages_delivered, 0);
        assert_eq!(stored.messages_failed, 0);
        assert_eq!(store.count_by_message(message.id, None).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_open_failure_aborts_run() {
        let transport = ScriptedTransport::refusing();
        let (store, dispatcher, message) = setup(transport).await;
        store.add(message.id, "a@example.com").await.unwrap();

        assert!(dispatcher.dispatch(&message, DispatchMode::Real).await.is_err());

        let stored = store.get(message.id).await.unwrap().unwrap();
        assert!(stored.queued);
        assert!(!stored.sent);
        assert_eq!(store.count_by_message(message.id, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sent_message_is_not_dispatched_again() {
        let transport = ScriptedTransport::new();
        let (store, dispatcher, message) = setup(transport.clone()).await;
        store.add(message.id, "a@example.com").await.unwrap();

        dispatcher.dispatch(&message, DispatchMode::Real).await.unwrap();
        let sent = store.get(message.id).await.unwrap().unwrap();

        let again = dispatcher.dispatch(&sent, DispatchMode::Real).await;
        assert!(matches!(again, Err(Error::InvalidState(_))));

        // A stale copy is checked against the stored state
        assert!(!message.sent);
        let stale = dispatcher.dispatch(&message, DispatchMode::Real).await;
        assert!(matches!(stale, Err(Error::InvalidState(_))));

        let stored = store.get(message.id).await.unwrap().unwrap();
        assert_eq!(stored.delivered, sent.delivered);
        assert_eq!(stored.messages_delivered, 1);
        assert_eq!(transport.opens(), 1);
        assert_eq!(transport.sent(), vec!["a@example.com"]);
        assert_eq!(store.count_by_message(message.id, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_draft_message_is_refused_in_real_mode() {
        let transport = ScriptedTransport::new();
        let (store, dispatcher, message) = setup(transport.clone()).await;
        store.unmark_queued(message.id).await.unwrap();
        store.add(message.id, "a@example.com").await.unwrap();
        let draft = store.get(message.id).await.unwrap().unwrap();

        let result = dispatcher.dispatch(&draft, DispatchMode::Real).await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
        assert_eq!(transport.opens(), 0);
        assert_eq!(store.count_by_message(message.id, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_close_error_is_swallowed() {
        let transport = ScriptedTransport::failing_close();
        let (store, dispatcher, message) = setup(transport.clone()).await;
        store.add(message.id, "a@example.com").await.unwrap();

        let result = dispatcher.dispatch(&message, DispatchMode::Real).await.unwrap();
        assert_eq!(result.delivered_count, 1);
        assert_eq!(transport.closes(), 1);
    }
}
