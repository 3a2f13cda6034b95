//! Dispatch job - the asynchronous entry point of a dispatch run

use crate::dispatcher::{DispatchMode, DispatchResult, MessageDispatcher};
use mailshot_common::types::MessageId;
use mailshot_common::Result;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Job payload for a dispatch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchJob {
    pub message_id: MessageId,
    #[serde(default)]
    pub test: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emails: Option<Vec<String>>,
}

impl DispatchJob {
    /// Real send to the resolved recipient population
    pub fn real(message_id: MessageId) -> Self {
        Self {
            message_id,
            test: false,
            emails: None,
        }
    }

    /// Test send to explicit addresses
    pub fn test(message_id: MessageId, emails: Vec<String>) -> Self {
        Self {
            message_id,
            test: true,
            emails: Some(emails),
        }
    }

    pub fn mode(&self) -> DispatchMode {
        if self.test {
            DispatchMode::Test {
                emails: self.emails.clone().unwrap_or_default(),
            }
        } else {
            DispatchMode::Real
        }
    }

    /// Execute the job.
    ///
    /// A message that no longer exists is reported to the operational log
    /// and the job still completes, so the queue never retries it.
    pub async fn run(&self, dispatcher: &MessageDispatcher) -> Result<Option<DispatchResult>> {
        let message = match dispatcher.messages().get(self.message_id).await? {
            Some(message) => message,
            None => {
                error!(message_id = %self.message_id, "Message {} does not exist", self.message_id);
                return Ok(None);
            }
        };

        match dispatcher.dispatch(&message, self.mode()).await {
            Ok(result) => {
                info!(
                    message_id = %self.message_id,
                    test = self.test,
                    delivered = result.delivered_count,
                    failed = result.failed_count,
                    "Message {} successfully sent",
                    self.message_id
                );
                Ok(Some(result))
            }
            Err(e) => {
                error!(message_id = %self.message_id, "Dispatch run aborted: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery_log::DeliveryLogger;
    use crate::resolver::RecipientResolver;
    use crate::transport::testing::ScriptedTransport;
    use mailshot_storage::models::CreateMessage;
    use mailshot_storage::repository::{MessageRepository, RecipientRepository};
    use mailshot_storage::InMemoryStore;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use uuid::Uuid;

    fn dispatcher(store: &Arc<InMemoryStore>, transport: ScriptedTransport) -> MessageDispatcher {
        MessageDispatcher::new(
            store.clone(),
            RecipientResolver::new(store.clone(), store.clone()),
            DeliveryLogger::new(store.clone()),
            Arc::new(transport),
        )
    }

    #[test]
    fn test_payload_format() {
        let id = Uuid::now_v7();
        let payload = serde_json::to_value(DispatchJob::real(id)).unwrap();
        assert_eq!(payload, serde_json::json!({ "message_id": id, "test": false }));

        let job: DispatchJob = serde_json::from_value(serde_json::json!({
            "message_id": id,
            "test": true,
            "emails": ["qa@example.com"],
        }))
        .unwrap();
        assert_eq!(job, DispatchJob::test(id, vec!["qa@example.com".to_string()]));
    }

    #[tokio::test]
    async fn test_missing_message_completes_quietly() {
        let store = Arc::new(InMemoryStore::new());
        let transport = ScriptedTransport::new();
        let dispatcher = dispatcher(&store, transport.clone());

        let outcome = DispatchJob::real(Uuid::now_v7()).run(&dispatcher).await.unwrap();
        assert_eq!(outcome, None);
        assert_eq!(transport.opens(), 0);
    }

    #[tokio::test]
    async fn test_run_dispatches_test_send() {
        let store = Arc::new(InMemoryStore::new());
        let transport = ScriptedTransport::new();
        let dispatcher = dispatcher(&store, transport.clone());
        let message = MessageRepository::create(
            store.as_ref(),
            CreateMessage {
                subject: "Preview".to_string(),
                plain_text: "Body".to_string(),
                from_email: "news@example.org".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        store.add(message.id, "everyone@example.com").await.unwrap();

        let job = DispatchJob::test(message.id, vec!["qa@example.com".to_string()]);
        let outcome = job.run(&dispatcher).await.unwrap().unwrap();

        assert_eq!(outcome.delivered_count, 1);
        assert_eq!(transport.sent(), vec!["qa@example.com"]);
    }

    #[tokio::test]
    async fn test_run_reports_aborted_dispatch() {
        let store = Arc::new(InMemoryStore::new());
        let dispatcher = dispatcher(&store, ScriptedTransport::refusing());
        let message = MessageRepository::create(
            store.as_ref(),
            CreateMessage {
                from_email: "news@example.org".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        store.add(message.id, "a@example.com").await.unwrap();
        store.try_mark_queued(message.id).await.unwrap();

        assert!(DispatchJob::real(message.id).run(&dispatcher).await.is_err());
        assert!(!store.get(message.id).await.unwrap().unwrap().sent);
    }
}
