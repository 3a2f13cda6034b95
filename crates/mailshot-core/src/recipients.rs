//! Explicit recipient import and removal

use mailshot_common::types::MessageId;
use mailshot_common::{Error, Result};
use mailshot_storage::repository::RecipientRepository;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Outcome of an import batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub added: usize,
    pub existing: usize,
}

impl ImportSummary {
    pub fn summary_line(&self) -> String {
        format!(
            "Recipients imported ({} new, {} already existed).",
            self.added, self.existing
        )
    }
}

/// Outcome of a removal batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RemovalSummary {
    pub removed: usize,
    pub missing: usize,
}

impl RemovalSummary {
    pub fn summary_line(&self) -> String {
        format!(
            "Recipients removed ({} removed, {} did not exist).",
            self.removed, self.missing
        )
    }
}

/// Adds and removes explicit recipients in batches
#[derive(Clone)]
pub struct RecipientImporter {
    recipients: Arc<dyn RecipientRepository>,
}

impl RecipientImporter {
    pub fn new(recipients: Arc<dyn RecipientRepository>) -> Self {
        Self { recipients }
    }

    /// Insert each address; duplicates are counted, not fatal
    pub async fn import(&self, message_id: MessageId, addresses: &[String]) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        for address in addresses {
            match self.recipients.add(message_id, address).await {
                Ok(_) => summary.added += 1,
                Err(Error::AlreadyExists(existing)) => {
                    debug!(message_id = %message_id, recipient = %existing, "Recipient already exists");
                    summary.existing += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(summary)
    }

    /// Remove each address, counting those that were not present
    pub async fn remove(&self, message_id: MessageId, addresses: &[String]) -> Result<RemovalSummary> {
        let mut summary = RemovalSummary::default();

        for address in addresses {
            if self.recipients.remove(message_id, address).await? {
                summary.removed += 1;
            } else {
                summary.missing += 1;
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailshot_storage::InMemoryStore;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn addresses(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    #[tokio::test]
    async fn test_import_then_remove_round_trip() {
        let store = Arc::new(InMemoryStore::new());
        let importer = RecipientImporter::new(store.clone());
        let message_id = Uuid::now_v7();
        let batch = addresses(&["a@example.com", "b@example.com", "c@example.com"]);

        let imported = importer.import(message_id, &batch).await.unwrap();
        assert_eq!(imported, ImportSummary { added: 3, existing: 0 });

        let again = importer
            .import(message_id, &addresses(&["A@example.com", "d@example.com"]))
            .await
            .unwrap();
        assert_eq!(again.summary_line(), "Recipients imported (1 new, 1 already existed).");

        let removed = importer
            .remove(message_id, &addresses(&["a@example.com", "b@example.com", "c@example.com", "d@example.com"]))
            .await
            .unwrap();
        assert_eq!(removed, RemovalSummary { removed: 4, missing: 0 });
        assert_eq!(store.count(message_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_missing_is_reported() {
        let store = Arc::new(InMemoryStore::new());
        let importer = RecipientImporter::new(store.clone());
        let message_id = Uuid::now_v7();
        importer
            .import(message_id, &addresses(&["a@example.com"]))
            .await
            .unwrap();

        let removed = importer
            .remove(message_id, &addresses(&["ghost@example.com"]))
            .await
            .unwrap();
        assert_eq!(removed.summary_line(), "Recipients removed (0 removed, 1 did not exist).");
        assert_eq!(store.count(message_id).await.unwrap(), 1);
    }
}
