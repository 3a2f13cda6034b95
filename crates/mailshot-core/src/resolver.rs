//! Recipient resolution
//!
//! The effective recipient set of a message is the union of its explicit
//! recipients and the usable addresses of every associated contact group,
//! lower-cased and deduplicated.

use mailshot_common::types::{is_disabled_address, normalize_email, MessageId};
use mailshot_common::Result;
use mailshot_storage::models::ContactGroupMembers;
use mailshot_storage::repository::{ContactGroupProvider, RecipientRepository};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Resolves who a message goes to
#[derive(Clone)]
pub struct RecipientResolver {
    recipients: Arc<dyn RecipientRepository>,
    groups: Arc<dyn ContactGroupProvider>,
}

impl RecipientResolver {
    pub fn new(
        recipients: Arc<dyn RecipientRepository>,
        groups: Arc<dyn ContactGroupProvider>,
    ) -> Self {
        Self { recipients, groups }
    }

    /// Effective recipient set of a message
    pub async fn resolve(&self, message_id: MessageId) -> Result<BTreeSet<String>> {
        let explicit = self.recipients.list_emails(message_id).await?;
        let groups = self.groups.groups_for_message(message_id).await?;
        Ok(Self::merge(&explicit, &groups))
    }

    /// Union of explicit addresses and usable group members
    pub fn merge(explicit: &[String], groups: &[ContactGroupMembers]) -> BTreeSet<String> {
        let members = groups
            .iter()
            .flat_map(|g| g.members.iter())
            .filter(|m| Self::is_usable(m));

        explicit
            .iter()
            .chain(members)
            .map(|a| normalize_email(a))
            .filter(|a| !a.is_empty())
            .collect()
    }

    /// Explicit recipient addresses of a message
    pub async fn explicit_recipients(&self, message_id: MessageId) -> Result<Vec<String>> {
        self.recipients.list_emails(message_id).await
    }

    /// Group members that would receive the message, per group
    pub async fn group_recipients(
        &self,
        message_id: MessageId,
    ) -> Result<Vec<ContactGroupMembers>> {
        let groups = self.groups.groups_for_message(message_id).await?;
        Ok(groups
            .into_iter()
            .map(|g| ContactGroupMembers {
                members: g
                    .members
                    .into_iter()
                    .filter(|m| Self::is_usable(m))
                    .collect(),
                group: g.group,
            })
            .collect())
    }

    /// Usable group members plus explicit recipients, without deduplication
    pub async fn recipient_count(&self, message_id: MessageId) -> Result<i64> {
        let explicit = self.recipients.count(message_id).await?;
        let members: usize = self
            .group_recipients(message_id)
            .await?
            .iter()
            .map(|g| g.members.len())
            .sum();
        Ok(explicit + members as i64)
    }

    fn is_usable(address: &str) -> bool {
        !address.trim().is_empty() && !is_disabled_address(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailshot_storage::models::{ContactGroup, CreateMessage};
    use mailshot_storage::repository::MessageRepository;
    use mailshot_storage::InMemoryStore;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn group(members: &[&str]) -> ContactGroupMembers {
        ContactGroupMembers {
            group: ContactGroup {
                id: Uuid::now_v7(),
                name: "members".to_string(),
            },
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn test_merge_dedups_case_insensitively() {
        let explicit = vec!["A@Example.com".to_string(), "b@example.com".to_string()];
        let groups = vec![group(&["a@example.com", "c@example.com"])];

        let resolved: Vec<String> = RecipientResolver::merge(&explicit, &groups)
            .into_iter()
            .collect();
        assert_eq!(
            resolved,
            vec!["a@example.com", "b@example.com", "c@example.com"]
        );
    }

    #[test]
    fn test_merge_skips_disabled_and_blank_members() {
        let groups = vec![group(&["ok@example.com", "bounced@example.com-INVALID", "", "  "])];

        let resolved: Vec<String> = RecipientResolver::merge(&[], &groups).into_iter().collect();
        assert_eq!(resolved, vec!["ok@example.com"]);
    }

    #[tokio::test]
    async fn test_resolve_and_count() {
        let store = Arc::new(InMemoryStore::new());
        let message = MessageRepository::create(store.as_ref(), CreateMessage::default())
            .await
            .unwrap();
        store.add(message.id, "a@example.com").await.unwrap();

        let group_id = store
            .add_contact_group("Friends", &["A@example.com", "x@example.com-invalid", "z@example.com"])
            .await;
        store.set_contact_groups(message.id, &[group_id]).await.unwrap();

        let resolver = RecipientResolver::new(store.clone(), store.clone());

        let resolved: Vec<String> = resolver.resolve(message.id).await.unwrap().into_iter().collect();
        assert_eq!(resolved, vec!["a@example.com", "z@example.com"]);

        // The count is not deduplicated across sources
        assert_eq!(resolver.recipient_count(message.id).await.unwrap(), 3);

        let preview = resolver.group_recipients(message.id).await.unwrap();
        assert_eq!(preview.len(), 1);
        assert_eq!(preview[0].group.name, "Friends");
        assert_eq!(preview[0].members, vec!["A@example.com", "z@example.com"]);
    }
}
