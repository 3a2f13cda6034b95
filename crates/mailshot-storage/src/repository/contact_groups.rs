//! Read-only access to the contact-group store

use crate::db::{db_error, DatabasePool};
use crate::models::{ContactGroup, ContactGroupMembers};
use async_trait::async_trait;
use mailshot_common::types::{ContactGroupId, MessageId};
use mailshot_common::Result;
use std::collections::BTreeMap;

/// Provider of contact groups and their member addresses
#[async_trait]
pub trait ContactGroupProvider: Send + Sync {
    /// All known contact groups
    async fn list_groups(&self) -> Result<Vec<ContactGroup>>;

    /// Groups associated with a message, each with its raw member addresses
    async fn groups_for_message(&self, message_id: MessageId) -> Result<Vec<ContactGroupMembers>>;
}

/// Database contact group provider
pub struct DbContactGroupProvider {
    pool: DatabasePool,
}

impl DbContactGroupProvider {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactGroupProvider for DbContactGroupProvider {
    async fn list_groups(&self) -> Result<Vec<ContactGroup>> {
        sqlx::query_as::<_, ContactGroup>("SELECT id, name FROM contact_groups ORDER BY name")
            .fetch_all(self.pool.pool())
            .await
            .map_err(db_error)
    }

    async fn groups_for_message(&self, message_id: MessageId) -> Result<Vec<ContactGroupMembers>> {
        // Left joins keep empty groups in the preview
        let rows: Vec<(ContactGroupId, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT g.id, g.name, c.email
            FROM message_contact_groups mg
            JOIN contact_groups g ON g.id = mg.group_id
            LEFT JOIN contact_group_members m ON m.group_id = g.id
            LEFT JOIN contacts c ON c.id = m.contact_id
            WHERE mg.message_id = $1
            ORDER BY g.name, c.email
            "#,
        )
        .bind(message_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_error)?;

        let mut groups: BTreeMap<(String, ContactGroupId), Vec<String>> = BTreeMap::new();
        for (id, name, email) in rows {
            let members = groups.entry((name, id)).or_default();
            if let Some(email) = email {
                members.push(email);
            }
        }

        Ok(groups
            .into_iter()
            .map(|((name, id), members)| ContactGroupMembers {
                group: ContactGroup { id, name },
                members,
            })
            .collect())
    }
}
