//! Message repository

use crate::db::{db_error, DatabasePool};
use crate::models::{CreateMessage, Message};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailshot_common::types::{ContactGroupId, MessageId};
use mailshot_common::{Error, Result};
use uuid::Uuid;

/// Message repository trait
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Create a new message in the draft state
    async fn create(&self, input: CreateMessage) -> Result<Message>;

    /// Get a message by ID
    async fn get(&self, id: MessageId) -> Result<Option<Message>>;

    /// List messages, most recently modified first
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Message>>;

    /// Count all messages
    async fn count(&self) -> Result<i64>;

    /// Persist content and sender fields; lifecycle fields are not written
    async fn save(&self, message: &Message) -> Result<Message>;

    /// Delete a message along with its recipients and logs
    async fn delete(&self, id: MessageId) -> Result<bool>;

    /// Atomically move a draft message to queued.
    ///
    /// Returns `false` when the message is missing, already queued or sent.
    async fn try_mark_queued(&self, id: MessageId) -> Result<bool>;

    /// Move a queued message back to draft when its job could not be
    /// submitted. Sent messages are never touched.
    async fn unmark_queued(&self, id: MessageId) -> Result<bool>;

    /// Record the outcome of a completed real-mode dispatch run.
    ///
    /// Only a queued, unsent message can be completed; anything else is
    /// [`Error::InvalidState`].
    async fn complete_send(
        &self,
        id: MessageId,
        delivered: i32,
        failed: i32,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Contact groups associated with a message
    async fn contact_group_ids(&self, id: MessageId) -> Result<Vec<ContactGroupId>>;

    /// Replace the contact groups associated with a message
    async fn set_contact_groups(&self, id: MessageId, groups: &[ContactGroupId]) -> Result<()>;
}

/// Database message repository
pub struct DbMessageRepository {
    pool: DatabasePool,
}

impl DbMessageRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for DbMessageRepository {
    async fn create(&self, input: CreateMessage) -> Result<Message> {
        let id = Uuid::now_v7();

        sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (
                id, content_type, subject, plain_text, html_text,
                from_name, from_email, reply_to
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.content_type.code())
        .bind(&input.subject)
        .bind(&input.plain_text)
        .bind(&input.html_text)
        .bind(&input.from_name)
        .bind(&input.from_email)
        .bind(&input.reply_to)
        .fetch_one(self.pool.pool())
        .await
        .map_err(db_error)
    }

    async fn get(&self, id: MessageId) -> Result<Option<Message>> {
        sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(db_error)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Message>> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            ORDER BY updated_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_error)
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(self.pool.pool())
            .await
            .map_err(db_error)?;
        Ok(count.0)
    }

    async fn save(&self, message: &Message) -> Result<Message> {
        sqlx::query_as::<_, Message>(
            r#"
            UPDATE messages SET
                content_type = $2,
                subject = $3,
                plain_text = $4,
                html_text = $5,
                from_name = $6,
                from_email = $7,
                reply_to = $8,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(message.id)
        .bind(&message.content_type)
        .bind(&message.subject)
        .bind(&message.plain_text)
        .bind(&message.html_text)
        .bind(&message.from_name)
        .bind(&message.from_email)
        .bind(&message.reply_to)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(db_error)?
        .ok_or_else(|| Error::NotFound(format!("Message {}", message.id)))
    }

    async fn delete(&self, id: MessageId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn try_mark_queued(&self, id: MessageId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET
                queued = TRUE,
                updated_at = NOW()
            WHERE id = $1 AND queued = FALSE AND sent = FALSE
            "#,
        )
        .bind(id)
        .execute(self.pool.pool())
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn unmark_queued(&self, id: MessageId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET
                queued = FALSE,
                updated_at = NOW()
            WHERE id = $1 AND queued = TRUE AND sent = FALSE
            "#,
        )
        .bind(id)
        .execute(self.pool.pool())
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn complete_send(
        &self,
        id: MessageId,
        delivered: i32,
        failed: i32,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET
                messages_delivered = $2,
                messages_failed = $3,
                delivered = $4,
                sent = TRUE,
                updated_at = NOW()
            WHERE id = $1 AND queued = TRUE AND sent = FALSE
            "#,
        )
        .bind(id)
        .bind(delivered)
        .bind(failed)
        .bind(at)
        .execute(self.pool.pool())
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(Error::InvalidState(format!(
                "Message {} is missing, not queued or already sent",
                id
            )));
        }
        Ok(())
    }

    async fn contact_group_ids(&self, id: MessageId) -> Result<Vec<ContactGroupId>> {
        let rows: Vec<(ContactGroupId,)> = sqlx::query_as(
            "SELECT group_id FROM message_contact_groups WHERE message_id = $1",
        )
        .bind(id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(|(group_id,)| group_id).collect())
    }

    async fn set_contact_groups(&self, id: MessageId, groups: &[ContactGroupId]) -> Result<()> {
        let mut tx = self.pool.pool().begin().await.map_err(db_error)?;

        sqlx::query("DELETE FROM message_contact_groups WHERE message_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        for group_id in groups {
            sqlx::query(
                r#"
                INSERT INTO message_contact_groups (message_id, group_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(id)
            .bind(group_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }
}
