//! Delivery log repository

use crate::db::{db_error, DatabasePool};
use crate::models::MessageLog;
use async_trait::async_trait;
use mailshot_common::types::MessageId;
use mailshot_common::Result;
use uuid::Uuid;

/// Message log repository trait. Entries are append-only.
#[async_trait]
pub trait MessageLogRepository: Send + Sync {
    /// Append one delivery attempt
    async fn record(&self, message_id: MessageId, recipient: &str, success: bool)
        -> Result<MessageLog>;

    /// List the log of a message, newest first
    async fn list_by_message(
        &self,
        message_id: MessageId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageLog>>;

    /// Count log entries of a message, optionally by outcome
    async fn count_by_message(&self, message_id: MessageId, success: Option<bool>) -> Result<i64>;
}

/// Database message log repository
pub struct DbMessageLogRepository {
    pool: DatabasePool,
}

impl DbMessageLogRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageLogRepository for DbMessageLogRepository {
    async fn record(
        &self,
        message_id: MessageId,
        recipient: &str,
        success: bool,
    ) -> Result<MessageLog> {
        sqlx::query_as::<_, MessageLog>(
            r#"
            INSERT INTO message_logs (id, message_id, recipient, success)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(message_id)
        .bind(recipient)
        .bind(success)
        .fetch_one(self.pool.pool())
        .await
        .map_err(db_error)
    }

    async fn list_by_message(
        &self,
        message_id: MessageId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageLog>> {
        sqlx::query_as::<_, MessageLog>(
            r#"
            SELECT * FROM message_logs
            WHERE message_id = $1
            ORDER BY timestamp DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(message_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_error)
    }

    async fn count_by_message(&self, message_id: MessageId, success: Option<bool>) -> Result<i64> {
        let count: (i64,) = if let Some(success) = success {
            sqlx::query_as(
                "SELECT COUNT(*) FROM message_logs WHERE message_id = $1 AND success = $2",
            )
            .bind(message_id)
            .bind(success)
            .fetch_one(self.pool.pool())
            .await
            .map_err(db_error)?
        } else {
            sqlx::query_as("SELECT COUNT(*) FROM message_logs WHERE message_id = $1")
                .bind(message_id)
                .fetch_one(self.pool.pool())
                .await
                .map_err(db_error)?
        };
        Ok(count.0)
    }
}
