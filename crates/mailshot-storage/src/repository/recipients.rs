//! Explicit recipient repository

use crate::db::{db_error, DatabasePool};
use crate::models::Recipient;
use async_trait::async_trait;
use mailshot_common::types::{normalize_email, MessageId};
use mailshot_common::{Error, Result};
use uuid::Uuid;

/// Recipient repository trait
#[async_trait]
pub trait RecipientRepository: Send + Sync {
    /// Add a recipient. The address is lower-cased before it is stored.
    ///
    /// Fails with [`Error::AlreadyExists`] if the message already has it.
    async fn add(&self, message_id: MessageId, email: &str) -> Result<Recipient>;

    /// Remove a recipient, returning whether it existed
    async fn remove(&self, message_id: MessageId, email: &str) -> Result<bool>;

    /// All explicit recipient addresses of a message
    async fn list_emails(&self, message_id: MessageId) -> Result<Vec<String>>;

    /// Number of explicit recipients of a message
    async fn count(&self, message_id: MessageId) -> Result<i64>;
}

/// Database recipient repository
pub struct DbRecipientRepository {
    pool: DatabasePool,
}

impl DbRecipientRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipientRepository for DbRecipientRepository {
    async fn add(&self, message_id: MessageId, email: &str) -> Result<Recipient> {
        let to_email = normalize_email(email);

        sqlx::query_as::<_, Recipient>(
            r#"
            INSERT INTO recipients (id, message_id, to_email)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(message_id)
        .bind(&to_email)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Error::AlreadyExists(to_email.clone())
            }
            other => db_error(other),
        })
    }

    async fn remove(&self, message_id: MessageId, email: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM recipients WHERE message_id = $1 AND to_email = $2")
                .bind(message_id)
                .bind(normalize_email(email))
                .execute(self.pool.pool())
                .await
                .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_emails(&self, message_id: MessageId) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT to_email FROM recipients WHERE message_id = $1")
                .bind(message_id)
                .fetch_all(self.pool.pool())
                .await
                .map_err(db_error)?;

        Ok(rows.into_iter().map(|(email,)| email).collect())
    }

    async fn count(&self, message_id: MessageId) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipients WHERE message_id = $1")
            .bind(message_id)
            .fetch_one(self.pool.pool())
            .await
            .map_err(db_error)?;
        Ok(count.0)
    }
}
