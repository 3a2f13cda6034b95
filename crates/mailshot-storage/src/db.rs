//! PostgreSQL pool shared by the repositories and the job queue

use mailshot_common::config::DatabaseConfig;
use mailshot_common::{Error, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection pool for the mailshot database
#[derive(Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Connect using the `[database]` section of the configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let url = connection_url(config)?;
        info!(
            max_connections = config.max_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Migration failed: {}", e)))?;
        info!("Schema is up to date");
        Ok(())
    }

    /// Round-trip a trivial query, used by the readiness check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(db_error)
    }
}

fn connection_url(config: &DatabaseConfig) -> Result<&str> {
    if config.backend != "postgres" {
        return Err(Error::Config(format!(
            "Database backend '{}' is not supported, use 'postgres'",
            config.backend
        )));
    }
    config
        .url
        .as_deref()
        .ok_or_else(|| Error::Config("database.url is required".to_string()))
}

/// Map a sqlx error into the common error type
pub(crate) fn db_error(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(backend: &str, url: Option<&str>) -> DatabaseConfig {
        DatabaseConfig {
            backend: backend.to_string(),
            url: url.map(str::to_string),
            max_connections: 5,
            min_connections: 1,
        }
    }

    #[test]
    fn test_connection_url_requires_postgres_url() {
        let cfg = config("postgres", Some("postgres://db/mailshot"));
        assert_eq!(connection_url(&cfg).unwrap(), "postgres://db/mailshot");

        assert!(matches!(
            connection_url(&config("postgres", None)),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            connection_url(&config("sqlite", Some("sqlite://x"))),
            Err(Error::Config(_))
        ));
    }
}
