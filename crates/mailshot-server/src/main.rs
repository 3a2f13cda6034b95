//! Mailshot - mass-mailing dispatcher entry point

use anyhow::Result;
use mailshot_api::AppState;
use mailshot_common::config::{Config, LoggingConfig};
use mailshot_core::{
    DbJobQueue, DeliveryLogger, DispatchWorker, MessageDispatcher, RecipientResolver,
    SmtpTransport,
};
use mailshot_storage::db::DatabasePool;
use mailshot_storage::repository::{
    DbContactGroupProvider, DbMessageLogRepository, DbMessageRepository, DbRecipientRepository,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting Mailshot...");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;

    // Run migrations
    db_pool.migrate().await?;

    let messages = Arc::new(DbMessageRepository::new(db_pool.clone()));
    let recipients = Arc::new(DbRecipientRepository::new(db_pool.clone()));
    let logs = Arc::new(DbMessageLogRepository::new(db_pool.clone()));
    let groups = Arc::new(DbContactGroupProvider::new(db_pool.clone()));
    let queue = DbJobQueue::new(db_pool.clone());

    let dispatcher = Arc::new(MessageDispatcher::new(
        messages.clone(),
        RecipientResolver::new(recipients.clone(), groups.clone()),
        DeliveryLogger::new(logs.clone()),
        Arc::new(SmtpTransport::new(config.smtp.clone())),
    ));

    // Start dispatch workers
    let worker_handles: Vec<_> = (0..config.worker.concurrency.max(1))
        .map(|_| {
            let worker = DispatchWorker::new(queue.clone(), dispatcher.clone())
                .with_batch_size(config.worker.batch_size)
                .with_poll_interval(config.worker.poll_interval_secs);
            tokio::spawn(async move {
                worker.run().await;
            })
        })
        .collect();
    info!(
        "Started {} dispatch worker(s) relaying through {}:{}",
        worker_handles.len(),
        config.smtp.host,
        config.smtp.port
    );

    // Start API server
    let mut state = AppState::new(messages, recipients, logs, groups, Arc::new(queue))
        .with_db_pool(db_pool.clone());
    if let Some(token) = config.api.admin_token.as_deref() {
        state = state.with_admin_token(token);
    }

    let listener = tokio::net::TcpListener::bind(&config.api.bind).await?;
    info!("Starting API server on {}", config.api.bind);
    let api_handle = tokio::spawn(async move {
        let app = mailshot_api::create_router(state);
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    info!("Mailshot started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    api_handle.abort();
    for handle in worker_handles {
        handle.abort();
    }

    info!("Mailshot shutdown complete");

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},mailshot=debug", config.level)));

    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
