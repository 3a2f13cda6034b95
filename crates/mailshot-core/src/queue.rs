//! Job queue - submission of dispatch jobs and the workers that run them

use crate::dispatcher::MessageDispatcher;
use crate::job::DispatchJob;
use async_trait::async_trait;
use chrono::Utc;
use mailshot_common::types::JobId;
use mailshot_common::{Error, Result};
use mailshot_storage::db::DatabasePool;
use mailshot_storage::models::Job;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Queue name of dispatch jobs
pub const DISPATCH_QUEUE: &str = "dispatch";

/// Fire-and-forget submission of dispatch jobs
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: DispatchJob) -> Result<JobId>;
}

fn db_error(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}

/// Job queue backed by the `jobs` table
#[derive(Clone)]
pub struct DbJobQueue {
    db_pool: DatabasePool,
}

impl DbJobQueue {
    pub fn new(db_pool: DatabasePool) -> Self {
        Self { db_pool }
    }

    /// Claim up to `limit` pending jobs. Concurrent claimers never get the same job.
    async fn claim(&self, limit: i64) -> Result<Vec<Job>> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'processing', started_at = NOW(), attempts = attempts + 1
            WHERE id IN (
                SELECT id FROM jobs
                WHERE status = 'pending'
                AND queue = $1
                AND scheduled_at <= NOW()
                ORDER BY scheduled_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(DISPATCH_QUEUE)
        .bind(limit)
        .fetch_all(self.db_pool.pool())
        .await
        .map_err(db_error)
    }

    async fn mark_completed(&self, job_id: JobId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .execute(self.db_pool.pool())
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn mark_failed(&self, job_id: JobId, reason: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', last_error = $2, completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(reason)
        .execute(self.db_pool.pool())
        .await
        .map_err(db_error)?;

        Ok(())
    }
}

#[async_trait]
impl JobQueue for DbJobQueue {
    async fn enqueue(&self, job: DispatchJob) -> Result<JobId> {
        let job_id = Uuid::now_v7();
        let payload =
            serde_json::to_value(&job).map_err(|e| Error::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO jobs (id, queue, payload, status, attempts, max_attempts, scheduled_at, created_at)
            VALUES ($1, $2, $3, 'pending', 0, 1, $4, $4)
            "#,
        )
        .bind(job_id)
        .bind(DISPATCH_QUEUE)
        .bind(&payload)
        .bind(Utc::now())
        .execute(self.db_pool.pool())
        .await
        .map_err(db_error)?;

        info!(job_id = %job_id, message_id = %job.message_id, test = job.test, "Enqueued dispatch job");
        Ok(job_id)
    }
}

/// In-process queue that only records submissions
#[derive(Default)]
pub struct InMemoryJobQueue {
    jobs: Mutex<Vec<DispatchJob>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs submitted so far
    pub async fn pending(&self) -> Vec<DispatchJob> {
        self.jobs.lock().await.clone()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: DispatchJob) -> Result<JobId> {
        self.jobs.lock().await.push(job);
        Ok(Uuid::now_v7())
    }
}

/// Worker running dispatch jobs claimed from the database queue
pub struct DispatchWorker {
    queue: DbJobQueue,
    dispatcher: Arc<MessageDispatcher>,
    batch_size: i64,
    poll_interval_secs: u64,
}

impl DispatchWorker {
    pub fn new(queue: DbJobQueue, dispatcher: Arc<MessageDispatcher>) -> Self {
        Self {
            queue,
            dispatcher,
            batch_size: 5,
            poll_interval_secs: 5,
        }
    }

    /// Set batch size
    pub fn with_batch_size(mut self, size: i64) -> Self {
        self.batch_size = size;
        self
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    /// Run the worker loop
    pub async fn run(&self) {
        let mut ticker = interval(Duration::from_secs(self.poll_interval_secs));

        info!(
            "Dispatch worker started (batch: {}, interval: {}s)",
            self.batch_size, self.poll_interval_secs
        );

        loop {
            ticker.tick().await;

            if let Err(e) = self.process_pending_jobs().await {
                error!("Error processing dispatch queue: {}", e);
            }
        }
    }

    async fn process_pending_jobs(&self) -> Result<()> {
        let jobs = self.queue.claim(self.batch_size).await?;
        for job in jobs {
            self.process_job(job).await;
        }
        Ok(())
    }

    async fn process_job(&self, job: Job) {
        let job_id = job.id;
        debug!(job_id = %job_id, "Processing dispatch job");

        let dispatch_job: DispatchJob = match serde_json::from_value(job.payload) {
            Ok(j) => j,
            Err(e) => {
                error!(job_id = %job_id, "Failed to parse job payload: {}", e);
                self.fail(job_id, &e.to_string()).await;
                return;
            }
        };

        // No retry: a failed run leaves the message queued for an operator
        match dispatch_job.run(&self.dispatcher).await {
            Ok(_) => {
                if let Err(e) = self.queue.mark_completed(job_id).await {
                    error!(job_id = %job_id, "Failed to mark job as completed: {}", e);
                }
            }
            Err(e) => self.fail(job_id, &e.to_string()).await,
        }
    }

    async fn fail(&self, job_id: JobId, reason: &str) {
        if let Err(e) = self.queue.mark_failed(job_id, reason).await {
            error!(job_id = %job_id, "Failed to mark job as failed: {}", e);
        }
    }
}
