//! Shared application state

use mailshot_core::{
    JobQueue, MessageService, MessageStateMachine, RecipientImporter, RecipientResolver,
};
use mailshot_storage::repository::{
    ContactGroupProvider, MessageLogRepository, MessageRepository, RecipientRepository,
};
use mailshot_storage::DatabasePool;
use std::sync::Arc;

use crate::auth::hash_token;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub messages: MessageService,
    pub resolver: RecipientResolver,
    pub importer: RecipientImporter,
    pub lifecycle: MessageStateMachine,
    pub logs: Arc<dyn MessageLogRepository>,
    pub groups: Arc<dyn ContactGroupProvider>,
    /// Checked by the readiness check when present
    pub db_pool: Option<DatabasePool>,
    /// SHA-256 hex digest of the admin bearer token
    pub admin_token_hash: Option<String>,
}

impl AppState {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        recipients: Arc<dyn RecipientRepository>,
        logs: Arc<dyn MessageLogRepository>,
        groups: Arc<dyn ContactGroupProvider>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            messages: MessageService::new(messages.clone()),
            resolver: RecipientResolver::new(recipients.clone(), groups.clone()),
            importer: RecipientImporter::new(recipients),
            lifecycle: MessageStateMachine::new(messages, queue),
            logs,
            groups,
            db_pool: None,
            admin_token_hash: None,
        }
    }

    /// State over a single store implementing every repository
    pub fn from_store<S>(store: Arc<S>, queue: Arc<dyn JobQueue>) -> Self
    where
        S: MessageRepository
            + RecipientRepository
            + MessageLogRepository
            + ContactGroupProvider
            + 'static,
    {
        Self::new(store.clone(), store.clone(), store.clone(), store, queue)
    }

    pub fn with_db_pool(mut self, db_pool: DatabasePool) -> Self {
        self.db_pool = Some(db_pool);
        self
    }

    /// Require this bearer token on every API route
    pub fn with_admin_token(mut self, token: &str) -> Self {
        self.admin_token_hash = Some(hash_token(token));
        self
    }
}
