//! Delivery logger - one immutable entry per delivery attempt

use mailshot_common::types::MessageId;
use mailshot_common::Result;
use mailshot_storage::models::MessageLog;
use mailshot_storage::repository::MessageLogRepository;
use std::sync::Arc;

/// Records the outcome of each delivery attempt
#[derive(Clone)]
pub struct DeliveryLogger {
    logs: Arc<dyn MessageLogRepository>,
}

impl DeliveryLogger {
    pub fn new(logs: Arc<dyn MessageLogRepository>) -> Self {
        Self { logs }
    }

    /// Append one entry, timestamped at the moment of writing
    pub async fn record(
        &self,
        message_id: MessageId,
        recipient: &str,
        success: bool,
    ) -> Result<MessageLog> {
        self.logs.record(message_id, recipient, success).await
    }
}
