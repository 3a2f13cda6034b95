//! Repository layer for data access

pub mod contact_groups;
pub mod message_logs;
pub mod messages;
pub mod recipients;

// Re-export concrete repository implementations with simple names
pub use contact_groups::DbContactGroupProvider;
pub use message_logs::DbMessageLogRepository;
pub use messages::DbMessageRepository;
pub use recipients::DbRecipientRepository;

// Re-export repository traits
pub use contact_groups::ContactGroupProvider;
pub use message_logs::MessageLogRepository;
pub use messages::MessageRepository;
pub use recipients::RecipientRepository;
