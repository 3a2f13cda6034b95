//! Mailshot Core - Mass-mailing dispatch and delivery tracking
//!
//! This crate resolves the recipient population of a message, delivers it
//! over a single transport session per run, records one log entry per
//! delivery attempt, and drives the queued/sent lifecycle of messages.
//! Dispatch runs execute on background workers fed by a job queue.

pub mod addresses;
pub mod content;
pub mod delivery_log;
pub mod dispatcher;
pub mod job;
pub mod lifecycle;
pub mod messages;
pub mod queue;
pub mod recipients;
pub mod resolver;
pub mod transport;

pub use delivery_log::DeliveryLogger;
pub use dispatcher::{DispatchMode, DispatchResult, MessageDispatcher};
pub use job::DispatchJob;
pub use lifecycle::{MessageState, MessageStateMachine, SendRequestError};
pub use messages::MessageService;
pub use queue::{DbJobQueue, DispatchWorker, InMemoryJobQueue, JobQueue};
pub use recipients::{ImportSummary, RecipientImporter, RemovalSummary};
pub use resolver::RecipientResolver;
pub use transport::{MailTransport, SmtpTransport, TransportError, TransportSession};
