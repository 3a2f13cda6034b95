//! Mail transport - sessions used to hand messages to the outbound relay

mod smtp;

pub use smtp::SmtpTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to open transport session: {0}")]
    Connect(String),

    #[error("Failed to send message: {0}")]
    Send(String),

    #[error("Failed to close transport session: {0}")]
    Close(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

impl From<TransportError> for mailshot_common::Error {
    fn from(e: TransportError) -> Self {
        mailshot_common::Error::Transport(e.to_string())
    }
}

/// Factory of transport sessions
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Open a session. One session is used for a whole dispatch run.
    async fn open(&self) -> Result<Box<dyn TransportSession>, TransportError>;
}

/// An open transport session
#[async_trait]
pub trait TransportSession: Send {
    /// Send one message to the recipients of its envelope
    async fn send(&mut self, email: &lettre::Message) -> Result<(), TransportError>;

    /// Close the session. Closing twice is a no-op.
    async fn close(&mut self) -> Result<(), TransportError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for tests

    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    pub struct Recorded {
        pub opens: usize,
        pub closes: usize,
        pub sent: Vec<String>,
    }

    /// Transport that records every send and fails chosen recipients
    #[derive(Default, Clone)]
    pub struct ScriptedTransport {
        pub recorded: Arc<Mutex<Recorded>>,
        failing: Arc<HashSet<String>>,
        refuse_open: bool,
        fail_close: bool,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(addresses: &[&str]) -> Self {
            Self {
                failing: Arc::new(addresses.iter().map(|a| a.to_string()).collect()),
                ..Self::default()
            }
        }

        pub fn refusing() -> Self {
            Self {
                refuse_open: true,
                ..Self::default()
            }
        }

        pub fn failing_close() -> Self {
            Self {
                fail_close: true,
                ..Self::default()
            }
        }

        pub fn opens(&self) -> usize {
            self.recorded.lock().unwrap().opens
        }

        pub fn closes(&self) -> usize {
            self.recorded.lock().unwrap().closes
        }

        pub fn sent(&self) -> Vec<String> {
            self.recorded.lock().unwrap().sent.clone()
        }
    }

    struct ScriptedSession {
        transport: ScriptedTransport,
        open: bool,
    }

    #[async_trait]
    impl MailTransport for ScriptedTransport {
        async fn open(&self) -> Result<Box<dyn TransportSession>, TransportError> {
            if self.refuse_open {
                return Err(TransportError::Connect("connection refused".to_string()));
            }
            self.recorded.lock().unwrap().opens += 1;
            Ok(Box::new(ScriptedSession {
                transport: self.clone(),
                open: true,
            }))
        }
    }

    #[async_trait]
    impl TransportSession for ScriptedSession {
        async fn send(&mut self, email: &lettre::Message) -> Result<(), TransportError> {
            let to: Vec<String> = email
                .envelope()
                .to()
                .iter()
                .map(|a| a.to_string())
                .collect();

            if to.iter().any(|a| self.transport.failing.contains(a)) {
                return Err(TransportError::Send(format!("rejected {}", to.join(","))));
            }
            self.transport.recorded.lock().unwrap().sent.extend(to);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            if !self.open {
                return Ok(());
            }
            self.open = false;
            self.transport.recorded.lock().unwrap().closes += 1;
            if self.transport.fail_close {
                return Err(TransportError::Close("connection reset".to_string()));
            }
            Ok(())
        }
    }
}
