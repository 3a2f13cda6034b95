//! SMTP relay transport

use super::{MailTransport, TransportError, TransportSession};
use async_trait::async_trait;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{AsyncSmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use mailshot_common::config::{SmtpConfig, SmtpTls};
use std::time::Duration;
use tracing::debug;

/// Transport relaying through a configured SMTP server
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    config: SmtpConfig,
}

impl SmtpTransport {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn tls_parameters(&self) -> Result<TlsParameters, TransportError> {
        TlsParameters::new(self.config.host.clone())
            .map_err(|e| TransportError::Connect(format!("Invalid TLS parameters: {}", e)))
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn open(&self) -> Result<Box<dyn TransportSession>, TransportError> {
        let config = &self.config;
        let hello = ClientId::Domain(config.hello_name.clone());
        let timeout = Some(Duration::from_secs(config.timeout_secs));

        let implicit_tls = match config.tls {
            SmtpTls::Tls => Some(self.tls_parameters()?),
            SmtpTls::None | SmtpTls::Starttls => None,
        };

        let mut conn = AsyncSmtpConnection::connect_tokio1(
            (config.host.as_str(), config.port),
            timeout,
            &hello,
            implicit_tls,
            None,
        )
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;

        if config.tls == SmtpTls::Starttls {
            if !conn.can_starttls() {
                return Err(TransportError::Connect(format!(
                    "{} does not offer STARTTLS",
                    config.host
                )));
            }
            conn.starttls(self.tls_parameters()?, &hello)
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;
        }

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            let credentials = Credentials::new(username.clone(), password.clone());
            conn.auth(&[Mechanism::Plain, Mechanism::Login], &credentials)
                .await
                .map_err(|e| TransportError::Connect(format!("Authentication failed: {}", e)))?;
        }

        debug!(host = %config.host, port = config.port, "SMTP session opened");
        Ok(Box::new(SmtpSession { conn: Some(conn) }))
    }
}

/// One SMTP connection, reused for every message of a run
struct SmtpSession {
    conn: Option<AsyncSmtpConnection>,
}

#[async_trait]
impl TransportSession for SmtpSession {
    async fn send(&mut self, email: &lettre::Message) -> Result<(), TransportError> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| TransportError::Send("session is closed".to_string()))?;

        conn.send(email.envelope(), &email.formatted())
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.conn.take() {
            Some(mut conn) => conn
                .quit()
                .await
                .map(|_| ())
                .map_err(|e| TransportError::Close(e.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_fails_without_server() {
        let transport = SmtpTransport::new(SmtpConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            timeout_secs: 1,
            ..SmtpConfig::default()
        });

        assert!(matches!(
            transport.open().await,
            Err(TransportError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_session_rejects_send() {
        let mut session = SmtpSession { conn: None };
        let email = lettre::Message::builder()
            .from("a@example.org".parse().unwrap())
            .to("b@example.org".parse().unwrap())
            .subject("x")
            .body("y".to_string())
            .unwrap();

        assert!(session.close().await.is_ok());
        assert!(matches!(
            session.send(&email).await,
            Err(TransportError::Send(_))
        ));
    }
}
