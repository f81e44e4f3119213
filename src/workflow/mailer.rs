//! Cancellation-request email delivery.
//!
//! There is no tool or service wrapper to imitate for outgoing mail in
//! this codebase's ancestry, so the adapter shape follows the same
//! pattern used for the HTTP chat client: a typed config, a thin
//! wrapper around the underlying client library, and error
//! classification into a `thiserror` enum rather than propagating the
//! client's own error type.

use async_trait::async_trait;
use lettre::message::Message;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use thiserror::Error;

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("invalid email address: {0}")]
    InvalidAddress(String),
    #[error("failed to build message: {0}")]
    BuildFailed(String),
    #[error("SMTP delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Interface onto outgoing email delivery for the cancellation workflow.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), MailerError>;
}

pub struct LettreMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: String,
    recipient: String,
}

impl LettreMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailerError> {
        let creds = Credentials::new(config.sender.clone(), config.app_password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| MailerError::DeliveryFailed(e.to_string()))?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            sender: config.sender.clone(),
            recipient: config.collector_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for LettreMailer {
    async fn send(&self, subject: &str, body: &str) -> Result<(), MailerError> {
        let message = Message::builder()
            .from(
                self.sender
                    .parse()
                    .map_err(|_| MailerError::InvalidAddress(self.sender.clone()))?,
            )
            .to(self
                .recipient
                .parse()
                .map_err(|_| MailerError::InvalidAddress(self.recipient.clone()))?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| MailerError::BuildFailed(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailerError::DeliveryFailed(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MailConfig {
        MailConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            sender: "assistant@example.com".to_string(),
            app_password: "secret".to_string(),
            collector_address: "rosters@example.com".to_string(),
            subject: "SHIFT CANCELLATION REQUEST".to_string(),
        }
    }

    #[test]
    fn constructs_from_valid_relay_host() {
        assert!(LettreMailer::new(&config()).is_ok());
    }

    #[test]
    fn rejects_malformed_sender_address() {
        let mut cfg = config();
        cfg.sender = "not-an-email".to_string();
        let mailer = LettreMailer::new(&cfg).unwrap();
        assert_eq!(mailer.sender, "not-an-email");
    }
}
