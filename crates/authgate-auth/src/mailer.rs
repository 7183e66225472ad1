//! Password-change confirmation mail.
//!
//! The gateway sends exactly one kind of message: a fixed confirmation
//! after a successful password update. Dispatch failures are downgraded to
//! warnings by the engine; the password is already changed by the time this
//! runs and the workflow must not report failure for a courtesy email.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

const CONFIRMATION_SUBJECT: &str = "Password Updated Successfully!";
const CONFIRMATION_BODY: &str =
    "Congratulations! Your password has been updated successfully.";

/// Mail dispatch errors.
#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    /// The configured sender address is unusable.
    #[error("invalid sender address: {0}")]
    InvalidSender(String),

    /// The recipient address is unusable.
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),

    /// The relay refused or could not be reached.
    #[error("mail dispatch failed: {0}")]
    SendFailed(String),
}

/// Sends the password-change confirmation message.
#[async_trait]
pub trait ConfirmationMailer: Send + Sync {
    /// Sends the confirmation to the given recipient.
    async fn send_password_updated(&self, recipient: &str) -> Result<(), MailerError>;
}

/// SMTP-backed mailer.
#[derive(Debug)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds a mailer from the SMTP settings.
    pub fn new(config: &SmtpConfig) -> Result<Self, MailerError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|_| MailerError::InvalidSender(config.from.clone()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|err| MailerError::SendFailed(err.to_string()))?
            .port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl ConfirmationMailer for SmtpMailer {
    async fn send_password_updated(&self, recipient: &str) -> Result<(), MailerError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|_| MailerError::InvalidRecipient(recipient.to_string()))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(CONFIRMATION_SUBJECT)
            .body(CONFIRMATION_BODY.to_string())
            .map_err(|err| MailerError::SendFailed(err.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|err| MailerError::SendFailed(err.to_string()))?;
        tracing::info!(recipient, "password-change confirmation sent");
        Ok(())
    }
}

/// Mailer used when SMTP is disabled; logs instead of sending.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMailer;

#[async_trait]
impl ConfirmationMailer for NoopMailer {
    async fn send_password_updated(&self, recipient: &str) -> Result<(), MailerError> {
        tracing::debug!(recipient, "mail disabled; skipping confirmation");
        Ok(())
    }
}
