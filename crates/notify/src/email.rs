//! SMTP email delivery.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use position_alert_core::{Notification, Notifier};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Port that speaks TLS from the first byte. Any other port upgrades with STARTTLS.
pub const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("invalid mailbox {0}: {1}")]
    InvalidMailbox(String, String),

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// SMTP connection and addressing settings.
#[derive(Debug)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    /// Login and envelope sender.
    pub sender: String,
    pub sender_name: String,
    pub password: SecretString,
    pub receiver: String,
    pub timeout: Duration,
}

impl SmtpSettings {
    /// Creates settings. Whitespace inside the password is removed.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: u16,
        sender: impl Into<String>,
        password: &str,
        receiver: impl Into<String>,
    ) -> Self {
        let password: String = password.split_whitespace().collect();
        Self {
            host: host.into(),
            port,
            sender: sender.into(),
            sender_name: "Hyperliquid Monitor".to_string(),
            password: SecretString::from(password),
            receiver: receiver.into(),
            timeout: Duration::from_secs(20),
        }
    }

    #[must_use]
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = name.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Sends each notification as a multipart (text + HTML) email.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    /// # Errors
    /// Returns error if an address is invalid or the relay cannot be configured.
    pub fn new(settings: SmtpSettings) -> Result<Self, EmailError> {
        let from = parse_mailbox(Some(settings.sender_name.as_str()), &settings.sender)?;
        let to = parse_mailbox(None, &settings.receiver)?;

        let builder = if settings.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
        };

        let credentials = Credentials::new(
            settings.sender.clone(),
            settings.password.expose_secret().to_string(),
        );
        let transport = builder
            .port(settings.port)
            .credentials(credentials)
            .timeout(Some(settings.timeout))
            .build();

        Ok(Self { transport, from, to })
    }

    /// Builds the email for `notification` without sending it.
    ///
    /// # Errors
    /// Returns error if the message cannot be assembled.
    pub fn build_message(&self, notification: &Notification) -> Result<Message, EmailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(notification.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(
                notification.text_body.clone(),
                notification.html_body.clone(),
            ))?;

        Ok(message)
    }
}

fn parse_mailbox(name: Option<&str>, address: &str) -> Result<Mailbox, EmailError> {
    let address = address
        .trim()
        .parse::<lettre::Address>()
        .map_err(|e| EmailError::InvalidMailbox(address.to_string(), e.to_string()))?;

    Ok(Mailbox::new(name.map(str::to_string), address))
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        let message = self.build_message(notification)?;
        let response = self.transport.send(message).await.map_err(EmailError::from)?;

        debug!(
            to = %self.to,
            code = %response.code(),
            "Email accepted"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}
