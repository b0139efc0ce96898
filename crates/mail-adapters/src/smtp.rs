//! SMTP transport built on lettre's async Tokio executor.

use std::sync::Arc;

use async_trait::async_trait;
use domains::{DomainError, EmailMessage, Mailer, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SmtpOptions {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub from: String,
    pub starttls: bool,
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(opts: &SmtpOptions) -> Result<Self> {
        let from = opts
            .from
            .parse::<Mailbox>()
            .map_err(|e| DomainError::internal(format!("invalid SMTP from address: {e}")))?;

        let builder = if opts.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&opts.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&opts.host)
        }
        .map_err(|e| DomainError::internal(format!("failed to configure SMTP transport: {e}")))?
        .port(opts.port);

        let builder = match (&opts.username, &opts.password) {
            (Some(user), Some(pass)) => builder.credentials(Credentials::new(
                user.clone(),
                pass.expose_secret().to_string(),
            )),
            _ => builder,
        };

        Ok(Self {
            transport: Arc::new(builder.build()),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| DomainError::external(format!("invalid recipient address: {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(header::ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|e| DomainError::external(format!("failed to build email: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| DomainError::external(format!("failed to send email: {e}")))?;
        debug!(subject = %message.subject, "email sent");
        Ok(())
    }
}
