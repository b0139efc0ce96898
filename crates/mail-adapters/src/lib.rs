//! # mail-adapters
//!
//! Implementations of the `Mailer` port. `LogMailer` only records what would
//! have been sent and is what the binary falls back to when no SMTP host is
//! configured. `SmtpMailer` (feature `mail-smtp`) talks to a real relay.

use async_trait::async_trait;
use domains::{EmailMessage, Mailer, Result};
use tracing::info;

#[cfg(feature = "mail-smtp")]
mod smtp;

#[cfg(feature = "mail-smtp")]
pub use smtp::{SmtpMailer, SmtpOptions};

/// No-op transport: logs the envelope and succeeds.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "mail transport not configured; skipping send"
        );
        Ok(())
    }
}
