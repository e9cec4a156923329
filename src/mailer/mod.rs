use async_trait::async_trait;
use lettre::message::{header, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

/// A failed delivery. Reasons are opaque beyond transient vs. permanent.
#[derive(Debug, Error)]
pub enum MailError {
    /// Expected to resolve on retry (connection refused, 4xx SMTP reply).
    #[error("transient mail failure: {0}")]
    Transient(String),
    /// Will not resolve on retry (5xx SMTP reply).
    #[error("permanent mail failure: {0}")]
    Permanent(String),
    #[error("invalid mail address: {0}")]
    InvalidAddress(String),
}

/// Outbound mail transport.
///
/// The processor only depends on this seam, so tests can substitute a
/// recording double and the SMTP details stay out of the alert engine.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message with plain-text and HTML alternatives.
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: &str,
    ) -> Result<(), MailError>;
}

/// SMTP-backed [`Mailer`] using lettre's async transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build the SMTP transport from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay address or from mailbox is invalid.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut builder = if config.smtp_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };
        builder = builder.port(config.smtp_port);

        if let (Some(username), Some(password)) =
            (&config.smtp_username, &config.smtp_password)
        {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = config
            .mail_from
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid MAIL_FROM '{}': {e}", config.mail_from))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: &str,
    ) -> Result<(), MailError> {
        let to: Mailbox = to
            .parse()
            .map_err(|_| MailError::InvalidAddress(to.to_string()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to.clone())
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(text.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html.to_string()),
                    ),
            )
            .map_err(|e| MailError::Permanent(format!("failed to build message: {e}")))?;

        self.transport.send(message).await.map_err(|e| {
            if e.is_permanent() {
                MailError::Permanent(e.to_string())
            } else {
                MailError::Transient(e.to_string())
            }
        })?;

        debug!(to = %to, subject, "Sent mail");
        Ok(())
    }
}
