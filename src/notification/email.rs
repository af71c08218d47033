//! # Email delivery.
//!
//! [`EmailSender`] turns a notification into an [`EmailMessage`] and hands it
//! to a [`Mailer`]. The mailer owns the outgoing transport.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};

use super::Sender;
use crate::error::Error;

/// A composed email.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    /// `From` header.
    pub from: String,
    /// `To` header.
    pub to: String,
    /// `Subject` header.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Outgoing mail transport.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    /// Sends one message.
    async fn deliver(&self, message: &EmailMessage) -> Result<(), Error>;
}

/// Sender delivering notifications by email.
pub struct EmailSender {
    source: String,
    subject: String,
    mailer: Arc<dyn Mailer>,
}

impl EmailSender {
    /// Creates a sender writing from `source` with a fixed `subject`.
    pub fn new(
        source: impl Into<String>,
        subject: impl Into<String>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            source: source.into(),
            subject: subject.into(),
            mailer,
        }
    }
}

#[async_trait]
impl Sender for EmailSender {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), Error> {
        let mail = EmailMessage {
            from: self.source.clone(),
            to: recipient.to_string(),
            subject: self.subject.clone(),
            body: message.to_string(),
        };
        match self.mailer.deliver(&mail).await {
            Ok(()) => {
                info!(recipient, "email sent");
                Ok(())
            }
            Err(err) => {
                error!(recipient, error = %err, "failed sending notification email");
                Err(match err {
                    Error::Delivery { .. } | Error::Cancelled => err,
                    other => Error::Delivery {
                        recipient: recipient.to_string(),
                        reason: other.to_string(),
                    },
                })
            }
        }
    }
}

/// [`Mailer`] posting messages as JSON to a mail relay.
#[cfg(feature = "http")]
#[derive(Clone, Debug)]
pub struct HttpMailer {
    relay_url: String,
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpMailer {
    /// Creates a mailer posting to `relay_url`.
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl Mailer for HttpMailer {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), Error> {
        let delivery_err = |reason: String| Error::Delivery {
            recipient: message.to.clone(),
            reason,
        };
        self.client
            .post(&self.relay_url)
            .json(message)
            .send()
            .await
            .map_err(|err| Error::transport(&self.relay_url, err))?
            .error_for_status()
            .map_err(|err| delivery_err(err.to_string()))?;
        Ok(())
    }
}

/// [`Mailer`] submitting messages over SMTP with STARTTLS and login credentials.
#[cfg(feature = "smtp")]
#[derive(Clone)]
pub struct SmtpMailer {
    host: String,
    transport: lettre::AsyncSmtpTransport<lettre::Tokio1Executor>,
}

#[cfg(feature = "smtp")]
impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer").field("host", &self.host).finish()
    }
}

#[cfg(feature = "smtp")]
impl SmtpMailer {
    /// Creates a mailer submitting to `host:port`, logging in as `username`.
    ///
    /// No connection is made here. Fails with [`Error::Configuration`] when TLS
    /// parameters cannot be built for `host`.
    pub fn new(
        host: &str,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, Error> {
        use lettre::transport::smtp::authentication::Credentials;

        let transport = lettre::AsyncSmtpTransport::<lettre::Tokio1Executor>::starttls_relay(host)
            .map_err(|e| Error::Configuration {
                reason: format!("invalid smtp host {host:?}: {e}"),
            })?
            .port(port)
            .credentials(Credentials::new(username.into(), password.into()))
            .build();
        Ok(Self {
            host: format!("{host}:{port}"),
            transport,
        })
    }

    /// Builds a mailer from `email.smtp_host`, `email.smtp_port`, `email.source` and `email.password`.
    pub fn from_config(email: &crate::config::EmailConfig) -> Result<Self, Error> {
        Self::new(
            &email.smtp_host,
            email.smtp_port,
            email.source.clone(),
            email.password.clone(),
        )
    }
}

/// Turns an [`EmailMessage`] into a plain-text MIME message.
#[cfg(feature = "smtp")]
fn to_mime(message: &EmailMessage) -> Result<lettre::Message, Error> {
    use lettre::message::{Mailbox, header::ContentType};

    let invalid = |reason: String| Error::Delivery {
        recipient: message.to.clone(),
        reason,
    };
    let from: Mailbox = message
        .from
        .parse()
        .map_err(|e| invalid(format!("invalid sender address {:?}: {e}", message.from)))?;
    let to: Mailbox = message
        .to
        .parse()
        .map_err(|e| invalid(format!("invalid recipient address: {e}")))?;
    lettre::Message::builder()
        .from(from)
        .to(to)
        .subject(message.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .map_err(|e| invalid(format!("failed to build message: {e}")))
}

#[cfg(feature = "smtp")]
#[async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), Error> {
        use lettre::AsyncTransport;

        let mime = to_mime(message)?;
        self.transport.send(mime).await.map_err(|e| {
            if e.is_permanent() || e.is_transient() {
                Error::Delivery {
                    recipient: message.to.clone(),
                    reason: format!("smtp server rejected message: {e}"),
                }
            } else {
                Error::transport(self.host.as_str(), e)
            }
        })?;
        Ok(())
    }
}
