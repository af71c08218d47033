//! Notification composition and delivery.
//!
//! ## Contents
//! - [`NotificationService`] orchestration: user lookup → message → sender
//! - [`TaskNotifier`] what the subscription worker calls
//! - [`Sender`] delivery capability, with [`LogSender`] and [`EmailSender`] variants
//! - [`build_sender`] picks the variant once, at wiring time
//!
//! ```text
//! worker ──► TaskNotifier::notify_user_to_complete_task(user, task)
//!               ├─► UserDirectory::get_user_details(user)
//!               ├─► "Hi {username}, you have a task ({task}) to complete!"
//!               └─► Sender::send(email, message)
//! ```

mod email;
mod log;
mod service;

#[cfg(feature = "http")]
pub use email::HttpMailer;
#[cfg(feature = "smtp")]
pub use email::SmtpMailer;
pub use email::{EmailMessage, EmailSender, Mailer};
pub use log::LogSender;
pub use service::{NotificationService, TaskNotifier, compose_message};

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, EmailConfig};
use crate::error::Error;

/// Delivery capability used by orchestration.
#[async_trait]
pub trait Sender: Send + Sync + 'static {
    /// Delivers `message` to `recipient`.
    async fn send(&self, recipient: &str, message: &str) -> Result<(), Error>;
}

/// Sender variant selected at process wiring time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SenderKind {
    /// Write notifications to the log.
    #[default]
    Log,
    /// Send notifications by email through a [`Mailer`].
    Email,
}

/// Builds the sender configured in `cfg`.
///
/// For [`SenderKind::Email`], `mailer` is used when given. Otherwise the mailer
/// comes from `cfg.email`: an `SmtpMailer` when a password is set (feature `smtp`),
/// else an `HttpMailer` posting to `relay_url` (feature `http`).
/// Fails with [`Error::Configuration`] when no mailer is available.
pub fn build_sender(
    cfg: &Config,
    mailer: Option<Arc<dyn Mailer>>,
) -> Result<Arc<dyn Sender>, Error> {
    match cfg.sender {
        SenderKind::Log => Ok(Arc::new(LogSender::new())),
        SenderKind::Email => {
            let mailer = match mailer {
                Some(m) => m,
                None => default_mailer(cfg)?,
            };
            Ok(Arc::new(EmailSender::new(
                cfg.email.source.clone(),
                cfg.email.subject.clone(),
                mailer,
            )))
        }
    }
}

fn default_mailer(cfg: &Config) -> Result<Arc<dyn Mailer>, Error> {
    let email = &cfg.email;
    if email.uses_smtp() {
        smtp_mailer(email)
    } else if !email.relay_url.trim().is_empty() {
        relay_mailer(email)
    } else {
        Err(Error::Configuration {
            reason: "email sender needs email.password (SMTP) or email.relay_url".into(),
        })
    }
}

#[cfg(feature = "smtp")]
fn smtp_mailer(email: &EmailConfig) -> Result<Arc<dyn Mailer>, Error> {
    Ok(Arc::new(SmtpMailer::from_config(email)?))
}

#[cfg(not(feature = "smtp"))]
fn smtp_mailer(_email: &EmailConfig) -> Result<Arc<dyn Mailer>, Error> {
    Err(Error::Configuration {
        reason: "email.password is set but the `smtp` feature is disabled".into(),
    })
}

#[cfg(feature = "http")]
fn relay_mailer(email: &EmailConfig) -> Result<Arc<dyn Mailer>, Error> {
    Ok(Arc::new(HttpMailer::new(email.relay_url.clone())))
}

#[cfg(not(feature = "http"))]
fn relay_mailer(_email: &EmailConfig) -> Result<Arc<dyn Mailer>, Error> {
    Err(Error::Configuration {
        reason: "email.relay_url is set but the `http` feature is disabled".into(),
    })
}
