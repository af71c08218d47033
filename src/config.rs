//! # Process configuration.
//!
//! Provides [`Config`], the centralized settings for a notifier process.
//!
//! Config is used in three ways:
//! 1. **Runtime creation**: `Runtime::new(config, registry, tasks)`
//! 2. **Component wiring**: worker, health reporter and sender read their timeouts from it
//! 3. **Startup validation**: [`Config::validate`] rejects unusable settings before anything runs

use std::fmt;
use std::time::Duration;

use crate::error::Error;
use crate::notification::SenderKind;

/// Settings for the email sender variant.
///
/// Mail goes out over SMTP when `password` is set (the `source` address doubles as
/// the login), otherwise through the HTTP relay at `relay_url`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EmailConfig {
    /// Sender address (`From` header) and SMTP login.
    pub source: String,
    /// SMTP submission server.
    pub smtp_host: String,
    /// SMTP submission port; STARTTLS is required.
    pub smtp_port: u16,
    /// SMTP password (app password for hosted mailboxes).
    pub password: String,
    /// Endpoint of the relay that accepts outgoing mail.
    pub relay_url: String,
    /// Subject line for every notification.
    pub subject: String,
}

impl EmailConfig {
    /// Whether SMTP credentials are configured.
    pub fn uses_smtp(&self) -> bool {
        !self.password.is_empty()
    }
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() { "" } else { "***" };
        f.debug_struct("EmailConfig")
            .field("source", &self.source)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("password", &password)
            .field("relay_url", &self.relay_url)
            .field("subject", &self.subject)
            .finish()
    }
}

/// Configuration for one notifier process.
///
/// ## Field semantics
/// - `service_name` / `service_address`: identity announced to the registry
/// - `user_service`: logical name resolved by the user gateway
/// - `bus_capacity`: per-topic ring buffer of the in-memory broker
/// - `register_timeout` / `deregister_timeout`: bounds for registry calls at startup/shutdown
/// - `shutdown_grace`: how long shutdown waits for running tasks
/// - `health_interval` / `health_timeout`: health reporter tick and per-tick bound
/// - `subscribe_timeout`: bound on subscription confirmation
/// - `sender` / `email`: notification delivery variant and its settings
#[derive(Clone, Debug)]
pub struct Config {
    /// Logical name this process registers under.
    pub service_name: String,

    /// Address announced for this instance.
    pub service_address: String,

    /// Logical name of the user service.
    pub user_service: String,

    /// Capacity of each broker topic channel.
    ///
    /// Subscribers lagging more than `bus_capacity` messages skip the oldest ones.
    pub bus_capacity: usize,

    /// Bound on the initial registration. Failure is fatal.
    pub register_timeout: Duration,

    /// Bound on best-effort deregistration during shutdown.
    pub deregister_timeout: Duration,

    /// Maximum time to wait for tasks after cancellation.
    ///
    /// When exceeded, shutdown proceeds and returns `RuntimeError::GraceExceeded`.
    pub shutdown_grace: Duration,

    /// Interval between health reports.
    pub health_interval: Duration,

    /// Bound on a single health report.
    pub health_timeout: Duration,

    /// Bound on waiting for the broker to confirm a subscription.
    pub subscribe_timeout: Duration,

    /// Notification delivery variant.
    pub sender: SenderKind,

    /// Email settings, used when `sender` is [`SenderKind::Email`].
    pub email: EmailConfig,
}

impl Config {
    /// Checks the configuration for values the process cannot run with.
    ///
    /// Returns [`Error::Configuration`] naming the first offending field.
    pub fn validate(&self) -> Result<(), Error> {
        let non_empty = [
            ("service_name", &self.service_name),
            ("service_address", &self.service_address),
            ("user_service", &self.user_service),
        ];
        for (field, value) in non_empty {
            if value.trim().is_empty() {
                return Err(invalid(format!("{field} must not be empty")));
            }
        }

        let non_zero = [
            ("health_interval", self.health_interval),
            ("health_timeout", self.health_timeout),
            ("subscribe_timeout", self.subscribe_timeout),
        ];
        for (field, value) in non_zero {
            if value.is_zero() {
                return Err(invalid(format!("{field} must be greater than zero")));
            }
        }

        if self.bus_capacity == 0 {
            return Err(invalid("bus_capacity must be greater than zero"));
        }

        if self.sender == SenderKind::Email {
            self.validate_email()?;
        }
        Ok(())
    }

    fn validate_email(&self) -> Result<(), Error> {
        let email = &self.email;
        if email.source.trim().is_empty() {
            return Err(invalid("email.source is required for the email sender"));
        }
        if email.uses_smtp() {
            if email.smtp_host.trim().is_empty() {
                return Err(invalid("email.smtp_host is required for SMTP delivery"));
            }
            if email.smtp_port == 0 {
                return Err(invalid("email.smtp_port must be greater than zero"));
            }
        } else if email.relay_url.trim().is_empty() {
            return Err(invalid("email sender needs email.password (SMTP) or email.relay_url"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::Configuration {
        reason: reason.into(),
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `service_name = "notifier"`, `service_address = "localhost:9003"`, `user_service = "user"`
    /// - `bus_capacity = 1024`
    /// - `register_timeout = 10s`, `deregister_timeout = 10s`, `shutdown_grace = 15s`
    /// - `health_interval = 5s`, `health_timeout = 2s`, `subscribe_timeout = 5s`
    /// - `sender = SenderKind::Log`
    /// - `email.smtp_host = "smtp.gmail.com"`, `email.smtp_port = 587`, `email.subject = "New Task Assigned"`
    fn default() -> Self {
        Self {
            service_name: "notifier".to_string(),
            service_address: "localhost:9003".to_string(),
            user_service: "user".to_string(),
            bus_capacity: 1024,
            register_timeout: Duration::from_secs(10),
            deregister_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(15),
            health_interval: Duration::from_secs(5),
            health_timeout: Duration::from_secs(2),
            subscribe_timeout: Duration::from_secs(5),
            sender: SenderKind::Log,
            email: EmailConfig {
                smtp_host: "smtp.gmail.com".to_string(),
                smtp_port: 587,
                subject: "New Task Assigned".to_string(),
                ..EmailConfig::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_health_interval_rejected() {
        let cfg = Config {
            health_interval: Duration::ZERO,
            ..Config::default()
        };
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.as_label(), "configuration");
        assert!(err.to_string().contains("health_interval"));
    }

    fn email_cfg() -> Config {
        let mut cfg = Config {
            sender: SenderKind::Email,
            ..Config::default()
        };
        cfg.email.source = "noreply@example.com".into();
        cfg
    }

    #[test]
    fn test_email_sender_requires_password_or_relay() {
        let mut cfg = email_cfg();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("email.password"), "{err}");

        cfg.email.relay_url = "http://mail-relay:8025/send".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_smtp_defaults_and_credentials() {
        let mut cfg = email_cfg();
        assert_eq!(cfg.email.smtp_host, "smtp.gmail.com");
        assert_eq!(cfg.email.smtp_port, 587);

        cfg.email.password = "app-password".into();
        assert!(cfg.validate().is_ok());

        cfg.email.smtp_port = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("smtp_port"), "{err}");

        cfg.email.smtp_port = 587;
        cfg.email.smtp_host = " ".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("smtp_host"), "{err}");
    }

    #[test]
    fn test_email_source_required() {
        let mut cfg = email_cfg();
        cfg.email.source.clear();
        cfg.email.password = "app-password".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("email.source"), "{err}");
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut cfg = email_cfg();
        cfg.email.password = "hunter2".into();
        let shown = format!("{cfg:?}");
        assert!(!shown.contains("hunter2"), "{shown}");
        assert!(shown.contains("***"), "{shown}");
    }

    #[test]
    fn test_blank_service_name_rejected() {
        let cfg = Config {
            service_name: "  ".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
