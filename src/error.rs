//! Error types used by the taskflow coordination layer.
//!
//! This module defines two main error enums:
//!
//! - [`Error`] — failures raised by components (bus, registry, gateway, senders, worker).
//! - [`RuntimeError`] — failures of the process lifecycle driven by [`Runtime`](crate::Runtime).
//!
//! Both types provide `as_label` for logs. [`Error`] additionally exposes
//! [`Error::is_cancellation`] and [`Error::root_cause`].

use std::any::Any;
use std::time::Duration;
use thiserror::Error;

/// # Errors produced by taskflow components.
///
/// Recoverable variants (`Decoding`, `InvalidIdentifier`) are swallowed by the
/// subscription worker; `Cancelled` is expected during shutdown and is never
/// reported as a failure.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid settings detected at startup.
    #[error("invalid configuration: {reason}")]
    Configuration {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// An event could not be serialized.
    #[error("failed to encode event: {0}")]
    Encoding(#[source] serde_json::Error),

    /// Bus, registry or RPC connectivity failure.
    #[error("transport failure ({target}): {reason}")]
    Transport {
        /// Topic, address or backend that could not be reached.
        target: String,
        /// Transport-level detail.
        reason: String,
    },

    /// A payload could not be decoded into an event.
    #[error("failed to decode payload: {0}")]
    Decoding(#[source] serde_json::Error),

    /// An identifier inside an event is not a valid UUID.
    #[error("invalid {field} {value:?}: {source}")]
    InvalidIdentifier {
        /// Wire name of the offending field.
        field: &'static str,
        /// Raw value as received.
        value: String,
        /// Parse failure.
        #[source]
        source: uuid::Error,
    },

    /// Looking up a logical service in the registry failed.
    #[error("failed to resolve service {service:?}")]
    Resolution {
        /// Logical service name.
        service: String,
        /// Registry failure.
        #[source]
        source: Box<Error>,
    },

    /// Nothing was found: an empty address set, or an absent entity.
    #[error("{what} not found")]
    NotFound {
        /// Human-readable description of the missing thing.
        what: String,
    },

    /// A downstream call failed.
    #[error("remote call to {address} failed: {reason}")]
    Remote {
        /// Address of the called instance.
        address: String,
        /// Failure detail.
        reason: String,
    },

    /// Fetching the recipient of a notification failed.
    #[error("failed to fetch user {user_id}")]
    UserLookup {
        /// User that could not be resolved.
        user_id: uuid::Uuid,
        /// Gateway failure.
        #[source]
        source: Box<Error>,
    },

    /// A sender could not deliver a notification.
    #[error("failed to deliver notification to {recipient}: {reason}")]
    Delivery {
        /// Intended recipient.
        recipient: String,
        /// Failure detail.
        reason: String,
    },

    /// A task or notification panicked instead of returning.
    #[error("{task} panicked: {message}")]
    Panicked {
        /// Name of the task that panicked.
        task: String,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// Operation stopped because shutdown was requested.
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use taskflow::Error;
    ///
    /// let err = Error::NotFound { what: "user service address".into() };
    /// assert_eq!(err.as_label(), "not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::Configuration { .. } => "configuration",
            Error::Encoding(_) => "encoding",
            Error::Transport { .. } => "transport",
            Error::Decoding(_) => "decoding",
            Error::InvalidIdentifier { .. } => "invalid_identifier",
            Error::Resolution { .. } => "resolution",
            Error::NotFound { .. } => "not_found",
            Error::Remote { .. } => "remote",
            Error::UserLookup { .. } => "user_lookup",
            Error::Delivery { .. } => "delivery",
            Error::Panicked { .. } => "panicked",
            Error::Cancelled => "cancelled",
        }
    }

    /// Indicates whether the error only reflects a requested shutdown.
    pub fn is_cancellation(&self) -> bool {
        matches!(self.root_cause(), Error::Cancelled)
    }

    /// Walks through wrapping variants (`UserLookup`, `Resolution`) and returns the innermost error.
    ///
    /// # Example
    /// ```
    /// use taskflow::Error;
    ///
    /// let err = Error::UserLookup {
    ///     user_id: uuid::Uuid::nil(),
    ///     source: Box::new(Error::NotFound { what: "user".into() }),
    /// };
    /// assert!(matches!(err.root_cause(), Error::NotFound { .. }));
    /// ```
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::UserLookup { source, .. } | Error::Resolution { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }

    pub(crate) fn transport(target: impl Into<String>, reason: impl ToString) -> Self {
        Error::Transport {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound { what: what.into() }
    }

    pub(crate) fn panicked(task: impl Into<String>, payload: &(dyn Any + Send)) -> Self {
        Error::Panicked {
            task: task.into(),
            message: panic_message(payload).to_string(),
        }
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// # Errors produced by the process lifecycle.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration was rejected before anything started.
    #[error("refusing to start: {0}")]
    InvalidConfig(#[source] Error),

    /// Registering this instance failed; the process must not start.
    #[error("failed to register instance {instance_id}")]
    Registration {
        /// Instance that could not be registered.
        instance_id: String,
        /// Registry failure.
        #[source]
        source: Error,
    },

    /// Installing the termination signal listener failed.
    #[error("failed to listen for shutdown signals: {0}")]
    Signal(#[source] std::io::Error),

    /// Every service task stopped on its own and at least one of them failed.
    #[error("task {task} failed")]
    TaskFailed {
        /// Name of the first task that failed.
        task: String,
        /// Its failure.
        #[source]
        source: Error,
    },

    /// Shutdown grace period was exceeded; the listed tasks were abandoned.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of tasks that had not finished.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use taskflow::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::InvalidConfig(_) => "runtime_invalid_config",
            RuntimeError::Registration { .. } => "runtime_registration",
            RuntimeError::Signal(_) => "runtime_signal",
            RuntimeError::TaskFailed { .. } => "runtime_task_failed",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_seen_through_wrappers() {
        let err = Error::UserLookup {
            user_id: uuid::Uuid::nil(),
            source: Box::new(Error::Cancelled),
        };
        assert!(err.is_cancellation());
        assert!(!Error::not_found("x").is_cancellation());
    }

    #[test]
    fn test_root_cause_nested_resolution() {
        let err = Error::UserLookup {
            user_id: uuid::Uuid::nil(),
            source: Box::new(Error::Resolution {
                service: "user".into(),
                source: Box::new(Error::transport("registry", "connection refused")),
            }),
        };
        assert_eq!(err.root_cause().as_label(), "transport");
        assert_eq!(err.as_label(), "user_lookup");
    }

    #[test]
    fn test_panic_message_extracts_text() {
        let boxed: Box<dyn Any + Send> = Box::new("static text");
        assert_eq!(panic_message(boxed.as_ref()), "static text");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn test_panicked_keeps_payload_text() {
        let boxed: Box<dyn Any + Send> = Box::new(String::from("index out of bounds"));
        let err = Error::panicked("worker", boxed.as_ref());
        assert_eq!(err.as_label(), "panicked");
        assert_eq!(err.to_string(), "worker panicked: index out of bounds");
        assert!(!err.is_cancellation());
    }
}
