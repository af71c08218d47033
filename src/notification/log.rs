//! # LogSender — notifications written to the log
//!
//! ## Example output
//! ```text
//! INFO taskflow::notification::log: sending notification recipient="alice@example.com" message="Hi alice, ..."
//! ```

use async_trait::async_trait;
use tracing::info;

use super::Sender;
use crate::error::Error;

/// Sender that only logs what it would deliver.
#[derive(Debug, Default)]
pub struct LogSender;

impl LogSender {
    /// Construct a new [`LogSender`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Sender for LogSender {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), Error> {
        info!(recipient, message, "sending notification");
        Ok(())
    }
}
