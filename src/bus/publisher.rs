//! Publishing side of the task-assignment bus.

use std::sync::Arc;

use tracing::{error, info};

use super::Broker;
use crate::error::Error;
use crate::events::{TASK_ASSIGNED_TOPIC, TaskAssignedEvent};

/// Encodes domain events and writes them to their fixed topic.
///
/// Success only means the broker accepted the write; how many consumers see
/// it is up to the broker.
#[derive(Clone)]
pub struct EventPublisher {
    broker: Arc<dyn Broker>,
}

impl EventPublisher {
    /// Creates a publisher writing to `broker`.
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// Publishes a [`TaskAssignedEvent`] on [`TASK_ASSIGNED_TOPIC`].
    ///
    /// Returns the number of subscriptions attached at publish time.
    /// Fails with [`Error::Encoding`] or [`Error::Transport`].
    pub async fn publish_task_assigned(&self, event: &TaskAssignedEvent) -> Result<usize, Error> {
        let payload = event.encode().inspect_err(|err| {
            error!(error = %err, "failed to encode task assigned event");
        })?;

        let receivers = self
            .broker
            .publish(TASK_ASSIGNED_TOPIC, &payload)
            .await
            .inspect_err(|err| {
                error!(topic = TASK_ASSIGNED_TOPIC, error = %err, "failed to publish task assigned event");
            })?;

        info!(
            topic = TASK_ASSIGNED_TOPIC,
            task_id = %event.task_id,
            user_id = %event.user_id,
            receivers,
            "published task assigned event"
        );
        Ok(receivers)
    }
}
