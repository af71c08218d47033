//! Notification orchestration.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::Sender;
use crate::error::Error;
use crate::gateway::UserDirectory;

/// Reacts to a validated task assignment.
#[async_trait]
pub trait TaskNotifier: Send + Sync + 'static {
    /// Tells `user_id` that `task_id` awaits completion.
    async fn notify_user_to_complete_task(&self, user_id: Uuid, task_id: Uuid)
    -> Result<(), Error>;
}

/// Builds the notification text.
///
/// # Example
/// ```
/// let msg = taskflow::compose_message("alice", uuid::Uuid::nil());
/// assert_eq!(
///     msg,
///     "Hi alice, you have a task (00000000-0000-0000-0000-000000000000) to complete!"
/// );
/// ```
pub fn compose_message(username: &str, task_id: Uuid) -> String {
    format!("Hi {username}, you have a task ({task_id}) to complete!")
}

/// Looks up the assignee and delivers a fixed-template message.
///
/// No retries at this layer: the first failure is returned.
pub struct NotificationService {
    users: Arc<dyn UserDirectory>,
    sender: Arc<dyn Sender>,
}

impl NotificationService {
    /// Creates a service resolving users through `users` and delivering through `sender`.
    pub fn new(users: Arc<dyn UserDirectory>, sender: Arc<dyn Sender>) -> Self {
        Self { users, sender }
    }
}

#[async_trait]
impl TaskNotifier for NotificationService {
    async fn notify_user_to_complete_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> Result<(), Error> {
        let details = self
            .users
            .get_user_details(user_id)
            .await
            .map_err(|source| Error::UserLookup {
                user_id,
                source: Box::new(source),
            })?;

        let message = compose_message(&details.username, task_id);
        debug!(%user_id, %task_id, recipient = %details.email, "delivering notification");
        self.sender.send(&details.email, &message).await
    }
}
