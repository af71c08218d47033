//! # Task-assignment event and its wire format.
//!
//! [`TaskAssignedEvent`] is published by the task service whenever a task is
//! assigned to a user, and consumed by the notifier.
//!
//! ## Wire format
//! ```text
//! {"taskId": "<uuid>", "userId": "<uuid>"}     UTF-8 JSON, unversioned
//! ```
//!
//! ## Rules
//! - Decoding is lenient: a missing field decodes as an empty string.
//! - Identifiers are validated separately by [`TaskAssignedEvent::parse_ids`];
//!   either one failing invalidates the whole event.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Topic carrying [`TaskAssignedEvent`]s.
pub const TASK_ASSIGNED_TOPIC: &str = "events:task:assigned";

/// A task was assigned to a user.
///
/// Both identifiers are kept as received; use [`parse_ids`](Self::parse_ids)
/// to obtain typed values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignedEvent {
    /// Assigned task.
    #[serde(default)]
    pub task_id: String,
    /// Assignee.
    #[serde(default)]
    pub user_id: String,
}

/// Identifiers of a validated [`TaskAssignedEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Assignment {
    /// Assigned task.
    pub task_id: Uuid,
    /// Assignee.
    pub user_id: Uuid,
}

impl TaskAssignedEvent {
    /// Creates an event from typed identifiers.
    pub fn new(task_id: Uuid, user_id: Uuid) -> Self {
        Self {
            task_id: task_id.to_string(),
            user_id: user_id.to_string(),
        }
    }

    /// Encodes the event as JSON.
    pub fn encode(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(Error::Encoding)
    }

    /// Decodes an event from a JSON payload.
    ///
    /// # Example
    /// ```
    /// use taskflow::TaskAssignedEvent;
    ///
    /// let ev = TaskAssignedEvent::decode(r#"{"taskId":"x"}"#).unwrap();
    /// assert_eq!(ev.task_id, "x");
    /// assert!(ev.user_id.is_empty());
    /// ```
    pub fn decode(payload: &str) -> Result<Self, Error> {
        serde_json::from_str(payload).map_err(Error::Decoding)
    }

    /// Parses both identifiers as UUIDs, the user first.
    pub fn parse_ids(&self) -> Result<Assignment, Error> {
        let user_id = parse_field("userId", &self.user_id)?;
        let task_id = parse_field("taskId", &self.task_id)?;
        Ok(Assignment { task_id, user_id })
    }
}

fn parse_field(field: &'static str, value: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(value).map_err(|source| Error::InvalidIdentifier {
        field,
        value: value.to_string(),
        source,
    })
}
