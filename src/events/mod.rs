//! Domain events exchanged between services.
//!
//! ## Contents
//! - [`TaskAssignedEvent`] the event published on task assignment, with its JSON codec
//! - [`Assignment`] typed identifiers of a validated event
//! - [`TASK_ASSIGNED_TOPIC`] the topic it travels on
//!
//! The bus that carries these lives in [`crate::bus`].

mod task_assigned;

pub use task_assigned::{Assignment, TASK_ASSIGNED_TOPIC, TaskAssignedEvent};
