//! Publish/subscribe event bus.
//!
//! The bus is **non-durable**: a message reaches only the subscriptions that
//! exist when it is published, there is no acknowledgement and no redelivery.
//!
//! ## Contents
//! - [`Broker`] / [`Subscription`] the transport contract
//! - [`MemoryBroker`] in-process broker over `tokio::sync::broadcast`
//! - `RedisBroker` Redis channels (feature `redis`)
//! - [`EventPublisher`] encodes domain events and publishes them on their topic
//!
//! ## Architecture
//! ```text
//! task service                                notifier
//!   EventPublisher ── publish(topic, json) ──► Broker ──► Subscription ──► SubscriptionWorker
//!                                              (topic)    (one per worker)
//! ```

mod memory;
mod publisher;
#[cfg(feature = "redis")]
mod redis;

pub use memory::{MemoryBroker, MemorySubscription};
pub use publisher::EventPublisher;
#[cfg(feature = "redis")]
pub use self::redis::{RedisBroker, RedisSubscription};

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;

/// A message delivered on a topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Topic the message was published on.
    pub topic: Arc<str>,
    /// UTF-8 payload as published.
    pub payload: Arc<str>,
}

/// Transport contract of the bus.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    /// Publishes `payload` on `topic`.
    ///
    /// Returns how many subscriptions were attached at publish time; `0` is not an error.
    /// Fails with [`Error::Transport`] if the broker cannot accept the write.
    async fn publish(&self, topic: &str, payload: &str) -> Result<usize, Error>;

    /// Attaches a new subscription to `topic`.
    ///
    /// The subscription only observes messages published after this call.
    async fn subscribe(&self, topic: &str) -> Result<Box<dyn Subscription>, Error>;
}

/// A live subscription to one topic, exclusively owned by its consumer.
#[async_trait]
pub trait Subscription: Send {
    /// Topic this subscription is attached to.
    fn topic(&self) -> &str;

    /// Waits until the broker confirms the subscription.
    async fn confirm(&mut self) -> Result<(), Error>;

    /// Waits for the next message.
    ///
    /// Returns `None` once the broker closed the subscription; no message will follow.
    /// Must be cancel-safe: dropping the future loses no message.
    async fn next_message(&mut self) -> Option<Message>;

    /// Releases the subscription. Calling it more than once is harmless.
    async fn close(&mut self) -> Result<(), Error>;
}
