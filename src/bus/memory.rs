//! # In-process broker.
//!
//! [`MemoryBroker`] keeps one [`tokio::sync::broadcast`] channel per topic.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                  Subscriptions (many per topic):
//!   task svc 1 ──┐
//!   task svc 2 ──┼──► MemoryBroker ──► topic channel ──► MemorySubscription ──► worker
//!   ...        ──┘    (HashMap)       (broadcast)    └─► MemorySubscription ──► worker
//! ```
//!
//! ## Rules
//! - **Non-durable**: messages are lost if the topic has no subscription at send time.
//! - **Bounded capacity**: one ring buffer per topic, shared by its subscriptions.
//! - **Lag handling**: a slow subscription skips the oldest messages (logged at warn).
//! - **Closure**: [`MemoryBroker::close_topic`] ends every subscription of the topic once
//!   it has drained; [`MemoryBroker::shutdown`] does so for all topics and rejects new work.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};
use tracing::warn;

use super::{Broker, Message, Subscription};
use crate::error::Error;

#[derive(Default)]
struct Topics {
    channels: HashMap<String, broadcast::Sender<Message>>,
    shut_down: bool,
}

/// Broadcast-backed broker living inside the process.
///
/// ### Properties
/// - **Non-blocking**: `publish()` never waits for subscribers.
/// - **Fire-and-forget**: no delivery or durability guarantees.
/// - **Shareable**: wrap in `Arc` and hand the same broker to publishers and workers.
pub struct MemoryBroker {
    capacity: usize,
    topics: RwLock<Topics>,
}

impl MemoryBroker {
    /// Creates a broker whose topics buffer up to `capacity` messages (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: RwLock::new(Topics::default()),
        }
    }

    /// Closes every subscription attached to `topic`.
    ///
    /// Buffered messages are still delivered before subscriptions observe the closure.
    pub async fn close_topic(&self, topic: &str) {
        self.topics.write().await.channels.remove(topic);
    }

    /// Closes all topics and makes further `publish`/`subscribe` calls fail.
    pub async fn shutdown(&self) {
        let mut topics = self.topics.write().await;
        topics.shut_down = true;
        topics.channels.clear();
    }

    /// Number of live subscriptions on `topic`.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .await
            .channels
            .get(topic)
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, topic: &str, payload: &str) -> Result<usize, Error> {
        let topics = self.topics.read().await;
        if topics.shut_down {
            return Err(Error::transport(topic, "broker is shut down"));
        }
        let Some(tx) = topics.channels.get(topic) else {
            return Ok(0);
        };
        let msg = Message {
            topic: Arc::from(topic),
            payload: Arc::from(payload),
        };
        // `send` only fails when no receiver is attached.
        Ok(tx.send(msg).unwrap_or(0))
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn Subscription>, Error> {
        let mut topics = self.topics.write().await;
        if topics.shut_down {
            return Err(Error::transport(topic, "broker is shut down"));
        }
        let capacity = self.capacity;
        let rx = topics
            .channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .subscribe();
        Ok(Box::new(MemorySubscription {
            topic: topic.to_string(),
            rx: Some(rx),
        }))
    }
}

/// Subscription handed out by [`MemoryBroker`].
pub struct MemorySubscription {
    topic: String,
    rx: Option<broadcast::Receiver<Message>>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn confirm(&mut self) -> Result<(), Error> {
        match self.rx {
            Some(_) => Ok(()),
            None => Err(Error::transport(&self.topic, "subscription already closed")),
        }
    }

    async fn next_message(&mut self) -> Option<Message> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "subscription lagged; messages lost");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.rx = None;
        Ok(())
    }
}
