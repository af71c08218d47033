//! # SubscriptionWorker: consumes task-assignment events.
//!
//! Owns one bus subscription for its whole run and turns every valid
//! [`TaskAssignedEvent`] into one call to a [`TaskNotifier`].
//!
//! ## States
//! ```text
//! Idle ──► Subscribing ──► Active ──┬─ cancelled ──► Draining ──► Terminated  (Err(Cancelled))
//!              │                    └─ broker closed ──► Closed ──► Terminated (Ok)
//!              └─ subscribe/confirm failed ─────────────────────► Terminated  (Err(Transport|Cancelled))
//! ```
//!
//! ## Message handling (Active)
//! ```text
//! select! (biased) {
//!   cancelled       ─► leave the loop, never start another message
//!   next_message()  ─► decode JSON      ─ Err ─► warn, skip
//!                   ─► parse userId/taskId ─ Err ─► warn, skip
//!                   ─► notify (awaited inline) ─ Err/panic ─► log, continue
//! }
//! ```
//!
//! ## Rules
//! - Messages are handled strictly one at a time, in arrival order.
//! - A failed notification is never retried and never stops the loop.
//! - The subscription is released on every exit path, including errors.
//! - Re-subscribing after a transport failure is the caller's decision.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bus::{Broker, Message, Subscription};
use crate::core::Task;
use crate::error::{Error, panic_message};
use crate::events::{TASK_ASSIGNED_TOPIC, TaskAssignedEvent};
use crate::notification::TaskNotifier;

/// Lifecycle state of a [`SubscriptionWorker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed, not running.
    Idle,
    /// Attaching to the topic and awaiting confirmation.
    Subscribing,
    /// Consuming messages.
    Active,
    /// Cancellation observed; releasing the subscription.
    Draining,
    /// The broker ended the subscription.
    Closed,
    /// Run finished; the subscription is released.
    Terminated,
}

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    Notified,
    Skipped,
    Failed,
}

/// Consumes [`TASK_ASSIGNED_TOPIC`] and notifies assignees.
pub struct SubscriptionWorker {
    broker: Arc<dyn Broker>,
    notifier: Arc<dyn TaskNotifier>,
    subscribe_timeout: Duration,
    state: watch::Sender<WorkerState>,
}

impl SubscriptionWorker {
    /// Creates a worker reading from `broker` and dispatching to `notifier`.
    ///
    /// `subscribe_timeout` bounds the wait for subscription confirmation.
    pub fn new(
        broker: Arc<dyn Broker>,
        notifier: Arc<dyn TaskNotifier>,
        subscribe_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            broker,
            notifier,
            subscribe_timeout,
            state,
        }
    }

    /// Current state.
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Receiver observing every state change.
    pub fn watch_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: WorkerState) {
        self.state.send_replace(next);
    }

    async fn confirm(
        &self,
        sub: &mut dyn Subscription,
        ctx: &CancellationToken,
    ) -> Result<(), Error> {
        let confirmed = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(Error::Cancelled),
            res = time::timeout(self.subscribe_timeout, sub.confirm()) => res,
        };
        match confirmed {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err @ (Error::Cancelled | Error::Transport { .. }))) => Err(err),
            Ok(Err(other)) => Err(Error::transport(TASK_ASSIGNED_TOPIC, other)),
            Err(_elapsed) => Err(Error::transport(
                TASK_ASSIGNED_TOPIC,
                format!(
                    "no subscription confirmation within {:?}",
                    self.subscribe_timeout
                ),
            )),
        }
    }

    async fn consume(
        &self,
        sub: &mut dyn Subscription,
        ctx: &CancellationToken,
    ) -> Result<(), Error> {
        self.confirm(sub, ctx).await?;
        self.set_state(WorkerState::Active);
        info!(
            topic = TASK_ASSIGNED_TOPIC,
            "subscribed; waiting for messages or cancellation"
        );

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    info!("cancellation requested; stopping subscriber");
                    return Err(Error::Cancelled);
                }
                msg = sub.next_message() => match msg {
                    Some(msg) => {
                        self.dispatch(&msg).await;
                    }
                    None => {
                        self.set_state(WorkerState::Closed);
                        info!(topic = TASK_ASSIGNED_TOPIC, "subscription closed by broker");
                        return Ok(());
                    }
                },
            }
        }
    }

    async fn dispatch(&self, msg: &Message) -> Dispatch {
        info!(topic = %msg.topic, "received message");

        let event = match TaskAssignedEvent::decode(&msg.payload) {
            Ok(ev) => ev,
            Err(err) => {
                warn!(error = %err, payload = %msg.payload, "failed to decode task assigned event; skipping");
                return Dispatch::Skipped;
            }
        };
        let ids = match event.parse_ids() {
            Ok(ids) => ids,
            Err(err) => {
                warn!(
                    task_id = %event.task_id,
                    user_id = %event.user_id,
                    error = %err,
                    "invalid identifier; skipping notification"
                );
                return Dispatch::Skipped;
            }
        };

        let notify = self
            .notifier
            .notify_user_to_complete_task(ids.user_id, ids.task_id);
        match AssertUnwindSafe(notify).catch_unwind().await {
            Ok(Ok(())) => {
                info!(task_id = %ids.task_id, user_id = %ids.user_id, "processed notification");
                Dispatch::Notified
            }
            Ok(Err(err)) if err.is_cancellation() => {
                info!(task_id = %ids.task_id, user_id = %ids.user_id, "notification cancelled");
                Dispatch::Failed
            }
            Ok(Err(err)) => {
                error!(
                    task_id = %ids.task_id,
                    user_id = %ids.user_id,
                    label = err.root_cause().as_label(),
                    cause = %err.root_cause(),
                    error = %err,
                    "failed to send notification"
                );
                Dispatch::Failed
            }
            Err(panic) => {
                error!(
                    task_id = %ids.task_id,
                    user_id = %ids.user_id,
                    panic = panic_message(panic.as_ref()),
                    "notification panicked"
                );
                Dispatch::Failed
            }
        }
    }
}

#[async_trait]
impl Task for SubscriptionWorker {
    fn name(&self) -> &str {
        "task-assigned-subscriber"
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), Error> {
        self.set_state(WorkerState::Subscribing);

        let subscribed = tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(Error::Cancelled),
            res = self.broker.subscribe(TASK_ASSIGNED_TOPIC) => res,
        };
        let mut sub = match subscribed {
            Ok(sub) => sub,
            Err(err) => {
                if !err.is_cancellation() {
                    error!(topic = TASK_ASSIGNED_TOPIC, error = %err, "failed to subscribe");
                }
                self.set_state(WorkerState::Terminated);
                return Err(err);
            }
        };

        let res = self.consume(sub.as_mut(), &ctx).await;
        match &res {
            Err(Error::Cancelled) => self.set_state(WorkerState::Draining),
            Err(err) => error!(topic = TASK_ASSIGNED_TOPIC, error = %err, "subscription failed"),
            Ok(()) => {}
        }

        match sub.close().await {
            Ok(()) => info!(topic = TASK_ASSIGNED_TOPIC, "subscription released"),
            Err(err) => error!(topic = TASK_ASSIGNED_TOPIC, error = %err, "failed to release subscription"),
        }
        self.set_state(WorkerState::Terminated);
        res
    }
}
