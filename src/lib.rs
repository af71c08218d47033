//! # taskflow
//!
//! **Taskflow** is the coordination layer of a task-management system: it
//! carries task-assignment events over a pub/sub bus and turns each of them
//! into a notification for the assignee.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  task service                                   notifier process
//! ┌──────────────┐                    ┌──────────────────────────────────────────────┐
//! │EventPublisher│── "events:task: ──►│ Broker ──► SubscriptionWorker                │
//! └──────────────┘    assigned" JSON  │                 │ decode + validate ids      │
//!                                     │                 ▼                            │
//!                                     │          NotificationService               │
//!                                     │            ├─► UserGateway ──► Registry      │
//!                                     │            │        └──► user service (1 call)│
//!                                     │            └─► Sender (Log | Email)          │
//!                                     │                                              │
//!                                     │ Runtime: register ─► run tasks ─► shutdown   │
//!                                     │          HealthReporter (periodic)           │
//!                                     └──────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! Runtime::run()
//!   ├─► register instance (fatal on failure)
//!   ├─► spawn SubscriptionWorker + HealthReporter
//!   ├─► wait for SIGINT/SIGTERM (or every service task exiting)
//!   ├─► deregister (bounded, best-effort)
//!   ├─► cancel all tasks
//!   └─► wait up to shutdown_grace
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                            |
//! |-------------------|---------------------------------------------------------------|-----------------------------------------------|
//! | **Events**        | Task-assignment event and its JSON wire form.                 | [`TaskAssignedEvent`]                         |
//! | **Bus**           | Non-durable topic pub/sub.                                    | [`Broker`], [`Subscription`], [`MemoryBroker`] |
//! | **Discovery**     | Registration, resolution and health reporting.                | [`Registry`], [`MemoryRegistry`], [`HealthReporter`] |
//! | **Gateway**       | Single-shot user lookup through the registry.                 | [`UserGateway`], [`UserConnector`]            |
//! | **Notification**  | Message template and pluggable delivery.                      | [`NotificationService`], [`Sender`]           |
//! | **Worker**        | Cancellation-aware consumer of assignment events.             | [`SubscriptionWorker`]                        |
//! | **Runtime**       | Registration, task supervision, graceful shutdown.            | [`Runtime`], [`Task`], [`TaskFn`]             |
//! | **Errors**        | Typed errors with stable log labels.                          | [`Error`], [`RuntimeError`]                   |
//!
//! ## Optional features
//! - `http` _(default)_: [`HttpUserConnector`] and [`HttpMailer`] over `reqwest`.
//! - `redis`: `RedisBroker`, the bus on Redis pub/sub channels.
//! - `grpc`: `GrpcUserConnector`, the user lookup over `tonic`.
//! - `smtp`: `SmtpMailer`, STARTTLS submission through `lettre`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use taskflow::{
//!     Config, LogSender, MemoryBroker, MemoryRegistry, NotificationService, Runtime,
//!     SubscriptionWorker, TaskRef, UserDirectory, UserDetails,
//! };
//!
//! struct Nobody;
//!
//! #[async_trait::async_trait]
//! impl UserDirectory for Nobody {
//!     async fn get_user_details(&self, id: uuid::Uuid) -> Result<UserDetails, taskflow::Error> {
//!         Err(taskflow::Error::NotFound { what: format!("user {id}") })
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::default();
//!     let broker = Arc::new(MemoryBroker::new(cfg.bus_capacity));
//!     let notifier = Arc::new(NotificationService::new(Arc::new(Nobody), Arc::new(LogSender::new())));
//!     let worker: TaskRef = Arc::new(SubscriptionWorker::new(broker, notifier, cfg.subscribe_timeout));
//!
//!     let rt = Runtime::new(cfg, Arc::new(MemoryRegistry::new()), vec![worker]);
//!     rt.run_until(tokio::time::sleep(Duration::from_millis(50))).await?;
//!     Ok(())
//! }
//! ```

mod bus;
mod config;
mod core;
mod discovery;
mod error;
mod events;
mod gateway;
mod notification;
mod worker;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use bus::{Broker, EventPublisher, MemoryBroker, MemorySubscription, Message, Subscription};
pub use config::{Config, EmailConfig};
pub use crate::core::{Runtime, ShutdownSignal, Task, TaskFn, TaskRef};
pub use discovery::{HealthReporter, InstanceId, MemoryRegistry, Registry, ServiceInstance};
pub use error::{Error, RuntimeError};
pub use events::{Assignment, TASK_ASSIGNED_TOPIC, TaskAssignedEvent};
pub use gateway::{
    UserConnection, UserConnector, UserDetails, UserDirectory, UserGateway, UserRecord,
};
pub use notification::{
    EmailMessage, EmailSender, LogSender, Mailer, NotificationService, Sender, SenderKind,
    TaskNotifier, build_sender, compose_message,
};
pub use worker::{SubscriptionWorker, WorkerState};

// Optional: HTTP-backed transports.
// Enable with: `--features http` (on by default)
#[cfg(feature = "http")]
pub use gateway::HttpUserConnector;
#[cfg(feature = "http")]
pub use notification::HttpMailer;

// Optional: service transports of a deployed notifier.
#[cfg(feature = "redis")]
pub use bus::{RedisBroker, RedisSubscription};
#[cfg(feature = "grpc")]
pub use gateway::{GetByIdRequest, GetByIdResponse, GrpcUserConnector};
#[cfg(feature = "smtp")]
pub use notification::SmtpMailer;
