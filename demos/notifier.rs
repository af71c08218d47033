//! # Example: In-process notifier
//!
//! Wires a complete notifier against in-memory backends:
//! - a [`MemoryBroker`] carrying `events:task:assigned`
//! - a [`MemoryRegistry`] where a fake user service is registered
//! - a [`LogSender`] printing notifications instead of mailing them
//!
//! Publishes a few assignments (one malformed, one for an unknown user) and
//! shuts down after a second, or on Ctrl-C.
//!
//! Run with: `RUST_LOG=info cargo run --example notifier`

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use taskflow::{
    Broker, Config, Error, EventPublisher, InstanceId, LogSender, MemoryBroker, MemoryRegistry,
    NotificationService, Registry, Runtime, SubscriptionWorker, TaskAssignedEvent, TaskRef,
    UserConnection, UserConnector, UserGateway, UserRecord, WorkerState,
};

/// User service answering from a fixed table.
struct InProcessUsers(HashMap<String, UserRecord>);

struct InProcessConnection(HashMap<String, UserRecord>);

#[async_trait]
impl UserConnector for InProcessUsers {
    async fn connect(&self, address: &str) -> Result<Box<dyn UserConnection>, Error> {
        info!(address, "connecting to user service");
        Ok(Box::new(InProcessConnection(self.0.clone())))
    }
}

#[async_trait]
impl UserConnection for InProcessConnection {
    async fn get_by_id(&mut self, user_id: &str) -> Result<Option<UserRecord>, Error> {
        Ok(self.0.get(user_id).cloned())
    }

    async fn close(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = Config {
        shutdown_grace: Duration::from_secs(2),
        ..Config::default()
    };

    let alice = Uuid::new_v4();
    let users = InProcessUsers(HashMap::from([(
        alice.to_string(),
        UserRecord {
            username: "alice".into(),
            email: "alice@example.com".into(),
        },
    )]));

    let registry = Arc::new(MemoryRegistry::new());
    registry
        .register(&InstanceId::from("user-1"), &cfg.user_service, "127.0.0.1:9001")
        .await?;

    let broker = Arc::new(MemoryBroker::new(cfg.bus_capacity));
    let gateway =
        UserGateway::new(registry.clone(), Arc::new(users)).with_service(&cfg.user_service);
    let notifier = Arc::new(NotificationService::new(
        Arc::new(gateway),
        Arc::new(LogSender::new()),
    ));
    let worker = Arc::new(SubscriptionWorker::new(
        broker.clone(),
        notifier,
        cfg.subscribe_timeout,
    ));
    let mut state = worker.watch_state();

    let publisher = EventPublisher::new(broker.clone());
    let demo = async move {
        if state.wait_for(|s| *s == WorkerState::Active).await.is_err() {
            return;
        }
        let events = [
            TaskAssignedEvent::new(Uuid::new_v4(), alice),
            TaskAssignedEvent::new(Uuid::new_v4(), Uuid::new_v4()),
        ];
        for event in &events {
            if let Err(err) = publisher.publish_task_assigned(event).await {
                tracing::error!(error = %err, "publish failed");
            }
        }
        let _ = broker
            .publish(taskflow::TASK_ASSIGNED_TOPIC, "{not json")
            .await;
        tokio::time::sleep(Duration::from_secs(1)).await;
    };

    let rt = Runtime::new(cfg, registry, vec![worker as TaskRef]);
    info!(instance_id = %rt.instance().instance_id, "starting notifier");

    rt.run_until(async {
        tokio::select! {
            _ = demo => info!("demo finished"),
            _ = tokio::signal::ctrl_c() => info!("ctrl-c received"),
        }
    })
    .await?;

    Ok(())
}
