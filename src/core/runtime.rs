//! # Runtime: registration, task execution and graceful shutdown.
//!
//! The [`Runtime`] owns one process lifecycle. It announces the instance to the
//! [`Registry`], runs the service tasks next to a [`HealthReporter`], and on
//! shutdown withdraws the instance before cancelling everything.
//!
//! ## Lifecycle
//! ```text
//! run_until(trigger)
//!   ├─► cfg.validate()                              ─ Err ─► InvalidConfig
//!   ├─► registry.register() within register_timeout ─ Err ─► Registration (nothing spawned)
//!   ├─► spawn: service tasks + health reporter, each with runtime_token.child_token()
//!   ├─► select! {
//!   │     trigger fired            ─► shutdown requested
//!   │     all service tasks exited ─► nothing left to serve
//!   │   }
//!   ├─► registry.deregister() within deregister_timeout   (best-effort, logged)
//!   ├─► runtime_token.cancel()   → propagates to child tokens
//!   └─► wait_all_with_grace(cfg.shutdown_grace):
//!          ├─ all joined, a service task failed → TaskFailed
//!          ├─ all joined                        → Ok
//!          └─ timeout exceeded                  → GraceExceeded { stuck }
//! ```
//!
//! Deregistration happens before cancellation so callers stop routing to this
//! instance while it is still able to finish in-flight work.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::{task::JoinSet, time};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::shutdown::ShutdownSignal;
use crate::core::task::TaskRef;
use crate::discovery::{HealthReporter, Registry, ServiceInstance};
use crate::error::{Error, RuntimeError};

/// Drives one notifier process from registration to shutdown.
pub struct Runtime {
    cfg: Config,
    registry: Arc<dyn Registry>,
    instance: ServiceInstance,
    tasks: Vec<TaskRef>,
}

impl Runtime {
    /// Creates a runtime for the instance described by `cfg`.
    ///
    /// The instance id is generated here and stays fixed for the lifetime of the runtime.
    pub fn new(cfg: Config, registry: Arc<dyn Registry>, tasks: Vec<TaskRef>) -> Self {
        let instance = ServiceInstance::new(&cfg.service_name, &cfg.service_address);
        Self::with_instance(cfg, registry, instance, tasks)
    }

    /// Creates a runtime for an explicitly provided instance.
    pub fn with_instance(
        cfg: Config,
        registry: Arc<dyn Registry>,
        instance: ServiceInstance,
        tasks: Vec<TaskRef>,
    ) -> Self {
        Self {
            cfg,
            registry,
            instance,
            tasks,
        }
    }

    /// The instance this runtime registers.
    pub fn instance(&self) -> &ServiceInstance {
        &self.instance
    }

    /// Runs until a termination signal arrives or every service task exits.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        let signal = ShutdownSignal::install().map_err(RuntimeError::Signal)?;
        self.run_until(async move {
            let name = signal.recv().await;
            info!(signal = name, "received termination signal");
        })
        .await
    }

    /// Runs until `trigger` completes or every service task exits.
    pub async fn run_until<F>(&self, trigger: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = ()>,
    {
        self.cfg.validate().map_err(RuntimeError::InvalidConfig)?;
        self.register().await?;

        let token = CancellationToken::new();
        let mut services = Running::default();
        let mut background = Running::default();
        for task in &self.tasks {
            services.spawn(task.clone(), token.child_token());
        }
        background.spawn(
            Arc::new(HealthReporter::new(
                self.registry.clone(),
                self.instance.clone(),
                self.cfg.health_interval,
                self.cfg.health_timeout,
            )),
            token.child_token(),
        );

        tokio::select! {
            _ = trigger => info!("shutdown requested"),
            _ = services.join_all() => info!("all service tasks exited"),
        }

        self.deregister().await;
        token.cancel();
        self.wait_all_with_grace(&mut services, &mut background).await?;

        match services.failures.into_iter().next() {
            Some((task, source)) => Err(RuntimeError::TaskFailed { task, source }),
            None => Ok(()),
        }
    }

    async fn register(&self) -> Result<(), RuntimeError> {
        let inst = &self.instance;
        let timeout = self.cfg.register_timeout;
        let res = time::timeout(
            timeout,
            self.registry.register(&inst.instance_id, &inst.service_name, &inst.address),
        )
        .await
        .unwrap_or_else(|_| {
            Err(Error::transport(
                "registry",
                format!("registration timed out after {timeout:?}"),
            ))
        });

        match res {
            Ok(()) => {
                info!(
                    instance_id = %inst.instance_id,
                    service = %inst.service_name,
                    address = %inst.address,
                    "registered service instance"
                );
                Ok(())
            }
            Err(source) => {
                error!(instance_id = %inst.instance_id, error = %source, "failed to register service instance");
                Err(RuntimeError::Registration {
                    instance_id: inst.instance_id.to_string(),
                    source,
                })
            }
        }
    }

    async fn deregister(&self) {
        let inst = &self.instance;
        let timeout = self.cfg.deregister_timeout;
        match time::timeout(
            timeout,
            self.registry.deregister(&inst.instance_id, &inst.service_name),
        )
        .await
        {
            Ok(Ok(())) => info!(instance_id = %inst.instance_id, "deregistered service instance"),
            Ok(Err(err)) => {
                error!(instance_id = %inst.instance_id, error = %err, "failed to deregister service instance")
            }
            Err(_elapsed) => error!(
                instance_id = %inst.instance_id,
                timeout = ?timeout,
                "deregistration timed out"
            ),
        }
    }

    /// Waits for all tasks within the configured grace period.
    ///
    /// Returns [`RuntimeError::GraceExceeded`] with the names of tasks still running;
    /// those are aborted.
    async fn wait_all_with_grace(
        &self,
        services: &mut Running,
        background: &mut Running,
    ) -> Result<(), RuntimeError> {
        let grace = self.cfg.shutdown_grace;
        let done = async {
            services.join_all().await;
            background.join_all().await;
        };

        match time::timeout(grace, done).await {
            Ok(()) => {
                info!("all tasks stopped within grace");
                Ok(())
            }
            Err(_) => {
                let mut stuck = services.pending.clone();
                stuck.extend(background.pending.iter().cloned());
                stuck.sort();
                warn!(grace = ?grace, stuck = ?stuck, "shutdown grace exceeded");
                services.set.abort_all();
                background.set.abort_all();
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}

/// Spawned tasks and what is known about them so far.
#[derive(Default)]
struct Running {
    set: JoinSet<(String, Result<(), Error>)>,
    pending: Vec<String>,
    failures: Vec<(String, Error)>,
}

impl Running {
    fn spawn(&mut self, task: TaskRef, token: CancellationToken) {
        let name = task.name().to_string();
        self.pending.push(name.clone());
        self.set.spawn(async move {
            let res = match AssertUnwindSafe(task.run(token)).catch_unwind().await {
                Ok(res) => res,
                Err(panic) => Err(Error::panicked(name.as_str(), panic.as_ref())),
            };
            (name, res)
        });
    }

    async fn join_all(&mut self) {
        while let Some(joined) = self.set.join_next().await {
            match joined {
                Ok((name, res)) => self.finished(name, res),
                Err(err) => error!(error = %err, "task join failed"),
            }
        }
    }

    fn finished(&mut self, name: String, res: Result<(), Error>) {
        if let Some(pos) = self.pending.iter().position(|n| *n == name) {
            self.pending.swap_remove(pos);
        }
        match res {
            Ok(()) => info!(task = %name, "task finished"),
            Err(err) if err.is_cancellation() => info!(task = %name, "task stopped"),
            Err(err) => {
                error!(task = %name, label = err.as_label(), error = %err, "task failed");
                self.failures.push((name, err));
            }
        }
    }
}
