//! # Periodic liveness reports.
//!
//! ```text
//! loop {
//!   select! {
//!     tick      ─► timeout(health_timeout, report_health_state) ─► warn on failure
//!     cancelled ─► return Ok
//!   }
//! }
//! ```
//!
//! Each report has its own deadline independent of the loop's cancellation, so
//! a slow backend delays at most one tick. Failures never stop the loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Registry, ServiceInstance};
use crate::core::Task;
use crate::error::Error;

/// Reports the liveness of one instance at a fixed interval.
pub struct HealthReporter {
    registry: Arc<dyn Registry>,
    instance: ServiceInstance,
    interval: Duration,
    timeout: Duration,
}

impl HealthReporter {
    /// Creates a reporter for `instance`.
    ///
    /// The first report is sent one `interval` after [`run`](Task::run) starts.
    pub fn new(
        registry: Arc<dyn Registry>,
        instance: ServiceInstance,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            instance,
            interval,
            timeout,
        }
    }

    async fn report_once(&self) {
        let id = &self.instance.instance_id;
        let name = &self.instance.service_name;
        match time::timeout(self.timeout, self.registry.report_health_state(id, name)).await {
            Ok(Ok(())) => debug!(instance_id = %id, "reported healthy state"),
            Ok(Err(err)) => {
                warn!(instance_id = %id, error = %err, "failed to report healthy state")
            }
            Err(_elapsed) => warn!(
                instance_id = %id,
                timeout = ?self.timeout,
                "health report timed out"
            ),
        }
    }
}

#[async_trait]
impl Task for HealthReporter {
    fn name(&self) -> &str {
        "health-reporter"
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), Error> {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(instance_id = %self.instance.instance_id, interval = ?self.interval, "starting health reporter");

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    info!("stopping health reporter due to cancellation");
                    return Ok(());
                }
                _ = ticker.tick() => self.report_once().await,
            }
        }
    }
}
