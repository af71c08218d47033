//! # In-process registry backend.
//!
//! Keeps instances per service in memory. Useful for tests, demos and
//! single-process deployments where every service shares one registry handle.
//!
//! ## Rules
//! - `register` is an upsert (re-registering refreshes address and heartbeat)
//! - `deregister` / `report_health_state` on an unknown instance → `NotFound`
//! - `service_addresses` returns addresses sorted, empty when nothing is registered
//! - with a heartbeat TTL, instances not reported within the TTL are not returned

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{InstanceId, Registry};
use crate::error::Error;

#[derive(Debug, Clone)]
struct Record {
    address: String,
    last_seen: Instant,
}

/// Registry backend held in process memory.
#[derive(Default)]
pub struct MemoryRegistry {
    services: RwLock<HashMap<String, BTreeMap<InstanceId, Record>>>,
    ttl: Option<Duration>,
}

impl MemoryRegistry {
    /// Creates a registry that keeps instances until they are deregistered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that hides instances not reported within `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            services: RwLock::default(),
            ttl: Some(ttl),
        }
    }

    /// Returns the sorted ids registered for `service_name`.
    pub async fn instances(&self, service_name: &str) -> Vec<InstanceId> {
        self.services
            .read()
            .await
            .get(service_name)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn is_fresh(&self, record: &Record, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_duration_since(record.last_seen) <= ttl,
            None => true,
        }
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn register(
        &self,
        instance_id: &InstanceId,
        service_name: &str,
        address: &str,
    ) -> Result<(), Error> {
        let mut services = self.services.write().await;
        services.entry(service_name.to_string()).or_default().insert(
            instance_id.clone(),
            Record {
                address: address.to_string(),
                last_seen: Instant::now(),
            },
        );
        Ok(())
    }

    async fn deregister(&self, instance_id: &InstanceId, service_name: &str) -> Result<(), Error> {
        let mut services = self.services.write().await;
        let removed = services
            .get_mut(service_name)
            .and_then(|m| m.remove(instance_id));
        if services.get(service_name).is_some_and(BTreeMap::is_empty) {
            services.remove(service_name);
        }
        match removed {
            Some(_) => Ok(()),
            None => Err(Error::not_found(format!(
                "instance {instance_id} of {service_name}"
            ))),
        }
    }

    async fn service_addresses(&self, service_name: &str) -> Result<Vec<String>, Error> {
        let now = Instant::now();
        let services = self.services.read().await;
        let mut addrs: Vec<String> = services
            .get(service_name)
            .into_iter()
            .flat_map(|m| m.values())
            .filter(|r| self.is_fresh(r, now))
            .map(|r| r.address.clone())
            .collect();
        addrs.sort_unstable();
        Ok(addrs)
    }

    async fn report_health_state(
        &self,
        instance_id: &InstanceId,
        service_name: &str,
    ) -> Result<(), Error> {
        let mut services = self.services.write().await;
        match services
            .get_mut(service_name)
            .and_then(|m| m.get_mut(instance_id))
        {
            Some(record) => {
                record.last_seen = Instant::now();
                Ok(())
            }
            None => Err(Error::not_found(format!(
                "instance {instance_id} of {service_name}"
            ))),
        }
    }
}
