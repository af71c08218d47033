//! Service discovery.
//!
//! ## Contents
//! - [`Registry`] the contract consumed by the rest of the crate
//! - [`InstanceId`] / [`ServiceInstance`] identity of a running deployment
//! - [`MemoryRegistry`] in-process backend
//! - [`HealthReporter`] periodic liveness reports
//!
//! ## Lifecycle
//! ```text
//! register (fatal on failure) ──► report_health_state every tick (failures logged)
//!                              ──► deregister at shutdown (best-effort, bounded)
//! ```

mod health;
mod memory;

pub use health::HealthReporter;
pub use memory::MemoryRegistry;

use std::fmt;

use async_trait::async_trait;

use crate::error::Error;

/// Contract of a discovery backend.
#[async_trait]
pub trait Registry: Send + Sync + 'static {
    /// Announces `address` as an instance of `service_name`.
    async fn register(
        &self,
        instance_id: &InstanceId,
        service_name: &str,
        address: &str,
    ) -> Result<(), Error>;

    /// Withdraws an instance.
    async fn deregister(&self, instance_id: &InstanceId, service_name: &str) -> Result<(), Error>;

    /// Lists the addresses of `service_name`.
    ///
    /// An empty list is a normal answer; callers decide whether it means "not found".
    async fn service_addresses(&self, service_name: &str) -> Result<Vec<String>, Error>;

    /// Reports that an instance is alive.
    async fn report_health_state(
        &self,
        instance_id: &InstanceId,
        service_name: &str,
    ) -> Result<(), Error>;
}

/// Identifier of one running instance, fixed for the process lifetime.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(String);

impl InstanceId {
    /// Generates `"{service_name}-{random}"`.
    ///
    /// # Example
    /// ```
    /// use taskflow::InstanceId;
    ///
    /// let id = InstanceId::generate("notifier");
    /// assert!(id.as_str().starts_with("notifier-"));
    /// ```
    pub fn generate(service_name: &str) -> Self {
        Self(format!("{service_name}-{}", rand::random::<u32>()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InstanceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A running deployment of a logical service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceInstance {
    /// Logical service name.
    pub service_name: String,
    /// Identifier for the process lifetime.
    pub instance_id: InstanceId,
    /// Network address other services call.
    pub address: String,
}

impl ServiceInstance {
    /// Creates an instance of `service_name` at `address` with a freshly generated id.
    pub fn new(service_name: impl Into<String>, address: impl Into<String>) -> Self {
        let service_name = service_name.into();
        Self {
            instance_id: InstanceId::generate(&service_name),
            service_name,
            address: address.into(),
        }
    }
}
