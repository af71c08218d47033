//! # User detail gateway.
//!
//! Resolves the user service through the [`Registry`], performs one remote
//! lookup and maps the answer onto [`UserDetails`].
//!
//! ## Flow
//! ```text
//! get_user_details(user_id)
//!   ├─► registry.service_addresses("user")
//!   │     ├─ Err        ─► Resolution
//!   │     └─ []         ─► NotFound
//!   ├─► pick one address uniformly at random
//!   ├─► connector.connect(address)          ─ Err ─► Transport
//!   ├─► connection.get_by_id(user_id)       ─ Err ─► Remote, None ─► NotFound
//!   └─► connection.close()                  (always, outcome unchanged)
//! ```
//!
//! ## Rules
//! - Single shot: no retry, no failover to another address, no health filtering.
//! - One connection per call, never pooled.
//! - Results are never cached.
//!
//! ## Transports
//! - `GrpcUserConnector` (feature `grpc`): the user service's `GetByID` RPC.
//! - `HttpUserConnector` (feature `http`): JSON over HTTP, for services fronted by a REST gateway.

#[cfg(feature = "grpc")]
mod grpc;
#[cfg(feature = "http")]
mod http;

#[cfg(feature = "grpc")]
pub use grpc::{GetByIdRequest, GetByIdResponse, GrpcUserConnector};
#[cfg(feature = "http")]
pub use http::HttpUserConnector;

use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::discovery::Registry;
use crate::error::Error;

/// Contact details of a user, fetched fresh for every notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserDetails {
    /// User the details belong to.
    pub user_id: Uuid,
    /// Display name.
    pub username: String,
    /// Delivery address.
    pub email: String,
}

/// Answer of the remote `GetByID` call.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UserRecord {
    /// Display name.
    pub username: String,
    /// Delivery address.
    pub email: String,
}

/// Opens connections to user service instances.
#[async_trait]
pub trait UserConnector: Send + Sync + 'static {
    /// Opens a connection to the instance at `address`.
    async fn connect(&self, address: &str) -> Result<Box<dyn UserConnection>, Error>;
}

/// One open connection to a user service instance.
#[async_trait]
pub trait UserConnection: Send {
    /// Unary lookup; `Ok(None)` means the user does not exist.
    async fn get_by_id(&mut self, user_id: &str) -> Result<Option<UserRecord>, Error>;

    /// Releases the connection.
    async fn close(&mut self) -> Result<(), Error>;
}

/// Source of [`UserDetails`], as seen by notification orchestration.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// Fetches the details of `user_id`.
    async fn get_user_details(&self, user_id: Uuid) -> Result<UserDetails, Error>;
}

/// [`UserDirectory`] backed by registry resolution and a remote call.
pub struct UserGateway {
    registry: Arc<dyn Registry>,
    connector: Arc<dyn UserConnector>,
    service: String,
}

impl UserGateway {
    /// Creates a gateway resolving the `"user"` service.
    pub fn new(registry: Arc<dyn Registry>, connector: Arc<dyn UserConnector>) -> Self {
        Self {
            registry,
            connector,
            service: "user".to_string(),
        }
    }

    /// Overrides the logical name of the user service.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    async fn resolve(&self) -> Result<Vec<String>, Error> {
        let addrs = self
            .registry
            .service_addresses(&self.service)
            .await
            .map_err(|source| Error::Resolution {
                service: self.service.clone(),
                source: Box::new(source),
            })?;
        if addrs.is_empty() {
            return Err(Error::not_found(format!(
                "address for service {:?}",
                self.service
            )));
        }
        Ok(addrs)
    }

    async fn call(&self, address: &str, user_id: Uuid) -> Result<UserRecord, Error> {
        let mut conn = self
            .connector
            .connect(address)
            .await
            .map_err(|err| match err {
                Error::Transport { .. } => err,
                other => Error::transport(address, other),
            })?;

        let res = conn.get_by_id(&user_id.to_string()).await;

        if let Err(err) = conn.close().await {
            warn!(address, error = %err, "failed to close user service connection");
        }

        match res {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(Error::not_found(format!("user {user_id}"))),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(err) => Err(Error::Remote {
                address: address.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}

/// Uniform random choice; `None` only for an empty slice.
fn pick(addrs: &[String]) -> Option<&str> {
    addrs.choose(&mut rand::thread_rng()).map(String::as_str)
}

#[async_trait]
impl UserDirectory for UserGateway {
    async fn get_user_details(&self, user_id: Uuid) -> Result<UserDetails, Error> {
        let addrs = self.resolve().await?;
        let Some(target) = pick(&addrs) else {
            return Err(Error::not_found(format!("address for {}", self.service)));
        };
        debug!(candidates = addrs.len(), "resolved user service");
        info!(address = target, %user_id, "calling user service");

        let record = self.call(target, user_id).await?;
        Ok(UserDetails {
            user_id,
            username: record.username,
            email: record.email,
        })
    }
}
