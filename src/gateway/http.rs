//! JSON-over-HTTP transport for the user lookup.
//!
//! `GET http://{address}/users/{id}` → `200 {"username": .., "email": ..}` or `404`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{UserConnection, UserConnector, UserRecord};
use crate::error::Error;

/// Connects to user service instances over HTTP, one client per call.
#[derive(Clone, Debug)]
pub struct HttpUserConnector {
    timeout: Duration,
}

impl HttpUserConnector {
    /// Creates a connector whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpUserConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl UserConnector for HttpUserConnector {
    async fn connect(&self, address: &str) -> Result<Box<dyn UserConnection>, Error> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| Error::transport(address, err))?;
        Ok(Box::new(HttpUserConnection {
            base: format!("http://{address}"),
            client: Some(client),
        }))
    }
}

struct HttpUserConnection {
    base: String,
    client: Option<reqwest::Client>,
}

#[async_trait]
impl UserConnection for HttpUserConnection {
    async fn get_by_id(&mut self, user_id: &str) -> Result<Option<UserRecord>, Error> {
        let Some(client) = self.client.as_ref() else {
            return Err(Error::transport(&self.base, "connection closed"));
        };
        let resp = client
            .get(format!("{}/users/{user_id}", self.base))
            .send()
            .await
            .map_err(|err| Error::transport(&self.base, err))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp.error_for_status().map_err(|err| Error::Remote {
            address: self.base.clone(),
            reason: err.to_string(),
        })?;
        let record = resp.json::<UserRecord>().await.map_err(|err| Error::Remote {
            address: self.base.clone(),
            reason: format!("malformed response: {err}"),
        })?;
        Ok(Some(record))
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.client = None;
        Ok(())
    }
}
