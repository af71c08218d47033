//! gRPC transport for the user lookup.
//!
//! Calls the unary `user.v1.User/GetByID` method over a plaintext HTTP/2
//! channel opened for the call and dropped on close.
//!
//! | outcome                         | result            |
//! |---------------------------------|-------------------|
//! | channel could not be opened     | `Transport`       |
//! | `OK`                            | `Ok(Some(record))`|
//! | status `NOT_FOUND`              | `Ok(None)`        |
//! | any other status                | `Remote`          |

use std::time::Duration;

use async_trait::async_trait;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};
use tracing::debug;

use super::{UserConnection, UserConnector, UserRecord};
use crate::error::Error;

const GET_BY_ID: &str = "/user.v1.User/GetByID";

/// Request of `User/GetByID`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GetByIdRequest {
    /// User id in its canonical hyphenated form.
    #[prost(string, tag = "1")]
    pub user_id: String,
}

/// Answer of `User/GetByID`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GetByIdResponse {
    #[prost(string, tag = "1")]
    pub user_id: String,
    #[prost(string, tag = "2")]
    pub username: String,
    #[prost(string, tag = "3")]
    pub email: String,
}

/// Connects to user service instances over gRPC, one channel per call.
#[derive(Clone, Debug)]
pub struct GrpcUserConnector {
    timeout: Duration,
    connect_timeout: Duration,
}

impl GrpcUserConnector {
    /// Creates a connector whose calls time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Bounds establishing the channel.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl Default for GrpcUserConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl UserConnector for GrpcUserConnector {
    async fn connect(&self, address: &str) -> Result<Box<dyn UserConnection>, Error> {
        let endpoint = Endpoint::from_shared(format!("http://{address}"))
            .map_err(|e| Error::transport(address, format!("invalid endpoint: {e}")))?
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout);
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| Error::transport(address, format!("failed to connect: {e}")))?;
        debug!(address, "user service channel open");
        Ok(Box::new(GrpcUserConnection {
            address: address.to_string(),
            client: Some(tonic::client::Grpc::new(channel)),
        }))
    }
}

struct GrpcUserConnection {
    address: String,
    client: Option<tonic::client::Grpc<Channel>>,
}

#[async_trait]
impl UserConnection for GrpcUserConnection {
    async fn get_by_id(&mut self, user_id: &str) -> Result<Option<UserRecord>, Error> {
        let Some(client) = self.client.as_mut() else {
            return Err(Error::transport(&self.address, "connection closed"));
        };
        client
            .ready()
            .await
            .map_err(|e| Error::transport(&self.address, format!("channel not ready: {e}")))?;

        let request = tonic::Request::new(GetByIdRequest {
            user_id: user_id.to_string(),
        });
        let codec = ProstCodec::<GetByIdRequest, GetByIdResponse>::default();
        let res = client
            .unary(request, PathAndQuery::from_static(GET_BY_ID), codec)
            .await;
        into_record(&self.address, res.map(tonic::Response::into_inner))
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.client = None;
        Ok(())
    }
}

fn into_record(
    address: &str,
    res: Result<GetByIdResponse, Status>,
) -> Result<Option<UserRecord>, Error> {
    match res {
        Ok(user) => Ok(Some(UserRecord {
            username: user.username,
            email: user.email,
        })),
        Err(status) if status.code() == Code::NotFound => Ok(None),
        Err(status) => Err(Error::Remote {
            address: address.to_string(),
            reason: format!("{:?}: {}", status.code(), status.message()),
        }),
    }
}
