// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transport port between the executors and the remote engine.
//!
//! Executors only see [`GeometryTransport`]; production code plugs in
//! [`GrpcTransport`], tests plug in an in-process fake.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use geochain_proto::{GeometryRequest, GeometryResponse, GeometryServiceClient};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Channel;
use tonic::Status;

/// Responses of an open bidirectional stream, in engine order.
pub type ResponseStream = BoxStream<'static, Result<GeometryResponse, Status>>;

/// RPC surface of the geometry engine.
#[async_trait]
pub trait GeometryTransport: Send + Sync {
    /// Evaluate one request tree.
    async fn operate(&self, request: GeometryRequest) -> Result<GeometryResponse, Status>;

    /// Open a bidirectional stream fed by `requests`.
    ///
    /// The outbound direction half-closes when every sender of `requests`
    /// is dropped.
    async fn operate_bi_stream(
        &self,
        requests: mpsc::Receiver<GeometryRequest>,
    ) -> Result<ResponseStream, Status>;

    /// Send every request on `requests`, then wait for one folded response.
    async fn operate_client_stream(
        &self,
        requests: mpsc::Receiver<GeometryRequest>,
    ) -> Result<GeometryResponse, Status>;
}

/// [`GeometryTransport`] over a tonic channel.
#[derive(Debug, Clone)]
pub struct GrpcTransport {
    client: GeometryServiceClient<Channel>,
}

impl GrpcTransport {
    /// Wrap an existing stub.
    pub const fn new(client: GeometryServiceClient<Channel>) -> Self {
        Self { client }
    }

    /// Build a stub over `channel` with symmetric message size limits.
    pub fn from_channel(channel: Channel, max_message_bytes: usize) -> Self {
        let client = GeometryServiceClient::new(channel)
            .max_decoding_message_size(max_message_bytes)
            .max_encoding_message_size(max_message_bytes);
        Self::new(client)
    }
}

#[async_trait]
impl GeometryTransport for GrpcTransport {
    async fn operate(&self, request: GeometryRequest) -> Result<GeometryResponse, Status> {
        let mut client = self.client.clone();
        Ok(client.operate(request).await?.into_inner())
    }

    async fn operate_bi_stream(
        &self,
        requests: mpsc::Receiver<GeometryRequest>,
    ) -> Result<ResponseStream, Status> {
        let mut client = self.client.clone();
        let response = client
            .operate_bi_stream(ReceiverStream::new(requests))
            .await?;
        Ok(response.into_inner().boxed())
    }

    async fn operate_client_stream(
        &self,
        requests: mpsc::Receiver<GeometryRequest>,
    ) -> Result<GeometryResponse, Status> {
        let mut client = self.client.clone();
        let response = client
            .operate_client_stream(ReceiverStream::new(requests))
            .await?;
        Ok(response.into_inner())
    }
}
