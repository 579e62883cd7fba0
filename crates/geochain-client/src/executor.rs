// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Blocking executor: one request tree, one response.

use crate::chain::Chain;
use crate::codec::{self, Geometry, RESULT_ENCODING};
use crate::error::{ChainError, Result};
use crate::node::OperationNode;
use crate::ops::UnaryOp;
use crate::reference::{ReferencePolicy, SpatialReference};
use crate::stream::StreamTemplate;
use crate::transport::GeometryTransport;
use geochain_proto::geometry_request::Left;
use geochain_proto::{GeometryData, GeometryRequest, GeometryResponse, OperatorType};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default number of geometries folded per client-stream union batch.
pub const DEFAULT_UNION_BATCH: usize = 25;

/// Entry point for building and running operations against one engine.
///
/// Cheap to clone; clones share the transport. Chains and streams carry a
/// clone, so the transport is passed in once and never looked up globally.
#[derive(Clone)]
pub struct GeometryClient {
    transport: Arc<dyn GeometryTransport>,
    policy: ReferencePolicy,
}

impl fmt::Debug for GeometryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeometryClient")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl GeometryClient {
    /// Client over `transport` with [`ReferencePolicy::AdoptLeft`].
    pub fn new(transport: Arc<dyn GeometryTransport>) -> Self {
        Self {
            transport,
            policy: ReferencePolicy::default(),
        }
    }

    /// Change how binary chaining calls treat operands in different references.
    pub fn with_reference_policy(mut self, policy: ReferencePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Active reference policy.
    pub const fn reference_policy(&self) -> ReferencePolicy {
        self.policy
    }

    /// Underlying transport.
    pub fn transport(&self) -> &Arc<dyn GeometryTransport> {
        &self.transport
    }

    /// Start a chain from a host geometry. Encoding failures poison the chain.
    pub fn chain(&self, geometry: &Geometry) -> Chain {
        Chain::from_geometry(self.clone(), geometry)
    }

    /// Start a chain from an already-encoded payload.
    pub fn chain_payload(&self, payload: GeometryData) -> Chain {
        Chain::from_payload(self.clone(), payload)
    }

    /// Template for streaming `op` over many geometries.
    pub fn stream(&self, op: UnaryOp) -> StreamTemplate {
        StreamTemplate::new(self.clone(), &op)
    }

    /// Send one raw request.
    pub async fn operate(&self, request: GeometryRequest) -> Result<GeometryResponse> {
        self.transport.operate(request).await.map_err(|status| {
            let err = ChainError::from(status);
            warn!(%err, "geometry request failed");
            err
        })
    }

    /// Run a node tree and decode its geometry result.
    pub async fn execute_node(&self, node: OperationNode) -> Result<Geometry> {
        let response = self.run(node).await?;
        self.decode(complete_geometry(response)?).await
    }

    pub(crate) async fn evaluate_relation(&self, node: OperationNode) -> Result<bool> {
        let response = self.run(node).await?;
        response
            .spatial_relationship
            .ok_or(ChainError::IncompleteResult)
    }

    pub(crate) async fn evaluate_measure(&self, node: OperationNode) -> Result<f64> {
        let response = self.run(node).await?;
        response.measure.ok_or(ChainError::IncompleteResult)
    }

    async fn run(&self, node: OperationNode) -> Result<GeometryResponse> {
        let request = node.into_request();
        debug!(
            operator = request.operator().as_str_name(),
            depth = request.depth(),
            "executing operation tree"
        );
        self.operate(request).await
    }

    /// Decode a payload, importing Esri shapes through the engine.
    pub async fn decode(&self, payload: GeometryData) -> Result<Geometry> {
        if !payload.is_esri_shape() {
            return codec::decode(&payload);
        }
        debug!("importing esri shape through the engine");
        let request = GeometryRequest {
            operator: OperatorType::ExportToWkb as i32,
            left: Some(Left::LeftGeometry(payload)),
            result_encoding: RESULT_ENCODING as i32,
            ..Default::default()
        };
        let response = self.operate(request).await?;
        codec::decode(&complete_geometry(response)?)
    }

    /// Union many geometries through the client-stream RPC.
    ///
    /// Geometries are sent in batches of `batch_size` (at least two); each
    /// batch result is carried into the next batch. A single geometry comes
    /// back unchanged without a request.
    pub async fn union_all<I>(&self, geometries: I, batch_size: usize) -> Result<Geometry>
    where
        I: IntoIterator<Item = Geometry>,
    {
        let batch_size = batch_size.max(2);
        let mut pending: Vec<Geometry> = Vec::with_capacity(batch_size);
        for geometry in geometries {
            pending.push(geometry);
            if pending.len() == batch_size {
                let merged = self.union_batch(std::mem::take(&mut pending)).await?;
                pending.push(merged);
            }
        }
        match pending.len() {
            0 => Err(ChainError::MissingLeftOperand),
            1 => pending.pop().ok_or(ChainError::MissingLeftOperand),
            _ => self.union_batch(pending).await,
        }
    }

    async fn union_batch(&self, batch: Vec<Geometry>) -> Result<Geometry> {
        let (tx, rx) = mpsc::channel(batch.len());
        for geometry in &batch {
            let request = GeometryRequest {
                operator: OperatorType::Union as i32,
                left: Some(Left::LeftGeometry(codec::encode(geometry)?)),
                result_encoding: RESULT_ENCODING as i32,
                ..Default::default()
            };
            tx.send(request)
                .await
                .map_err(|_| ChainError::ServiceUnavailable("union stream closed".into()))?;
        }
        drop(tx);
        debug!(batch = batch.len(), "streaming union batch");
        let response = self
            .transport
            .operate_client_stream(rx)
            .await
            .map_err(ChainError::from)?;
        self.decode(complete_geometry(response)?).await
    }
}

/// Geometry of a response, provided it has both a payload and a usable
/// reference. A `ProjectionData` with no definition counts as absent.
pub(crate) fn complete_geometry(response: GeometryResponse) -> Result<GeometryData> {
    response
        .geometry
        .filter(|geometry| {
            let referenced = geometry
                .proj
                .as_ref()
                .and_then(SpatialReference::from_proto)
                .is_some();
            geometry.has_data() && (referenced || geometry.is_esri_shape())
        })
        .ok_or(ChainError::IncompleteResult)
}
