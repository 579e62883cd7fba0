// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fluent, lazy operation chains.
//!
//! Each chaining call consumes the chain and returns it wrapped around a new
//! node. Nothing reaches the engine until [`Chain::execute`] or one of the
//! relational/measure terminators runs.
//!
//! Errors are deferred: the first failure poisons the chain, later calls pass
//! the same error along untouched, and the terminator reports it without a
//! network round trip.

use crate::codec::{self, Geometry, RESULT_ENCODING};
use crate::error::{ChainError, Result};
use crate::executor::GeometryClient;
use crate::node::{Operand, OperationNode};
use crate::ops::{BinaryOp, Envelope, OffsetJoin, Predicate, UnaryOp};
use crate::reference::{reconcile, Reconciliation, ReferencePolicy, SpatialReference};
use geochain_proto::geometry_request::Params;
use geochain_proto::{params, GeometryData, OperatorType};
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
enum ChainState {
    Vacant,
    Seed(GeometryData),
    Pending(Box<OperationNode>),
    Poisoned(ChainError),
}

/// Handle to a lazily built operation tree.
///
/// `Clone` copies the whole tree, so a prefix can be executed more than once
/// without sharing nodes.
#[derive(Clone)]
pub struct Chain {
    client: GeometryClient,
    reference: Option<SpatialReference>,
    state: ChainState,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("reference", &self.reference)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Chain {
    pub(crate) fn from_geometry(client: GeometryClient, geometry: &Geometry) -> Self {
        let reference = geometry.reference.clone();
        let state = match codec::encode(geometry) {
            Ok(payload) => ChainState::Seed(payload),
            Err(err) => ChainState::Poisoned(err),
        };
        Self {
            client,
            reference,
            state,
        }
    }

    pub(crate) fn from_payload(client: GeometryClient, payload: GeometryData) -> Self {
        let reference = payload.proj.as_ref().and_then(SpatialReference::from_proto);
        let state = if reference.is_none() && !payload.is_esri_shape() {
            ChainState::Poisoned(ChainError::MissingSpatialReference)
        } else {
            ChainState::Seed(payload)
        };
        Self {
            client,
            reference,
            state,
        }
    }

    /// Move the contents out, leaving an empty chain behind.
    ///
    /// Operating on the emptied chain fails with a missing-operand error.
    pub fn take(&mut self) -> Self {
        Self {
            client: self.client.clone(),
            reference: self.reference.take(),
            state: std::mem::replace(&mut self.state, ChainState::Vacant),
        }
    }

    /// Deferred error, if the chain is poisoned.
    pub const fn error(&self) -> Option<&ChainError> {
        match &self.state {
            ChainState::Poisoned(err) => Some(err),
            _ => None,
        }
    }

    /// True once a chaining call has failed.
    pub const fn is_poisoned(&self) -> bool {
        matches!(self.state, ChainState::Poisoned(_))
    }

    /// Reference the chain's current result is expressed in, when known.
    pub const fn reference(&self) -> Option<&SpatialReference> {
        self.reference.as_ref()
    }

    /// Pending operation tree, if any.
    pub fn pending(&self) -> Option<&OperationNode> {
        match &self.state {
            ChainState::Pending(node) => Some(node.as_ref()),
            _ => None,
        }
    }

    /// Apply a unary operation.
    pub fn apply(self, op: UnaryOp) -> Self {
        let node = OperationNode::new(op.operator(), op.params())
            .with_result_reference(op.result_reference().cloned());
        self.append(node, None)
    }

    /// Combine with `other` into a geometry.
    pub fn combine(self, op: BinaryOp, other: Self) -> Self {
        self.append(OperationNode::new(op.operator(), op.params()), Some(other))
    }

    /// Planar buffer.
    pub fn buffer(self, distance: f64) -> Self {
        self.apply(UnaryOp::Buffer { distance })
    }

    /// Geodesic buffer in meters. Pass `f64::NAN` to let the engine pick the deviation.
    pub fn geodesic_buffer(self, distance_m: f64, max_deviation_m: f64) -> Self {
        self.apply(UnaryOp::GeodesicBuffer {
            distance_m,
            max_deviation_m,
        })
    }

    /// Convex hull.
    pub fn convex_hull(self) -> Self {
        self.apply(UnaryOp::ConvexHull)
    }

    /// Planar densify.
    pub fn densify_by_length(self, max_length: f64) -> Self {
        self.apply(UnaryOp::DensifyByLength { max_length })
    }

    /// Geodetic densify in meters.
    pub fn geodetic_densify_by_length(self, max_length_m: f64) -> Self {
        self.apply(UnaryOp::GeodeticDensifyByLength { max_length_m })
    }

    /// Deviation-bounded generalization.
    pub fn generalize(self, max_deviation: f64, remove_degenerates: bool) -> Self {
        self.apply(UnaryOp::Generalize {
            max_deviation,
            remove_degenerates,
        })
    }

    /// Area-bounded generalization.
    pub fn generalize_by_area(
        self,
        percent_reduction: f64,
        max_point_count: i32,
        remove_degenerates: bool,
    ) -> Self {
        self.apply(UnaryOp::GeneralizeByArea {
            percent_reduction,
            max_point_count,
            remove_degenerates,
        })
    }

    /// Offset curve.
    pub fn offset(
        self,
        distance: f64,
        join: OffsetJoin,
        bevel_ratio: f64,
        flatten_error: f64,
    ) -> Self {
        self.apply(UnaryOp::Offset {
            distance,
            join,
            bevel_ratio,
            flatten_error,
        })
    }

    /// Reproject into `target`.
    pub fn project(self, target: SpatialReference) -> Self {
        self.apply(UnaryOp::Project { target })
    }

    /// Topological simplify.
    pub fn simplify(self, force: bool) -> Self {
        self.apply(UnaryOp::Simplify { force })
    }

    /// OGC-valid simplify.
    pub fn simplify_ogc(self, force: bool) -> Self {
        self.apply(UnaryOp::SimplifyOgc { force })
    }

    /// Translate by planar units, or by meters when `geodetic`.
    pub fn shift_xy(self, geodetic: bool, x_offset: f64, y_offset: f64) -> Self {
        self.apply(UnaryOp::ShiftXy {
            geodetic,
            x_offset,
            y_offset,
        })
    }

    /// Clip to `envelope`.
    pub fn clip(self, envelope: Envelope) -> Self {
        self.apply(UnaryOp::Clip { envelope })
    }

    /// Topological boundary.
    pub fn boundary(self) -> Self {
        self.apply(UnaryOp::Boundary)
    }

    /// Minimum enclosing circle.
    pub fn enclosing_circle(self) -> Self {
        self.apply(UnaryOp::EnclosingCircle)
    }

    /// Left minus `other`.
    pub fn difference(self, other: Self) -> Self {
        self.combine(BinaryOp::Difference, other)
    }

    /// Intersection with `other`.
    pub fn intersection(self, other: Self) -> Self {
        self.combine(BinaryOp::Intersection, other)
    }

    /// Symmetric difference with `other`.
    pub fn symmetric_difference(self, other: Self) -> Self {
        self.combine(BinaryOp::SymmetricDifference, other)
    }

    /// Union with `other`.
    pub fn union(self, other: Self) -> Self {
        self.combine(BinaryOp::Union, other)
    }

    /// Cut by the polyline in `other`.
    pub fn cut(self, other: Self, consider_touch: bool) -> Self {
        self.combine(BinaryOp::Cut { consider_touch }, other)
    }

    /// Evaluate a named predicate against `other`.
    pub async fn satisfies(self, predicate: Predicate, other: Self) -> Result<bool> {
        self.relation(predicate.operator(), None, other).await
    }

    /// Left contains `other`.
    pub async fn contains(self, other: Self) -> Result<bool> {
        self.satisfies(Predicate::Contains, other).await
    }

    /// Left crosses `other`.
    pub async fn crosses(self, other: Self) -> Result<bool> {
        self.satisfies(Predicate::Crosses, other).await
    }

    /// Left and `other` share no points.
    pub async fn disjoint(self, other: Self) -> Result<bool> {
        self.satisfies(Predicate::Disjoint, other).await
    }

    /// Left equals `other` topologically.
    pub async fn equals(self, other: Self) -> Result<bool> {
        self.satisfies(Predicate::Equals, other).await
    }

    /// Left intersects `other`.
    pub async fn intersects(self, other: Self) -> Result<bool> {
        self.satisfies(Predicate::Intersects, other).await
    }

    /// Left overlaps `other`.
    pub async fn overlaps(self, other: Self) -> Result<bool> {
        self.satisfies(Predicate::Overlaps, other).await
    }

    /// Left touches `other`.
    pub async fn touches(self, other: Self) -> Result<bool> {
        self.satisfies(Predicate::Touches, other).await
    }

    /// Left within `other`.
    pub async fn within(self, other: Self) -> Result<bool> {
        self.satisfies(Predicate::Within, other).await
    }

    /// Test a DE-9IM pattern. The matrix must be exactly nine characters.
    pub async fn relate(self, other: Self, matrix: &str) -> Result<bool> {
        if matrix.chars().count() != 9 {
            return Err(ChainError::InvalidRelateMatrix(matrix.to_string()));
        }
        let params = Params::Relate(params::Relate {
            de_9im: matrix.to_string(),
        });
        self.relation(OperatorType::Relate, Some(params), other).await
    }

    /// Geodetic length in meters.
    pub async fn geodetic_length(self) -> Result<f64> {
        self.measure(OperatorType::GeodeticLength, None).await
    }

    /// Geodetic area in square meters.
    pub async fn geodetic_area(self) -> Result<f64> {
        self.measure(OperatorType::GeodeticArea, None).await
    }

    /// Planar distance to `other`.
    pub async fn distance(self, other: Self) -> Result<f64> {
        self.measure(OperatorType::Distance, Some(other)).await
    }

    /// Run the tree and decode the result.
    ///
    /// A chain with no operations decodes its seed; a poisoned chain returns
    /// its error without contacting the engine.
    pub async fn execute(self) -> Result<Geometry> {
        match self.state {
            ChainState::Pending(node) => self.client.execute_node(*node).await,
            ChainState::Seed(payload) => self.client.decode(payload).await,
            ChainState::Vacant => Err(ChainError::MissingLeftOperand),
            ChainState::Poisoned(err) => Err(err),
        }
    }

    async fn relation(
        self,
        operator: OperatorType,
        params: Option<Params>,
        other: Self,
    ) -> Result<bool> {
        let client = self.client.clone();
        let node = self
            .append(OperationNode::new(operator, params), Some(other))
            .into_node()?;
        client.evaluate_relation(node).await
    }

    async fn measure(self, operator: OperatorType, other: Option<Self>) -> Result<f64> {
        let client = self.client.clone();
        let node = self
            .append(OperationNode::new(operator, None), other)
            .into_node()?;
        client.evaluate_measure(node).await
    }

    fn into_node(self) -> Result<OperationNode> {
        match self.state {
            ChainState::Pending(node) => Ok(*node),
            ChainState::Poisoned(err) => Err(err),
            ChainState::Seed(_) | ChainState::Vacant => Err(ChainError::MissingLeftOperand),
        }
    }

    fn append(mut self, node: OperationNode, other: Option<Self>) -> Self {
        let state = std::mem::replace(&mut self.state, ChainState::Vacant);
        self.state = match self.extend(state, node, other) {
            Ok(node) => ChainState::Pending(Box::new(node)),
            Err(err) => {
                debug!(%err, "operation chain poisoned");
                ChainState::Poisoned(err)
            }
        };
        self
    }

    fn extend(
        &mut self,
        state: ChainState,
        mut node: OperationNode,
        other: Option<Self>,
    ) -> Result<OperationNode> {
        let left = match state {
            ChainState::Poisoned(err) => return Err(err),
            ChainState::Pending(pending) => Some(Operand::Node(pending)),
            ChainState::Seed(payload) => Some(Operand::Inline(payload)),
            ChainState::Vacant => None,
        };
        if let Some(err) = other.as_ref().and_then(Self::error) {
            return Err(err.clone());
        }

        node.left = Some(left.ok_or(ChainError::MissingLeftOperand)?);
        if !node.has_left_geometry_input() {
            return Err(ChainError::BrokenLeftOperand);
        }

        if let Some(other) = other {
            node.right = Some(match other.state {
                ChainState::Pending(pending) => Operand::Node(pending),
                ChainState::Seed(payload) => Operand::Inline(payload),
                ChainState::Vacant => return Err(ChainError::MissingRightOperand),
                ChainState::Poisoned(err) => return Err(err),
            });
            if !node.has_right_geometry_input() {
                return Err(ChainError::BrokenRightOperand);
            }
            if let (Some(left_ref), Some(right_ref)) = (&self.reference, &other.reference) {
                if let Reconciliation::Mismatch { diagnostic } = reconcile(left_ref, right_ref) {
                    match self.client.reference_policy() {
                        ReferencePolicy::AdoptLeft => {
                            warn!(
                                operator = node.operator.as_str_name(),
                                %diagnostic,
                                "operand references differ; using left reference"
                            );
                            node.operation_reference = Some(left_ref.clone());
                        }
                        ReferencePolicy::Reject => {
                            return Err(ChainError::ReferenceMismatch(diagnostic));
                        }
                    }
                }
            }
        }

        node.result_encoding = RESULT_ENCODING;
        if let Some(target) = &node.result_reference {
            self.reference = Some(target.clone());
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{GeometryTransport, ResponseStream};
    use async_trait::async_trait;
    use geochain_proto::{Encoding, GeometryRequest, GeometryResponse};
    use geo_types::Point;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tonic::Status;

    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicUsize,
    }

    impl CountingTransport {
        fn hit(&self) -> Status {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Status::unimplemented("counting transport")
        }
    }

    #[async_trait]
    impl GeometryTransport for CountingTransport {
        async fn operate(
            &self,
            _request: GeometryRequest,
        ) -> std::result::Result<GeometryResponse, Status> {
            Err(self.hit())
        }

        async fn operate_bi_stream(
            &self,
            _requests: mpsc::Receiver<GeometryRequest>,
        ) -> std::result::Result<ResponseStream, Status> {
            Err(self.hit())
        }

        async fn operate_client_stream(
            &self,
            _requests: mpsc::Receiver<GeometryRequest>,
        ) -> std::result::Result<GeometryResponse, Status> {
            Err(self.hit())
        }
    }

    fn client() -> (Arc<CountingTransport>, GeometryClient) {
        let transport = Arc::new(CountingTransport::default());
        (transport.clone(), GeometryClient::new(transport))
    }

    fn point(x: f64, y: f64, epsg: i32) -> Geometry {
        Geometry::new(Point::new(x, y), SpatialReference::Epsg(epsg))
    }

    #[tokio::test]
    async fn poisoned_chain_keeps_first_error_and_stays_offline() {
        let (transport, client) = client();
        let chain = client
            .chain(&Geometry::unreferenced(Point::new(1.0, 1.0)))
            .buffer(2.0)
            .convex_hull()
            .union(client.chain(&point(0.0, 0.0, 4326)))
            .project(SpatialReference::Epsg(3857));

        assert_eq!(chain.error(), Some(&ChainError::MissingSpatialReference));
        let other = client.chain(&point(0.0, 0.0, 4326));
        assert_eq!(
            chain.clone().contains(other).await,
            Err(ChainError::MissingSpatialReference)
        );
        assert_eq!(
            chain.clone().geodetic_area().await,
            Err(ChainError::MissingSpatialReference)
        );
        assert_eq!(chain.execute().await, Err(ChainError::MissingSpatialReference));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn right_hand_error_is_adopted() {
        let (_, client) = client();
        let bad = client.chain(&Geometry::unreferenced(Point::new(1.0, 1.0)));
        let chain = client.chain(&point(0.0, 0.0, 4326)).intersection(bad);
        assert_eq!(chain.error(), Some(&ChainError::MissingSpatialReference));
    }

    #[test]
    fn taken_chain_has_no_left_operand() {
        let (_, client) = client();
        let mut chain = client.chain(&point(0.0, 0.0, 4326));
        let moved = chain.take().buffer(1.0);
        assert!(moved.pending().is_some());
        assert_eq!(
            chain.buffer(1.0).error(),
            Some(&ChainError::MissingLeftOperand)
        );
    }

    #[test]
    fn taken_right_chain_has_no_right_operand() {
        let (_, client) = client();
        let mut right = client.chain(&point(0.0, 0.0, 4326));
        let _ = right.take();
        let chain = client.chain(&point(1.0, 1.0, 4326)).union(right);
        assert_eq!(chain.error(), Some(&ChainError::MissingRightOperand));
    }

    #[test]
    fn empty_payloads_are_broken_operands() {
        let (_, client) = client();
        let empty = || GeometryData {
            proj: Some(SpatialReference::Epsg(4326).to_proto()),
            data: None,
        };
        let left = client.chain_payload(empty()).buffer(1.0);
        assert_eq!(left.error(), Some(&ChainError::BrokenLeftOperand));

        let right = client
            .chain(&point(0.0, 0.0, 4326))
            .difference(client.chain_payload(empty()));
        assert_eq!(right.error(), Some(&ChainError::BrokenRightOperand));
    }

    #[tokio::test]
    async fn relate_checks_matrix_length_first() {
        let (transport, client) = client();
        for matrix in ["T*F**F**", "T*F**F***F", ""] {
            let result = client
                .chain(&point(0.0, 0.0, 4326))
                .relate(client.chain(&point(1.0, 1.0, 4326)), matrix)
                .await;
            assert_eq!(result, Err(ChainError::InvalidRelateMatrix(matrix.into())));
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn matching_references_leave_operation_reference_unset() {
        let (_, client) = client();
        let chain = client
            .chain(&point(0.0, 0.0, 4326))
            .union(client.chain(&point(1.0, 1.0, 4326)));
        let node = chain.pending().unwrap();
        assert_eq!(node.operation_reference(), None);
        assert_eq!(node.result_encoding(), Encoding::Ewkb);
    }

    #[test]
    fn mismatched_references_adopt_left() {
        let (_, client) = client();
        let chain = client
            .chain(&point(0.0, 0.0, 4267))
            .union(client.chain(&point(1.0, 1.0, 4326)));
        assert_eq!(
            chain.pending().unwrap().operation_reference(),
            Some(&SpatialReference::Epsg(4267))
        );
        assert_eq!(chain.reference(), Some(&SpatialReference::Epsg(4267)));
    }

    #[test]
    fn reject_policy_poisons_on_mismatch() {
        let (_, client) = client();
        let client = client.with_reference_policy(ReferencePolicy::Reject);
        let chain = client
            .chain(&point(0.0, 0.0, 4267))
            .union(client.chain(&point(1.0, 1.0, 4326)));
        assert!(matches!(
            chain.error(),
            Some(ChainError::ReferenceMismatch(_))
        ));
    }

    #[test]
    fn projected_operand_reconciles_in_its_new_reference() {
        let (_, client) = client();
        let right = client
            .chain(&point(1.0, 1.0, 4267))
            .project(SpatialReference::Epsg(4326));
        assert_eq!(right.reference(), Some(&SpatialReference::Epsg(4326)));

        let chain = client.chain(&point(0.0, 0.0, 4326)).buffer(3.0).union(right);
        let node = chain.pending().unwrap();
        assert_eq!(node.operation_reference(), None);
        assert!(matches!(node.left(), Some(Operand::Node(_))));
        assert!(matches!(node.right(), Some(Operand::Node(_))));
        assert_eq!(node.node_count(), 3);
    }
}
