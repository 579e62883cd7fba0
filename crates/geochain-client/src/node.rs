// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Owned operation tree.
//!
//! Every node owns its operands outright; an operand is inline geometry or a
//! boxed child node. Nothing is shared, so a tree serializes by value in one
//! pass.

use crate::reference::SpatialReference;
use geochain_proto::geometry_request::{Left, Params, Right};
use geochain_proto::{Encoding, GeometryData, GeometryRequest, OperatorType};

/// One operand slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Encoded geometry moved in from a chain seed.
    Inline(GeometryData),
    /// Operation evaluated by the engine before this one.
    Node(Box<OperationNode>),
}

impl Operand {
    /// True when the operand can feed the engine.
    pub fn has_geometry_input(&self) -> bool {
        match self {
            Self::Inline(data) => data.has_data(),
            Self::Node(_) => true,
        }
    }

    fn into_left(self) -> Left {
        match self {
            Self::Inline(data) => Left::LeftGeometry(data),
            Self::Node(node) => Left::LeftGeometryRequest(Box::new(node.into_request())),
        }
    }

    fn into_right(self) -> Right {
        match self {
            Self::Inline(data) => Right::RightGeometry(data),
            Self::Node(node) => Right::RightGeometryRequest(Box::new(node.into_request())),
        }
    }
}

/// A pending operation and its operands.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationNode {
    pub(crate) operator: OperatorType,
    pub(crate) params: Option<Params>,
    pub(crate) left: Option<Operand>,
    pub(crate) right: Option<Operand>,
    pub(crate) result_reference: Option<SpatialReference>,
    pub(crate) operation_reference: Option<SpatialReference>,
    pub(crate) result_encoding: Encoding,
}

impl OperationNode {
    /// Node with no operands attached yet.
    pub const fn new(operator: OperatorType, params: Option<Params>) -> Self {
        Self {
            operator,
            params,
            left: None,
            right: None,
            result_reference: None,
            operation_reference: None,
            result_encoding: Encoding::UnknownEncoding,
        }
    }

    /// Ask for the result in `reference`.
    #[must_use]
    pub fn with_result_reference(mut self, reference: Option<SpatialReference>) -> Self {
        self.result_reference = reference;
        self
    }

    /// Operator of this node.
    pub const fn operator(&self) -> OperatorType {
        self.operator
    }

    /// Operator parameters.
    pub const fn params(&self) -> Option<&Params> {
        self.params.as_ref()
    }

    /// Left operand.
    pub const fn left(&self) -> Option<&Operand> {
        self.left.as_ref()
    }

    /// Right operand.
    pub const fn right(&self) -> Option<&Operand> {
        self.right.as_ref()
    }

    /// Reference the result is requested in.
    pub const fn result_reference(&self) -> Option<&SpatialReference> {
        self.result_reference.as_ref()
    }

    /// Reference stamped when operands disagreed.
    pub const fn operation_reference(&self) -> Option<&SpatialReference> {
        self.operation_reference.as_ref()
    }

    /// Encoding requested for the result.
    pub const fn result_encoding(&self) -> Encoding {
        self.result_encoding
    }

    /// True when a left operand with geometry input is attached.
    pub fn has_left_geometry_input(&self) -> bool {
        self.left.as_ref().is_some_and(Operand::has_geometry_input)
    }

    /// True when a right operand with geometry input is attached.
    pub fn has_right_geometry_input(&self) -> bool {
        self.right.as_ref().is_some_and(Operand::has_geometry_input)
    }

    /// Number of nodes in this tree, counting `self`.
    pub fn node_count(&self) -> usize {
        let count = |operand: &Option<Operand>| match operand {
            Some(Operand::Node(child)) => child.node_count(),
            _ => 0,
        };
        1 + count(&self.left) + count(&self.right)
    }

    /// Serialize the tree into one request.
    pub fn into_request(self) -> GeometryRequest {
        GeometryRequest {
            operator: self.operator as i32,
            left: self.left.map(Operand::into_left),
            right: self.right.map(Operand::into_right),
            operation_proj: self.operation_reference.as_ref().map(SpatialReference::to_proto),
            result_proj: self.result_reference.as_ref().map(SpatialReference::to_proto),
            result_encoding: self.result_encoding as i32,
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geochain_proto::geometry_data::Data;
    use geochain_proto::params;

    fn inline(wkt: &str) -> Operand {
        Operand::Inline(GeometryData {
            proj: Some(SpatialReference::Epsg(4326).to_proto()),
            data: Some(Data::Wkt(wkt.into())),
        })
    }

    #[test]
    fn nested_nodes_serialize_as_nested_requests() {
        let mut buffer = OperationNode::new(
            OperatorType::Buffer,
            Some(Params::Buffer(params::Buffer { distance: 1.0 })),
        );
        buffer.left = Some(inline("POINT (0 0)"));

        let mut union = OperationNode::new(OperatorType::Union, None);
        union.left = Some(Operand::Node(Box::new(buffer)));
        union.right = Some(inline("POINT (3 3)"));
        union.operation_reference = Some(SpatialReference::Epsg(4326));
        assert_eq!(union.node_count(), 2);

        let request = union.into_request();
        assert_eq!(request.operator(), OperatorType::Union);
        assert_eq!(request.depth(), 2);
        assert!(request.has_right_input());
        let Some(Left::LeftGeometryRequest(inner)) = request.left else {
            unreachable!("left operand is a nested node");
        };
        assert_eq!(inner.operator(), OperatorType::Buffer);
        assert!(matches!(inner.params, Some(Params::Buffer(_))));
        assert_eq!(
            request.operation_proj,
            Some(SpatialReference::Epsg(4326).to_proto())
        );
    }

    #[test]
    fn empty_inline_operand_has_no_input() {
        let mut node = OperationNode::new(OperatorType::ConvexHull, None);
        assert!(!node.has_left_geometry_input());
        node.left = Some(Operand::Inline(GeometryData::default()));
        assert!(!node.has_left_geometry_input());
    }
}
