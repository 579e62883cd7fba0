// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire schema for the remote geometry service (`epl.protobuf.v1`).
//!
//! Messages and the client stub are generated from `proto/geometry.proto`
//! at build time. Field tags match the service's published schema; do not
//! renumber them.
//!
//! A request is a tree: each operand slot holds either inline geometry or a
//! nested [`GeometryRequest`] that the engine evaluates first.

tonic::include_proto!("epl.protobuf.v1");

pub use geometry_service_client::GeometryServiceClient;

/// Fully-qualified gRPC service name.
pub const SERVICE_NAME: &str = "epl.protobuf.v1.GeometryService";

impl geometry_data::Data {
    /// Short variant name for diagnostics.
    pub const fn variant_name(&self) -> &'static str {
        match self {
            Self::Wkt(_) => "wkt",
            Self::Wkb(_) => "wkb",
            Self::Ewkb(_) => "ewkb",
            Self::Geojson(_) => "geojson",
            Self::EsriShape(_) => "esri_shape",
        }
    }
}

impl GeometryData {
    /// True when a payload variant is populated.
    pub const fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// True when the payload is an Esri shape.
    pub const fn is_esri_shape(&self) -> bool {
        matches!(self.data, Some(geometry_data::Data::EsriShape(_)))
    }
}

impl OperatorType {
    /// True for operators answered with `spatial_relationship`.
    pub const fn is_relational(&self) -> bool {
        matches!(
            self,
            Self::Contains
                | Self::Crosses
                | Self::Disjoint
                | Self::Equals
                | Self::Intersects
                | Self::Overlaps
                | Self::Touches
                | Self::Within
                | Self::Relate
        )
    }

    /// True for operators answered with `measure`.
    pub const fn is_measure(&self) -> bool {
        matches!(
            self,
            Self::Distance | Self::GeodeticArea | Self::GeodeticLength
        )
    }
}

impl GeometryRequest {
    /// True when the left slot carries a nested request or populated inline data.
    pub fn has_left_input(&self) -> bool {
        match &self.left {
            Some(geometry_request::Left::LeftGeometry(data)) => data.has_data(),
            Some(geometry_request::Left::LeftGeometryRequest(_)) => true,
            None => false,
        }
    }

    /// True when the right slot carries a nested request or populated inline data.
    pub fn has_right_input(&self) -> bool {
        match &self.right {
            Some(geometry_request::Right::RightGeometry(data)) => data.has_data(),
            Some(geometry_request::Right::RightGeometryRequest(_)) => true,
            None => false,
        }
    }

    /// Number of request levels in this tree, counting `self`.
    pub fn depth(&self) -> usize {
        let left = match &self.left {
            Some(geometry_request::Left::LeftGeometryRequest(inner)) => inner.depth(),
            _ => 0,
        };
        let right = match &self.right {
            Some(geometry_request::Right::RightGeometryRequest(inner)) => inner.depth(),
            _ => 0,
        };
        1 + left.max(right)
    }
}
