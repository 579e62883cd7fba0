// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Operator catalogue shared by chains and stream templates.

use crate::reference::SpatialReference;
use geochain_proto::geometry_request::Params;
use geochain_proto::{params, EnvelopeData, OperatorType};

/// Corner style for [`UnaryOp::Offset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetJoin {
    /// Rounded corners.
    #[default]
    Round,
    /// Beveled corners.
    Bevel,
    /// Mitered corners.
    Miter,
    /// Squared corners.
    Square,
}

impl OffsetJoin {
    const fn to_proto(self) -> params::JoinType {
        match self {
            Self::Round => params::JoinType::Round,
            Self::Bevel => params::JoinType::Bevel,
            Self::Miter => params::JoinType::Miter,
            Self::Square => params::JoinType::Square,
        }
    }
}

/// Axis-aligned clip envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Minimum x.
    pub xmin: f64,
    /// Minimum y.
    pub ymin: f64,
    /// Maximum x.
    pub xmax: f64,
    /// Maximum y.
    pub ymax: f64,
    /// Envelope reference; `None` means the operand's.
    pub reference: Option<SpatialReference>,
}

impl Envelope {
    /// Envelope in the operand's reference.
    pub const fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
            reference: None,
        }
    }

    fn to_proto(&self) -> EnvelopeData {
        EnvelopeData {
            xmin: self.xmin,
            ymin: self.ymin,
            xmax: self.xmax,
            ymax: self.ymax,
            proj: self.reference.as_ref().map(SpatialReference::to_proto),
        }
    }
}

/// Operations on a single operand.
#[derive(Debug, Clone, PartialEq)]
pub enum UnaryOp {
    /// Planar buffer.
    Buffer {
        /// Distance in the operand's units.
        distance: f64,
    },
    /// Geodesic buffer.
    GeodesicBuffer {
        /// Distance in meters.
        distance_m: f64,
        /// Allowed deviation in meters; NaN lets the engine choose.
        max_deviation_m: f64,
    },
    /// Convex hull.
    ConvexHull,
    /// Insert vertices so no segment exceeds `max_length`.
    DensifyByLength {
        /// Maximum segment length in the operand's units.
        max_length: f64,
    },
    /// Geodetic densify.
    GeodeticDensifyByLength {
        /// Maximum segment length in meters.
        max_length_m: f64,
    },
    /// Deviation-bounded generalization.
    Generalize {
        /// Maximum deviation.
        max_deviation: f64,
        /// Drop degenerate parts.
        remove_degenerates: bool,
    },
    /// Area-bounded generalization.
    GeneralizeByArea {
        /// Percent of area change tolerated.
        percent_reduction: f64,
        /// Point budget; zero means unbounded.
        max_point_count: i32,
        /// Drop degenerate parts.
        remove_degenerates: bool,
    },
    /// Offset curve.
    Offset {
        /// Offset distance.
        distance: f64,
        /// Corner style.
        join: OffsetJoin,
        /// Bevel ratio for mitered joins.
        bevel_ratio: f64,
        /// Flattening tolerance for rounded joins.
        flatten_error: f64,
    },
    /// Reproject.
    Project {
        /// Reference of the result.
        target: SpatialReference,
    },
    /// Topological simplify.
    Simplify {
        /// Simplify even if already known simple.
        force: bool,
    },
    /// OGC-valid simplify.
    SimplifyOgc {
        /// Simplify even if already known simple.
        force: bool,
    },
    /// Translate.
    ShiftXy {
        /// Offsets are meters on the ellipsoid.
        geodetic: bool,
        /// Shift along x.
        x_offset: f64,
        /// Shift along y.
        y_offset: f64,
    },
    /// Clip to an envelope.
    Clip {
        /// Clip bounds.
        envelope: Envelope,
    },
    /// Topological boundary.
    Boundary,
    /// Minimum enclosing circle.
    EnclosingCircle,
}

impl UnaryOp {
    /// Wire operator.
    pub const fn operator(&self) -> OperatorType {
        match self {
            Self::Buffer { .. } => OperatorType::Buffer,
            Self::GeodesicBuffer { .. } => OperatorType::GeodesicBuffer,
            Self::ConvexHull => OperatorType::ConvexHull,
            Self::DensifyByLength { .. } => OperatorType::DensifyByLength,
            Self::GeodeticDensifyByLength { .. } => OperatorType::GeodeticDensifyByLength,
            Self::Generalize { .. } => OperatorType::Generalize,
            Self::GeneralizeByArea { .. } => OperatorType::GeneralizeByArea,
            Self::Offset { .. } => OperatorType::Offset,
            Self::Project { .. } => OperatorType::Project,
            Self::Simplify { .. } => OperatorType::Simplify,
            Self::SimplifyOgc { .. } => OperatorType::SimplifyOgc,
            Self::ShiftXy { .. } => OperatorType::AffineTransform,
            Self::Clip { .. } => OperatorType::Clip,
            Self::Boundary => OperatorType::Boundary,
            Self::EnclosingCircle => OperatorType::EnclosingCircle,
        }
    }

    /// Wire parameters, if the operator takes any.
    pub fn params(&self) -> Option<Params> {
        Some(match self {
            Self::Buffer { distance } => Params::Buffer(params::Buffer {
                distance: *distance,
            }),
            Self::GeodesicBuffer {
                distance_m,
                max_deviation_m,
            } => Params::GeodesicBuffer(params::GeodesicBuffer {
                distance: *distance_m,
                max_deviation: *max_deviation_m,
            }),
            Self::DensifyByLength { max_length } => Params::Densify(params::Densify {
                max_length: *max_length,
            }),
            Self::GeodeticDensifyByLength { max_length_m } => Params::Densify(params::Densify {
                max_length: *max_length_m,
            }),
            Self::Generalize {
                max_deviation,
                remove_degenerates,
            } => Params::Generalize(params::Generalize {
                max_deviation: *max_deviation,
                remove_degenerates: *remove_degenerates,
            }),
            Self::GeneralizeByArea {
                percent_reduction,
                max_point_count,
                remove_degenerates,
            } => Params::GeneralizeByArea(params::GeneralizeByArea {
                percent_reduction: *percent_reduction,
                max_point_count: *max_point_count,
                remove_degenerates: *remove_degenerates,
            }),
            Self::Offset {
                distance,
                join,
                bevel_ratio,
                flatten_error,
            } => Params::Offset(params::Offset {
                distance: *distance,
                join_type: join.to_proto() as i32,
                bevel_ratio: *bevel_ratio,
                flatten_error: *flatten_error,
            }),
            Self::Simplify { force } | Self::SimplifyOgc { force } => {
                Params::Simplify(params::Simplify { force: *force })
            }
            Self::ShiftXy {
                geodetic,
                x_offset,
                y_offset,
            } => Params::AffineTransform(params::AffineTransform {
                geodetic: *geodetic,
                x_offset: *x_offset,
                y_offset: *y_offset,
            }),
            Self::Clip { envelope } => Params::Clip(params::Clip {
                envelope: Some(envelope.to_proto()),
            }),
            Self::ConvexHull | Self::Project { .. } | Self::Boundary | Self::EnclosingCircle => {
                return None
            }
        })
    }

    /// Reference the result is requested in. Only `Project` sets one.
    pub const fn result_reference(&self) -> Option<&SpatialReference> {
        match self {
            Self::Project { target } => Some(target),
            _ => None,
        }
    }
}

/// Operations combining two operands into a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Left minus right.
    Difference,
    /// Shared part.
    Intersection,
    /// Parts in exactly one operand.
    SymmetricDifference,
    /// Combined area.
    Union,
    /// Split left by the right polyline.
    Cut {
        /// Treat touching parts as cut points.
        consider_touch: bool,
    },
}

impl BinaryOp {
    /// Wire operator.
    pub const fn operator(self) -> OperatorType {
        match self {
            Self::Difference => OperatorType::Difference,
            Self::Intersection => OperatorType::Intersection,
            Self::SymmetricDifference => OperatorType::SymmetricDifference,
            Self::Union => OperatorType::Union,
            Self::Cut { .. } => OperatorType::Cut,
        }
    }

    /// Wire parameters, if the operator takes any.
    pub fn params(self) -> Option<Params> {
        match self {
            Self::Cut { consider_touch } => Some(Params::Cut(params::Cut { consider_touch })),
            _ => None,
        }
    }
}

/// Named binary predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// Left contains right.
    Contains,
    /// Left crosses right.
    Crosses,
    /// No shared points.
    Disjoint,
    /// Topologically equal.
    Equals,
    /// At least one shared point.
    Intersects,
    /// Same dimension, partial overlap.
    Overlaps,
    /// Boundaries meet, interiors do not.
    Touches,
    /// Left within right.
    Within,
}

impl Predicate {
    /// Wire operator.
    pub const fn operator(self) -> OperatorType {
        match self {
            Self::Contains => OperatorType::Contains,
            Self::Crosses => OperatorType::Crosses,
            Self::Disjoint => OperatorType::Disjoint,
            Self::Equals => OperatorType::Equals,
            Self::Intersects => OperatorType::Intersects,
            Self::Overlaps => OperatorType::Overlaps,
            Self::Touches => OperatorType::Touches,
            Self::Within => OperatorType::Within,
        }
    }
}
