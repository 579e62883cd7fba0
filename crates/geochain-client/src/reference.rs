// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Spatial references and operand reconciliation.
//!
//! References compare structurally: variant and value must match exactly.
//! No equivalence between, say, `EPSG:4326` and its WKT definition is
//! computed here; that knowledge lives in the engine.

use geochain_proto::{projection_data, ProjectionData};
use std::fmt;

/// Custom azimuthal definition centred on a longitude/latitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomProjection {
    /// Central meridian.
    pub lon_0: f64,
    /// Latitude of origin.
    pub lat_0: f64,
}

/// Coordinate system a geometry is expressed in.
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialReference {
    /// EPSG numeric code.
    Epsg(i32),
    /// Proj4 definition string.
    Proj4(String),
    /// OGC WKT definition.
    Wkt(String),
    /// Custom definition.
    Custom(CustomProjection),
}

impl SpatialReference {
    /// EPSG code, when this is an EPSG reference.
    pub const fn epsg(&self) -> Option<i32> {
        match self {
            Self::Epsg(code) => Some(*code),
            _ => None,
        }
    }

    /// Wire descriptor.
    pub fn to_proto(&self) -> ProjectionData {
        let definition = match self {
            Self::Epsg(code) => projection_data::Definition::Epsg(*code),
            Self::Proj4(text) => projection_data::Definition::Proj4(text.clone()),
            Self::Wkt(text) => projection_data::Definition::Wkt(text.clone()),
            Self::Custom(custom) => projection_data::Definition::Custom(projection_data::Custom {
                lon_0: custom.lon_0,
                lat_0: custom.lat_0,
            }),
        };
        ProjectionData {
            definition: Some(definition),
        }
    }

    /// Read a wire descriptor. `None` when no definition is populated.
    pub fn from_proto(proj: &ProjectionData) -> Option<Self> {
        Some(match proj.definition.as_ref()? {
            projection_data::Definition::Epsg(code) => Self::Epsg(*code),
            projection_data::Definition::Proj4(text) => Self::Proj4(text.clone()),
            projection_data::Definition::Wkt(text) => Self::Wkt(text.clone()),
            projection_data::Definition::Custom(custom) => Self::Custom(CustomProjection {
                lon_0: custom.lon_0,
                lat_0: custom.lat_0,
            }),
        })
    }
}

impl fmt::Display for SpatialReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epsg(code) => write!(f, "EPSG:{code}"),
            Self::Proj4(text) => write!(f, "proj4({text})"),
            Self::Wkt(text) => write!(f, "wkt({text})"),
            Self::Custom(custom) => {
                write!(f, "custom(lon_0={}, lat_0={})", custom.lon_0, custom.lat_0)
            }
        }
    }
}

/// Outcome of comparing two operand references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Both operands share a reference; nothing to stamp.
    Same,
    /// References differ.
    Mismatch {
        /// Human-readable description of the disagreement.
        diagnostic: String,
    },
}

/// What a binary chaining call does when its operands disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferencePolicy {
    /// Run the operation in the left operand's reference and log a warning.
    #[default]
    AdoptLeft,
    /// Poison the chain with [`crate::ChainError::ReferenceMismatch`].
    Reject,
}

/// Compare two references exactly.
pub fn reconcile(left: &SpatialReference, right: &SpatialReference) -> Reconciliation {
    if left == right {
        return Reconciliation::Same;
    }
    Reconciliation::Mismatch {
        diagnostic: format!(
            "left operand is {left}, right operand is {right}; operation runs in {left}"
        ),
    }
}
