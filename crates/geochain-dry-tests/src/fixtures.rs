// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reference geometries.

use geo_types::{coord, Point, Rect};
use geochain_client::{Geometry, SpatialReference};

/// Multi-linestring crossing both hemispheres, in NAD27 coordinates.
pub const NAD27_LINES_WKT: &str =
    "MULTILINESTRING ((-120 -45, -100 -55, -90 -63, 0 0, 1 1, 100 25, 170 45, 175 65))";

/// [`NAD27_LINES_WKT`] tagged with EPSG:4267.
#[allow(clippy::expect_used)]
pub fn nad27_lines() -> Geometry {
    Geometry::from_wkt(NAD27_LINES_WKT, SpatialReference::Epsg(4267))
        .expect("fixture wkt should parse")
}

/// Point in WGS84.
pub fn point(x: f64, y: f64) -> Geometry {
    Geometry::new(Point::new(x, y), SpatialReference::Epsg(4326))
}

/// Axis-aligned square with its lower-left corner at (`x`, `y`), in WGS84.
pub fn square(x: f64, y: f64, side: f64) -> Geometry {
    let rect = Rect::new(coord! { x: x, y: y }, coord! { x: x + side, y: y + side });
    Geometry::new(rect.to_polygon(), SpatialReference::Epsg(4326))
}
