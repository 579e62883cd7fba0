// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Request evaluation for [`crate::FakeEngine`].
//!
//! Geometric results are deliberately coarse: buffers grow the bounding box,
//! boolean overlays keep the left operand, unions collect their inputs.
//! Predicates are exact (DE-9IM through `geo`), so relation tests on buffered
//! output behave like a real engine would.

use geo::{Area, BoundingRect, ConvexHull, Relate, Translate};
use geo_types::{coord, GeometryCollection, LineString, Rect};
use geochain_client::codec;
use geochain_client::{Geometry, Shape, SpatialReference};
use geochain_proto::geometry_data::Data;
use geochain_proto::geometry_request::{Left, Params, Right};
use geochain_proto::{GeometryData, GeometryRequest, GeometryResponse, OperatorType};
use tonic::Status;

/// Reference assigned to imported Esri shapes.
pub(crate) const ESRI_IMPORT_EPSG: i32 = 4326;

pub(crate) fn evaluate(request: &GeometryRequest) -> Result<GeometryResponse, Status> {
    let operator = request.operator();
    if operator.is_relational() {
        let (left, right) = binary_operands(request)?;
        let related = relation(operator, request, &left, &right)?;
        return Ok(GeometryResponse {
            spatial_relationship: Some(related),
            ..Default::default()
        });
    }
    if operator.is_measure() {
        let value = measure(operator, request)?;
        return Ok(GeometryResponse {
            measure: Some(value),
            ..Default::default()
        });
    }
    let geometry = evaluate_geometry(request)?;
    let payload = codec::encode_as(&geometry, request.result_encoding())
        .map_err(|err| Status::unimplemented(err.to_string()))?;
    Ok(GeometryResponse {
        geometry: Some(payload),
        ..Default::default()
    })
}

/// Union of every left operand, reported in the first operand's reference.
pub(crate) fn fold_union(requests: &[GeometryRequest]) -> Result<GeometryResponse, Status> {
    let first = requests
        .first()
        .ok_or_else(|| Status::invalid_argument("empty union stream"))?;
    let mut shapes = Vec::with_capacity(requests.len());
    for request in requests {
        shapes.push(left_operand(request)?.shape);
    }
    let reference = left_operand(first)?.reference;
    let merged = Geometry {
        shape: collect(shapes),
        reference,
    };
    let payload = codec::encode_as(&merged, first.result_encoding())
        .map_err(|err| Status::unimplemented(err.to_string()))?;
    Ok(GeometryResponse {
        geometry: Some(payload),
        ..Default::default()
    })
}

fn evaluate_geometry(request: &GeometryRequest) -> Result<Geometry, Status> {
    let left = left_operand(request)?;
    let operation_reference = request
        .operation_proj
        .as_ref()
        .and_then(SpatialReference::from_proto)
        .or_else(|| left.reference.clone());
    let reference = request
        .result_proj
        .as_ref()
        .and_then(SpatialReference::from_proto)
        .or(operation_reference);

    let shape = match request.operator() {
        OperatorType::Buffer | OperatorType::GeodesicBuffer => {
            grow(&left.shape, buffer_distance(request))?
        }
        OperatorType::ConvexHull => Shape::Polygon(left.shape.convex_hull()),
        OperatorType::EnclosingCircle => grow(&left.shape, 0.0)?,
        OperatorType::AffineTransform => match &request.params {
            Some(Params::AffineTransform(shift)) => {
                left.shape.translate(shift.x_offset, shift.y_offset)
            }
            _ => left.shape,
        },
        OperatorType::Union => {
            let right = right_operand(request)?;
            collect(vec![left.shape, right.shape])
        }
        OperatorType::Difference
        | OperatorType::Intersection
        | OperatorType::SymmetricDifference
        | OperatorType::Cut => {
            right_operand(request)?;
            left.shape
        }
        OperatorType::UnknownOperator => {
            return Err(Status::invalid_argument("operator not set"));
        }
        _ => left.shape,
    };
    Ok(Geometry { shape, reference })
}

fn relation(
    operator: OperatorType,
    request: &GeometryRequest,
    left: &Geometry,
    right: &Geometry,
) -> Result<bool, Status> {
    let matrix = left.shape.relate(&right.shape);
    Ok(match operator {
        OperatorType::Contains => matrix.is_contains(),
        OperatorType::Crosses => matrix.is_crosses(),
        OperatorType::Disjoint => matrix.is_disjoint(),
        OperatorType::Equals => matrix.is_equal_topo(),
        OperatorType::Intersects => matrix.is_intersects(),
        OperatorType::Overlaps => matrix.is_overlaps(),
        OperatorType::Touches => matrix.is_touches(),
        OperatorType::Within => matrix.is_within(),
        OperatorType::Relate => {
            let pattern = match &request.params {
                Some(Params::Relate(relate)) => relate.de_9im.as_str(),
                _ => return Err(Status::invalid_argument("relate without a matrix")),
            };
            matrix
                .matches(pattern)
                .map_err(|_| Status::invalid_argument("malformed DE-9IM matrix"))?
        }
        _ => return Err(Status::invalid_argument("not a relational operator")),
    })
}

fn measure(operator: OperatorType, request: &GeometryRequest) -> Result<f64, Status> {
    match operator {
        OperatorType::GeodeticArea => Ok(left_operand(request)?.shape.unsigned_area()),
        OperatorType::GeodeticLength => Ok(planar_length(&left_operand(request)?.shape)),
        OperatorType::Distance => {
            let (left, right) = binary_operands(request)?;
            let a = bounds(&left.shape)?.center();
            let b = bounds(&right.shape)?.center();
            Ok((a.x - b.x).hypot(a.y - b.y))
        }
        _ => Err(Status::invalid_argument("not a measure operator")),
    }
}

fn binary_operands(request: &GeometryRequest) -> Result<(Geometry, Geometry), Status> {
    Ok((left_operand(request)?, right_operand(request)?))
}

fn left_operand(request: &GeometryRequest) -> Result<Geometry, Status> {
    match &request.left {
        Some(Left::LeftGeometry(data)) => import(data),
        Some(Left::LeftGeometryRequest(inner)) => evaluate_geometry(inner),
        None => Err(Status::invalid_argument("left geometry missing")),
    }
}

fn right_operand(request: &GeometryRequest) -> Result<Geometry, Status> {
    match &request.right {
        Some(Right::RightGeometry(data)) => import(data),
        Some(Right::RightGeometryRequest(inner)) => evaluate_geometry(inner),
        None => Err(Status::invalid_argument("right geometry missing")),
    }
}

/// Inline operand. Esri shapes are taken to hold WKT text in WGS84.
fn import(data: &GeometryData) -> Result<Geometry, Status> {
    if let Some(Data::EsriShape(bytes)) = &data.data {
        let text = String::from_utf8(bytes.clone())
            .map_err(|_| Status::invalid_argument("unreadable esri shape"))?;
        return Geometry::from_wkt(&text, SpatialReference::Epsg(ESRI_IMPORT_EPSG))
            .map_err(|err| Status::invalid_argument(err.to_string()));
    }
    codec::decode(data).map_err(|err| Status::invalid_argument(err.to_string()))
}

fn buffer_distance(request: &GeometryRequest) -> f64 {
    match &request.params {
        Some(Params::Buffer(buffer)) => buffer.distance,
        Some(Params::GeodesicBuffer(buffer)) => buffer.distance,
        _ => 0.0,
    }
}

fn bounds(shape: &Shape) -> Result<Rect<f64>, Status> {
    shape
        .bounding_rect()
        .ok_or_else(|| Status::invalid_argument("empty geometry"))
}

fn grow(shape: &Shape, distance: f64) -> Result<Shape, Status> {
    let rect = bounds(shape)?;
    let (min, max) = (rect.min(), rect.max());
    let grown = Rect::new(
        coord! { x: min.x - distance, y: min.y - distance },
        coord! { x: max.x + distance, y: max.y + distance },
    );
    Ok(Shape::Polygon(grown.to_polygon()))
}

fn collect(shapes: Vec<Shape>) -> Shape {
    let mut parts = Vec::with_capacity(shapes.len());
    for shape in shapes {
        match shape {
            Shape::GeometryCollection(collection) => parts.extend(collection.0),
            other => parts.push(other),
        }
    }
    Shape::GeometryCollection(GeometryCollection(parts))
}

fn planar_length(shape: &Shape) -> f64 {
    fn ring(line: &LineString<f64>) -> f64 {
        line.lines().map(|segment| segment.dx().hypot(segment.dy())).sum()
    }
    match shape {
        Shape::Line(segment) => segment.dx().hypot(segment.dy()),
        Shape::LineString(line) => ring(line),
        Shape::MultiLineString(lines) => lines.iter().map(ring).sum(),
        Shape::Polygon(polygon) => ring(polygon.exterior()),
        Shape::MultiPolygon(polygons) => polygons.iter().map(|p| ring(p.exterior())).sum(),
        Shape::GeometryCollection(parts) => parts.iter().map(planar_length).sum(),
        _ => 0.0,
    }
}
