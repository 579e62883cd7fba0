// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Conversion between host geometry and wire payloads.
//!
//! Pure and local. Esri shapes cannot be read here because their reference is
//! only known to the engine; [`crate::GeometryClient::decode`] routes those
//! through a unary import request.

use crate::error::{ChainError, Result};
use crate::reference::SpatialReference;
use geochain_proto::{geometry_data::Data, Encoding, GeometryData};
use geozero::geojson::GeoJson;
use geozero::wkb::{Ewkb, Wkb};
use geozero::{CoordDimensions, ToGeo, ToJson, ToWkb};
use std::str::FromStr;
use wkb::writer::{write_geometry, WriteOptions};
use wkb::Endianness;
use wkt::ToWkt;

/// Host geometry value.
pub type Shape = geo_types::Geometry<f64>;

/// Encoding used for operands sent to the engine.
pub const OPERAND_ENCODING: Encoding = Encoding::Wkb;
/// Encoding requested for every result.
pub const RESULT_ENCODING: Encoding = Encoding::Ewkb;

/// A shape together with the reference its coordinates are expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    /// Coordinates.
    pub shape: Shape,
    /// Coordinate system; required before the geometry can be sent.
    pub reference: Option<SpatialReference>,
}

impl Geometry {
    /// Geometry in `reference`.
    pub fn new(shape: impl Into<Shape>, reference: SpatialReference) -> Self {
        Self {
            shape: shape.into(),
            reference: Some(reference),
        }
    }

    /// Geometry without a reference. Encoding it fails.
    pub fn unreferenced(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            reference: None,
        }
    }

    /// Parse well-known text in `reference`.
    pub fn from_wkt(text: &str, reference: SpatialReference) -> Result<Self> {
        Ok(Self::new(parse_wkt(text)?, reference))
    }

    /// Well-known text of the shape.
    pub fn to_wkt(&self) -> String {
        self.shape.wkt_string()
    }
}

/// Encode with [`OPERAND_ENCODING`].
pub fn encode(geometry: &Geometry) -> Result<GeometryData> {
    encode_as(geometry, OPERAND_ENCODING)
}

/// Encode in a specific wire encoding.
///
/// EWKB embeds the SRID when the reference is an EPSG code. Esri shapes
/// cannot be produced locally.
pub fn encode_as(geometry: &Geometry, encoding: Encoding) -> Result<GeometryData> {
    let reference = geometry
        .reference
        .as_ref()
        .ok_or(ChainError::MissingSpatialReference)?;
    let shape = &geometry.shape;
    let data = match encoding {
        Encoding::Wkb | Encoding::UnknownEncoding => Data::Wkb(xdr_wkb(shape)?),
        Encoding::Ewkb => Data::Ewkb(
            shape
                .to_ewkb(CoordDimensions::xy(), reference.epsg())
                .map_err(encode_error)?,
        ),
        Encoding::Wkt => Data::Wkt(shape.wkt_string()),
        Encoding::Geojson => Data::Geojson(shape.to_json().map_err(encode_error)?),
        Encoding::EsriShape => return Err(ChainError::UnsupportedPayloadVariant("esri_shape")),
    };
    Ok(GeometryData {
        proj: Some(reference.to_proto()),
        data: Some(data),
    })
}

/// Decode a payload that carries its own reference.
pub fn decode(data: &GeometryData) -> Result<Geometry> {
    let payload = data
        .data
        .as_ref()
        .ok_or(ChainError::UnsupportedPayloadVariant("none"))?;
    let shape = decode_shape(payload)?;
    let reference = data
        .proj
        .as_ref()
        .and_then(SpatialReference::from_proto)
        .ok_or(ChainError::MissingSpatialReference)?;
    Ok(Geometry::new(shape, reference))
}

fn decode_shape(payload: &Data) -> Result<Shape> {
    let decoded = match payload {
        Data::Wkb(bytes) => Wkb(bytes.clone()).to_geo(),
        Data::Ewkb(bytes) => Ewkb(bytes.clone()).to_geo(),
        Data::Geojson(text) => GeoJson(text.as_str()).to_geo(),
        Data::Wkt(text) => return parse_wkt(text),
        Data::EsriShape(_) => return Err(ChainError::UnsupportedPayloadVariant("esri_shape")),
    };
    decoded.map_err(|err| ChainError::Decode(format!("{}: {err}", payload.variant_name())))
}

fn parse_wkt(text: &str) -> Result<Shape> {
    let parsed = wkt::Wkt::<f64>::from_str(text)
        .map_err(|err| ChainError::Decode(format!("wkt: {err}")))?;
    Shape::try_from(parsed)
        .map_err(|err: wkt::conversion::Error| ChainError::Decode(format!("wkt: {err}")))
}

/// Plain WKB in XDR (big-endian) byte order.
fn xdr_wkb(shape: &Shape) -> Result<Vec<u8>> {
    let options = WriteOptions {
        endianness: Endianness::BigEndian,
    };
    let mut bytes = Vec::new();
    write_geometry(&mut bytes, &wkb_compatible(shape), &options)
        .map_err(|err| ChainError::Encode(err.to_string()))?;
    Ok(bytes)
}

// WKB has no line, rect or triangle type.
fn wkb_compatible(shape: &Shape) -> Shape {
    match shape {
        Shape::Line(line) => {
            Shape::LineString(geo_types::LineString::from(vec![line.start, line.end]))
        }
        Shape::Rect(rect) => Shape::Polygon(rect.to_polygon()),
        Shape::Triangle(triangle) => Shape::Polygon(triangle.to_polygon()),
        Shape::GeometryCollection(collection) => {
            Shape::GeometryCollection(collection.iter().map(wkb_compatible).collect())
        }
        other => other.clone(),
    }
}

fn encode_error(err: geozero::error::GeozeroError) -> ChainError {
    ChainError::Encode(err.to_string())
}
