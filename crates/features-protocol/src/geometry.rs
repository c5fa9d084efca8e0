//! Search geometry parsing and multi-level decomposition.
//!
//! A compound search area (MultiPolygon, GeometryCollection, ...) is broken down
//! into atomic Point / LineString / Polygon shapes so each can be searched with a
//! single INTERSECTS filter.

use std::str::FromStr;

use geo_types::{Geometry, LineString, Point, Polygon};
use thiserror::Error;
use wkt::ToWkt;

/// Errors that can occur when parsing a search geometry.
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    /// The text is not valid WKT.
    #[error("Invalid WKT: {0}")]
    Parse(String),

    /// The WKT parsed but has no geometry equivalent.
    #[error("Unsupported geometry: {0}")]
    Unsupported(String),
}

/// A search geometry as supplied by the caller: WKT text or an already parsed value.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryInput {
    Wkt(String),
    Geometry(Geometry<f64>),
}

impl GeometryInput {
    /// Parse into a geometry value. Already-parsed input is returned as is.
    pub fn parse(&self) -> Result<Geometry<f64>, GeometryError> {
        match self {
            GeometryInput::Wkt(text) => parse_wkt(text),
            GeometryInput::Geometry(geometry) => Ok(geometry.clone()),
        }
    }

    /// WKT text for use in a spatial filter. Text input is forwarded verbatim.
    pub fn to_wkt_string(&self) -> String {
        match self {
            GeometryInput::Wkt(text) => text.trim().to_string(),
            GeometryInput::Geometry(geometry) => geometry.wkt_string(),
        }
    }
}

impl From<&str> for GeometryInput {
    fn from(value: &str) -> Self {
        GeometryInput::Wkt(value.to_string())
    }
}

impl From<String> for GeometryInput {
    fn from(value: String) -> Self {
        GeometryInput::Wkt(value)
    }
}

impl From<Geometry<f64>> for GeometryInput {
    fn from(value: Geometry<f64>) -> Self {
        GeometryInput::Geometry(value)
    }
}

impl From<AtomicGeometry> for GeometryInput {
    fn from(value: AtomicGeometry) -> Self {
        GeometryInput::Geometry(value.into())
    }
}

/// A geometry that cannot be decomposed further.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomicGeometry {
    Point(Point<f64>),
    LineString(LineString<f64>),
    Polygon(Polygon<f64>),
}

impl AtomicGeometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            AtomicGeometry::Point(_) => "Point",
            AtomicGeometry::LineString(_) => "LineString",
            AtomicGeometry::Polygon(_) => "Polygon",
        }
    }

    pub fn to_wkt_string(&self) -> String {
        Geometry::from(self.clone()).wkt_string()
    }
}

impl From<AtomicGeometry> for Geometry<f64> {
    fn from(value: AtomicGeometry) -> Self {
        match value {
            AtomicGeometry::Point(p) => Geometry::Point(p),
            AtomicGeometry::LineString(ls) => Geometry::LineString(ls),
            AtomicGeometry::Polygon(p) => Geometry::Polygon(p),
        }
    }
}

/// Parse WKT text into a geometry.
pub fn parse_wkt(text: &str) -> Result<Geometry<f64>, GeometryError> {
    let parsed = wkt::Wkt::<f64>::from_str(text.trim())
        .map_err(|e| GeometryError::Parse(e.to_string()))?;
    Geometry::try_from(parsed).map_err(|e| GeometryError::Unsupported(format!("{:?}", e)))
}

/// Recursively flatten a geometry into its atomic parts, in encounter order.
///
/// Multi-geometries and geometry collections are explored to any depth.
/// `Line`, `Rect` and `Triangle` are normalised to LineString / Polygon.
pub fn explode(geometry: Geometry<f64>) -> Vec<AtomicGeometry> {
    let mut parts = Vec::new();
    explode_into(geometry, &mut parts);
    parts
}

fn explode_into(geometry: Geometry<f64>, parts: &mut Vec<AtomicGeometry>) {
    match geometry {
        Geometry::Point(p) => parts.push(AtomicGeometry::Point(p)),
        Geometry::Line(line) => parts.push(AtomicGeometry::LineString(LineString::new(vec![
            line.start, line.end,
        ]))),
        Geometry::LineString(ls) => parts.push(AtomicGeometry::LineString(ls)),
        Geometry::Polygon(p) => parts.push(AtomicGeometry::Polygon(p)),
        Geometry::Rect(rect) => parts.push(AtomicGeometry::Polygon(rect.to_polygon())),
        Geometry::Triangle(triangle) => {
            parts.push(AtomicGeometry::Polygon(triangle.to_polygon()))
        }
        Geometry::MultiPoint(mp) => parts.extend(mp.0.into_iter().map(AtomicGeometry::Point)),
        Geometry::MultiLineString(mls) => {
            parts.extend(mls.0.into_iter().map(AtomicGeometry::LineString))
        }
        Geometry::MultiPolygon(mp) => parts.extend(mp.0.into_iter().map(AtomicGeometry::Polygon)),
        Geometry::GeometryCollection(gc) => {
            for child in gc.0 {
                explode_into(child, parts);
            }
        }
    }
}
