//! Spatial filters of a query: a bounding box or an arbitrary `GeoJSON`
//! geometry that results must intersect or be contained by.

use geo::{BoundingRect, Coord, Polygon, Rect};
use geojson::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ConstructionError;

/// Axis-aligned rectangle as `(min_x, min_y, max_x, max_y)`.
///
/// Serializes as a four-element JSON array, the `bbox` layout used by
/// `GeoJSON` and STAC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    /// Western edge (minimum longitude).
    pub min_x: f64,
    /// Southern edge (minimum latitude).
    pub min_y: f64,
    /// Eastern edge (maximum longitude).
    pub max_x: f64,
    /// Northern edge (maximum latitude).
    pub max_y: f64,
}

impl BoundingBox {
    /// Creates a bounding box from its four edges.
    #[must_use]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Returns the edges as `[min_x, min_y, max_x, max_y]`.
    #[must_use]
    pub const fn to_array(self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    /// Returns the closed rectangle polygon covering this box.
    #[must_use]
    pub fn to_polygon(self) -> Polygon<f64> {
        Rect::new(
            Coord {
                x: self.min_x,
                y: self.min_y,
            },
            Coord {
                x: self.max_x,
                y: self.max_y,
            },
        )
        .to_polygon()
    }

    /// Returns the rectangle as a `GeoJSON` `Polygon` geometry.
    #[must_use]
    pub fn to_geometry(self) -> Geometry {
        Geometry::new(geojson::Value::from(&self.to_polygon()))
    }

    /// Parses a raw `bbox` value: a JSON array of exactly four numbers.
    pub(crate) fn from_value(value: &Value) -> Result<Self, ConstructionError> {
        let invalid = |reason: &str| ConstructionError::InvalidParameter {
            name: "bbox",
            reason: reason.to_string(),
        };

        let items = value
            .as_array()
            .ok_or_else(|| invalid("expected an array of four numbers"))?;

        let edges = items
            .iter()
            .map(Value::as_f64)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| invalid("every entry must be a number"))?;

        match edges.as_slice() {
            &[min_x, min_y, max_x, max_y] => Ok(Self::new(min_x, min_y, max_x, max_y)),
            _ => Err(invalid(&format!("expected 4 numbers, got {}", edges.len()))),
        }
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([min_x, min_y, max_x, max_y]: [f64; 4]) -> Self {
        Self::new(min_x, min_y, max_x, max_y)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        bbox.to_array()
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

/// The single spatial filter of a query.
///
/// A query carries at most one of these, so `bbox`, `intersects` and
/// `contains` can never be set together.
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialFilter {
    /// Results must fall within this rectangle.
    BBox(BoundingBox),
    /// Results must intersect this geometry.
    Intersects {
        /// Geometry as supplied by the caller.
        geometry: Geometry,
        /// Bounding rectangle of `geometry`.
        extent: BoundingBox,
    },
    /// Results must be contained by this geometry.
    Contains {
        /// Geometry as supplied by the caller.
        geometry: Geometry,
        /// Bounding rectangle of `geometry`.
        extent: BoundingBox,
    },
}

impl SpatialFilter {
    /// Query parameter name this filter is read from and written to.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::BBox(_) => "bbox",
            Self::Intersects { .. } => "intersects",
            Self::Contains { .. } => "contains",
        }
    }

    /// Bounding rectangle of the filter.
    #[must_use]
    pub const fn bounds(&self) -> BoundingBox {
        match self {
            Self::BBox(bbox) => *bbox,
            Self::Intersects { extent, .. } | Self::Contains { extent, .. } => *extent,
        }
    }

    /// Filter geometry; a bounding box is expanded to its rectangle polygon.
    #[must_use]
    pub fn geometry(&self) -> Geometry {
        match self {
            Self::BBox(bbox) => bbox.to_geometry(),
            Self::Intersects { geometry, .. } | Self::Contains { geometry, .. } => {
                geometry.clone()
            }
        }
    }

    /// Raw JSON value of the filter, as it appears in a query mapping.
    pub(crate) fn to_value(&self) -> Value {
        match self {
            Self::BBox(bbox) => Value::from(bbox.to_array().to_vec()),
            Self::Intersects { geometry, .. } | Self::Contains { geometry, .. } => {
                Value::Object(geojson::JsonObject::from(geometry))
            }
        }
    }

    /// Builds an `intersects` filter, computing the geometry's extent.
    pub(crate) fn intersects(value: &Value) -> Result<Self, ConstructionError> {
        let (geometry, extent) = parse_geometry("intersects", value)?;
        Ok(Self::Intersects { geometry, extent })
    }

    /// Builds a `contains` filter, computing the geometry's extent.
    pub(crate) fn contains(value: &Value) -> Result<Self, ConstructionError> {
        let (geometry, extent) = parse_geometry("contains", value)?;
        Ok(Self::Contains { geometry, extent })
    }
}

/// Parses a `GeoJSON` geometry object and computes its bounding rectangle.
///
/// Geometries without any coordinates have no extent and are rejected.
fn parse_geometry(
    name: &'static str,
    value: &Value,
) -> Result<(Geometry, BoundingBox), ConstructionError> {
    let geometry: Geometry = serde_json::from_value(value.clone()).map_err(|e| {
        ConstructionError::InvalidParameter {
            name,
            reason: format!("not a GeoJSON geometry: {e}"),
        }
    })?;

    let geo_geometry: geo::Geometry<f64> =
        geometry
            .clone()
            .try_into()
            .map_err(|e| ConstructionError::InvalidParameter {
                name,
                reason: format!("unsupported geometry: {e}"),
            })?;

    let extent = geo_geometry
        .bounding_rect()
        .ok_or_else(|| ConstructionError::InvalidParameter {
            name,
            reason: "geometry has no coordinates".to_string(),
        })?;

    Ok((geometry, extent.into()))
}
