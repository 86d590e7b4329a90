//! Territory geometry.
//!
//! Sales territories are drawn in the field app as a polygon of
//! `[longitude, latitude]` vertices. Before storing one we close the ring and
//! derive its bounding box and centroid, and we keep GeoJSON shapes so the
//! documents can be fed straight back to a map.

use serde::{Deserialize, Serialize};

/// A `[longitude, latitude]` pair.
pub type LonLat = [f64; 2];

/// Errors from [`Ring::close`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("ring_lonlat must have at least 3 vertices")]
    TooFewVertices,
    #[error("vertex {index} is not a valid longitude/latitude pair")]
    InvalidCoordinate { index: usize },
}

/// A closed polygon ring: the last vertex equals the first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Ring(Vec<LonLat>);

impl Ring {
    /// Validate vertices and close the ring if it is open.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::TooFewVertices`] when fewer than three vertices are
    /// given, and [`GeoError::InvalidCoordinate`] for non-finite values or
    /// values outside ±180 longitude / ±90 latitude.
    pub fn close(mut points: Vec<LonLat>) -> Result<Self, GeoError> {
        if points.len() < 3 {
            return Err(GeoError::TooFewVertices);
        }
        for (index, [lon, lat]) in points.iter().copied().enumerate() {
            let valid = lon.is_finite()
                && lat.is_finite()
                && (-180.0..=180.0).contains(&lon)
                && (-90.0..=90.0).contains(&lat);
            if !valid {
                return Err(GeoError::InvalidCoordinate { index });
            }
        }

        if let (Some(first), Some(last)) = (points.first().copied(), points.last().copied())
            && first != last
        {
            points.push(first);
        }
        Ok(Self(points))
    }

    /// All vertices including the closing one.
    #[must_use]
    pub fn points(&self) -> &[LonLat] {
        &self.0
    }

    /// Vertices without the closing duplicate.
    #[must_use]
    pub fn vertices(&self) -> &[LonLat] {
        self.0.split_last().map_or(&[], |(_, rest)| rest)
    }

    /// `[minLon, minLat, maxLon, maxLat]`.
    #[must_use]
    pub fn bbox(&self) -> [f64; 4] {
        self.0.iter().fold(
            [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY],
            |[min_lon, min_lat, max_lon, max_lat], &[lon, lat]| {
                [min_lon.min(lon), min_lat.min(lat), max_lon.max(lon), max_lat.max(lat)]
            },
        )
    }

    /// Arithmetic mean of the distinct vertices.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn centroid(&self) -> LonLat {
        let vertices = self.vertices();
        let n = vertices.len() as f64;
        let (lon_sum, lat_sum) = vertices
            .iter()
            .fold((0.0, 0.0), |(lon_sum, lat_sum), &[lon, lat]| (lon_sum + lon, lat_sum + lat));
        [lon_sum / n, lat_sum / n]
    }

    /// GeoJSON `Polygon` with this ring as its only (outer) ring.
    #[must_use]
    pub fn to_polygon(&self) -> Geometry {
        Geometry::Polygon {
            coordinates: vec![self.0.clone()],
        }
    }
}

/// The subset of GeoJSON geometries territories use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: LonLat },
    Polygon { coordinates: Vec<Vec<LonLat>> },
}

impl Geometry {
    #[must_use]
    pub const fn point(at: LonLat) -> Self {
        Self::Point { coordinates: at }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn square() -> Vec<LonLat> {
        vec![[-97.0, 30.0], [-96.0, 30.0], [-96.0, 31.0], [-97.0, 31.0]]
    }

    #[test]
    fn test_close_appends_first_vertex() {
        let ring = Ring::close(square()).unwrap();
        assert_eq!(ring.points().len(), 5);
        assert_eq!(ring.points().first(), ring.points().last());
        assert_eq!(ring.vertices().len(), 4);
    }

    #[test]
    fn test_close_keeps_closed_ring() {
        let mut points = square();
        points.push([-97.0, 30.0]);
        let ring = Ring::close(points).unwrap();
        assert_eq!(ring.points().len(), 5);
    }

    #[test]
    fn test_close_rejects_bad_input() {
        assert_eq!(
            Ring::close(vec![[0.0, 0.0], [1.0, 1.0]]),
            Err(GeoError::TooFewVertices)
        );
        assert_eq!(
            Ring::close(vec![[0.0, 0.0], [1.0, 95.0], [1.0, 0.0]]),
            Err(GeoError::InvalidCoordinate { index: 1 })
        );
        assert_eq!(
            Ring::close(vec![[f64::NAN, 0.0], [1.0, 1.0], [1.0, 0.0]]),
            Err(GeoError::InvalidCoordinate { index: 0 })
        );
    }

    #[test]
    fn test_bbox_and_centroid() {
        let ring = Ring::close(square()).unwrap();
        assert_eq!(ring.bbox(), [-97.0, 30.0, -96.0, 31.0]);
        assert_eq!(ring.centroid(), [-96.5, 30.5]);
    }

    #[test]
    fn test_geojson_shapes() {
        let ring = Ring::close(square()).unwrap();
        let polygon = serde_json::to_value(ring.to_polygon()).unwrap();
        assert_eq!(polygon["type"], "Polygon");
        assert_eq!(polygon["coordinates"][0].as_array().unwrap().len(), 5);

        let point = serde_json::to_value(Geometry::point(ring.centroid())).unwrap();
        assert_eq!(point, serde_json::json!({"type": "Point", "coordinates": [-96.5, 30.5]}));
    }
}
