//! Sales territories.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cfac_core::geo::Geometry;
use cfac_core::{TerritoryId, UserId};

/// A polygon a salesperson works, stored as GeoJSON.
#[derive(Debug, Clone, Serialize)]
pub struct Territory {
    pub id: TerritoryId,
    pub user_id: UserId,
    pub name: String,
    pub geometry: Geometry,
    /// `[minLon, minLat, maxLon, maxLat]`
    pub bbox: Vec<f64>,
    pub centroid: Geometry,
    pub created_at: DateTime<Utc>,
}
