//! Sales territory repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use cfac_core::geo::{Geometry, Ring};
use cfac_core::{TerritoryId, UserId};

use super::RepositoryError;
use crate::models::Territory;

#[derive(sqlx::FromRow)]
struct TerritoryRow {
    id: TerritoryId,
    user_id: UserId,
    name: String,
    geometry: Json<Geometry>,
    bbox: Vec<f64>,
    centroid: Json<Geometry>,
    created_at: DateTime<Utc>,
}

impl From<TerritoryRow> for Territory {
    fn from(r: TerritoryRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            name: r.name,
            geometry: r.geometry.0,
            bbox: r.bbox,
            centroid: r.centroid.0,
            created_at: r.created_at,
        }
    }
}

/// Repository for sales territories.
pub struct TerritoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TerritoryRepository<'a> {
    /// Create a new territory repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Number of territories a user owns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_for_user(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM territories WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Store a territory with its derived bounding box and centroid.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        name: &str,
        ring: &Ring,
    ) -> Result<Territory, RepositoryError> {
        let row = sqlx::query_as::<_, TerritoryRow>(
            r"
            INSERT INTO territories (user_id, name, geometry, bbox, centroid)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, name, geometry, bbox, centroid, created_at
            ",
        )
        .bind(user_id)
        .bind(name)
        .bind(Json(ring.to_polygon()))
        .bind(ring.bbox().to_vec())
        .bind(Json(Geometry::point(ring.centroid())))
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// A user's territories, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Territory>, RepositoryError> {
        let rows = sqlx::query_as::<_, TerritoryRow>(
            r"
            SELECT id, user_id, name, geometry, bbox, centroid, created_at
            FROM territories WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Territory::from).collect())
    }
}
