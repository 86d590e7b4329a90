//! Service catalogue repository.

use sqlx::PgPool;
use sqlx::types::Json;

use cfac_core::ServiceId;
use cfac_core::pricing::{PriceSheet, format_service_name};

use super::RepositoryError;
use crate::models::service::{NewService, Service};

const SELECT_SERVICE: &str =
    "SELECT id, key, label, category, active, image, price_by_vehicle_size FROM services";

#[derive(sqlx::FromRow)]
struct ServiceRow {
    id: ServiceId,
    key: String,
    label: String,
    category: String,
    active: bool,
    image: Option<String>,
    price_by_vehicle_size: Json<PriceSheet>,
}

impl From<ServiceRow> for Service {
    fn from(r: ServiceRow) -> Self {
        Self {
            id: r.id,
            key: r.key,
            label: r.label,
            category: r.category,
            active: r.active,
            image: r.image,
            price_by_vehicle_size: r.price_by_vehicle_size.0,
        }
    }
}

/// Repository for the service catalogue.
pub struct ServiceRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ServiceRepository<'a> {
    /// Create a new service repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active services, by label.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<Service>, RepositoryError> {
        let rows = sqlx::query_as::<_, ServiceRow>(&format!(
            "{SELECT_SERVICE} WHERE active ORDER BY label"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Service::from).collect())
    }

    /// Get a service by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ServiceId) -> Result<Option<Service>, RepositoryError> {
        let row = sqlx::query_as::<_, ServiceRow>(&format!("{SELECT_SERVICE} WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(Service::from))
    }

    /// Services whose key is in `keys`, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_keys(&self, keys: &[String]) -> Result<Vec<Service>, RepositoryError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, ServiceRow>(&format!(
            "{SELECT_SERVICE} WHERE key = ANY($1)"
        ))
        .bind(keys)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Service::from).collect())
    }

    /// Insert a service, or replace the one with the same key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, new: &NewService) -> Result<Service, RepositoryError> {
        let row = sqlx::query_as::<_, ServiceRow>(
            r"
            INSERT INTO services (key, label, category, active, image, price_by_vehicle_size)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (key) DO UPDATE
            SET label = EXCLUDED.label,
                category = EXCLUDED.category,
                active = EXCLUDED.active,
                image = EXCLUDED.image,
                price_by_vehicle_size = EXCLUDED.price_by_vehicle_size
            RETURNING id, key, label, category, active, image, price_by_vehicle_size
            ",
        )
        .bind(format_service_name(&new.label))
        .bind(&new.label)
        .bind(&new.category)
        .bind(new.active)
        .bind(&new.image)
        .bind(Json(&new.price_by_vehicle_size))
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }
}
