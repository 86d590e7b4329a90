//! Cached view of the active service catalogue.
//!
//! The home page, cart and field-app API all read the catalogue, which only
//! changes when an operator reseeds it. Entries live for 5 minutes.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use crate::db::{RepositoryError, ServiceRepository};
use crate::models::Service;

#[derive(Clone)]
pub struct Catalogue {
    cache: Cache<(), Arc<Vec<Service>>>,
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalogue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(Duration::from_secs(300))
                .build(),
        }
    }

    /// Active services ordered by label.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the catalogue cannot be loaded.
    pub async fn active(&self, pool: &PgPool) -> Result<Arc<Vec<Service>>, RepositoryError> {
        if let Some(services) = self.cache.get(&()).await {
            return Ok(services);
        }
        let services = Arc::new(ServiceRepository::new(pool).list_active().await?);
        self.cache.insert((), Arc::clone(&services)).await;
        tracing::debug!(count = services.len(), "Service catalogue cached");
        Ok(services)
    }

    /// Drop the cached catalogue.
    pub async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
    }
}
