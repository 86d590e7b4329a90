//! Database operations.
//!
//! # Tables
//!
//! - `users` - Customers and employees (role column)
//! - `services` - Service catalogue with per-vehicle-size prices
//! - `orders` - Bookings, guest orders, payment and compensation state
//! - `contracts` - Signed service agreements from the field app
//! - `territories` - Sales territory polygons
//! - `estimate_requests`, `employee_applicants` - Inbound leads
//! - `page_hits` - Visitor log
//! - `tower_sessions.session` - Session storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/web/migrations/` and run via:
//! ```bash
//! cargo run -p cfac-cli -- migrate
//! ```

pub mod contracts;
pub mod leads;
pub mod orders;
pub mod page_hits;
pub mod services;
pub mod territories;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use contracts::ContractRepository;
pub use leads::{ApplicantRepository, EstimateRepository};
pub use orders::OrderRepository;
pub use page_hits::PageHitRepository;
pub use services::ServiceRepository;
pub use territories::TerritoryRepository;
pub use users::UserRepository;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in database is invalid or corrupted.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Entity not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint violation.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to [`RepositoryError::Conflict`].
    pub(crate) fn from_insert(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(e)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page number.
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    /// Page size for admin listings.
    pub const ADMIN_PAGE_SIZE: i64 = 20;

    /// Clamp user input to a valid page (`page >= 1`, `1 <= per_page <= 100`).
    #[must_use]
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(Self::ADMIN_PAGE_SIZE).clamp(1, 100),
        }
    }

    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    /// Number of pages needed for `total` rows (0 when empty).
    #[must_use]
    pub const fn total_pages(&self, total: i64) -> i64 {
        (total + self.per_page - 1) / self.per_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamps_input() {
        let p = Pagination::new(Some(0), Some(500));
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 100);
        assert_eq!(Pagination::new(None, None).per_page, 20);
    }

    #[test]
    fn test_pagination_offset_and_pages() {
        let p = Pagination::new(Some(3), Some(20));
        assert_eq!(p.offset(), 40);
        assert_eq!(p.total_pages(0), 0);
        assert_eq!(p.total_pages(20), 1);
        assert_eq!(p.total_pages(41), 3);
    }
}
