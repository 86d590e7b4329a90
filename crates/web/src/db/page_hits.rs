//! Visitor log storage.

use sqlx::PgPool;
use sqlx::types::Json;

use super::RepositoryError;

/// One logged request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageHit {
    pub ip: Option<String>,
    pub method: String,
    pub path: String,
    pub query: String,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    /// Request headers, minus cookies and credentials.
    pub headers: serde_json::Map<String, serde_json::Value>,
    pub visitor: Option<String>,
}

/// Repository for the `page_hits` table.
pub struct PageHitRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PageHitRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append a hit.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record(&self, hit: &PageHit) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO page_hits (ip, method, path, query, referrer, user_agent, headers, visitor)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(&hit.ip)
        .bind(&hit.method)
        .bind(&hit.path)
        .bind(&hit.query)
        .bind(&hit.referrer)
        .bind(&hit.user_agent)
        .bind(Json(&hit.headers))
        .bind(&hit.visitor)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
