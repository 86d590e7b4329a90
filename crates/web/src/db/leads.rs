//! Estimate request and job applicant repositories.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use cfac_core::{ApplicantId, EstimateRequestId};

use super::RepositoryError;
use crate::models::{Applicant, EstimateRequest};

#[derive(sqlx::FromRow)]
struct EstimateRow {
    id: EstimateRequestId,
    name: String,
    email: String,
    phone_number: Option<String>,
    vehicle_size: Option<String>,
    message: String,
    created_at: DateTime<Utc>,
}

impl From<EstimateRow> for EstimateRequest {
    fn from(r: EstimateRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            phone_number: r.phone_number,
            vehicle_size: r.vehicle_size,
            message: r.message,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ApplicantRow {
    id: ApplicantId,
    name: String,
    email: String,
    phone_number: Option<String>,
    desired_role: String,
    message: String,
    created_at: DateTime<Utc>,
}

impl From<ApplicantRow> for Applicant {
    fn from(r: ApplicantRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            phone_number: r.phone_number,
            desired_role: r.desired_role,
            message: r.message,
            created_at: r.created_at,
        }
    }
}

/// Fields submitted by the public estimate form.
#[derive(Debug, Clone)]
pub struct NewEstimate {
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub vehicle_size: Option<String>,
    pub message: String,
}

/// Fields submitted by the careers form.
#[derive(Debug, Clone)]
pub struct NewApplicant {
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub desired_role: String,
    pub message: String,
}

/// Repository for estimate requests.
pub struct EstimateRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EstimateRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Save an estimate request.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, new: &NewEstimate) -> Result<EstimateRequest, RepositoryError> {
        let row = sqlx::query_as::<_, EstimateRow>(
            r"
            INSERT INTO estimate_requests (name, email, phone_number, vehicle_size, message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, email, phone_number, vehicle_size, message, created_at
            ",
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.phone_number)
        .bind(&new.vehicle_size)
        .bind(&new.message)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// All estimate requests, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<EstimateRequest>, RepositoryError> {
        let rows = sqlx::query_as::<_, EstimateRow>(
            r"
            SELECT id, name, email, phone_number, vehicle_size, message, created_at
            FROM estimate_requests
            ORDER BY created_at DESC, id DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(EstimateRequest::from).collect())
    }
}

/// Repository for pending job applicants.
pub struct ApplicantRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ApplicantRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Save a job application.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, new: &NewApplicant) -> Result<Applicant, RepositoryError> {
        let row = sqlx::query_as::<_, ApplicantRow>(
            r"
            INSERT INTO employee_applicants (name, email, phone_number, desired_role, message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, email, phone_number, desired_role, message, created_at
            ",
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.phone_number)
        .bind(&new.desired_role)
        .bind(&new.message)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// Applicants waiting for review, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Applicant>, RepositoryError> {
        let rows = sqlx::query_as::<_, ApplicantRow>(
            r"
            SELECT id, name, email, phone_number, desired_role, message, created_at
            FROM employee_applicants
            ORDER BY created_at, id
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Applicant::from).collect())
    }

    /// Remove a reviewed applicant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ApplicantId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM employee_applicants WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
