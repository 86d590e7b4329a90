//! Contract repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use cfac_core::ContractId;

use super::RepositoryError;
use crate::models::contract::{Contract, NewContract};

const SELECT_CONTRACT: &str = "SELECT id, user_name, email, phone_number, accepted_terms, \
     signature_data, contract_version, registration_date, document_generated_at, created_at \
     FROM contracts";

#[derive(sqlx::FromRow)]
struct ContractRow {
    id: ContractId,
    user_name: String,
    email: String,
    phone_number: Option<String>,
    accepted_terms: bool,
    signature_data: Option<String>,
    contract_version: String,
    registration_date: DateTime<Utc>,
    document_generated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<ContractRow> for Contract {
    fn from(r: ContractRow) -> Self {
        Self {
            id: r.id,
            user_name: r.user_name,
            email: r.email,
            phone_number: r.phone_number,
            accepted_terms: r.accepted_terms,
            signature_data: r.signature_data,
            contract_version: r.contract_version,
            registration_date: r.registration_date,
            document_generated_at: r.document_generated_at,
            created_at: r.created_at,
        }
    }
}

/// Repository for signed contracts.
pub struct ContractRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ContractRepository<'a> {
    /// Create a new contract repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Save an accepted contract.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, new: &NewContract) -> Result<Contract, RepositoryError> {
        let row = sqlx::query_as::<_, ContractRow>(
            r"
            INSERT INTO contracts (user_name, email, phone_number, accepted_terms,
                                   signature_data, contract_version, registration_date)
            VALUES ($1, LOWER($2), $3, TRUE, $4, $5, $6)
            RETURNING id, user_name, email, phone_number, accepted_terms, signature_data,
                      contract_version, registration_date, document_generated_at, created_at
            ",
        )
        .bind(&new.user_name)
        .bind(&new.email)
        .bind(&new.phone_number)
        .bind(&new.signature_data)
        .bind(&new.contract_version)
        .bind(new.registration_date)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// The most recent contract signed with an email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_latest_by_email(&self, email: &str) -> Result<Option<Contract>, RepositoryError> {
        let row = sqlx::query_as::<_, ContractRow>(&format!(
            "{SELECT_CONTRACT} WHERE LOWER(email) = LOWER($1) ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(email.trim())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Contract::from))
    }

    /// Stamp the time a printable document was produced.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the contract doesn't exist.
    pub async fn mark_generated(&self, id: ContractId) -> Result<DateTime<Utc>, RepositoryError> {
        let stamp = sqlx::query_scalar::<_, DateTime<Utc>>(
            r"
            UPDATE contracts SET document_generated_at = NOW()
            WHERE id = $1
            RETURNING document_generated_at
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        Ok(stamp)
    }
}
