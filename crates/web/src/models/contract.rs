//! Service contracts signed in the field app.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cfac_core::ContractId;

/// A customer's signed service agreement.
#[derive(Debug, Clone, Serialize)]
pub struct Contract {
    pub id: ContractId,
    pub user_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub accepted_terms: bool,
    /// Signature image as a data URL.
    pub signature_data: Option<String>,
    pub contract_version: String,
    pub registration_date: DateTime<Utc>,
    pub document_generated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields for saving a contract.
#[derive(Debug, Clone)]
pub struct NewContract {
    pub user_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub signature_data: Option<String>,
    pub contract_version: String,
    pub registration_date: DateTime<Utc>,
}
