//! Independent contractor agreements signed in the field app.

use askama::Template;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::db::ContractRepository;
use crate::error::{ApiError, ApiResult};
use crate::models::Contract;
use crate::models::contract::NewContract;
use crate::state::AppState;

const DEFAULT_VERSION: &str = "v1.0";

/// Printable copy of a signed agreement, served as an attachment.
#[derive(Template)]
#[template(path = "contracts/document.html")]
pub struct ContractDocument<'a> {
    pub contract: &'a Contract,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SaveContractRequest {
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub registration_date: Option<String>,
    pub signature_data: Option<String>,
    pub accepted_terms: Option<bool>,
    pub contract_version: Option<String>,
}

impl SaveContractRequest {
    fn validate(self, now: DateTime<Utc>) -> Result<NewContract, ApiError> {
        let user_name = self.user_name.map(|n| n.trim().to_string()).unwrap_or_default();
        let email = self.email.map(|e| e.trim().to_string()).unwrap_or_default();
        if user_name.is_empty() || email.is_empty() {
            return Err(ApiError::bad_request("user_name and email are required"));
        }
        if self.accepted_terms != Some(true) {
            return Err(ApiError::bad_request("Contract must be accepted"));
        }

        let registration_date = match self.registration_date.as_deref().map(str::trim) {
            None | Some("") => now,
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|d| d.with_timezone(&Utc))
                .or_else(|_| {
                    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                        .map(|d| d.and_utc())
                })
                .map_err(|_| ApiError::bad_request("registration_date must be an ISO 8601 date"))?,
        };

        Ok(NewContract {
            user_name,
            email,
            phone_number: self.phone_number.filter(|p| !p.trim().is_empty()),
            signature_data: self.signature_data.filter(|s| !s.is_empty()),
            contract_version: self
                .contract_version
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            registration_date,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

impl EmailQuery {
    fn required(self) -> Result<String, ApiError> {
        self.email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ApiError::bad_request("Email parameter is required."))
    }
}

pub async fn save_contract(
    State(state): State<AppState>,
    Json(request): Json<SaveContractRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let new = request.validate(Utc::now())?;
    let contract = ContractRepository::new(state.pool()).create(&new).await?;
    tracing::info!(contract_id = %contract.id, version = %contract.contract_version, "Contract saved");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Contract saved successfully.",
            "contract_id": contract.id,
        })),
    ))
}

pub async fn find_contract(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> ApiResult<Json<Contract>> {
    let email = query.required()?;
    ContractRepository::new(state.pool())
        .find_latest_by_email(&email)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Contract not found."))
}

fn attachment(contract: &Contract, generated_at: DateTime<Utc>) -> ApiResult<Response> {
    let body = ContractDocument {
        contract,
        generated_at,
    }
    .render()
    .map_err(ApiError::internal)?;
    let filename = format!("{}_contract.html", contract.email.replace(['"', '/', '\\'], "_"));

    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}

/// Generate (or regenerate) the printable agreement for `?email=`.
pub async fn generate_document(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> ApiResult<Response> {
    let email = query.required()?;
    let contracts = ContractRepository::new(state.pool());
    let Some(contract) = contracts.find_latest_by_email(&email).await? else {
        return Err(ApiError::not_found("Contract not found for the provided email."));
    };

    let generated_at = contracts.mark_generated(contract.id).await?;
    tracing::info!(contract_id = %contract.id, "Contract document generated");
    attachment(&contract, generated_at)
}

/// Download a previously generated agreement.
pub async fn download_document(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Response> {
    let Some(contract) = ContractRepository::new(state.pool())
        .find_latest_by_email(email.trim())
        .await?
    else {
        return Err(ApiError::not_found("Contract not found."));
    };
    let Some(generated_at) = contract.document_generated_at else {
        return Err(ApiError::not_found("Contract document has not been generated."));
    };
    attachment(&contract, generated_at)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cfac_core::ContractId;

    use super::*;

    fn request() -> SaveContractRequest {
        SaveContractRequest {
            user_name: Some("Jordan Reyes".to_string()),
            email: Some("jordan@example.com".to_string()),
            accepted_terms: Some(true),
            ..SaveContractRequest::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let now = Utc::now();
        let new = request().validate(now).unwrap();
        assert_eq!(new.contract_version, "v1.0");
        assert_eq!(new.registration_date, now);
        assert!(new.signature_data.is_none());
    }

    #[test]
    fn test_required_fields_and_acceptance() {
        let missing = SaveContractRequest {
            email: None,
            ..request()
        };
        assert_eq!(
            missing.validate(Utc::now()).unwrap_err().message,
            "user_name and email are required"
        );

        let unaccepted = SaveContractRequest {
            accepted_terms: Some(false),
            ..request()
        };
        assert_eq!(
            unaccepted.validate(Utc::now()).unwrap_err().message,
            "Contract must be accepted"
        );
    }

    #[test]
    fn test_registration_date_parsed() {
        let new = SaveContractRequest {
            registration_date: Some("2026-03-04T10:30:00.123456".to_string()),
            ..request()
        }
        .validate(Utc::now())
        .unwrap();
        assert_eq!(new.registration_date.format("%Y-%m-%d %H:%M").to_string(), "2026-03-04 10:30");
    }

    #[test]
    fn test_document_renders_signer() {
        let now = Utc::now();
        let contract = Contract {
            id: ContractId::new(1),
            user_name: "Jordan Reyes".to_string(),
            email: "jordan@example.com".to_string(),
            phone_number: None,
            accepted_terms: true,
            signature_data: None,
            contract_version: "v1.0".to_string(),
            registration_date: now,
            document_generated_at: Some(now),
            created_at: now,
        };
        let html = ContractDocument {
            contract: &contract,
            generated_at: now,
        }
        .render()
        .unwrap();
        assert!(html.contains("INDEPENDENT CONTRACTOR AGREEMENT"));
        assert!(html.contains("Jordan Reyes"));
        assert!(html.contains("No signature provided."));
    }
}
