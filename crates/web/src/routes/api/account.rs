//! Field-app account settings and password reset.

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};

use cfac_core::{Address, Email, PhoneNumber};

use crate::db::UserRepository;
use crate::error::{ApiError, ApiResult};
use crate::middleware::BearerUser;
use crate::models::User;
use crate::models::user::ProfileUpdate;
use crate::routes::auth::send_reset_link;
use crate::state::AppState;

const RESET_SENT: &str = "If an account exists for this email, a reset link has been sent.";

#[derive(Debug, Default, Deserialize)]
pub struct AddressUpdate {
    #[serde(default)]
    pub street_address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub zip_code: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<AddressUpdate>,
}

impl AccountUpdate {
    /// Merge the supplied fields into the user's current profile.
    fn apply(self, user: &User) -> Result<ProfileUpdate, ApiError> {
        let name = match self.name {
            Some(name) => {
                let name = name.trim().to_string();
                if !(2..=100).contains(&name.chars().count()) {
                    return Err(ApiError::bad_request("Name must be between 2 and 100 characters."));
                }
                name
            }
            None => user.name.clone(),
        };

        let email = match self.email.as_deref().map(str::trim) {
            Some("") => None,
            Some(email) => Some(
                Email::parse(email).map_err(|_| ApiError::bad_request("Invalid email address."))?,
            ),
            None => user.email.clone(),
        };

        let phone_number = match self.phone_number.as_deref().map(str::trim) {
            Some("") => None,
            Some(phone) => Some(
                PhoneNumber::parse(phone).map_err(|_| ApiError::bad_request("Invalid phone number."))?,
            ),
            None => user.phone_number.clone(),
        };

        let address = match self.address {
            Some(a) => Address {
                street: a.street_address.trim().to_string(),
                unit_apt: user.address.unit_apt.clone(),
                city: a.city.trim().to_string(),
                country: Some(a.country.trim())
                    .filter(|c| !c.is_empty())
                    .unwrap_or(Address::DEFAULT_COUNTRY)
                    .to_string(),
                zip_code: a.zip_code.trim().to_string(),
            },
            None => user.address.clone(),
        };

        Ok(ProfileUpdate {
            name,
            email,
            phone_number,
            address,
        })
    }
}

fn unchanged(user: &User, update: &ProfileUpdate) -> bool {
    user.name == update.name
        && user.email == update.email
        && user.phone_number == update.phone_number
        && user.address == update.address
}

pub async fn get_account(BearerUser(user): BearerUser) -> Json<Value> {
    Json(json!({
        "name": user.name,
        "email": user.email_str(),
        "phone_number": user.phone_str(),
        "address": user.address,
    }))
}

pub async fn update_account(
    State(state): State<AppState>,
    BearerUser(user): BearerUser,
    Json(request): Json<AccountUpdate>,
) -> ApiResult<Json<Value>> {
    let update = request.apply(&user)?;
    if unchanged(&user, &update) {
        return Ok(Json(json!({ "message": "No changes were made." })));
    }

    let users = UserRepository::new(state.pool());
    if users
        .contact_taken(update.email.as_ref(), update.phone_number.as_ref(), Some(user.id))
        .await?
    {
        return Err(ApiError::new(
            axum::http::StatusCode::CONFLICT,
            "A user with the provided email or phone number already exists.",
        ));
    }

    users.update_profile(user.id, &update).await?;
    tracing::info!(user_id = %user.id, "Account updated from field app");
    Ok(Json(json!({ "message": "Account settings updated successfully." })))
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: Option<String>,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> ApiResult<Json<Value>> {
    let Some(email) = request.email.filter(|e| !e.trim().is_empty()) else {
        return Err(ApiError::bad_request("Email is required"));
    };

    if let Ok(email) = Email::parse(&email)
        && let Some(user) = UserRepository::new(state.pool()).get_by_email(&email).await?
        && let Err(e) = send_reset_link(&state, &user).await
    {
        tracing::error!(user_id = %user.id, error = %e, "Failed to send API password reset");
    }

    Ok(Json(json!({ "message": RESET_SENT })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cfac_core::Role;

    use super::*;
    use crate::models::user::tests::user;

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let current = user(Role::Sales);
        let update = AccountUpdate {
            email: Some(" New@Example.COM ".to_string()),
            ..AccountUpdate::default()
        }
        .apply(&current)
        .unwrap();
        assert_eq!(update.email.unwrap().as_str(), "new@example.com");
        assert_eq!(update.name, current.name);
        assert_eq!(update.phone_number, current.phone_number);
    }

    #[test]
    fn test_address_update_keeps_unit() {
        let mut current = user(Role::Tech);
        current.address.unit_apt = "4B".to_string();
        let update = AccountUpdate {
            address: Some(AddressUpdate {
                street_address: "9 Oak Lane".to_string(),
                city: "Austin".to_string(),
                country: "United States".to_string(),
                zip_code: "78702".to_string(),
            }),
            ..AccountUpdate::default()
        }
        .apply(&current)
        .unwrap();
        assert_eq!(update.address.street, "9 Oak Lane");
        assert_eq!(update.address.unit_apt, "4B");
    }

    #[test]
    fn test_invalid_fields_rejected() {
        let current = user(Role::Tech);
        let err = AccountUpdate {
            email: Some("not-an-email".to_string()),
            ..AccountUpdate::default()
        }
        .apply(&current)
        .unwrap_err();
        assert_eq!(err.message, "Invalid email address.");

        let unchanged_update = AccountUpdate::default().apply(&current).unwrap();
        assert!(unchanged(&current, &unchanged_update));
    }
}
