//! Account settings for any signed-in user.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use cfac_core::{Address, Email, PhoneNumber};

use crate::db::{RepositoryError, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::{Page, RequireUser, flash_redirect};
use crate::models::CurrentUser;
use crate::models::session::FlashLevel;
use crate::models::user::{ProfileUpdate, User};
use crate::state::AppState;

/// Contact and address fields shared by registration and account settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub street_address: String,
    #[serde(default)]
    pub unit_apt: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub zip_code: String,
}

impl ProfileForm {
    /// Prefill from a stored user.
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email_str().to_string(),
            phone_number: user.phone_str().to_string(),
            street_address: user.address.street.clone(),
            unit_apt: user.address.unit_apt.clone(),
            city: user.address.city.clone(),
            country: user.address.country.clone(),
            zip_code: user.address.zip_code.clone(),
        }
    }

    /// Validate the fields, returning the first problem as a message.
    ///
    /// Email is optional only when `email_required` is false; a blank phone
    /// number is always allowed.
    ///
    /// # Errors
    ///
    /// Returns a user-facing message describing the first invalid field.
    pub fn validate(&self, email_required: bool) -> std::result::Result<ProfileUpdate, String> {
        let name = self.name.trim();
        if !(2..=100).contains(&name.chars().count()) {
            return Err("Name must be between 2 and 100 characters.".to_string());
        }

        let email = if self.email.trim().is_empty() && !email_required {
            None
        } else {
            Some(Email::parse(&self.email).map_err(|_| "Invalid email address.".to_string())?)
        };

        let phone_number = if self.phone_number.trim().is_empty() {
            None
        } else {
            Some(
                PhoneNumber::parse(&self.phone_number)
                    .map_err(|_| "Invalid phone number.".to_string())?,
            )
        };

        let country = self.country.trim();
        let address = Address {
            street: self.street_address.trim().to_string(),
            unit_apt: self.unit_apt.trim().to_string(),
            city: self.city.trim().to_string(),
            country: if country.is_empty() {
                Address::DEFAULT_COUNTRY.to_string()
            } else {
                country.to_string()
            },
            zip_code: self.zip_code.trim().to_string(),
        };
        address.validate().map_err(|e| capitalize(&e.to_string()))?;

        Ok(ProfileUpdate {
            name: name.to_string(),
            email,
            phone_number,
            address,
        })
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        format!("{}{}.", first.to_uppercase(), chars.as_str())
    })
}

#[derive(Template, WebTemplate)]
#[template(path = "account/settings.html")]
pub struct AccountSettingsTemplate {
    pub page: Page,
    pub form: ProfileForm,
    pub email_required: bool,
    pub error: Option<String>,
}

pub(crate) const DUPLICATE_CONTACT: &str =
    "A user with the provided email or phone number already exists.";

async fn render_error(
    session: &Session,
    form: ProfileForm,
    email_required: bool,
    message: impl Into<String>,
) -> Response {
    AccountSettingsTemplate {
        page: Page::load(session).await,
        form,
        email_required,
        error: Some(message.into()),
    }
    .into_response()
}

async fn load_user(state: &AppState, current: &CurrentUser) -> Result<User> {
    UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
}

pub async fn settings_page(
    State(state): State<AppState>,
    page: Page,
    RequireUser(current): RequireUser,
) -> Result<impl IntoResponse> {
    let user = load_user(&state, &current).await?;
    Ok(AccountSettingsTemplate {
        page,
        form: ProfileForm::from_user(&user),
        email_required: !user.role.is_staff(),
        error: None,
    })
}

pub async fn update_settings(
    State(state): State<AppState>,
    session: Session,
    RequireUser(current): RequireUser,
    Form(form): Form<ProfileForm>,
) -> Result<Response> {
    let user = load_user(&state, &current).await?;
    let email_required = !user.role.is_staff();

    let mut update = match form.validate(email_required) {
        Ok(update) => update,
        Err(message) => return Ok(render_error(&session, form, email_required, message).await),
    };
    // Employees created by username keep their stored email when the field is blank
    if update.email.is_none() {
        update.email.clone_from(&user.email);
    }

    let users = UserRepository::new(state.pool());
    if users
        .contact_taken(update.email.as_ref(), update.phone_number.as_ref(), Some(user.id))
        .await?
    {
        return Ok(render_error(&session, form, email_required, DUPLICATE_CONTACT).await);
    }

    match users.update_profile(user.id, &update).await {
        Ok(updated) => {
            tracing::info!(user_id = %updated.id, "Account settings updated");
            session
                .insert(
                    crate::models::session::keys::CURRENT_USER,
                    CurrentUser::from(&updated),
                )
                .await?;
            Ok(flash_redirect(
                &session,
                FlashLevel::Success,
                "Account settings updated successfully.",
                "/account_settings",
            )
            .await)
        }
        Err(RepositoryError::Conflict(_)) => {
            Ok(render_error(&session, form, email_required, DUPLICATE_CONTACT).await)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid() -> ProfileForm {
        ProfileForm {
            name: "Pat Lee".to_string(),
            email: "Pat@Example.com".to_string(),
            phone_number: "(512) 555-0100".to_string(),
            street_address: "12 Elm Street".to_string(),
            unit_apt: String::new(),
            city: "Austin".to_string(),
            country: String::new(),
            zip_code: "78701".to_string(),
        }
    }

    #[test]
    fn test_validate_normalises_fields() {
        let update = valid().validate(true).unwrap();
        assert_eq!(update.email.unwrap().as_str(), "pat@example.com");
        assert_eq!(update.phone_number.unwrap().as_str(), "5125550100");
        assert_eq!(update.address.country, "United States");
    }

    #[test]
    fn test_validate_reports_first_problem() {
        let mut form = valid();
        form.name = "P".to_string();
        assert_eq!(
            form.validate(true).unwrap_err(),
            "Name must be between 2 and 100 characters."
        );

        let mut form = valid();
        form.zip_code = "7870".to_string();
        assert_eq!(
            form.validate(true).unwrap_err(),
            "Zip code must be 12345 or 12345-6789."
        );

        let mut form = valid();
        form.street_address = "1 A".to_string();
        assert_eq!(
            form.validate(true).unwrap_err(),
            "Street address must be between 5 and 200 characters."
        );
    }

    #[test]
    fn test_email_optional_for_employees() {
        let mut form = valid();
        form.email = String::new();
        assert!(form.validate(true).is_err());
        assert!(form.validate(false).unwrap().email.is_none());
    }
}
