//! Login, registration, password reset, and logout.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use cfac_core::{Email, Role};

use crate::db::UserRepository;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{Page, clear_current_user, flash_redirect, push_flash, set_current_user};
use crate::models::session::FlashLevel;
use crate::models::user::NewUser;
use crate::models::{CurrentUser, User};
use crate::routes::account::{DUPLICATE_CONTACT, ProfileForm};
use crate::services::auth::MIN_PASSWORD_LENGTH;
use crate::services::{AuthError, AuthService, EmailError};
use crate::state::AppState;

// =============================================================================
// Templates
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: Page,
    pub error: Option<String>,
    pub next: String,
    pub identifier: String,
}

/// Username/password form shared by the admin and field-staff logins.
#[derive(Template, WebTemplate)]
#[template(path = "auth/employee_login.html")]
pub struct EmployeeLoginTemplate {
    pub page: Page,
    pub error: Option<String>,
    pub heading: &'static str,
    pub action: &'static str,
    pub next: String,
    pub username: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub page: Page,
    pub error: Option<String>,
    pub form: ProfileForm,
    pub sms_opt_in: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_request.html")]
pub struct ResetRequestTemplate {
    pub page: Page,
    pub error: Option<String>,
    pub email: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_password.html")]
pub struct ResetPasswordTemplate {
    pub page: Page,
    pub error: Option<String>,
    pub token: String,
}

// =============================================================================
// Form and Query Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmployeeLoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(flatten)]
    pub profile: ProfileForm,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    pub sms_opt_in: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequestForm {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// A post-login redirect target, accepted only when it stays on this site.
fn safe_next(next: Option<&str>) -> Option<&str> {
    next.map(str::trim).filter(|n| {
        n.starts_with('/') && !n.starts_with("//") && !n.starts_with("/\\")
    })
}

/// Sign the user in and record them for error reports.
async fn start_session(session: &Session, user: &User) -> Result<()> {
    set_current_user(session, &CurrentUser::from(user)).await?;
    set_sentry_user(&user.id, user.email.as_ref().map(Email::as_str));
    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
    Ok(())
}

/// Email `user` a one-hour password reset link.
///
/// # Errors
///
/// Returns an error when the user has no email, the token cannot be signed,
/// or the email fails to send.
pub(crate) async fn send_reset_link(state: &AppState, user: &User) -> Result<()> {
    let to = user
        .email
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("User has no email address".to_string()))?;
    let token = state
        .reset_tokens()
        .issue(user.id, chrono::Utc::now().timestamp())?;
    let reset_url = format!("{}/reset_password/{token}", state.config().base_url);

    state
        .email()
        .send_password_reset(to.as_str(), user.display_name(), &reset_url)
        .await
        .map_err(|e: EmailError| AppError::Internal(e.to_string()))
}

// =============================================================================
// Customer Login
// =============================================================================

pub async fn login_page(page: Page, Query(query): Query<NextQuery>) -> impl IntoResponse {
    LoginTemplate {
        page,
        error: None,
        next: safe_next(query.next.as_deref()).unwrap_or_default().to_string(),
        identifier: String::new(),
    }
}

pub async fn login_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let next = safe_next(form.next.as_deref()).map(str::to_string);

    match AuthService::new(state.pool())
        .login_customer(&form.identifier, &form.password)
        .await
    {
        Ok(user) => {
            start_session(&session, &user).await?;
            Ok(flash_redirect(
                &session,
                FlashLevel::Success,
                "Logged in successfully as customer.",
                next.as_deref().unwrap_or("/"),
            )
            .await)
        }
        Err(AuthError::InvalidCredentials) => {
            tracing::warn!("Failed customer login");
            Ok(LoginTemplate {
                page: Page::load(&session).await,
                error: Some("Invalid credentials. Please try again.".to_string()),
                next: next.unwrap_or_default(),
                identifier: form.identifier,
            }
            .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Employee Logins
// =============================================================================

/// Which employees an employee login page admits and where it sends them.
#[derive(Debug, Clone, Copy)]
struct EmployeeDesk {
    heading: &'static str,
    action: &'static str,
    roles: &'static [Role],
}

const ADMIN_DESK: EmployeeDesk = EmployeeDesk {
    heading: "Admin Login",
    action: "/employee_login",
    roles: &[Role::Admin],
};

const STAFF_DESK: EmployeeDesk = EmployeeDesk {
    heading: "Technician & Sales Login",
    action: "/staff_login",
    roles: &[Role::Tech, Role::Sales],
};

const fn landing_page(role: Role) -> &'static str {
    match role {
        Role::Admin => "/admin/main",
        Role::Tech => "/tech/main",
        Role::Sales => "/payments/collecting_payments",
        Role::Customer => "/",
    }
}

fn employee_form(desk: EmployeeDesk, page: Page, next: Option<&str>) -> EmployeeLoginTemplate {
    EmployeeLoginTemplate {
        page,
        error: None,
        heading: desk.heading,
        action: desk.action,
        next: safe_next(next).unwrap_or_default().to_string(),
        username: String::new(),
    }
}

async fn employee_login(
    desk: EmployeeDesk,
    state: &AppState,
    session: &Session,
    form: EmployeeLoginForm,
) -> Result<Response> {
    let next = safe_next(form.next.as_deref()).map(str::to_string);
    let result = AuthService::new(state.pool())
        .login_employee(form.username.trim(), &form.password, desk.roles)
        .await;

    let error = match result {
        Ok(user) => {
            start_session(session, &user).await?;
            let to = next.as_deref().unwrap_or_else(|| landing_page(user.role));
            return Ok(flash_redirect(
                session,
                FlashLevel::Success,
                format!("Logged in successfully as {}.", user.role),
                to,
            )
            .await);
        }
        Err(AuthError::UserNotFound | AuthError::WrongRole) => "Invalid username or user type.",
        Err(AuthError::InvalidPassword) => "Invalid password.",
        Err(e) => return Err(e.into()),
    };

    tracing::warn!(desk = desk.action, "Failed employee login");
    Ok(EmployeeLoginTemplate {
        page: Page::load(session).await,
        error: Some(error.to_string()),
        heading: desk.heading,
        action: desk.action,
        next: next.unwrap_or_default(),
        username: form.username,
    }
    .into_response())
}

pub async fn employee_login_page(page: Page, Query(query): Query<NextQuery>) -> impl IntoResponse {
    employee_form(ADMIN_DESK, page, query.next.as_deref())
}

pub async fn employee_login_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<EmployeeLoginForm>,
) -> Result<Response> {
    employee_login(ADMIN_DESK, &state, &session, form).await
}

pub async fn staff_login_page(page: Page, Query(query): Query<NextQuery>) -> impl IntoResponse {
    employee_form(STAFF_DESK, page, query.next.as_deref())
}

pub async fn staff_login_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<EmployeeLoginForm>,
) -> Result<Response> {
    employee_login(STAFF_DESK, &state, &session, form).await
}

// =============================================================================
// Registration
// =============================================================================

pub async fn register_page(page: Page) -> impl IntoResponse {
    RegisterTemplate {
        page,
        error: None,
        form: ProfileForm::default(),
        sms_opt_in: false,
    }
}

pub async fn register_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let sms_opt_in = form.sms_opt_in.is_some();
    let profile = match form.profile.validate(true) {
        Ok(profile) => profile,
        Err(message) => {
            return Ok(register_error(&session, form.profile, sms_opt_in, message).await);
        }
    };

    let new = NewUser {
        email: profile.email,
        username: None,
        phone_number: profile.phone_number,
        role: Role::Customer,
        name: profile.name,
        address: profile.address,
        sms_opt_in,
    };

    let result = AuthService::new(state.pool())
        .register(&new, &form.password, &form.confirm_password, MIN_PASSWORD_LENGTH)
        .await;

    let message = match result {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "Customer registered");
            start_session(&session, &user).await?;
            return Ok(flash_redirect(
                &session,
                FlashLevel::Success,
                "Account created successfully!",
                "/",
            )
            .await);
        }
        Err(AuthError::UserAlreadyExists) => DUPLICATE_CONTACT.to_string(),
        Err(AuthError::PasswordMismatch) => "Passwords must match.".to_string(),
        Err(AuthError::WeakPassword(_)) => {
            format!("Password must be at least {MIN_PASSWORD_LENGTH} characters.")
        }
        Err(e) => return Err(e.into()),
    };

    Ok(register_error(&session, form.profile, sms_opt_in, message).await)
}

async fn register_error(
    session: &Session,
    form: ProfileForm,
    sms_opt_in: bool,
    message: String,
) -> Response {
    RegisterTemplate {
        page: Page::load(session).await,
        error: Some(message),
        form,
        sms_opt_in,
    }
    .into_response()
}

// =============================================================================
// Password Reset
// =============================================================================

pub async fn reset_request_page(page: Page) -> impl IntoResponse {
    ResetRequestTemplate {
        page,
        error: None,
        email: String::new(),
    }
}

pub async fn reset_request_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ResetRequestForm>,
) -> Result<Response> {
    let user = match Email::parse(&form.email) {
        Ok(email) => UserRepository::new(state.pool())
            .get_by_email(&email)
            .await?
            .filter(|u| u.role == Role::Customer),
        Err(_) => None,
    };

    let Some(user) = user else {
        return Ok(ResetRequestTemplate {
            page: Page::load(&session).await,
            error: Some("Email not found.".to_string()),
            email: form.email,
        }
        .into_response());
    };

    if let Err(e) = send_reset_link(&state, &user).await {
        tracing::error!(user_id = %user.id, error = %e, "Failed to send password reset email");
        return Err(e);
    }

    Ok(flash_redirect(
        &session,
        FlashLevel::Info,
        "A password reset link has been sent to your email.",
        "/login",
    )
    .await)
}

pub async fn reset_password_page(
    State(state): State<AppState>,
    session: Session,
    page: Page,
    Path(token): Path<String>,
) -> Result<Response> {
    match state
        .reset_tokens()
        .verify(&token, chrono::Utc::now().timestamp())
    {
        Ok(_) => Ok(ResetPasswordTemplate {
            page,
            error: None,
            token,
        }
        .into_response()),
        Err(e) => Ok(reset_link_rejected(&session, &e).await),
    }
}

pub async fn reset_password_submit(
    State(state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response> {
    let user_id = match state
        .reset_tokens()
        .verify(&token, chrono::Utc::now().timestamp())
    {
        Ok(id) => id,
        Err(e) => return Ok(reset_link_rejected(&session, &e).await),
    };

    let message = match AuthService::new(state.pool())
        .set_password(user_id, &form.password, &form.confirm_password)
        .await
    {
        Ok(()) => {
            tracing::info!(user_id = %user_id, "Password reset");
            return Ok(flash_redirect(
                &session,
                FlashLevel::Success,
                "Your password has been updated!",
                "/login",
            )
            .await);
        }
        Err(AuthError::PasswordMismatch) => "Passwords must match.".to_string(),
        Err(AuthError::WeakPassword(_)) => {
            format!("Password must be at least {MIN_PASSWORD_LENGTH} characters.")
        }
        Err(AuthError::UserNotFound) => {
            return Ok(reset_link_rejected(&session, &AuthError::InvalidResetToken).await);
        }
        Err(e) => return Err(e.into()),
    };

    Ok(ResetPasswordTemplate {
        page: Page::load(&session).await,
        error: Some(message),
        token,
    }
    .into_response())
}

async fn reset_link_rejected(session: &Session, error: &AuthError) -> Response {
    let message = match error {
        AuthError::ExpiredResetToken => "The password reset link has expired.",
        _ => "Invalid reset link.",
    };
    tracing::warn!(error = %error, "Rejected password reset link");
    flash_redirect(session, FlashLevel::Warning, message, "/reset_password_request").await
}

// =============================================================================
// Logout
// =============================================================================

pub async fn logout(session: Session) -> Result<Response> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    push_flash(&session, FlashLevel::Info, "You have been logged out.").await?;
    Ok(Redirect::to("/").into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next_accepts_local_paths_only() {
        assert_eq!(safe_next(Some("/customer/cart")), Some("/customer/cart"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn test_landing_pages() {
        assert_eq!(landing_page(Role::Admin), "/admin/main");
        assert_eq!(landing_page(Role::Tech), "/tech/main");
        assert_eq!(landing_page(Role::Sales), "/payments/collecting_payments");
    }

    #[test]
    fn test_desks_admit_expected_roles() {
        assert_eq!(ADMIN_DESK.roles, &[Role::Admin]);
        assert!(STAFF_DESK.roles.contains(&Role::Tech));
        assert!(STAFF_DESK.roles.contains(&Role::Sales));
        assert!(!STAFF_DESK.roles.contains(&Role::Admin));
    }
}
