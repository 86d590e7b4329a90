//! Authentication extractors.
//!
//! Session extractors guard the HTML pages by role. Unauthenticated requests
//! are sent to the matching login page with a `next` parameter; signed-in
//! users with the wrong role are sent home with a message. Requests under
//! `/api/` get bare 401/403 JSON responses instead.
//!
//! [`BearerUser`] authenticates the field-app API with a JWT.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use tower_sessions::Session;

use cfac_core::Role;

use super::flash::push_flash;
use crate::db::UserRepository;
use crate::error::ApiError;
use crate::models::session::{FlashLevel, keys};
use crate::models::{CurrentUser, User};
use crate::state::AppState;

/// Customer login page.
pub const CUSTOMER_LOGIN_PATH: &str = "/login";
/// Admin login page.
pub const ADMIN_LOGIN_PATH: &str = "/employee_login";
/// Technician and salesperson login page.
pub const STAFF_LOGIN_PATH: &str = "/staff_login";

/// Error returned when a request lacks a signed-in user of the right role.
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to a login page (for HTML requests).
    RedirectToLogin { login: &'static str, next: String },
    /// Redirect home after queueing a permission message.
    RedirectHome,
    /// 401 (for API requests).
    Unauthorized,
    /// 403 (for API requests).
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin { login, next } => Redirect::to(&format!(
                "{login}?next={}",
                urlencoding::encode(&next)
            ))
            .into_response(),
            Self::RedirectHome => Redirect::to("/").into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Authentication required" })),
            )
                .into_response(),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "You do not have permission to access this resource" })),
            )
                .into_response(),
        }
    }
}

/// Which roles a guard admits and where it sends anonymous visitors.
struct Guard {
    roles: &'static [Role],
    login: &'static str,
    prompt: &'static str,
}

async fn authorize(parts: &Parts, guard: &Guard) -> Result<CurrentUser, AuthRejection> {
    let is_api = parts.uri.path().starts_with("/api/");

    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AuthRejection::Unauthorized)?;

    let user: Option<CurrentUser> = session.get(keys::CURRENT_USER).await.ok().flatten();

    let Some(user) = user else {
        if is_api {
            return Err(AuthRejection::Unauthorized);
        }
        let _ = push_flash(session, FlashLevel::Warning, guard.prompt).await;
        let next = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);
        return Err(AuthRejection::RedirectToLogin {
            login: guard.login,
            next,
        });
    };

    if !guard.roles.is_empty() && !guard.roles.contains(&user.role) {
        tracing::warn!(user_id = %user.id, role = %user.role, path = %parts.uri.path(), "Role not permitted");
        if is_api {
            return Err(AuthRejection::Forbidden);
        }
        let _ = push_flash(
            session,
            FlashLevel::Danger,
            "You do not have permission to access this page.",
        )
        .await;
        return Err(AuthRejection::RedirectHome);
    }

    Ok(user)
}

macro_rules! role_extractor {
    ($(#[$meta:meta])* $name:ident, [$($role:ident),*], $login:expr, $prompt:literal) => {
        $(#[$meta])*
        pub struct $name(pub CurrentUser);

        impl<S> FromRequestParts<S> for $name
        where
            S: Send + Sync,
        {
            type Rejection = AuthRejection;

            async fn from_request_parts(
                parts: &mut Parts,
                _state: &S,
            ) -> Result<Self, Self::Rejection> {
                const GUARD: Guard = Guard {
                    roles: &[$(Role::$role),*],
                    login: $login,
                    prompt: $prompt,
                };
                authorize(parts, &GUARD).await.map(Self)
            }
        }
    };
}

role_extractor!(
    /// Any signed-in user.
    ///
    /// ```rust,ignore
    /// async fn handler(RequireUser(user): RequireUser) -> impl IntoResponse {
    ///     format!("Hello, {}!", user.name)
    /// }
    /// ```
    RequireUser,
    [],
    CUSTOMER_LOGIN_PATH,
    "Please log in to access this page."
);

role_extractor!(
    /// A signed-in customer.
    RequireCustomer,
    [Customer],
    CUSTOMER_LOGIN_PATH,
    "Please log in as a customer to access this page."
);

role_extractor!(
    /// A signed-in admin.
    RequireAdmin,
    [Admin],
    ADMIN_LOGIN_PATH,
    "Please log in as an admin to access this page."
);

role_extractor!(
    /// A signed-in technician.
    RequireTech,
    [Tech],
    STAFF_LOGIN_PATH,
    "Please log in as a tech to access this page."
);

role_extractor!(
    /// A signed-in technician or salesperson.
    RequireStaff,
    [Tech, Sales],
    STAFF_LOGIN_PATH,
    "Please log in as a tech or sales user to access this page."
);

/// Extractor that optionally gets the current user.
pub struct OptionalUser(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentUser>(keys::CURRENT_USER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(user))
    }
}

/// Helper to set the current user in the session.
///
/// Cycles the session id first so a pre-login id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(keys::CURRENT_USER, user).await
}

/// Helper to clear the session on logout.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

/// Extract the token from an `Authorization: Bearer <token>` header.
#[must_use]
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The field-app user identified by a valid bearer token.
///
/// Missing or malformed headers and bad tokens get 401; a valid token for a
/// deleted user gets 404 "Invalid token or user not found.".
pub struct BearerUser(pub User);

impl FromRequestParts<AppState> for BearerUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::unauthorized("Authorization header missing or invalid."))?;
        let user_id = state.jwt().verify(token)?;
        let user = UserRepository::new(state.pool())
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Invalid token or user not found."))?;
        Ok(Self(user))
    }
}

/// Like [`BearerUser`], but anonymous requests pass through.
///
/// A header that is present must still carry a valid token.
pub struct OptionalBearerUser(pub Option<User>);

impl FromRequestParts<AppState> for OptionalBearerUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(Self(None));
        }
        BearerUser::from_request_parts(parts, state)
            .await
            .map(|BearerUser(user)| Self(Some(user)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(uri: &str, authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&parts("/api/account", Some("Bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer_token(&parts("/api/account", Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts("/api/account", Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts("/api/account", None)), None);
    }

    #[tokio::test]
    async fn test_missing_session_is_unauthorized() {
        let mut p = parts("/admin/main", None);
        let result = RequireAdmin::from_request_parts(&mut p, &()).await;
        assert!(matches!(result, Err(AuthRejection::Unauthorized)));
    }

    #[test]
    fn test_login_redirect_carries_next() {
        let response = AuthRejection::RedirectToLogin {
            login: ADMIN_LOGIN_PATH,
            next: "/admin/view_order/3?x=1".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()["location"],
            "/employee_login?next=%2Fadmin%2Fview_order%2F3%3Fx%3D1"
        );
    }
}
