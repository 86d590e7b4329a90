//! One-shot messages carried in the session across a redirect.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::session::{Flash, FlashLevel, keys};
use crate::models::CurrentUser;

/// Queue a message for the next rendered page.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn push_flash(
    session: &Session,
    level: FlashLevel,
    message: impl Into<String>,
) -> Result<(), tower_sessions::session::Error> {
    let mut flashes: Vec<Flash> = session.get(keys::FLASHES).await?.unwrap_or_default();
    flashes.push(Flash {
        level,
        message: message.into(),
    });
    session.insert(keys::FLASHES, flashes).await
}

/// Queue a message and redirect.
///
/// A session failure is logged; the redirect still happens.
pub async fn flash_redirect(
    session: &Session,
    level: FlashLevel,
    message: impl Into<String>,
    to: &str,
) -> Response {
    if let Err(e) = push_flash(session, level, message).await {
        tracing::warn!(error = %e, "Failed to store flash message");
    }
    Redirect::to(to).into_response()
}

/// Remove and return the queued messages.
pub async fn take_flashes(session: &Session) -> Vec<Flash> {
    session
        .remove::<Vec<Flash>>(keys::FLASHES)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// What the base layout needs on every rendered page.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub user: Option<CurrentUser>,
    pub flashes: Vec<Flash>,
}

impl Page {
    /// Read the signed-in user and drain pending flashes.
    pub async fn load(session: &Session) -> Self {
        let user = session
            .get::<CurrentUser>(keys::CURRENT_USER)
            .await
            .ok()
            .flatten();
        Self {
            user,
            flashes: take_flashes(session).await,
        }
    }

    /// Whether a user with this role name is signed in, for nav links.
    #[must_use]
    pub fn is_role(&self, role: &str) -> bool {
        self.user.as_ref().is_some_and(|u| u.role.as_str() == role)
    }
}

impl<S> FromRequestParts<S> for Page
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(match parts.extensions.get::<Session>() {
            Some(session) => Self::load(session).await,
            None => Self::default(),
        })
    }
}
