//! Session-related types.
//!
//! Types stored in the session: the signed-in user, the shopping cart, and
//! one-shot flash messages shown on the next rendered page.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cfac_core::{Role, ServiceId, UserId, VehicleSize};

use super::User;

/// Session-stored user identity.
///
/// Enough to authorize a request without a database round trip. Handlers
/// that need the full record load it by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub role: Role,
    pub name: String,
    pub email: Option<String>,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            name: user.display_name().to_string(),
            email: user.email.as_ref().map(|e| e.as_str().to_string()),
        }
    }
}

/// A service waiting in the customer's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub service_id: ServiceId,
    pub service_key: String,
    pub service_name: String,
    pub vehicle_size: VehicleSize,
    /// Date the customer picked on the service page, if any.
    pub service_date: Option<String>,
    /// `None` when the service has no price for this vehicle size.
    pub price: Option<Decimal>,
    pub completion_time: String,
}

/// Flash message severity, matching the CSS alert classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Info,
    Warning,
    Danger,
}

impl FlashLevel {
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

/// A message to show once on the next page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the customer's cart (`Vec<CartItem>`).
    pub const CART: &str = "cart";

    /// Key for pending flash messages (`Vec<Flash>`).
    pub const FLASHES: &str = "flashes";
}
