//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cfac_core::{Address, Email, PhoneNumber, Role, UserId};

/// A customer or employee account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    /// Optional for employees created by username only.
    pub email: Option<Email>,
    pub username: Option<String>,
    pub phone_number: Option<PhoneNumber>,
    pub role: Role,
    pub name: String,
    pub address: Address,
    pub sms_opt_in: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Name for greetings and staff listings, falling back to login identifiers.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if !self.name.trim().is_empty() {
            return &self.name;
        }
        self.email
            .as_ref()
            .map(Email::as_str)
            .or(self.username.as_deref())
            .unwrap_or("User")
    }

    /// Email as a plain string, for templates.
    #[must_use]
    pub fn email_str(&self) -> &str {
        self.email.as_ref().map_or("", Email::as_str)
    }

    /// Phone digits as a plain string, for templates.
    #[must_use]
    pub fn phone_str(&self) -> &str {
        self.phone_number.as_ref().map_or("", PhoneNumber::as_str)
    }

    /// US number to text, if the user opted in and has one.
    #[must_use]
    pub fn sms_number(&self) -> Option<String> {
        if !self.sms_opt_in {
            return None;
        }
        self.phone_number.as_ref()?.to_e164_us().ok()
    }
}

/// Fields for creating an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Option<Email>,
    pub username: Option<String>,
    pub phone_number: Option<PhoneNumber>,
    pub role: Role,
    pub name: String,
    pub address: Address,
    pub sms_opt_in: bool,
}

/// Fields a user can change on their account page or through the API.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: Option<Email>,
    pub phone_number: Option<PhoneNumber>,
    pub address: Address,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub fn user(role: Role) -> User {
        User {
            id: UserId::new(1),
            email: Some(Email::parse("pat@example.com").unwrap()),
            username: None,
            phone_number: Some(PhoneNumber::parse("5125550100").unwrap()),
            role,
            name: "Pat Lee".to_string(),
            address: Address::default(),
            sms_opt_in: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_name_falls_back() {
        let mut u = user(Role::Tech);
        assert_eq!(u.display_name(), "Pat Lee");
        u.name = " ".to_string();
        assert_eq!(u.display_name(), "pat@example.com");
        u.email = None;
        u.username = Some("pat".to_string());
        assert_eq!(u.display_name(), "pat");
    }

    #[test]
    fn test_sms_number_requires_opt_in() {
        let mut u = user(Role::Customer);
        assert_eq!(u.sms_number().as_deref(), Some("+15125550100"));
        u.sms_opt_in = false;
        assert_eq!(u.sms_number(), None);
    }
}
