//! Authentication service.
//!
//! Password logins for customers (email or phone) and employees (username
//! or email), registration, and password changes. Passwords are hashed with
//! Argon2id.

mod error;
mod reset;

pub use error::AuthError;
pub use reset::{RESET_TOKEN_MAX_AGE_SECS, ResetTokens};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use cfac_core::{Email, PhoneNumber, Role, UserId};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::user::{NewUser, User};

/// Minimum password length for customer accounts.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Minimum password length for employee accounts created from the CLI.
pub const MIN_EMPLOYEE_PASSWORD_LENGTH: usize = 8;

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Log a customer in by email or phone number.
    ///
    /// Anything containing `@` is treated as an email, everything else as a
    /// phone number (digits only).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for unknown users, non-customer
    /// accounts, and wrong passwords alike.
    pub async fn login_customer(&self, identifier: &str, password: &str) -> Result<User, AuthError> {
        let identifier = identifier.trim();
        let user = if identifier.contains('@') {
            let email = Email::parse(identifier).map_err(|_| AuthError::InvalidCredentials)?;
            self.users.get_by_email(&email).await?
        } else {
            match PhoneNumber::digits_of(identifier) {
                Some(digits) => self.users.get_by_phone(&digits).await?,
                None => None,
            }
        };

        let user = user
            .filter(|u| u.role == Role::Customer)
            .ok_or(AuthError::InvalidCredentials)?;
        let hash = self
            .users
            .get_password_hash(user.id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, &hash).map_err(|_| AuthError::InvalidCredentials)?;

        Ok(user)
    }

    /// Log an employee in by username or email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound`, `AuthError::WrongRole` when the
    /// account's role isn't in `allowed`, or `AuthError::InvalidPassword`.
    pub async fn login_employee(
        &self,
        login: &str,
        password: &str,
        allowed: &[Role],
    ) -> Result<User, AuthError> {
        let user = self
            .users
            .get_by_login(login)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !allowed.contains(&user.role) {
            return Err(AuthError::WrongRole);
        }

        let hash = self
            .users
            .get_password_hash(user.id)
            .await?
            .ok_or(AuthError::InvalidPassword)?;
        verify_password(password, &hash)?;

        Ok(user)
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` or `AuthError::PasswordMismatch` for
    /// bad passwords and `AuthError::UserAlreadyExists` when the email,
    /// username, or phone number is taken.
    pub async fn register(
        &self,
        new: &NewUser,
        password: &str,
        confirm: &str,
        min_length: usize,
    ) -> Result<User, AuthError> {
        validate_password(password, min_length)?;
        if password != confirm {
            return Err(AuthError::PasswordMismatch);
        }

        if self
            .users
            .contact_taken(new.email.as_ref(), new.phone_number.as_ref(), None)
            .await?
        {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = hash_password(password)?;
        self.users
            .create(new, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Replace a user's password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword`, `AuthError::PasswordMismatch`, or
    /// `AuthError::UserNotFound`.
    pub async fn set_password(
        &self,
        user_id: UserId,
        password: &str,
        confirm: &str,
    ) -> Result<(), AuthError> {
        validate_password(password, MIN_PASSWORD_LENGTH)?;
        if password != confirm {
            return Err(AuthError::PasswordMismatch);
        }

        let password_hash = hash_password(password)?;
        self.users
            .update_password(user_id, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` when shorter than `min_length` characters.
pub fn validate_password(password: &str, min_length: usize) -> Result<(), AuthError> {
    if password.chars().count() < min_length {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {min_length} characters long."
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidPassword` on mismatch or an unreadable hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidPassword)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidPassword)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &hash).is_ok());
        assert!(matches!(
            verify_password("hunter23", &hash),
            Err(AuthError::InvalidPassword)
        ));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(matches!(
            verify_password("x", "not-a-hash"),
            Err(AuthError::InvalidPassword)
        ));
    }

    #[test]
    fn test_validate_password_lengths() {
        assert!(validate_password("abcdef", MIN_PASSWORD_LENGTH).is_ok());
        assert!(validate_password("abcde", MIN_PASSWORD_LENGTH).is_err());
        assert!(validate_password("abcdefg", MIN_EMPLOYEE_PASSWORD_LENGTH).is_err());
    }
}
