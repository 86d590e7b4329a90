//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] cfac_core::EmailError),

    /// Invalid phone number.
    #[error("invalid phone number: {0}")]
    InvalidPhone(#[from] cfac_core::PhoneError),

    /// Wrong password, or no customer with that email or phone.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No account with that login.
    #[error("user not found")]
    UserNotFound,

    /// The account exists but the password is wrong.
    #[error("invalid password")]
    InvalidPassword,

    /// The account's role may not use this login.
    #[error("user type not allowed here")]
    WrongRole,

    /// Email, username, or phone number already registered.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Reset link signature or format is wrong.
    #[error("invalid reset token")]
    InvalidResetToken,

    /// Reset link is older than an hour.
    #[error("reset token expired")]
    ExpiredResetToken,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
