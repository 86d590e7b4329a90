//! Bearer tokens for the field apps' JSON API.
//!
//! HS256-signed JWTs carrying the user id as `sub`, valid for four hours.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use cfac_core::UserId;

/// How long an API token stays valid.
pub const TOKEN_LIFETIME_HOURS: i64 = 4;

/// Errors from token handling.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("failed to create token: {0}")]
    Create(#[source] jsonwebtoken::errors::Error),

    #[error("token has expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID as a string.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Claims for `user_id`, issued now.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp(),
        }
    }
}

/// Signs and verifies API tokens.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys").finish_non_exhaustive()
    }
}

impl JwtKeys {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }

    /// Sign claims into a token string.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::Create` if encoding fails.
    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(JwtError::Create)
    }

    /// Issue a token for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::Create` if encoding fails.
    pub fn issue(&self, user_id: UserId) -> Result<String, JwtError> {
        self.sign(&Claims::new(user_id))
    }

    /// Verify a token and return the user it belongs to.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::Expired` for expired tokens and `JwtError::Invalid`
    /// for anything else wrong with the token.
    pub fn verify(&self, token: &str) -> Result<UserId, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e.to_string()),
            }
        })?;

        data.claims
            .sub
            .parse()
            .map_err(|_| JwtError::Invalid("subject is not a user id".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn keys() -> JwtKeys {
        JwtKeys::new(&SecretString::from("Qm8vT2xR5nW9pL3kJ7hF1dS6gA4zC0bY".to_string()))
    }

    #[test]
    fn test_issue_and_verify() {
        let keys = keys();
        let token = keys.issue(UserId::new(12)).unwrap();
        assert_eq!(keys.verify(&token).unwrap(), UserId::new(12));
    }

    #[test]
    fn test_claims_expire_after_four_hours() {
        let claims = Claims::new(UserId::new(1));
        assert_eq!(claims.exp - claims.iat, 4 * 60 * 60);
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = keys();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "12".to_string(),
            iat: now - 20_000,
            exp: now - 10,
        };
        let token = keys.sign(&claims).unwrap();
        assert!(matches!(keys.verify(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let token = keys().issue(UserId::new(12)).unwrap();
        let other = JwtKeys::new(&SecretString::from("Zp4Kx8Wm2Qr6Tn0Vb3Yc7Hd1Jf5Lg9Sa".to_string()));
        assert!(matches!(other.verify(&token), Err(JwtError::Invalid(_))));
        assert!(matches!(keys().verify("not.a.token"), Err(JwtError::Invalid(_))));
    }
}
