//! Signed password reset tokens.
//!
//! A token is `base64url("{user_id}.{issued_at}") + "." + base64url(hmac)`,
//! where the HMAC-SHA256 key is the application secret and the purpose string
//! is mixed into the signed message. Nothing is stored server side.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use cfac_core::UserId;

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Separates these signatures from any other use of the secret.
const PURPOSE: &str = "password-reset-salt";

/// Reset links stay valid for one hour.
pub const RESET_TOKEN_MAX_AGE_SECS: i64 = 60 * 60;

/// Issues and checks password reset tokens.
#[derive(Clone)]
pub struct ResetTokens {
    secret: SecretString,
}

impl std::fmt::Debug for ResetTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetTokens")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl ResetTokens {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    fn mac(&self, payload: &str) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| AuthError::InvalidResetToken)?;
        mac.update(PURPOSE.as_bytes());
        mac.update(b":");
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    /// Create a token for `user_id` issued at the Unix time `now`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetToken` if the key is unusable.
    pub fn issue(&self, user_id: UserId, now: i64) -> Result<String, AuthError> {
        let payload = format!("{user_id}.{now}");
        let signature = self.mac(&payload)?.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Check a token and return the user it was issued for.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetToken` for malformed or tampered tokens
    /// and `AuthError::ExpiredResetToken` once the token is older than an hour.
    pub fn verify(&self, token: &str, now: i64) -> Result<UserId, AuthError> {
        let (payload_b64, signature_b64) = token
            .split_once('.')
            .ok_or(AuthError::InvalidResetToken)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or(AuthError::InvalidResetToken)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::InvalidResetToken)?;

        self.mac(&payload)?
            .verify_slice(&signature)
            .map_err(|_| AuthError::InvalidResetToken)?;

        let (user_id, issued_at) = payload
            .split_once('.')
            .ok_or(AuthError::InvalidResetToken)?;
        let user_id: UserId = user_id.parse().map_err(|_| AuthError::InvalidResetToken)?;
        let issued_at: i64 = issued_at.parse().map_err(|_| AuthError::InvalidResetToken)?;

        if now - issued_at > RESET_TOKEN_MAX_AGE_SECS {
            return Err(AuthError::ExpiredResetToken);
        }
        Ok(user_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tokens() -> ResetTokens {
        ResetTokens::new(SecretString::from("k8Jq2mV9xR4tL7wZ1pN6sD3fG5hY0cBa".to_string()))
    }

    #[test]
    fn test_issue_then_verify() {
        let t = tokens();
        let token = t.issue(UserId::new(42), 1_700_000_000).unwrap();
        assert!(!token.contains('+') && !token.contains('/'));
        assert_eq!(t.verify(&token, 1_700_000_100).unwrap(), UserId::new(42));
    }

    #[test]
    fn test_expired_after_an_hour() {
        let t = tokens();
        let token = t.issue(UserId::new(42), 1_700_000_000).unwrap();
        assert!(t.verify(&token, 1_700_000_000 + 3600).is_ok());
        assert!(matches!(
            t.verify(&token, 1_700_000_000 + 3601),
            Err(AuthError::ExpiredResetToken)
        ));
    }

    #[test]
    fn test_tampered_payload_is_invalid() {
        let t = tokens();
        let token = t.issue(UserId::new(42), 1_700_000_000).unwrap();
        let (_, signature) = token.split_once('.').unwrap();
        let forged = format!("{}.{signature}", URL_SAFE_NO_PAD.encode("1.1700000000"));
        assert!(matches!(t.verify(&forged, 1_700_000_000), Err(AuthError::InvalidResetToken)));
        assert!(matches!(t.verify("garbage", 0), Err(AuthError::InvalidResetToken)));
    }

    #[test]
    fn test_other_secret_is_invalid() {
        let token = tokens().issue(UserId::new(7), 100).unwrap();
        let other = ResetTokens::new(SecretString::from("Zx9Lm3Qp7Rt1Vw5Yb8Nc2Df6Gh4Jk0Sa".to_string()));
        assert!(matches!(other.verify(&token, 100), Err(AuthError::InvalidResetToken)));
    }
}
