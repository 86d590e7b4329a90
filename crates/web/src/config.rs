//! Application configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CFAC_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SECRET_KEY` - Session and password-reset signing secret (min 32 chars, high entropy)
//! - `JWT_SECRET` - Signing secret for field-app API tokens (min 32 chars, high entropy)
//! - `STRIPE_SECRET_KEY` - Stripe API secret key
//! - `STRIPE_PUBLISHABLE_KEY` - Stripe publishable key (sent to the browser)
//! - `STRIPE_WEBHOOK_SECRET` - Stripe webhook endpoint signing secret
//! - `POSTMARK_SERVER_TOKEN` - Postmark server token (SMTP username and password)
//! - `POSTMARK_SENDER_EMAIL` - From address for all email
//!
//! ## Optional
//! - `CFAC_HOST` - Bind address (default: 127.0.0.1)
//! - `CFAC_PORT` - Listen port (default: 3000)
//! - `CFAC_BASE_URL` - Public URL used in links and cookies (default: <http://localhost:3000>)
//! - `ENV` - Deployment environment name (default: development)
//! - `LOG_FORMAT` - `json` for structured log lines (default: human readable)
//! - `STRIPE_API_BASE` - Stripe API base URL (default: <https://api.stripe.com>)
//! - `CHECKOUT_SUCCESS_URL` - Stripe Checkout success URL (default: `{base}/thank-you`)
//! - `CHECKOUT_CANCEL_URL` - Stripe Checkout cancel URL (default: `{base}/shop?canceled=true`)
//! - `SHOP_PRICE_IDS` - Comma-separated Stripe price ids for the shop products, in display order
//! - `SMTP_HOST` / `SMTP_PORT` - SMTP relay (default: smtp.postmarkapp.com:587)
//! - `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, `TWILIO_PHONE_NUMBER` - SMS (disabled unless all are set)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sentry sampling (default: 1.0 / 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, no trailing slash
    pub base_url: String,
    /// Deployment environment (`development`, `production`, ...)
    pub environment: String,
    /// Emit JSON log lines
    pub json_logs: bool,
    /// Session and password-reset signing secret
    pub secret_key: SecretString,
    /// API token signing secret
    pub jwt_secret: SecretString,
    pub stripe: StripeConfig,
    pub email: EmailConfig,
    /// SMS delivery, absent when Twilio is not configured
    pub sms: Option<SmsConfig>,
    pub sentry: SentryConfig,
}

/// Stripe configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    pub api_base: String,
    pub secret_key: SecretString,
    pub publishable_key: String,
    pub webhook_secret: SecretString,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    /// Stripe price ids for the shop products, in display order
    pub shop_price_ids: Vec<String>,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .field("publishable_key", &self.publishable_key)
            .field("webhook_secret", &"[REDACTED]")
            .field("checkout_success_url", &self.checkout_success_url)
            .field("checkout_cancel_url", &self.checkout_cancel_url)
            .field("shop_price_ids", &self.shop_price_ids)
            .finish()
    }
}

/// Outgoing email (Postmark over SMTP).
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub server_token: SecretString,
    pub sender: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("server_token", &"[REDACTED]")
            .field("sender", &self.sender)
            .finish()
    }
}

/// Twilio SMS configuration.
#[derive(Clone)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub from_number: String,
}

impl std::fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .finish()
    }
}

/// Sentry error tracking configuration.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("CFAC_DATABASE_URL")?;
        let host = parse_env("CFAC_HOST", "127.0.0.1")?;
        let port = parse_env("CFAC_PORT", "3000")?;
        let base_url = get_env_or_default("CFAC_BASE_URL", "http://localhost:3000")
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("CFAC_BASE_URL".to_string(), e.to_string()))?;

        let secret_key = get_validated_secret("SECRET_KEY")?;
        validate_secret_length(&secret_key, "SECRET_KEY")?;
        let jwt_secret = get_validated_secret("JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "JWT_SECRET")?;

        let stripe = StripeConfig::from_env(&base_url)?;
        let email = EmailConfig::from_env()?;
        let sms = SmsConfig::from_env();
        let sentry = SentryConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            environment: get_env_or_default("ENV", "development"),
            json_logs: get_optional_env("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            secret_key,
            jwt_secret,
            stripe,
            email,
            sms,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn uses_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Absolute URL for a path on this site.
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl StripeConfig {
    fn from_env(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: get_env_or_default("STRIPE_API_BASE", "https://api.stripe.com")
                .trim_end_matches('/')
                .to_string(),
            secret_key: get_required_secret("STRIPE_SECRET_KEY")?,
            publishable_key: get_required_env("STRIPE_PUBLISHABLE_KEY")?,
            webhook_secret: get_required_secret("STRIPE_WEBHOOK_SECRET")?,
            checkout_success_url: get_optional_env("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|| format!("{base_url}/thank-you")),
            checkout_cancel_url: get_optional_env("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|| format!("{base_url}/shop?canceled=true")),
            shop_price_ids: get_optional_env("SHOP_PRICE_IDS")
                .map(|ids| {
                    ids.split(',')
                        .map(|id| id.trim().to_string())
                        .filter(|id| !id.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

impl EmailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            smtp_host: get_env_or_default("SMTP_HOST", "smtp.postmarkapp.com"),
            smtp_port: parse_env("SMTP_PORT", "587")?,
            server_token: get_required_secret("POSTMARK_SERVER_TOKEN")?,
            sender: get_required_env("POSTMARK_SENDER_EMAIL")?,
        })
    }
}

impl SmsConfig {
    fn from_env() -> Option<Self> {
        Some(Self {
            account_sid: get_optional_env("TWILIO_ACCOUNT_SID")?,
            auth_token: SecretString::from(get_optional_env("TWILIO_AUTH_TOKEN")?),
            from_number: get_optional_env("TWILIO_PHONE_NUMBER")?,
        })
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional, non-empty environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {MIN_SECRET_LENGTH} characters (got {})",
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// A complete configuration for tests that build services or routers.
    pub fn test_config() -> AppConfig {
        AppConfig {
            database_url: SecretString::from("postgres://localhost/cfac_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            environment: "test".to_string(),
            json_logs: false,
            secret_key: SecretString::from("kD8#vQ2!mZ7@pL4$wR9^tY1&nB6*cX3%"),
            jwt_secret: SecretString::from("J5@hF8!qW2#eR7$tY4^uI9&oP1*aS6%d"),
            stripe: StripeConfig {
                api_base: "http://127.0.0.1:9".to_string(),
                secret_key: SecretString::from("sk_test_abc123"),
                publishable_key: "pk_test_abc123".to_string(),
                webhook_secret: SecretString::from("whsec_test_abc123"),
                checkout_success_url: "http://localhost:3000/thank-you".to_string(),
                checkout_cancel_url: "http://localhost:3000/shop?canceled=true".to_string(),
                shop_price_ids: vec!["price_brush".to_string()],
            },
            email: EmailConfig {
                smtp_host: "localhost".to_string(),
                smtp_port: 2525,
                server_token: SecretString::from("postmark-token"),
                sender: "bookings@cfac.test".to_string(),
            },
            sms: None,
            sentry: SentryConfig::default(),
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_rejects_placeholders() {
        let err = validate_secret_strength("your-jwt-key-here", "JWT_SECRET").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
        assert!(validate_secret_strength("changeme123", "SECRET_KEY").is_err());
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"ab".repeat(20), "SECRET_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "SECRET_KEY").is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "SECRET_KEY").is_err());
        assert!(validate_secret_length(&SecretString::from("a".repeat(32)), "SECRET_KEY").is_ok());
    }

    #[test]
    fn test_socket_addr_and_urls() {
        let config = test_config();
        let addr = config.socket_addr();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");
        assert!(!config.uses_https());
        assert_eq!(
            config.absolute_url("/reset_password/abc"),
            "http://localhost:3000/reset_password/abc"
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = test_config();
        let debug_output = format!("{:?} {:?}", config.stripe, config.email);

        assert!(debug_output.contains("pk_test_abc123"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_test_abc123"));
        assert!(!debug_output.contains("whsec_test_abc123"));
        assert!(!debug_output.contains("postmark-token"));
    }
}
