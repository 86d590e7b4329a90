//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::services::{
    Catalogue, EmailService, JwtKeys, Notifier, ResetTokens, SmsClient, StripeClient,
};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and external clients.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    stripe: StripeClient,
    email: EmailService,
    sms: Option<SmsClient>,
    jwt: JwtKeys,
    reset_tokens: ResetTokens,
    catalogue: Catalogue,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP relay settings are invalid.
    pub fn new(
        config: AppConfig,
        pool: PgPool,
    ) -> Result<Self, lettre::transport::smtp::Error> {
        let stripe = StripeClient::new(&config.stripe);
        let email = EmailService::new(&config.email, &config.base_url)?;
        let sms = config.sms.as_ref().map(SmsClient::new);
        let jwt = JwtKeys::new(&config.jwt_secret);
        let reset_tokens = ResetTokens::new(config.secret_key.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                stripe,
                email,
                sms,
                jwt,
                reset_tokens,
                catalogue: Catalogue::new(),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    /// SMS client, absent when Twilio is not configured.
    #[must_use]
    pub fn sms(&self) -> Option<&SmsClient> {
        self.inner.sms.as_ref()
    }

    #[must_use]
    pub fn jwt(&self) -> &JwtKeys {
        &self.inner.jwt
    }

    #[must_use]
    pub fn reset_tokens(&self) -> &ResetTokens {
        &self.inner.reset_tokens
    }

    #[must_use]
    pub fn catalogue(&self) -> &Catalogue {
        &self.inner.catalogue
    }

    /// Notification sender borrowing this state's clients.
    #[must_use]
    pub fn notifier(&self) -> Notifier<'_> {
        Notifier::new(self.pool(), self.email(), self.sms())
    }
}
