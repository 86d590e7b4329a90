//! Twilio SMS client.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::SmsConfig;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Errors from sending SMS.
#[derive(Debug, Error)]
pub enum SmsError {
    #[error("Twilio request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Twilio API error ({status}): {message}")]
    Api { status: u16, message: String },
}

#[derive(Deserialize)]
struct TwilioError {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct MessageResource {
    sid: String,
}

/// Sends text messages through Twilio's Messages API.
#[derive(Clone)]
pub struct SmsClient {
    client: Client,
    api_base: String,
    account_sid: String,
    auth_token: SecretString,
    from_number: String,
}

impl std::fmt::Debug for SmsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsClient")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .finish_non_exhaustive()
    }
}

impl SmsClient {
    #[must_use]
    pub fn new(config: &SmsConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: TWILIO_API_BASE.to_string(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
        }
    }

    /// Send `body` to an E.164 number.
    ///
    /// # Errors
    ///
    /// Returns `SmsError` if Twilio rejects the message or can't be reached.
    #[instrument(skip(self, body))]
    pub async fn send(&self, to: &str, body: &str) -> Result<(), SmsError> {
        let response = self
            .client
            .post(format!(
                "{}/Accounts/{}/Messages.json",
                self.api_base, self.account_sid
            ))
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<TwilioError>()
                .await
                .map(|e| e.message)
                .unwrap_or_default();
            return Err(SmsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let message: MessageResource = response.json().await?;
        debug!(sid = %message.sid, "SMS sent");
        Ok(())
    }
}
