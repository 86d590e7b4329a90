//! Stripe REST client.
//!
//! Covers the handful of endpoints the site uses: Payment Intents for card
//! payments, Checkout Sessions for the shop, and webhook signature checks.
//! Requests are form-encoded with Stripe's bracket notation.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use cfac_core::OrderId;

use crate::config::StripeConfig;

/// Maximum age of a webhook signature timestamp, in seconds.
pub const WEBHOOK_TOLERANCE_SECS: u64 = 300;

/// Errors from the Stripe API.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("Stripe request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The card was declined or is otherwise unusable. The message is safe
    /// to show the customer.
    #[error("{0}")]
    Card(String),

    /// Stripe returned an error response.
    #[error("Stripe API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Webhook signature header missing, malformed, stale, or wrong.
    #[error("Invalid Stripe signature: {0}")]
    InvalidSignature(String),

    /// Webhook body is not a Stripe event.
    #[error("Invalid Stripe payload: {0}")]
    InvalidPayload(String),
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: Option<String>,
}

/// A Payment Intent, reduced to the fields the site reads.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub next_action: Option<NextAction>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    /// Where to send the customer to finish 3-D Secure, if Stripe asked for it.
    #[must_use]
    pub fn redirect_url(&self) -> Option<&str> {
        self.next_action
            .as_ref()
            .and_then(|a| a.redirect_to_url.as_ref())
            .map(|r| r.url.as_str())
    }

    /// The order this intent pays for, from its metadata.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        self.metadata.get("order_id")?.parse().ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NextAction {
    #[serde(default)]
    pub redirect_to_url: Option<RedirectToUrl>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedirectToUrl {
    pub url: String,
}

/// A Checkout Session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub payment_intent: Option<Expandable<PaymentIntent>>,
}

impl CheckoutSession {
    /// The order this session pays for: the session metadata, then the
    /// expanded payment intent's metadata.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        self.metadata
            .get("order_id")
            .and_then(|id| id.parse().ok())
            .or_else(|| match &self.payment_intent {
                Some(Expandable::Object(intent)) => intent.order_id(),
                _ => None,
            })
    }
}

/// A field Stripe returns either as an ID or, when expanded, as the object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

/// A webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl Event {
    /// The payment intent in `data.object`, for `payment_intent.*` events.
    #[must_use]
    pub fn payment_intent(&self) -> Option<PaymentIntent> {
        serde_json::from_value(self.data.object.clone()).ok()
    }
}

/// How a new Payment Intent is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Confirm now with a card from Stripe.js; the server finishes any
    /// follow-up step (customer checkout).
    Manual,
    /// Confirm now and let Stripe finish on its own (field collection).
    Automatic,
    /// Don't confirm; the browser confirms with the client secret.
    Deferred,
}

/// Parameters for creating a Payment Intent.
#[derive(Debug, Clone)]
pub struct NewPaymentIntent<'a> {
    pub amount_cents: i64,
    pub order_id: OrderId,
    pub payment_method: Option<&'a str>,
    pub confirmation: Confirmation,
    pub description: Option<String>,
    pub return_url: Option<String>,
}

impl NewPaymentIntent<'_> {
    fn to_form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("amount", self.amount_cents.to_string()),
            ("currency", "usd".to_string()),
            ("metadata[order_id]", self.order_id.to_string()),
        ];
        if let Some(pm) = self.payment_method {
            form.push(("payment_method", pm.to_string()));
        }
        match self.confirmation {
            Confirmation::Manual => {
                form.push(("confirmation_method", "manual".to_string()));
                form.push(("confirm", "true".to_string()));
            }
            Confirmation::Automatic => {
                form.push(("confirmation_method", "automatic".to_string()));
                form.push(("confirm", "true".to_string()));
                form.push(("payment_method_types[]", "card".to_string()));
            }
            Confirmation::Deferred => {
                form.push(("automatic_payment_methods[enabled]", "true".to_string()));
            }
        }
        if let Some(description) = &self.description {
            form.push(("description", description.clone()));
        }
        if let Some(url) = &self.return_url {
            form.push(("return_url", url.clone()));
        }
        form
    }
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: SecretString,
    webhook_secret: SecretString,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a new Stripe client.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base.clone(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, StripeError> {
        let response = request
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<ErrorEnvelope>(&body).ok();
        match parsed {
            Some(ErrorEnvelope { error }) if error.kind == "card_error" => Err(StripeError::Card(
                error
                    .message
                    .unwrap_or_else(|| "Your card was declined.".to_string()),
            )),
            Some(ErrorEnvelope { error }) => Err(StripeError::Api {
                status: status.as_u16(),
                message: error.message.unwrap_or(error.kind),
            }),
            None => Err(StripeError::Api {
                status: status.as_u16(),
                message: body,
            }),
        }
    }

    /// Create (and possibly confirm) a Payment Intent.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Card` for declined cards and other variants for
    /// transport or API failures.
    #[instrument(skip(self, params), fields(order_id = %params.order_id, amount = params.amount_cents))]
    pub async fn create_payment_intent(
        &self,
        params: &NewPaymentIntent<'_>,
    ) -> Result<PaymentIntent, StripeError> {
        let intent: PaymentIntent = self
            .send(
                self.client
                    .post(format!("{}/v1/payment_intents", self.api_base))
                    .form(&params.to_form()),
            )
            .await?;
        debug!(intent_id = %intent.id, status = %intent.status, "Payment intent created");
        Ok(intent)
    }

    /// Confirm a Payment Intent that is waiting on the server, e.g. after 3-D Secure.
    ///
    /// # Errors
    ///
    /// Returns `StripeError` if the request fails.
    #[instrument(skip(self))]
    pub async fn confirm_payment_intent(&self, id: &str) -> Result<PaymentIntent, StripeError> {
        self.send(
            self.client
                .post(format!("{}/v1/payment_intents/{id}/confirm", self.api_base)),
        )
        .await
    }

    /// Fetch a Payment Intent.
    ///
    /// # Errors
    ///
    /// Returns `StripeError` if the request fails.
    #[instrument(skip(self))]
    pub async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, StripeError> {
        self.send(
            self.client
                .get(format!("{}/v1/payment_intents/{id}", self.api_base)),
        )
        .await
    }

    /// Start a hosted Checkout for one unit of a catalogue price.
    ///
    /// # Errors
    ///
    /// Returns `StripeError` if the request fails.
    #[instrument(skip(self))]
    pub async fn create_checkout_session(
        &self,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let form = [
            ("mode", "payment"),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1"),
            ("shipping_address_collection[allowed_countries][0]", "US"),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
        ];
        self.send(
            self.client
                .post(format!("{}/v1/checkout/sessions", self.api_base))
                .form(&form),
        )
        .await
    }

    /// Fetch a Checkout Session with its payment intent expanded.
    ///
    /// # Errors
    ///
    /// Returns `StripeError` if the request fails.
    #[instrument(skip(self))]
    pub async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, StripeError> {
        self.send(
            self.client
                .get(format!(
                    "{}/v1/checkout/sessions/{id}?expand%5B%5D=payment_intent",
                    self.api_base
                )),
        )
        .await
    }

    /// Verify a webhook's `Stripe-Signature` header and parse the event.
    ///
    /// The header looks like `t=1700000000,v1=<hex>[,v1=<hex>...]`; the
    /// signature is HMAC-SHA256 over `"{t}.{payload}"` with the endpoint
    /// secret. `now` is the current Unix time.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::InvalidSignature` or `StripeError::InvalidPayload`.
    pub fn verify_webhook(
        &self,
        payload: &[u8],
        header: &str,
        now: i64,
    ) -> Result<Event, StripeError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", t)) => timestamp = t.parse::<i64>().ok(),
                Some(("v1", sig)) => signatures.push(sig),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| StripeError::InvalidSignature("missing timestamp".to_string()))?;
        if signatures.is_empty() {
            return Err(StripeError::InvalidSignature("missing v1 signature".to_string()));
        }
        if now.abs_diff(timestamp) > WEBHOOK_TOLERANCE_SECS {
            return Err(StripeError::InvalidSignature(
                "timestamp outside tolerance".to_string(),
            ));
        }

        let mut mac =
            Hmac::<Sha256>::new_from_slice(self.webhook_secret.expose_secret().as_bytes())
                .map_err(|e| StripeError::InvalidSignature(e.to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        if !signatures
            .iter()
            .filter_map(|sig| hex::decode(sig).ok())
            .any(|sig| mac.clone().verify_slice(&sig).is_ok())
        {
            warn!("Stripe webhook signature mismatch");
            return Err(StripeError::InvalidSignature("signature mismatch".to_string()));
        }

        serde_json::from_slice(payload).map_err(|e| StripeError::InvalidPayload(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::config::tests::test_config;

    /// Sign a payload the way Stripe does, for webhook tests.
    pub fn sign(secret: &str, payload: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn client() -> StripeClient {
        StripeClient::new(&test_config().stripe)
    }

    const EVENT: &str = r#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_1","status":"succeeded","amount":18182,"metadata":{"order_id":"10"}}}}"#;

    #[test]
    fn test_verify_webhook_valid() {
        let now = 1_700_000_000;
        let header = sign("whsec_test_abc123", EVENT, now);
        let event = client().verify_webhook(EVENT.as_bytes(), &header, now + 10).unwrap();
        assert_eq!(event.kind, "payment_intent.succeeded");
        let intent = event.payment_intent().unwrap();
        assert_eq!(intent.id, "pi_1");
        assert_eq!(intent.order_id(), Some(OrderId::new(10)));
    }

    #[test]
    fn test_verify_webhook_rejects_stale_timestamp() {
        let now = 1_700_000_000;
        let header = sign("whsec_test_abc123", EVENT, now);
        assert!(matches!(
            client().verify_webhook(EVENT.as_bytes(), &header, now + 301),
            Err(StripeError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_verify_webhook_extreme_or_malformed_timestamp() {
        let now = 1_700_000_000;
        for header in [
            "t=-9223372036854775808,v1=00",
            "t=9223372036854775807,v1=00",
            "t=soon,v1=00",
            "t=,v1=00",
        ] {
            assert!(matches!(
                client().verify_webhook(EVENT.as_bytes(), header, now),
                Err(StripeError::InvalidSignature(_))
            ));
        }
        let header = sign("whsec_test_abc123", EVENT, i64::MIN);
        assert!(client().verify_webhook(EVENT.as_bytes(), &header, i64::MAX).is_err());
    }

    #[test]
    fn test_verify_webhook_non_hex_signature_rejected() {
        let now = 1_700_000_000;
        let header = format!("t={now},v1=not-hex-at-all");
        assert!(matches!(
            client().verify_webhook(EVENT.as_bytes(), &header, now),
            Err(StripeError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_verify_webhook_rejects_wrong_secret_and_garbage() {
        let now = 1_700_000_000;
        let header = sign("whsec_other", EVENT, now);
        assert!(client().verify_webhook(EVENT.as_bytes(), &header, now).is_err());
        assert!(client().verify_webhook(EVENT.as_bytes(), "nonsense", now).is_err());
    }

    #[test]
    fn test_verify_webhook_accepts_any_matching_v1() {
        let now = 1_700_000_000;
        let good = sign("whsec_test_abc123", EVENT, now);
        let header = format!("t={now},v1=deadbeef,{}", good.split_once(',').unwrap().1);
        assert!(client().verify_webhook(EVENT.as_bytes(), &header, now).is_ok());
    }

    #[test]
    fn test_verify_webhook_bad_payload() {
        let now = 1_700_000_000;
        let header = sign("whsec_test_abc123", "not json", now);
        assert!(matches!(
            client().verify_webhook(b"not json", &header, now),
            Err(StripeError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_manual_intent_form() {
        let params = NewPaymentIntent {
            amount_cents: 18182,
            order_id: OrderId::new(10),
            payment_method: Some("pm_card_visa"),
            confirmation: Confirmation::Manual,
            description: None,
            return_url: Some("http://localhost:3000/customer/my_orders".to_string()),
        };
        let form = params.to_form();
        assert!(form.contains(&("amount", "18182".to_string())));
        assert!(form.contains(&("metadata[order_id]", "10".to_string())));
        assert!(form.contains(&("confirmation_method", "manual".to_string())));
        assert!(form.contains(&("confirm", "true".to_string())));
    }

    #[test]
    fn test_deferred_intent_form_is_not_confirmed() {
        let params = NewPaymentIntent {
            amount_cents: 500,
            order_id: OrderId::new(3),
            payment_method: None,
            confirmation: Confirmation::Deferred,
            description: Some("Payment for Order 3".to_string()),
            return_url: None,
        };
        let form = params.to_form();
        assert!(!form.iter().any(|(k, _)| *k == "confirm"));
        assert!(form.contains(&("description", "Payment for Order 3".to_string())));
    }

    #[test]
    fn test_intent_redirect_url_and_session_order_id() {
        let intent: PaymentIntent = serde_json::from_str(
            r#"{"id":"pi_2","status":"requires_action","next_action":{"redirect_to_url":{"url":"https://hooks.stripe.com/3ds"}}}"#,
        )
        .unwrap();
        assert_eq!(intent.redirect_url(), Some("https://hooks.stripe.com/3ds"));

        let session: CheckoutSession = serde_json::from_str(
            r#"{"id":"cs_1","payment_intent":{"id":"pi_3","status":"succeeded","metadata":{"order_id":"7"}}}"#,
        )
        .unwrap();
        assert_eq!(session.order_id(), Some(OrderId::new(7)));

        let unexpanded: CheckoutSession =
            serde_json::from_str(r#"{"id":"cs_2","payment_intent":"pi_4"}"#).unwrap();
        assert_eq!(unexpanded.order_id(), None);
    }
}
