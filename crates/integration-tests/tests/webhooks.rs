//! Stripe webhook signature handling.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::json;

use cfac_integration_tests::{json_body, send, stripe_signature};

const SUCCEEDED: &str = r#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_1","status":"succeeded","amount":18182,"metadata":{"order_id":"10"}}}}"#;
const IGNORED: &str = r#"{"id":"evt_2","type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;

fn webhook(payload: &'static str, signature: Option<String>) -> Request<Body> {
    let mut request = Request::post("/payments/stripe_webhook").header("content-type", "application/json");
    if let Some(signature) = signature {
        request = request.header("stripe-signature", signature);
    }
    request.body(Body::from(payload)).unwrap()
}

#[tokio::test]
async fn test_missing_signature_rejected() {
    let response = send(webhook(SUCCEEDED, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({"error": "Invalid signature"}));
}

#[tokio::test]
async fn test_wrong_signature_rejected() {
    let now = Utc::now().timestamp();
    let forged = stripe_signature(IGNORED, now);
    let response = send(webhook(SUCCEEDED, Some(forged))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({"error": "Invalid signature"}));
}

#[tokio::test]
async fn test_stale_signature_rejected() {
    let an_hour_ago = Utc::now().timestamp() - 3600;
    let response = send(webhook(SUCCEEDED, Some(stripe_signature(SUCCEEDED, an_hour_ago)))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unhandled_event_acknowledged() {
    let now = Utc::now().timestamp();
    let response = send(webhook(IGNORED, Some(stripe_signature(IGNORED, now)))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_signed_event_without_intent_rejected() {
    const NO_OBJECT: &str = r#"{"id":"evt_3","type":"payment_intent.succeeded","data":{"object":null}}"#;
    let now = Utc::now().timestamp();
    let response = send(webhook(NO_OBJECT, Some(stripe_signature(NO_OBJECT, now)))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({"error": "Invalid payload"}));
}
