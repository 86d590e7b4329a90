//! Requests through the full middleware stack.
//!
//! The app is built over a pool that never connects, so these cover the
//! paths that answer before touching the database.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::json;

use cfac_integration_tests::{CLIENT_IP, json_body, send};

fn api_post(path: &str, body: &serde_json::Value) -> Request<Body> {
    Request::post(path)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", CLIENT_IP)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn api_get(path: &str) -> Request<Body> {
    Request::get(path)
        .header("x-forwarded-for", CLIENT_IP)
        .body(Body::empty())
        .unwrap()
}

// =============================================================================
// Health and middleware
// =============================================================================

#[tokio::test]
async fn test_health_returns_ok() {
    let response = send(Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 64).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let response = send(Request::get("/health/ready").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_security_headers_present() {
    let response = send(Request::get("/health").body(Body::empty()).unwrap()).await;
    let headers = response.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
}

#[tokio::test]
async fn test_request_id_generated_and_echoed() {
    let response = send(Request::get("/health").body(Body::empty()).unwrap()).await;
    assert!(!response.headers()["x-request-id"].is_empty());

    let response = send(
        Request::get("/health")
            .header("x-request-id", "req-abc-123")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.headers()["x-request-id"], "req-abc-123");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let response = send(Request::post("/no/such/page").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// JSON API
// =============================================================================

#[tokio::test]
async fn test_api_login_requires_credentials() {
    let response = send(api_post("/api/login", &json!({"username": "jo"}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Username and password required."})
    );
}

#[tokio::test]
async fn test_api_orders_requires_bearer_token() {
    let response = send(api_get("/api/orders")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Authorization header missing or invalid."})
    );
}

#[tokio::test]
async fn test_api_rejects_malformed_token() {
    let request = Request::get("/api/account")
        .header("x-forwarded-for", CLIENT_IP)
        .header(header::AUTHORIZATION, "Bearer not.a.jwt")
        .body(Body::empty())
        .unwrap();
    let response = send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await, json!({"error": "Invalid token."}));
}

#[tokio::test]
async fn test_contract_save_validates_before_storing() {
    let response = send(api_post("/api/contract/save", &json!({"email": "jo@example.com"}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"error": "user_name and email are required"})
    );

    let response = send(api_post(
        "/api/contract/save",
        &json!({"user_name": "Jo", "email": "jo@example.com", "accepted_terms": false}),
    ))
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Contract must be accepted"})
    );
}

#[tokio::test]
async fn test_contract_find_requires_email() {
    let response = send(api_get("/api/contract/find")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Email parameter is required."})
    );
}

#[tokio::test]
async fn test_territory_routes_require_bearer_token() {
    for path in ["/api/territories", "/api/houses-in-area"] {
        let response = send(api_post(path, &json!({"ring_lonlat": []}))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{path}");
    }
}

#[tokio::test]
async fn test_api_rate_limit_applies_per_client() {
    let app = cfac_integration_tests::test_app();
    let mut last = StatusCode::OK;
    for _ in 0..60 {
        let response = tower::ServiceExt::oneshot(app.clone(), api_post("/api/login", &json!({})))
            .await
            .unwrap();
        last = response.status();
        if last == StatusCode::TOO_MANY_REQUESTS {
            break;
        }
        assert_eq!(last, StatusCode::BAD_REQUEST);
    }
    assert_eq!(last, StatusCode::TOO_MANY_REQUESTS);
}
