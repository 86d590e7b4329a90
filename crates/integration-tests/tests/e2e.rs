//! End-to-end flows against a running server and database.
//!
//! These tests require:
//! - A migrated and seeded database (`cfac-cli migrate && cfac-cli seed-services`)
//! - The web server running (`cargo run -p cfac-web`)
//!
//! Run with: `cargo test -p cfac-integration-tests -- --ignored`

use chrono::Utc;
use reqwest::{Client, StatusCode, redirect};
use serde_json::{Value, json};

use cfac_integration_tests::live_base_url;

fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

fn unique_email(prefix: &str) -> String {
    format!("{prefix}+{}@example.com", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

async fn first_service_key(client: &Client) -> String {
    let body: Value = client
        .get(format!("{}/api/services", live_base_url()))
        .send()
        .await
        .expect("Failed to list services")
        .json()
        .await
        .expect("services JSON");
    body["services"][0]["key"]
        .as_str()
        .expect("at least one seeded service")
        .to_string()
}

// ============================================================================
// Customer site
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_home_page_lists_services() {
    let resp = client().get(live_base_url()).send().await.expect("home page");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("set-cookie").is_some(), "visitor cookie issued");

    let body = resp.text().await.expect("body");
    assert!(body.contains("Complete Detailing"));
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_register_then_view_orders() {
    let client = client();
    let base = live_base_url();
    let email = unique_email("customer");

    let resp = client
        .post(format!("{base}/register"))
        .form(&[
            ("name", "Test Customer"),
            ("email", email.as_str()),
            ("phone_number", ""),
            ("street_address", "12 Elm Street"),
            ("unit_apt", ""),
            ("city", "Austin"),
            ("country", "United States"),
            ("zip_code", "78701"),
            ("password", "secret123"),
            ("confirm_password", "secret123"),
        ])
        .send()
        .await
        .expect("register");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let resp = client
        .get(format!("{base}/customer/my_orders"))
        .send()
        .await
        .expect("my orders");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_admin_pages_redirect_anonymous_visitors() {
    let resp = client()
        .get(format!("{}/admin/main", live_base_url()))
        .send()
        .await
        .expect("admin page");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let location = resp.headers()["location"].to_str().unwrap();
    assert!(location.starts_with("/employee_login?next="));
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_cart_requires_vehicle_size() {
    let client = client();
    let base = live_base_url();
    let key = first_service_key(&client).await;

    let resp = client
        .get(format!("{base}/customer/add_to_cart?service_id={key}"))
        .send()
        .await
        .expect("add to cart");
    assert!(resp.status().is_redirection());
}

// ============================================================================
// Field-app API
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_api_login_unknown_user() {
    let resp = client()
        .post(format!("{}/api/login", live_base_url()))
        .json(&json!({"username": "nobody-here", "password": "whatever"}))
        .send()
        .await
        .expect("api login");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.expect("JSON");
    assert_eq!(body, json!({"error": "Invalid username."}));
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_guest_order_created() {
    let client = client();
    let base = live_base_url();
    let key = first_service_key(&client).await;

    let resp = client
        .post(format!("{base}/api/guest_order"))
        .json(&json!({
            "guest_name": "Walk Up",
            "guest_email": unique_email("guest"),
            "guest_address": {
                "street_address": "1 Main Street",
                "unit_apt": "",
                "city": "Austin",
                "country": "United States",
                "zip_code": "78701",
            },
            "vehicle_size": "sedan_4_door",
            "selectedServices": [key],
        }))
        .send()
        .await
        .expect("guest order");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.expect("JSON");
    assert_eq!(body["message"], "Order created successfully!");
    assert!(body["order_id"].is_number());
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_guest_order_reports_missing_fields() {
    let resp = client()
        .post(format!("{}/api/guest_order", live_base_url()))
        .json(&json!({"guest_name": "Walk Up"}))
        .send()
        .await
        .expect("guest order");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("JSON");
    assert!(body["error"].as_str().unwrap().starts_with("Missing required fields"));
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_contract_save_and_find() {
    let client = client();
    let base = live_base_url();
    let email = unique_email("contractor");

    let resp = client
        .post(format!("{base}/api/contract/save"))
        .json(&json!({
            "user_name": "Jo Contractor",
            "email": email,
            "accepted_terms": true,
        }))
        .send()
        .await
        .expect("save contract");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = client
        .get(format!("{base}/api/contract/find"))
        .query(&[("email", email.as_str())])
        .send()
        .await
        .expect("find contract");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("JSON");
    assert_eq!(body["user_name"], "Jo Contractor");
    assert_eq!(body["contract_version"], "v1.0");

    let resp = client
        .get(format!("{base}/api/contract/pdf/{email}"))
        .send()
        .await
        .expect("download before generate");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .get(format!("{base}/api/contract/generate_pdf"))
        .query(&[("email", email.as_str())])
        .send()
        .await
        .expect("generate");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("document");
    assert!(body.contains("INDEPENDENT CONTRACTOR AGREEMENT"));
}
