//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! # Public pages
//! GET  /                              - Home page with the service catalogue
//! GET  /aboutus, /about-founder       - About pages
//! GET  /privacy_policy, /refund_policy
//! GET  /thank-you
//! GET  /careers                       - Careers page
//! POST /careers                       - Employee application
//! POST /estimate                      - Estimate request
//! GET  /shop                          - Product shop
//! POST /create-checkout-session       - Stripe Checkout for a shop product
//! GET  /payment_success               - Order paid through Checkout
//! GET  /public_profile/tech/:id
//! GET  /public_profile/sales/:id
//!
//! # Auth (rate limited)
//! GET|POST /login                     - Customer login
//! GET|POST /employee_login            - Admin login
//! GET|POST /staff_login               - Technician and sales login
//! GET|POST /register
//! GET|POST /reset_password_request
//! GET|POST /reset_password/:token
//! GET  /logout
//!
//! # Account
//! GET|POST /account_settings
//!
//! # Customer
//! GET  /customer/add_to_cart
//! GET  /customer/cart
//! POST /customer/cart/remove
//! GET|POST /customer/checkout
//! GET|POST /customer/checkout/:order_id/pay
//! GET  /customer/my_orders
//! GET  /customer/order/:id
//!
//! # Admin
//! GET  /admin/main
//! GET  /admin/view_order/:id
//! GET|POST /admin/edit_order/:id
//! POST /admin/delete_order/:id
//! POST /admin/delete/:user_id
//! GET  /admin/manage_users
//! GET  /admin/view_user/:id
//! GET  /admin/compensation
//! POST /admin/create_compensation
//! GET  /admin/pending_users
//! POST /admin/pending_users/:id/dismiss
//!
//! # Technicians
//! GET  /tech/main
//! GET  /tech/my_schedule
//! POST /tech/order/:id/schedule
//! POST /tech/order/:id/complete
//! GET  /tech/view_order/:id
//!
//! # Payments (sales and technicians)
//! GET  /payments/collecting_payments
//! GET|POST /payments/collect_payment/:id
//! POST /payments/stripe_webhook       - Stripe events (signature checked)
//! POST /payments/create_payment_intent
//! POST /payments/update_order/:id
//! POST /payments/send_payment_links/:id
//!
//! # Field-app JSON API (rate limited)
//! POST /api/login
//! GET|PUT /api/account
//! POST /api/account/reset-password
//! GET  /api/orders
//! GET  /api/services
//! POST /api/guest_order
//! GET  /api/tech/orders_with_downpayment
//! POST /api/contract/save
//! GET  /api/contract/find
//! GET  /api/contract/generate_pdf
//! GET  /api/contract/pdf/:email
//! GET|POST /api/territories
//! POST /api/houses-in-area
//! ```

pub mod account;
pub mod admin;
pub mod api;
pub mod auth;
pub mod customer;
pub mod pages;
pub mod payments;
pub mod tech;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the public page routes.
pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::home))
        .route("/aboutus", get(pages::about_us))
        .route("/about-founder", get(pages::about_founder))
        .route("/privacy_policy", get(pages::privacy_policy))
        .route("/refund_policy", get(pages::refund_policy))
        .route("/thank-you", get(pages::thank_you))
        .route("/careers", get(pages::careers).post(pages::apply))
        .route("/estimate", post(pages::request_estimate))
        .route("/shop", get(pages::shop))
        .route("/create-checkout-session", post(pages::create_checkout_session))
        .route("/payment_success", get(pages::payment_success))
        .route("/public_profile/tech/{id}", get(pages::public_tech_profile))
        .route("/public_profile/sales/{id}", get(pages::public_sales_profile))
}

/// Create the login, registration and password reset routes.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login_submit))
        .route(
            "/employee_login",
            get(auth::employee_login_page).post(auth::employee_login_submit),
        )
        .route(
            "/staff_login",
            get(auth::staff_login_page).post(auth::staff_login_submit),
        )
        .route("/register", get(auth::register_page).post(auth::register_submit))
        .route(
            "/reset_password_request",
            get(auth::reset_request_page).post(auth::reset_request_submit),
        )
        .route(
            "/reset_password/{token}",
            get(auth::reset_password_page).post(auth::reset_password_submit),
        )
        .layer(auth_rate_limiter())
}

/// Create the customer cart, checkout and order routes.
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/add_to_cart", get(customer::add_to_cart))
        .route("/cart", get(customer::cart))
        .route("/cart/remove", post(customer::remove_from_cart))
        .route(
            "/checkout",
            get(customer::checkout_page).post(customer::checkout_submit),
        )
        .route(
            "/checkout/{order_id}/pay",
            get(customer::pay_page).post(customer::pay_submit),
        )
        .route("/my_orders", get(customer::my_orders))
        .route("/order/{id}", get(customer::view_order))
}

/// Create the admin back-office routes.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/main", get(admin::dashboard))
        .route("/view_order/{id}", get(admin::orders::view_order))
        .route(
            "/edit_order/{id}",
            get(admin::orders::edit_order_page).post(admin::orders::edit_order_submit),
        )
        .route("/delete_order/{id}", post(admin::orders::delete_order))
        .route("/delete/{user_id}", post(admin::users::delete_user))
        .route("/manage_users", get(admin::users::manage_users))
        .route("/view_user/{id}", get(admin::users::view_user))
        .route("/compensation", get(admin::compensation::compensation))
        .route(
            "/create_compensation",
            post(admin::compensation::create_compensation),
        )
        .route("/pending_users", get(admin::pending_users))
        .route("/pending_users/{id}/dismiss", post(admin::dismiss_applicant))
}

/// Create the technician routes.
pub fn tech_routes() -> Router<AppState> {
    Router::new()
        .route("/main", get(tech::main))
        .route("/my_schedule", get(tech::my_schedule))
        .route("/order/{id}/schedule", post(tech::schedule))
        .route("/order/{id}/complete", post(tech::complete))
        .route("/view_order/{id}", get(tech::view_order))
}

/// Create the payment collection routes.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/collecting_payments", get(payments::collecting_payments))
        .route(
            "/collect_payment/{id}",
            get(payments::collect_payment_page).post(payments::collect_payment_submit),
        )
        .route("/stripe_webhook", post(payments::stripe_webhook))
        .route("/create_payment_intent", post(payments::create_payment_intent))
        .route("/update_order/{id}", post(payments::update_order))
        .route("/send_payment_links/{id}", post(payments::send_payment_links))
}

/// Create the field-app JSON API routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(api::auth::login))
        .route(
            "/account",
            get(api::account::get_account).put(api::account::update_account),
        )
        .route("/account/reset-password", post(api::account::reset_password))
        .route("/orders", get(api::orders::list_orders))
        .route("/services", get(api::services::list_services))
        .route("/guest_order", post(api::guest_order::create_guest_order))
        .route(
            "/tech/orders_with_downpayment",
            get(api::orders::orders_with_downpayment),
        )
        .route("/contract/save", post(api::contracts::save_contract))
        .route("/contract/find", get(api::contracts::find_contract))
        .route("/contract/generate_pdf", get(api::contracts::generate_document))
        .route("/contract/pdf/{email}", get(api::contracts::download_document))
        .route(
            "/territories",
            get(api::territories::list_territories).post(api::territories::create_territory),
        )
        .route("/houses-in-area", post(api::territories::houses_in_area))
        .layer(api_rate_limiter())
}

/// Create all routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(page_routes())
        .merge(auth_routes())
        .route("/logout", get(auth::logout))
        .route(
            "/account_settings",
            get(account::settings_page).post(account::update_settings),
        )
        .nest("/customer", customer_routes())
        .nest("/admin", admin_routes())
        .nest("/tech", tech_routes())
        .nest("/payments", payment_routes())
        .nest("/api", api_routes())
}
