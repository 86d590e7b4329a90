//! Public pages: home, static content, lead forms, the shop, and public
//! employee profiles.

use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;

use cfac_core::{Email, OrderId, PhoneNumber, Role, UserId, VehicleSize};

use crate::db::leads::{NewApplicant, NewEstimate};
use crate::db::{ApplicantRepository, EstimateRepository, OrderRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{Page, flash_redirect};
use crate::models::session::FlashLevel;
use crate::models::{Order, Service, User};
use crate::state::AppState;

// =============================================================================
// Templates
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub page: Page,
    pub services: Arc<Vec<Service>>,
    pub vehicle_sizes: &'static [VehicleSize],
}

/// A page with no data beyond the layout.
#[derive(Template, WebTemplate)]
#[template(path = "pages/static.html")]
pub struct StaticTemplate {
    pub page: Page,
    pub kind: StaticPage,
}

/// Which static page [`StaticTemplate`] renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticPage {
    AboutUs,
    AboutFounder,
    PrivacyPolicy,
    RefundPolicy,
    ThankYou,
}

impl StaticPage {
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::AboutUs => "About Us",
            Self::AboutFounder => "About the Founder",
            Self::PrivacyPolicy => "Privacy Policy",
            Self::RefundPolicy => "Refund and Service Issue Policy",
            Self::ThankYou => "Thank You",
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/careers.html")]
pub struct CareersTemplate {
    pub page: Page,
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/shop.html")]
pub struct ShopTemplate {
    pub page: Page,
    pub products: Vec<ShopProduct>,
    pub canceled: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/payment_success.html")]
pub struct PaymentSuccessTemplate {
    pub page: Page,
    pub order: Order,
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/public_profile.html")]
pub struct PublicProfileTemplate {
    pub page: Page,
    pub user: User,
}

// =============================================================================
// Shop
// =============================================================================

/// A product sold through Stripe Checkout.
#[derive(Debug, Clone)]
pub struct ShopProduct {
    pub name: &'static str,
    pub description: &'static str,
    pub price: Decimal,
    pub image: &'static str,
    /// Absent until a Stripe price is configured for the product.
    pub price_id: Option<String>,
}

/// The shop's fixed product list, paired with configured price ids.
#[must_use]
pub fn shop_products(price_ids: &[String]) -> Vec<ShopProduct> {
    let products = [
        ("Brush Cleaner", "Cleans your tools thoroughly.", Decimal::new(2999, 2), "brush.png"),
        ("Tank Scrubber", "Heavy-duty tank scrubbing device.", Decimal::new(3999, 2), "tank.png"),
        ("Vacuum Pro", "Professional-grade vacuum.", Decimal::new(4999, 2), "vac.png"),
    ];
    products
        .into_iter()
        .enumerate()
        .map(|(i, (name, description, price, image))| ShopProduct {
            name,
            description,
            price,
            image,
            price_id: price_ids.get(i).cloned(),
        })
        .collect()
}

// =============================================================================
// Form and Query Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ApplicationForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    pub desired_role: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct EstimateForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub vehicle_size: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ShopQuery {
    pub canceled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSessionForm {
    pub price_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentSuccessQuery {
    pub session_id: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Home page: active services and the vehicle size picker.
pub async fn home(State(state): State<AppState>, page: Page) -> Result<impl IntoResponse> {
    let services = state.catalogue().active(state.pool()).await?;
    if services.is_empty() {
        tracing::warn!("No active services in the catalogue");
    }
    Ok(HomeTemplate {
        page,
        services,
        vehicle_sizes: VehicleSize::ALL,
    })
}

pub async fn about_us(page: Page) -> impl IntoResponse {
    StaticTemplate {
        page,
        kind: StaticPage::AboutUs,
    }
}

pub async fn about_founder(page: Page) -> impl IntoResponse {
    StaticTemplate {
        page,
        kind: StaticPage::AboutFounder,
    }
}

pub async fn privacy_policy(page: Page) -> impl IntoResponse {
    StaticTemplate {
        page,
        kind: StaticPage::PrivacyPolicy,
    }
}

pub async fn refund_policy(page: Page) -> impl IntoResponse {
    StaticTemplate {
        page,
        kind: StaticPage::RefundPolicy,
    }
}

pub async fn thank_you(page: Page) -> impl IntoResponse {
    StaticTemplate {
        page,
        kind: StaticPage::ThankYou,
    }
}

pub async fn careers(page: Page) -> impl IntoResponse {
    CareersTemplate { page }
}

/// Employee application from the careers page.
pub async fn apply(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ApplicationForm>,
) -> Result<Response> {
    let name = form.name.trim();
    let email = match Email::parse(&form.email) {
        Ok(email) if !name.is_empty() => email,
        _ => {
            return Ok(flash_redirect(
                &session,
                FlashLevel::Danger,
                "Please provide your name and a valid email address.",
                "/careers",
            )
            .await);
        }
    };
    let desired_role = match form.desired_role.trim() {
        role @ ("tech" | "sales") => role.to_string(),
        _ => {
            return Ok(flash_redirect(
                &session,
                FlashLevel::Danger,
                "Please choose the position you are applying for.",
                "/careers",
            )
            .await);
        }
    };

    let applicant = ApplicantRepository::new(state.pool())
        .create(&NewApplicant {
            name: name.to_string(),
            email: email.into_inner(),
            phone_number: PhoneNumber::digits_of(&form.phone_number),
            desired_role,
            message: form.message.trim().to_string(),
        })
        .await?;
    tracing::info!(applicant_id = %applicant.id, "Employee application received");

    Ok(flash_redirect(
        &session,
        FlashLevel::Success,
        "Thank you for applying! We will be in touch soon.",
        "/careers",
    )
    .await)
}

/// Public estimate request.
pub async fn request_estimate(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<EstimateForm>,
) -> Result<Response> {
    let name = form.name.trim();
    let email = match Email::parse(&form.email) {
        Ok(email) if !name.is_empty() => email,
        _ => {
            return Ok(flash_redirect(
                &session,
                FlashLevel::Danger,
                "Please provide your name and a valid email address.",
                "/",
            )
            .await);
        }
    };

    let request = EstimateRepository::new(state.pool())
        .create(&NewEstimate {
            name: name.to_string(),
            email: email.into_inner(),
            phone_number: PhoneNumber::digits_of(&form.phone_number),
            vehicle_size: VehicleSize::normalize(&form.vehicle_size).map(|s| s.to_string()),
            message: form.message.trim().to_string(),
        })
        .await?;
    tracing::info!(estimate_id = %request.id, "Estimate request received");

    Ok(flash_redirect(
        &session,
        FlashLevel::Success,
        "Thank you! We will contact you with an estimate shortly.",
        "/",
    )
    .await)
}

pub async fn shop(
    State(state): State<AppState>,
    page: Page,
    Query(query): Query<ShopQuery>,
) -> impl IntoResponse {
    ShopTemplate {
        page,
        products: shop_products(&state.config().stripe.shop_price_ids),
        canceled: query.canceled.unwrap_or(false),
    }
}

/// Start a Stripe Checkout session and send the browser to it.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Form(form): Form<CheckoutSessionForm>,
) -> Result<Response> {
    let price_id = form.price_id.trim();
    if price_id.is_empty() {
        return Err(AppError::BadRequest("Missing price_id".to_string()));
    }
    let config = &state.config().stripe;
    let checkout = state
        .stripe()
        .create_checkout_session(
            price_id,
            &config.checkout_success_url,
            &config.checkout_cancel_url,
        )
        .await?;
    let url = checkout
        .url
        .ok_or_else(|| AppError::Internal("Checkout session has no URL".to_string()))?;
    tracing::info!(session_id = %checkout.id, "Redirecting to Stripe Checkout");
    Ok(Redirect::to(&url).into_response())
}

/// Show the order paid through a Checkout session.
pub async fn payment_success(
    State(state): State<AppState>,
    page: Page,
    Query(query): Query<PaymentSuccessQuery>,
) -> Result<impl IntoResponse> {
    let session_id = query
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("Session ID missing".to_string()))?;

    let checkout = state.stripe().retrieve_checkout_session(&session_id).await?;
    let order_id: OrderId = checkout.order_id().ok_or_else(|| {
        tracing::error!(session_id = %session_id, "Order ID missing from PaymentIntent metadata");
        AppError::BadRequest("Order ID missing".to_string())
    })?;

    let order = OrderRepository::new(state.pool())
        .get(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    Ok(PaymentSuccessTemplate { page, order })
}

pub async fn public_tech_profile(
    State(state): State<AppState>,
    page: Page,
    Path(user_id): Path<UserId>,
) -> Result<impl IntoResponse> {
    public_profile(&state, page, user_id, Role::Tech).await
}

pub async fn public_sales_profile(
    State(state): State<AppState>,
    page: Page,
    Path(user_id): Path<UserId>,
) -> Result<impl IntoResponse> {
    public_profile(&state, page, user_id, Role::Sales).await
}

async fn public_profile(
    state: &AppState,
    page: Page,
    user_id: UserId,
    role: Role,
) -> Result<PublicProfileTemplate> {
    let user = UserRepository::new(state.pool())
        .get_by_id(user_id)
        .await?
        .filter(|u| u.role == role)
        .ok_or_else(|| AppError::NotFound(format!("{} user", role.label())))?;
    Ok(PublicProfileTemplate { page, user })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shop_products_pair_price_ids_in_order() {
        let products = shop_products(&["price_a".to_string(), "price_b".to_string()]);
        assert_eq!(products.len(), 3);
        assert_eq!(products[0].name, "Brush Cleaner");
        assert_eq!(products[0].price, Decimal::new(2999, 2));
        assert_eq!(products[1].price_id.as_deref(), Some("price_b"));
        assert_eq!(products[2].price_id, None);
        assert_eq!(products[2].price.to_string(), "49.99");
    }
}
