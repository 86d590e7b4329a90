//! Payment collection in the field, Stripe webhooks, and payment links.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;

use cfac_core::pricing::amount_in_cents;
use cfac_core::{OrderId, PaymentMethod, PaymentStatus, Role};

use crate::db::{OrderRepository, RepositoryError, UserRepository};
use crate::error::{ApiError, ApiResult, AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{Page, RequireStaff, flash_redirect, push_flash};
use crate::models::session::FlashLevel;
use crate::models::{CurrentUser, Order, User};
use crate::services::stripe::{Confirmation, NewPaymentIntent, PaymentIntent};
use crate::services::{OrderSummary, StripeError};
use crate::state::AppState;

const COLLECTING: &str = "/payments/collecting_payments";

// =============================================================================
// Templates
// =============================================================================

/// An unpaid order in the collection list.
pub struct UnpaidOrder {
    pub order: Order,
    pub customer_name: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "payments/collecting_payments.html")]
pub struct CollectingPaymentsTemplate {
    pub page: Page,
    pub orders: Vec<UnpaidOrder>,
}

#[derive(Template, WebTemplate)]
#[template(path = "payments/collect_payment.html")]
pub struct CollectPaymentTemplate {
    pub page: Page,
    pub order: Order,
    pub customer_name: String,
    pub publishable_key: String,
    pub error: Option<String>,
}

// =============================================================================
// Form and Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CollectPaymentForm {
    #[serde(default)]
    pub method: String,
    pub payment_method_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    pub order_id: OrderId,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub payment_intent_id: String,
}

// =============================================================================
// Helpers
// =============================================================================

async fn customer_of(state: &AppState, order: &Order) -> Result<Option<User>> {
    Ok(match order.user_id {
        Some(id) => UserRepository::new(state.pool()).get_by_id(id).await?,
        None => None,
    })
}

async fn collect_form(
    state: &AppState,
    session: &Session,
    order: Order,
    error: Option<String>,
) -> Result<Response> {
    let customer = customer_of(state, &order).await?;
    Ok(CollectPaymentTemplate {
        page: Page::load(session).await,
        customer_name: order.customer_name(customer.as_ref()).to_string(),
        order,
        publishable_key: state.config().stripe.publishable_key.clone(),
        error,
    }
    .into_response())
}

/// An order the current employee may collect payment for.
async fn collectable_order(
    state: &AppState,
    current: &CurrentUser,
    id: OrderId,
) -> Result<Option<Order>> {
    Ok(OrderRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|o| current.role != Role::Sales || o.salesperson_id == Some(current.id)))
}

/// Record a collected payment and tell everyone who needs to know.
async fn record_collection(
    state: &AppState,
    current: &CurrentUser,
    order: &Order,
    method: PaymentMethod,
    status: PaymentStatus,
    intent_id: Option<&str>,
) -> Result<Order> {
    let order = OrderRepository::new(state.pool())
        .set_payment(order.id, Some(method), status, intent_id)
        .await?;
    tracing::info!(
        order_id = %order.id,
        collector_id = %current.id,
        method = %method,
        status = %status,
        "Payment collected"
    );

    let customer = customer_of(state, &order).await?;
    let collector = UserRepository::new(state.pool()).get_by_id(current.id).await?;
    state
        .notifier()
        .payment_collected(&order, customer.as_ref(), collector.as_ref(), method)
        .await;
    Ok(order)
}

// =============================================================================
// Field Collection
// =============================================================================

pub async fn collecting_payments(
    State(state): State<AppState>,
    page: Page,
    RequireStaff(current): RequireStaff,
) -> Result<impl IntoResponse> {
    let salesperson = (current.role == Role::Sales).then_some(current.id);
    let orders = OrderRepository::new(state.pool())
        .list_unpaid(salesperson)
        .await?;

    let mut ids: Vec<_> = orders.iter().filter_map(|o| o.user_id).collect();
    ids.sort_unstable();
    ids.dedup();
    let customers = UserRepository::new(state.pool()).get_many(&ids).await?;

    let orders = orders
        .into_iter()
        .map(|order| {
            let customer = customers.iter().find(|u| Some(u.id) == order.user_id);
            UnpaidOrder {
                customer_name: order.customer_name(customer).to_string(),
                order,
            }
        })
        .collect();

    Ok(CollectingPaymentsTemplate { page, orders })
}

pub async fn collect_payment_page(
    State(state): State<AppState>,
    session: Session,
    RequireStaff(current): RequireStaff,
    Path(id): Path<OrderId>,
) -> Result<Response> {
    let Some(order) = collectable_order(&state, &current, id).await? else {
        return Ok(flash_redirect(&session, FlashLevel::Danger, "Order not found.", COLLECTING).await);
    };
    if order.payment_status.is_settled() {
        return Ok(flash_redirect(
            &session,
            FlashLevel::Info,
            "This order has already been paid.",
            COLLECTING,
        )
        .await);
    }
    collect_form(&state, &session, order, None).await
}

pub async fn collect_payment_submit(
    State(state): State<AppState>,
    session: Session,
    RequireStaff(current): RequireStaff,
    Path(id): Path<OrderId>,
    Form(form): Form<CollectPaymentForm>,
) -> Result<Response> {
    let Some(order) = collectable_order(&state, &current, id).await? else {
        return Ok(flash_redirect(&session, FlashLevel::Danger, "Order not found.", COLLECTING).await);
    };
    if order.payment_status.is_settled() {
        return Ok(flash_redirect(
            &session,
            FlashLevel::Info,
            "This order has already been paid.",
            COLLECTING,
        )
        .await);
    }

    match form.method.trim().parse::<PaymentMethod>() {
        Ok(PaymentMethod::Cash) => {
            record_collection(&state, &current, &order, PaymentMethod::Cash, PaymentStatus::Paid, None)
                .await?;
            Ok(flash_redirect(
                &session,
                FlashLevel::Success,
                "Cash payment recorded successfully.",
                COLLECTING,
            )
            .await)
        }
        Ok(PaymentMethod::Card) => {
            let payment_method = form
                .payment_method_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty());
            match payment_method {
                Some(pm) => collect_card(&state, &session, &current, order, pm).await,
                None => {
                    collect_form(
                        &state,
                        &session,
                        order,
                        Some("Please enter your card details to proceed with payment.".to_string()),
                    )
                    .await
                }
            }
        }
        Err(_) => {
            collect_form(&state, &session, order, Some("Invalid payment method.".to_string())).await
        }
    }
}

async fn collect_card(
    state: &AppState,
    session: &Session,
    current: &CurrentUser,
    order: Order,
    payment_method: &str,
) -> Result<Response> {
    let amount_cents = amount_in_cents(order.total())
        .map_err(|e| AppError::BadRequest(format!("Order total cannot be charged: {e}")))?;
    let order_id = order.id.to_string();
    let collector = current.id.to_string();
    add_breadcrumb(
        "payment",
        "Field card collection",
        Some(&[("order_id", order_id.as_str()), ("collector_id", collector.as_str())][..]),
    );
    let intent = state
        .stripe()
        .create_payment_intent(&NewPaymentIntent {
            amount_cents,
            order_id: order.id,
            payment_method: Some(payment_method),
            confirmation: Confirmation::Automatic,
            description: Some(format!("Payment for Order {}", order.id)),
            return_url: Some(state.config().absolute_url(COLLECTING)),
        })
        .await;

    let intent = match intent {
        Ok(intent) => intent,
        Err(StripeError::Card(message)) => {
            tracing::warn!(order_id = %order.id, "Card declined in the field");
            return collect_form(state, session, order, Some(format!("Card Error: {message}"))).await;
        }
        Err(e) => {
            tracing::error!(order_id = %order.id, error = %e, "Field payment intent failed");
            return collect_form(
                state,
                session,
                order,
                Some("Payment processing error. Please try again.".to_string()),
            )
            .await;
        }
    };

    match PaymentStatus::from_intent_status(&intent.status) {
        PaymentStatus::Paid => {
            record_collection(
                state,
                current,
                &order,
                PaymentMethod::Card,
                PaymentStatus::DownpaymentCollected,
                Some(&intent.id),
            )
            .await?;
            Ok(flash_redirect(
                session,
                FlashLevel::Success,
                "Card payment collected successfully.",
                COLLECTING,
            )
            .await)
        }
        PaymentStatus::RequiresAction => {
            OrderRepository::new(state.pool())
                .set_payment(
                    order.id,
                    Some(PaymentMethod::Card),
                    PaymentStatus::RequiresAction,
                    Some(&intent.id),
                )
                .await?;
            push_flash(
                session,
                FlashLevel::Warning,
                "Additional authentication required. Please complete the payment.",
            )
            .await?;
            Ok(match intent.redirect_url() {
                Some(url) => Redirect::to(url).into_response(),
                None => Redirect::to(&format!("/payments/collect_payment/{}", order.id)).into_response(),
            })
        }
        status => {
            OrderRepository::new(state.pool())
                .set_payment(order.id, Some(PaymentMethod::Card), status, Some(&intent.id))
                .await?;
            tracing::info!(order_id = %order.id, stripe_status = %intent.status, "Field payment pending");
            Ok(flash_redirect(session, FlashLevel::Info, "Payment is being processed.", COLLECTING).await)
        }
    }
}

// =============================================================================
// Stripe Webhook and Client-side Payments
// =============================================================================

/// Apply a webhook's payment intent to its order.
async fn apply_intent_event(
    state: &AppState,
    intent: &PaymentIntent,
    status: PaymentStatus,
) -> std::result::Result<(), RepositoryError> {
    let orders = OrderRepository::new(state.pool());
    match intent.order_id() {
        Some(order_id) => match orders.set_payment(order_id, None, status, Some(&intent.id)).await {
            Ok(_) => {
                tracing::info!(order_id = %order_id, intent = %intent.id, status = %status, "Webhook updated order");
                Ok(())
            }
            Err(RepositoryError::NotFound) => {
                tracing::warn!(order_id = %order_id, intent = %intent.id, "Webhook for unknown order");
                Ok(())
            }
            Err(e) => Err(e),
        },
        None => {
            let updated = orders.set_payment_status_by_intent(&intent.id, status).await?;
            tracing::info!(intent = %intent.id, orders = updated.len(), status = %status, "Webhook updated orders by intent");
            Ok(())
        }
    }
}

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Invalid signature"))?;

    let event = state
        .stripe()
        .verify_webhook(&body, signature, chrono::Utc::now().timestamp())
        .map_err(|e| {
            tracing::warn!(error = %e, "Rejected Stripe webhook");
            ApiError::from(e)
        })?;

    let status = match event.kind.as_str() {
        "payment_intent.succeeded" => PaymentStatus::Paid,
        "payment_intent.payment_failed" => PaymentStatus::Failed,
        other => {
            tracing::debug!(event = %event.id, kind = other, "Ignoring Stripe event");
            return Ok(StatusCode::OK);
        }
    };

    let intent = event
        .payment_intent()
        .ok_or_else(|| ApiError::bad_request("Invalid payload"))?;
    apply_intent_event(&state, &intent, status).await?;
    Ok(StatusCode::OK)
}

pub async fn create_payment_intent(
    State(state): State<AppState>,
    Json(request): Json<CreateIntentRequest>,
) -> ApiResult<Json<Value>> {
    let order = OrderRepository::new(state.pool())
        .get(request.order_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found."))?;
    if order.payment_status == PaymentStatus::Paid {
        return Err(ApiError::bad_request("Order already paid."));
    }

    let amount_cents = amount_in_cents(order.total())
        .map_err(|e| ApiError::bad_request(format!("Order total cannot be charged: {e}")))?;
    let intent = state
        .stripe()
        .create_payment_intent(&NewPaymentIntent {
            amount_cents,
            order_id: order.id,
            payment_method: None,
            confirmation: Confirmation::Deferred,
            description: Some(format!("Payment for Order {}", order.id)),
            return_url: None,
        })
        .await?;

    OrderRepository::new(state.pool())
        .set_payment(order.id, None, order.payment_status, Some(&intent.id))
        .await?;
    tracing::info!(order_id = %order.id, intent = %intent.id, "Payment intent created");

    Ok(Json(json!({ "client_secret": intent.client_secret })))
}

pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(request): Json<UpdateOrderRequest>,
) -> ApiResult<Json<Value>> {
    let orders = OrderRepository::new(state.pool());
    orders
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found."))?;

    let intent = state
        .stripe()
        .retrieve_payment_intent(request.payment_intent_id.trim())
        .await?;
    if intent.order_id().is_some_and(|owner| owner != id) {
        return Err(ApiError::bad_request("Payment intent does not belong to this order."));
    }

    let status = PaymentStatus::from_intent_status(&intent.status);
    if status == PaymentStatus::Paid {
        orders
            .set_payment(id, Some(PaymentMethod::Card), PaymentStatus::Paid, Some(&intent.id))
            .await?;
        tracing::info!(order_id = %id, intent = %intent.id, "Order paid by client-side confirmation");
    }

    Ok(Json(json!({
        "order_id": id,
        "payment_status": status,
    })))
}

// =============================================================================
// Payment Links
// =============================================================================

pub async fn send_payment_links(
    State(state): State<AppState>,
    session: Session,
    RequireStaff(current): RequireStaff,
    Path(id): Path<OrderId>,
) -> Result<Response> {
    let Some(order) = collectable_order(&state, &current, id).await? else {
        return Ok(flash_redirect(&session, FlashLevel::Danger, "Order not found.", COLLECTING).await);
    };

    let downpayment = order.downpayment_checkout_url.as_deref().filter(|u| !u.is_empty());
    let remaining = order
        .remaining_balance_checkout_url
        .as_deref()
        .filter(|u| !u.is_empty());
    if downpayment.is_none() && remaining.is_none() {
        return Ok(flash_redirect(
            &session,
            FlashLevel::Warning,
            "Payment links are not yet generated for this order.",
            COLLECTING,
        )
        .await);
    }

    let customer = customer_of(&state, &order).await?;
    let Some(to) = order.customer_email(customer.as_ref()) else {
        return Ok(flash_redirect(
            &session,
            FlashLevel::Danger,
            "This order has no customer email address.",
            COLLECTING,
        )
        .await);
    };

    let summary = OrderSummary::new(&order, customer.as_ref());
    if let Err(e) = state
        .email()
        .send_payment_links(&to, &summary, downpayment, remaining)
        .await
    {
        tracing::warn!(order_id = %id, error = %e, "Failed to send payment links");
        return Ok(flash_redirect(
            &session,
            FlashLevel::Danger,
            "Failed to send payment links. Please try again.",
            COLLECTING,
        )
        .await);
    }

    tracing::info!(order_id = %id, sender_id = %current.id, "Payment links sent");
    Ok(flash_redirect(
        &session,
        FlashLevel::Success,
        "Payment links sent to the customer.",
        COLLECTING,
    )
    .await)
}
