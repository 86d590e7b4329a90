//! Customer cart, checkout, and order history.

use std::collections::HashMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::{Days, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tower_sessions::Session;

use cfac_core::pricing::{PriceBreakdown, amount_in_cents, estimated_minutes};
use cfac_core::{OrderId, PaymentMethod, PaymentStatus, PaymentTiming, ServiceId, UserId, VehicleSize};

use crate::db::{OrderRepository, ServiceRepository, UserRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{Page, RequireCustomer, flash_redirect, push_flash};
use crate::models::order::NewOrder;
use crate::models::session::{FlashLevel, keys};
use crate::models::{CartItem, CurrentUser, Order, OrderLine, Service, User};
use crate::services::StripeError;
use crate::services::stripe::{Confirmation, NewPaymentIntent};
use crate::state::AppState;

const CART_PATH: &str = "/customer/cart";
const CHECKOUT_PATH: &str = "/customer/checkout";
const MY_ORDERS_PATH: &str = "/customer/my_orders";

// =============================================================================
// Templates
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "customer/cart.html")]
pub struct CartTemplate {
    pub page: Page,
    pub items: Vec<CartItem>,
    pub breakdown: PriceBreakdown,
    pub address: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "customer/checkout.html")]
pub struct CheckoutTemplate {
    pub page: Page,
    pub items: Vec<CartItem>,
    pub breakdown: PriceBreakdown,
    pub default_date: String,
    pub min_date: String,
}

/// Card entry for an order created with "pay now".
#[derive(Template, WebTemplate)]
#[template(path = "customer/pay.html")]
pub struct CardPaymentTemplate {
    pub page: Page,
    pub order: Order,
    pub publishable_key: String,
    pub error: Option<String>,
}

/// An order with its technician's name resolved.
pub struct CustomerOrder {
    pub order: Order,
    pub tech_name: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "customer/my_orders.html")]
pub struct MyOrdersTemplate {
    pub page: Page,
    pub orders: Vec<CustomerOrder>,
}

#[derive(Template, WebTemplate)]
#[template(path = "customer/order.html")]
pub struct OrderDetailTemplate {
    pub page: Page,
    pub order: Order,
    pub services: Vec<Service>,
    pub tech_name: String,
}

// =============================================================================
// Form and Query Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AddToCartQuery {
    pub service_id: Option<String>,
    pub vehicle_size: Option<String>,
    pub service_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub service_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub service_date: String,
    #[serde(default)]
    pub service_time: String,
    #[serde(default)]
    pub payment_time: String,
    pub payment_method_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PayForm {
    pub payment_method_id: Option<String>,
}

// =============================================================================
// Cart Helpers
// =============================================================================

async fn load_cart(session: &Session) -> Result<Vec<CartItem>> {
    Ok(session.get(keys::CART).await?.unwrap_or_default())
}

async fn save_cart(session: &Session, cart: &[CartItem]) -> Result<()> {
    session.insert(keys::CART, cart).await?;
    Ok(())
}

fn cart_breakdown(items: &[CartItem]) -> PriceBreakdown {
    PriceBreakdown::from_prices(items.iter().filter_map(|item| item.price)).rounded()
}

/// Parse `"3,7, 9"` into service ids, ignoring anything that isn't one.
fn parse_service_ids(raw: &str) -> Vec<ServiceId> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i32>().ok())
        .map(ServiceId::new)
        .collect()
}

fn cart_item(service: &Service, size: VehicleSize, service_date: Option<&str>) -> CartItem {
    let price = service.price_for(size);
    CartItem {
        service_id: service.id,
        service_key: service.key.clone(),
        service_name: service.label.clone(),
        vehicle_size: size,
        service_date: service_date.map(str::to_string).filter(|d| !d.is_empty()),
        price: price.map(|p| p.price),
        completion_time: price.map(|p| p.completion_time.clone()).unwrap_or_default(),
    }
}

/// Add items to `cart`, skipping any already present for the same vehicle
/// size. Returns one flash per item.
fn merge_into_cart(cart: &mut Vec<CartItem>, items: Vec<CartItem>) -> Vec<(FlashLevel, String)> {
    items
        .into_iter()
        .map(|item| {
            let duplicate = cart
                .iter()
                .any(|c| c.service_id == item.service_id && c.vehicle_size == item.vehicle_size);
            if duplicate {
                (FlashLevel::Info, format!("{} is already in your cart.", item.service_name))
            } else {
                let message = format!("Added {} to your cart.", item.service_name);
                cart.push(item);
                (FlashLevel::Success, message)
            }
        })
        .collect()
}

fn order_lines(items: &[CartItem]) -> Vec<OrderLine> {
    items
        .iter()
        .map(|item| OrderLine {
            service_id: Some(item.service_id),
            service_key: item.service_key.clone(),
            label: item.service_name.clone(),
            vehicle_size: Some(item.vehicle_size),
            price: item.price,
            completion_time: item.completion_time.clone(),
        })
        .collect()
}

async fn load_customer(state: &AppState, current: &CurrentUser) -> Result<User> {
    UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
}

/// Names of the technicians who scheduled `orders`, by user id.
async fn tech_names(state: &AppState, orders: &[Order]) -> Result<HashMap<UserId, String>> {
    let mut ids: Vec<UserId> = orders.iter().filter_map(|o| o.scheduled_by).collect();
    ids.sort_unstable_by_key(UserId::as_i32);
    ids.dedup();
    let techs = UserRepository::new(state.pool()).get_many(&ids).await?;
    Ok(techs
        .into_iter()
        .map(|u| (u.id, u.display_name().to_string()))
        .collect())
}

fn tech_name(names: &HashMap<UserId, String>, order: &Order) -> String {
    order
        .scheduled_by
        .and_then(|id| names.get(&id).cloned())
        .unwrap_or_else(|| "Not scheduled yet".to_string())
}

// =============================================================================
// Cart
// =============================================================================

pub async fn add_to_cart(
    State(state): State<AppState>,
    session: Session,
    RequireCustomer(_user): RequireCustomer,
    Query(query): Query<AddToCartQuery>,
) -> Result<Response> {
    let ids = parse_service_ids(query.service_id.as_deref().unwrap_or_default());
    if ids.is_empty() {
        return Ok(flash_redirect(&session, FlashLevel::Danger, "No service_id provided.", "/").await);
    }

    let Some(size) = query.vehicle_size.as_deref().and_then(VehicleSize::normalize) else {
        return Ok(
            flash_redirect(&session, FlashLevel::Danger, "Please choose a vehicle size.", "/").await,
        );
    };

    let catalogue = state.catalogue().active(state.pool()).await?;
    let items: Vec<CartItem> = catalogue
        .iter()
        .filter(|service| ids.contains(&service.id))
        .map(|service| cart_item(service, size, query.service_date.as_deref()))
        .collect();
    if items.is_empty() {
        return Ok(
            flash_redirect(&session, FlashLevel::Danger, "Selected services not found.", "/").await,
        );
    }

    let mut cart = load_cart(&session).await?;
    let messages = merge_into_cart(&mut cart, items);
    save_cart(&session, &cart).await?;
    for (level, message) in messages {
        push_flash(&session, level, message).await?;
    }

    Ok(Redirect::to(CART_PATH).into_response())
}

pub async fn cart(
    State(state): State<AppState>,
    session: Session,
    page: Page,
    RequireCustomer(current): RequireCustomer,
) -> Result<Response> {
    let items = load_cart(&session).await?;
    let user = load_customer(&state, &current).await?;

    Ok(CartTemplate {
        page,
        breakdown: cart_breakdown(&items),
        items,
        address: user.address.full_address(),
    }
    .into_response())
}

pub async fn remove_from_cart(
    session: Session,
    RequireCustomer(_user): RequireCustomer,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let Some(id) = form
        .service_id
        .as_deref()
        .and_then(|s| s.trim().parse::<i32>().ok())
        .map(ServiceId::new)
    else {
        return Ok(
            flash_redirect(&session, FlashLevel::Danger, "No service_id provided.", CART_PATH).await,
        );
    };

    let mut cart = load_cart(&session).await?;
    let Some(index) = cart.iter().position(|item| item.service_id == id) else {
        return Ok(flash_redirect(
            &session,
            FlashLevel::Warning,
            "Item not found in your cart.",
            CART_PATH,
        )
        .await);
    };
    cart.remove(index);
    save_cart(&session, &cart).await?;

    Ok(flash_redirect(&session, FlashLevel::Success, "Item removed from your cart.", CART_PATH).await)
}

// =============================================================================
// Checkout
// =============================================================================

pub async fn checkout_page(
    session: Session,
    page: Page,
    RequireCustomer(_user): RequireCustomer,
) -> Result<Response> {
    let items = load_cart(&session).await?;
    if items.is_empty() {
        return Ok(flash_redirect(&session, FlashLevel::Info, "Your cart is empty.", CART_PATH).await);
    }

    let today = Utc::now().date_naive();
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    Ok(CheckoutTemplate {
        page,
        breakdown: cart_breakdown(&items),
        items,
        default_date: tomorrow.format("%Y-%m-%d").to_string(),
        min_date: today.format("%Y-%m-%d").to_string(),
    }
    .into_response())
}

/// A checked checkout form.
#[derive(Debug, PartialEq, Eq)]
struct CheckoutRequest {
    service_date: chrono::NaiveDateTime,
    timing: PaymentTiming,
}

fn parse_checkout(form: &CheckoutForm, today: NaiveDate) -> std::result::Result<CheckoutRequest, &'static str> {
    let (date, time, timing) = (
        form.service_date.trim(),
        form.service_time.trim(),
        form.payment_time.trim(),
    );
    if date.is_empty() || time.is_empty() || timing.is_empty() {
        return Err("Missing required information.");
    }

    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| "Invalid date or time format.")?;
    let time = NaiveTime::parse_from_str(time, "%H:%M").map_err(|_| "Invalid date or time format.")?;
    if date < today {
        return Err("Service date cannot be in the past.");
    }

    let timing = match timing {
        "now" => PaymentTiming::Now,
        "after" => PaymentTiming::After,
        _ => return Err("Invalid payment option."),
    };

    Ok(CheckoutRequest {
        service_date: date.and_time(time),
        timing,
    })
}

pub async fn checkout_submit(
    State(state): State<AppState>,
    session: Session,
    RequireCustomer(current): RequireCustomer,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    let items = load_cart(&session).await?;
    if items.is_empty() {
        return Ok(flash_redirect(&session, FlashLevel::Info, "Your cart is empty.", CART_PATH).await);
    }

    let request = match parse_checkout(&form, Utc::now().date_naive()) {
        Ok(request) => request,
        Err(message) => {
            tracing::warn!(reason = message, "Rejected checkout");
            return Ok(flash_redirect(&session, FlashLevel::Danger, message, CHECKOUT_PATH).await);
        }
    };

    let user = load_customer(&state, &current).await?;
    let breakdown = cart_breakdown(&items);
    let minutes = estimated_minutes(items.iter().map(|i| i.completion_time.as_str()));

    let new = NewOrder {
        user_id: Some(user.id),
        is_guest: false,
        guest_name: None,
        guest_email: None,
        guest_phone_number: None,
        guest_address: None,
        vehicle_size: items.first().map(|i| i.vehicle_size),
        lines: order_lines(&items),
        services_total: breakdown.services_total,
        fee: breakdown.fee,
        travel_fee: breakdown.travel_fee,
        final_price: Some(breakdown.final_total),
        estimated_minutes: i32::try_from(minutes).unwrap_or(i32::MAX),
        service_date: Some(request.service_date),
        payment_timing: request.timing,
        payment_status: PaymentStatus::Pending,
        address: Some(user.address.clone()).filter(|a| !a.is_empty()),
        salesperson_id: None,
        service_package: String::new(),
        senior_rv_discount: false,
    };

    let order = OrderRepository::new(state.pool()).create(&new).await?;
    tracing::info!(order_id = %order.id, user_id = %user.id, timing = %request.timing, "Order placed");
    save_cart(&session, &[]).await?;
    state.notifier().order_placed(&order, Some(&user)).await;

    if request.timing == PaymentTiming::After {
        return Ok(placed(&session).await);
    }

    match form.payment_method_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(pm) => charge_card(&state, &session, order, pm).await,
        None => {
            push_flash(
                &session,
                FlashLevel::Info,
                "Please enter your card details to proceed with payment.",
            )
            .await?;
            Ok(card_form(&state, &session, order, None).await)
        }
    }
}

async fn placed(session: &Session) -> Response {
    flash_redirect(
        session,
        FlashLevel::Success,
        "Your order has been placed successfully!",
        MY_ORDERS_PATH,
    )
    .await
}

async fn card_form(state: &AppState, session: &Session, order: Order, error: Option<String>) -> Response {
    CardPaymentTemplate {
        page: Page::load(session).await,
        order,
        publishable_key: state.config().stripe.publishable_key.clone(),
        error,
    }
    .into_response()
}

/// Charge `order` with a card collected by Stripe.js.
async fn charge_card(
    state: &AppState,
    session: &Session,
    order: Order,
    payment_method: &str,
) -> Result<Response> {
    let amount_cents = amount_in_cents(order.total())
        .map_err(|e| AppError::BadRequest(format!("Order total cannot be charged: {e}")))?;
    let order_id = order.id.to_string();
    add_breadcrumb("payment", "Customer card charge", Some(&[("order_id", order_id.as_str())][..]));
    let return_url = state.config().absolute_url(MY_ORDERS_PATH);
    let intent = state
        .stripe()
        .create_payment_intent(&NewPaymentIntent {
            amount_cents,
            order_id: order.id,
            payment_method: Some(payment_method),
            confirmation: Confirmation::Manual,
            description: Some(format!("Payment for Order {}", order.id)),
            return_url: Some(return_url),
        })
        .await;

    let intent = match intent {
        Ok(intent) => intent,
        Err(StripeError::Card(message)) => {
            tracing::warn!(order_id = %order.id, "Card declined at checkout");
            return Ok(card_form(state, session, order, Some(format!("Card error: {message}"))).await);
        }
        Err(e) => {
            tracing::error!(order_id = %order.id, error = %e, "Payment intent failed");
            return Ok(card_form(
                state,
                session,
                order,
                Some("Payment processing error. Please try again.".to_string()),
            )
            .await);
        }
    };

    let orders = OrderRepository::new(state.pool());
    let status = PaymentStatus::from_intent_status(&intent.status);
    orders
        .set_payment(order.id, Some(PaymentMethod::Card), status, Some(&intent.id))
        .await?;
    tracing::info!(order_id = %order.id, intent = %intent.id, status = %status, "Checkout payment attempted");

    match status {
        PaymentStatus::Paid => Ok(placed(session).await),
        PaymentStatus::RequiresAction => {
            push_flash(
                session,
                FlashLevel::Warning,
                "Additional authentication required. Please complete the payment.",
            )
            .await?;
            Ok(match intent.redirect_url() {
                Some(url) => Redirect::to(url).into_response(),
                None => Redirect::to(&pay_path(order.id)).into_response(),
            })
        }
        _ => Ok(flash_redirect(
            session,
            FlashLevel::Danger,
            "Something went wrong with your payment. Please try again.",
            &pay_path(order.id),
        )
        .await),
    }
}

fn pay_path(id: OrderId) -> String {
    format!("/customer/checkout/{id}/pay")
}

/// A customer's own order that still needs paying, or a redirect explaining
/// why not.
async fn payable_order(
    state: &AppState,
    session: &Session,
    current: &CurrentUser,
    id: OrderId,
) -> Result<std::result::Result<Order, Response>> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|o| o.user_id == Some(current.id));
    let Some(order) = order else {
        return Ok(Err(
            flash_redirect(session, FlashLevel::Danger, "Order not found.", MY_ORDERS_PATH).await,
        ));
    };
    if order.payment_status.is_settled() {
        return Ok(Err(flash_redirect(
            session,
            FlashLevel::Info,
            "This order has already been paid.",
            MY_ORDERS_PATH,
        )
        .await));
    }
    Ok(Ok(order))
}

pub async fn pay_page(
    State(state): State<AppState>,
    session: Session,
    RequireCustomer(current): RequireCustomer,
    Path(id): Path<OrderId>,
) -> Result<Response> {
    match payable_order(&state, &session, &current, id).await? {
        Ok(order) => Ok(card_form(&state, &session, order, None).await),
        Err(redirect) => Ok(redirect),
    }
}

pub async fn pay_submit(
    State(state): State<AppState>,
    session: Session,
    RequireCustomer(current): RequireCustomer,
    Path(id): Path<OrderId>,
    Form(form): Form<PayForm>,
) -> Result<Response> {
    let order = match payable_order(&state, &session, &current, id).await? {
        Ok(order) => order,
        Err(redirect) => return Ok(redirect),
    };

    match form.payment_method_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(pm) => charge_card(&state, &session, order, pm).await,
        None => Ok(card_form(
            &state,
            &session,
            order,
            Some("Please enter your card details to proceed with payment.".to_string()),
        )
        .await),
    }
}

// =============================================================================
// Orders
// =============================================================================

pub async fn my_orders(
    State(state): State<AppState>,
    page: Page,
    RequireCustomer(current): RequireCustomer,
) -> Result<impl IntoResponse> {
    let user = load_customer(&state, &current).await?;
    let orders = OrderRepository::new(state.pool())
        .list_for_customer(
            user.id,
            user.email.as_ref().map(cfac_core::Email::as_str),
            user.phone_number.as_ref().map(cfac_core::PhoneNumber::as_str),
        )
        .await?;

    let names = tech_names(&state, &orders).await?;
    let orders = orders
        .into_iter()
        .map(|order| CustomerOrder {
            tech_name: tech_name(&names, &order),
            order,
        })
        .collect();

    Ok(MyOrdersTemplate { page, orders })
}

pub async fn view_order(
    State(state): State<AppState>,
    session: Session,
    page: Page,
    RequireCustomer(current): RequireCustomer,
    Path(id): Path<String>,
) -> Result<Response> {
    let Ok(id) = id.parse::<OrderId>() else {
        return Ok(flash_redirect(&session, FlashLevel::Danger, "Invalid order ID.", MY_ORDERS_PATH).await);
    };

    let user = load_customer(&state, &current).await?;
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|o| o.visible_to_customer(&user));
    let Some(order) = order else {
        return Ok(flash_redirect(&session, FlashLevel::Danger, "Order not found.", MY_ORDERS_PATH).await);
    };

    let keys: Vec<String> = order.lines.iter().map(|l| l.service_key.clone()).collect();
    let services = ServiceRepository::new(state.pool()).get_by_keys(&keys).await?;
    let names = tech_names(&state, std::slice::from_ref(&order)).await?;

    Ok(OrderDetailTemplate {
        page,
        tech_name: tech_name(&names, &order),
        services,
        order,
    }
    .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn item(id: i32, size: VehicleSize, price: i64) -> CartItem {
        CartItem {
            service_id: ServiceId::new(id),
            service_key: format!("service_{id}"),
            service_name: format!("Service {id}"),
            vehicle_size: size,
            service_date: None,
            price: Some(Decimal::from(price)),
            completion_time: "60 minutes".to_string(),
        }
    }

    #[test]
    fn test_parse_service_ids_skips_garbage() {
        assert_eq!(
            parse_service_ids("3, 7,x,,9"),
            vec![ServiceId::new(3), ServiceId::new(7), ServiceId::new(9)]
        );
        assert!(parse_service_ids("").is_empty());
    }

    #[test]
    fn test_merge_skips_same_service_and_size() {
        let mut cart = vec![item(1, VehicleSize::Sedan4Door, 100)];
        let messages = merge_into_cart(
            &mut cart,
            vec![item(1, VehicleSize::Sedan4Door, 100), item(1, VehicleSize::Suv6Seater, 150)],
        );
        assert_eq!(cart.len(), 2);
        assert_eq!(messages[0], (FlashLevel::Info, "Service 1 is already in your cart.".to_string()));
        assert_eq!(messages[1], (FlashLevel::Success, "Added Service 1 to your cart.".to_string()));
    }

    #[test]
    fn test_cart_breakdown_ignores_unpriced_items() {
        let mut unpriced = item(2, VehicleSize::Sedan4Door, 0);
        unpriced.price = None;
        let breakdown = cart_breakdown(&[item(1, VehicleSize::Sedan4Door, 110), unpriced]);
        assert_eq!(breakdown.services_total, Decimal::from(110));
        assert_eq!(breakdown.final_total, Decimal::from(200));
    }

    fn form(date: &str, time: &str, timing: &str) -> CheckoutForm {
        CheckoutForm {
            service_date: date.to_string(),
            service_time: time.to_string(),
            payment_time: timing.to_string(),
            payment_method_id: None,
        }
    }

    #[test]
    fn test_parse_checkout() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let ok = parse_checkout(&form("2026-03-11", "09:30", "after"), today).unwrap();
        assert_eq!(ok.timing, PaymentTiming::After);
        assert_eq!(ok.service_date.format("%Y-%m-%d %H:%M").to_string(), "2026-03-11 09:30");

        assert_eq!(
            parse_checkout(&form("", "09:30", "now"), today),
            Err("Missing required information.")
        );
        assert_eq!(
            parse_checkout(&form("03/11/2026", "09:30", "now"), today),
            Err("Invalid date or time format.")
        );
        assert_eq!(
            parse_checkout(&form("2026-03-09", "09:30", "now"), today),
            Err("Service date cannot be in the past.")
        );
        assert!(parse_checkout(&form("2026-03-10", "08:00", "now"), today).is_ok());
    }

    #[test]
    fn test_tech_name_defaults() {
        let order = crate::models::order::tests::order();
        assert_eq!(tech_name(&HashMap::new(), &order), "Not scheduled yet");
    }
}
