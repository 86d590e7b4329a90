//! Admin order view, edit, and delete.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;

use cfac_core::pricing::{PricingError, minimum_total, validate_admin_total};
use cfac_core::{OrderId, OrderStatus, PaymentMethod};

use super::{ADMIN_HOME, employee_name, users_by_id};
use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{Page, RequireAdmin, flash_redirect};
use crate::models::Order;
use crate::models::order::OrderEdit;
use crate::models::session::FlashLevel;
use crate::state::AppState;

#[derive(Template, WebTemplate)]
#[template(path = "admin/view_order.html")]
pub struct ViewOrderTemplate {
    pub page: Page,
    pub order: Order,
    pub customer_name: String,
    pub customer_email: String,
    pub address: String,
    pub salesperson: String,
    pub technician: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/edit_order.html")]
pub struct EditOrderTemplate {
    pub page: Page,
    pub order: Order,
    pub statuses: &'static [OrderStatus],
    pub methods: &'static [PaymentMethod],
    /// What the order's services sell for with fees, shown beside the floor.
    pub standard_price: Decimal,
    pub error: Option<String>,
}

impl EditOrderTemplate {
    fn new(page: Page, order: Order, error: Option<String>) -> Self {
        Self {
            page,
            standard_price: minimum_total(order.services_total),
            order,
            statuses: OrderStatus::ALL,
            methods: PaymentMethod::ALL,
            error,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EditOrderForm {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub total: String,
    #[serde(default)]
    pub service_date: String,
}

async fn load_order(state: &AppState, id: OrderId) -> Result<Order> {
    OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found.".to_string()))
}

/// Parse a `datetime-local` value, or a bare date that keeps the order's
/// current time of day.
fn parse_service_date(raw: &str, current: Option<NaiveDateTime>) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M"))
        .ok()
        .or_else(|| {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
            let time = current.map_or(NaiveTime::MIN, |c| c.time());
            Some(date.and_time(time))
        })
}

/// Apply the edit form to `order`, checking the total against its services.
fn apply_edit(order: &Order, form: &EditOrderForm) -> std::result::Result<OrderEdit, String> {
    let status = form
        .status
        .parse::<OrderStatus>()
        .map_err(|_| "Invalid order status.".to_string())?;

    let payment_method = match form.payment_method.trim() {
        "" | "none" => None,
        other => Some(
            other
                .parse::<PaymentMethod>()
                .map_err(|_| "Invalid payment method.".to_string())?,
        ),
    };

    let total = form
        .total
        .trim()
        .trim_start_matches('$')
        .parse::<Decimal>()
        .map_err(|_| "Total price must be a number.".to_string())?;
    let final_price = validate_admin_total(total, order.services_total).map_err(|e| match e {
        PricingError::BelowMinimum { minimum } => format!(
            "Total price cannot be less than the services subtotal of {}.",
            filters::format_currency(minimum)
        ),
        _ => "Total price cannot be negative.".to_string(),
    })?;

    let service_date = if form.service_date.trim().is_empty() {
        order.service_date
    } else {
        Some(
            parse_service_date(&form.service_date, order.service_date)
                .ok_or_else(|| "Invalid service date.".to_string())?,
        )
    };

    Ok(OrderEdit {
        status,
        payment_method,
        final_price,
        service_date,
    })
}

pub async fn view_order(
    State(state): State<AppState>,
    page: Page,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    let order = load_order(&state, id).await?;
    let users = users_by_id(
        &state,
        [order.user_id, order.salesperson_id, order.scheduled_by]
            .into_iter()
            .flatten(),
    )
    .await?;
    let customer = order.user_id.and_then(|id| users.get(&id));

    Ok(ViewOrderTemplate {
        customer_name: order.customer_name(customer).to_string(),
        customer_email: order.customer_email(customer).unwrap_or_default(),
        address: order
            .service_address(customer)
            .map(|a| a.full_address())
            .unwrap_or_else(|| "Not provided".to_string()),
        salesperson: employee_name(&users, order.salesperson_id, "Not Assigned"),
        technician: employee_name(&users, order.scheduled_by, "Not Scheduled Yet"),
        page,
        order,
    })
}

pub async fn edit_order_page(
    State(state): State<AppState>,
    page: Page,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    Ok(EditOrderTemplate::new(page, load_order(&state, id).await?, None))
}

pub async fn edit_order_submit(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Form(form): Form<EditOrderForm>,
) -> Result<Response> {
    let order = load_order(&state, id).await?;
    let edit_path = format!("/admin/edit_order/{id}");

    let edit = match apply_edit(&order, &form) {
        Ok(edit) => edit,
        Err(message) => {
            tracing::warn!(order_id = %id, reason = %message, "Rejected order edit");
            return Ok(
                EditOrderTemplate::new(Page::load(&session).await, order, Some(message))
                    .into_response(),
            );
        }
    };

    if edit == OrderEdit::from_order(&order) {
        return Ok(
            flash_redirect(&session, FlashLevel::Info, "No changes made to the order.", &edit_path)
                .await,
        );
    }

    OrderRepository::new(state.pool()).admin_update(id, &edit).await?;
    tracing::info!(order_id = %id, admin_id = %admin.id, status = %edit.status, "Order updated by admin");

    Ok(flash_redirect(
        &session,
        FlashLevel::Success,
        "Order updated successfully.",
        &format!("/admin/view_order/{id}"),
    )
    .await)
}

pub async fn delete_order(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Response> {
    let (level, message) = if OrderRepository::new(state.pool()).delete(id).await? {
        tracing::info!(order_id = %id, admin_id = %admin.id, "Order deleted");
        (FlashLevel::Success, "Order deleted successfully.")
    } else {
        (FlashLevel::Danger, "Order not found.")
    };
    Ok(flash_redirect(&session, level, message, ADMIN_HOME).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::order::tests::order;

    fn form(status: &str, method: &str, total: &str, date: &str) -> EditOrderForm {
        EditOrderForm {
            status: status.to_string(),
            payment_method: method.to_string(),
            total: total.to_string(),
            service_date: date.to_string(),
        }
    }

    #[test]
    fn test_unchanged_form_matches_current_order() {
        let o = order();
        let edit = apply_edit(&o, &form("ordered", "", "200", "")).unwrap();
        assert_eq!(edit, OrderEdit::from_order(&o));
    }

    #[test]
    fn test_edit_parses_fields() {
        let o = order();
        let edit = apply_edit(&o, &form("scheduled", "cash", "$250.505", "2026-05-01T14:30")).unwrap();
        assert_eq!(edit.status, OrderStatus::Scheduled);
        assert_eq!(edit.payment_method, Some(PaymentMethod::Cash));
        assert_eq!(edit.final_price, "250.51".parse::<Decimal>().unwrap());
        assert_eq!(
            edit.service_date.unwrap().format("%Y-%m-%d %H:%M").to_string(),
            "2026-05-01 14:30"
        );
    }

    #[test]
    fn test_edit_page_shows_standard_price() {
        let page = EditOrderTemplate::new(Page::default(), order(), None);
        assert_eq!(page.standard_price, Decimal::from(200));
        let html = page.render().unwrap();
        assert!(html.contains("Standard price $200.00"));
    }

    #[test]
    fn test_total_below_services_subtotal_rejected() {
        let o = order();
        assert_eq!(
            apply_edit(&o, &form("ordered", "", "109.99", "")).unwrap_err(),
            "Total price cannot be less than the services subtotal of $110.00."
        );
        assert_eq!(
            apply_edit(&o, &form("ordered", "", "-1", "")).unwrap_err(),
            "Total price cannot be negative."
        );
        assert!(apply_edit(&o, &form("shipped", "", "200", "")).is_err());
    }

    #[test]
    fn test_bare_date_keeps_time() {
        let current = NaiveDate::from_ymd_opt(2026, 1, 2)
            .unwrap()
            .and_hms_opt(9, 15, 0);
        let parsed = parse_service_date("2026-02-03", current).unwrap();
        assert_eq!(parsed.format("%Y-%m-%d %H:%M").to_string(), "2026-02-03 09:15");
        assert!(parse_service_date("tomorrow", current).is_none());
    }
}
