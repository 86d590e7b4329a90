//! Employee compensation tracking.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use cfac_core::{EmployeeKind, OrderId};

use super::{PageQuery, employee_name, users_by_id};
use crate::db::{OrderRepository, Pagination};
use crate::error::Result;
use crate::filters;
use crate::middleware::{Page, RequireAdmin, flash_redirect};
use crate::models::Order;
use crate::models::session::FlashLevel;
use crate::state::AppState;

const COMPENSATION: &str = "/admin/compensation";

/// An order with the employees owed for it.
pub struct CompensationRow {
    pub order: Order,
    pub technician: String,
    pub salesperson: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/compensation.html")]
pub struct CompensationTemplate {
    pub page: Page,
    pub rows: Vec<CompensationRow>,
    pub current_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Deserialize)]
pub struct CompensationForm {
    pub order_id: Option<String>,
    pub employee_type: Option<String>,
}

impl CompensationForm {
    fn parse(&self) -> Option<(OrderId, EmployeeKind)> {
        let id = self.order_id.as_deref()?.trim().parse().ok()?;
        let kind = self.employee_type.as_deref()?.trim().parse().ok()?;
        Some((id, kind))
    }
}

pub async fn compensation(
    State(state): State<AppState>,
    page: Page,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse> {
    let pagination = Pagination::new(query.page, None);
    let orders = OrderRepository::new(state.pool());
    let total = orders.counts().await?.total;
    let page_orders = orders.list_by_service_date(pagination).await?;

    let users = users_by_id(
        &state,
        page_orders
            .iter()
            .flat_map(|o| [o.scheduled_by, o.salesperson_id])
            .flatten()
            .collect::<Vec<_>>(),
    )
    .await?;

    Ok(CompensationTemplate {
        page,
        rows: page_orders
            .into_iter()
            .map(|order| CompensationRow {
                technician: employee_name(&users, order.scheduled_by, "Not Assigned"),
                salesperson: employee_name(&users, order.salesperson_id, "Not Assigned"),
                order,
            })
            .collect(),
        current_page: pagination.page,
        total_pages: pagination.total_pages(total),
    })
}

pub async fn create_compensation(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Form(form): Form<CompensationForm>,
) -> Result<Response> {
    let Some((order_id, kind)) = form.parse() else {
        return Ok(flash_redirect(
            &session,
            FlashLevel::Danger,
            "Invalid request parameters.",
            COMPENSATION,
        )
        .await);
    };

    let updated = OrderRepository::new(state.pool())
        .mark_compensation_paid(order_id, kind)
        .await?;
    if !updated {
        return Ok(flash_redirect(&session, FlashLevel::Danger, "Order not found.", COMPENSATION).await);
    }

    tracing::info!(order_id = %order_id, employee = %kind, admin_id = %admin.id, "Compensation marked paid");
    Ok(flash_redirect(
        &session,
        FlashLevel::Success,
        "Compensation marked as paid.",
        COMPENSATION,
    )
    .await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(order_id: Option<&str>, kind: Option<&str>) -> CompensationForm {
        CompensationForm {
            order_id: order_id.map(str::to_string),
            employee_type: kind.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_compensation_form() {
        assert_eq!(
            form(Some("12"), Some("salesperson")).parse(),
            Some((OrderId::new(12), EmployeeKind::Salesperson))
        );
        assert_eq!(form(Some("12"), Some("tech")).parse().unwrap().1, EmployeeKind::Tech);
        assert!(form(Some("abc"), Some("tech")).parse().is_none());
        assert!(form(Some("12"), Some("admin")).parse().is_none());
        assert!(form(None, Some("tech")).parse().is_none());
    }
}
