//! Back-office pages for admins.
//!
//! Every handler takes [`RequireAdmin`]; anyone else is sent to the employee
//! login or home.

pub mod compensation;
pub mod orders;
pub mod users;

use std::collections::HashMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;

use cfac_core::{ApplicantId, Role, UserId};

use crate::db::orders::OrderCounts;
use crate::db::{ApplicantRepository, EstimateRepository, OrderRepository, Pagination, UserRepository};
use crate::error::Result;
use crate::filters;
use crate::middleware::{Page, RequireAdmin, flash_redirect};
use crate::models::session::FlashLevel;
use crate::models::{Applicant, EstimateRequest, Order, User};
use crate::state::AppState;

pub(crate) const ADMIN_HOME: &str = "/admin/main";

/// Load the users referenced by `ids`, keyed by id.
pub(crate) async fn users_by_id(
    state: &AppState,
    ids: impl IntoIterator<Item = UserId>,
) -> Result<HashMap<UserId, User>> {
    let mut ids: Vec<UserId> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    let users = UserRepository::new(state.pool()).get_many(&ids).await?;
    Ok(users.into_iter().map(|u| (u.id, u)).collect())
}

/// Name of an employee referenced by an order, `missing` when unset.
pub(crate) fn employee_name(
    users: &HashMap<UserId, User>,
    id: Option<UserId>,
    missing: &str,
) -> String {
    match id {
        None => missing.to_string(),
        Some(id) => users
            .get(&id)
            .map_or_else(|| "Unknown".to_string(), |u| u.display_name().to_string()),
    }
}

/// An order row on the admin dashboard.
pub struct AdminOrder {
    pub order: Order,
    pub order_type: &'static str,
    pub salesperson: String,
    pub technician: String,
    pub total: Decimal,
}

impl AdminOrder {
    fn new(order: Order, users: &HashMap<UserId, User>) -> Self {
        Self {
            order_type: order.order_type(),
            salesperson: employee_name(users, order.salesperson_id, "Not Assigned"),
            technician: employee_name(users, order.scheduled_by, "Not Scheduled Yet"),
            total: order.total(),
            order,
        }
    }
}

/// Order totals shown above the dashboard table.
pub struct OrderStats {
    pub total: i64,
    pub guest: i64,
    pub checkout: i64,
    pub guest_percent: f64,
    pub checkout_percent: f64,
}

impl From<OrderCounts> for OrderStats {
    fn from(counts: OrderCounts) -> Self {
        Self {
            total: counts.total,
            guest: counts.guest,
            checkout: counts.checkout(),
            guest_percent: counts.percent(counts.guest),
            checkout_percent: counts.percent(counts.checkout()),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/main.html")]
pub struct DashboardTemplate {
    pub page: Page,
    pub estimates: Vec<EstimateRequest>,
    pub orders: Vec<AdminOrder>,
    pub stats: OrderStats,
    pub role_counts: Vec<(Role, i64)>,
    pub current_page: i64,
    pub total_pages: i64,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/pending_users.html")]
pub struct PendingUsersTemplate {
    pub page: Page,
    pub applicants: Vec<Applicant>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

pub async fn dashboard(
    State(state): State<AppState>,
    page: Page,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse> {
    let pagination = Pagination::new(query.page, None);
    let orders = OrderRepository::new(state.pool());
    let counts = orders.counts().await?;
    let page_orders = orders.list_page(pagination).await?;

    let users = users_by_id(
        &state,
        page_orders
            .iter()
            .flat_map(|o| [o.salesperson_id, o.scheduled_by])
            .flatten()
            .collect::<Vec<_>>(),
    )
    .await?;

    Ok(DashboardTemplate {
        page,
        estimates: EstimateRepository::new(state.pool()).list_all().await?,
        orders: page_orders
            .into_iter()
            .map(|order| AdminOrder::new(order, &users))
            .collect(),
        stats: counts.into(),
        role_counts: UserRepository::new(state.pool()).count_by_role().await?,
        current_page: pagination.page,
        total_pages: pagination.total_pages(counts.total),
    })
}

pub async fn pending_users(
    State(state): State<AppState>,
    page: Page,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    Ok(PendingUsersTemplate {
        page,
        applicants: ApplicantRepository::new(state.pool()).list().await?,
    })
}

pub async fn dismiss_applicant(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ApplicantId>,
) -> Result<Response> {
    let (level, message) = if ApplicantRepository::new(state.pool()).delete(id).await? {
        tracing::info!(applicant_id = %id, admin_id = %admin.id, "Applicant dismissed");
        (FlashLevel::Success, "Applicant dismissed.")
    } else {
        (FlashLevel::Warning, "Applicant not found.")
    };
    Ok(flash_redirect(&session, level, message, "/admin/pending_users").await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::order::tests::order;
    use crate::models::user::tests::user;

    #[test]
    fn test_admin_order_names() {
        let mut o = order();
        o.salesperson_id = Some(UserId::new(1));
        o.scheduled_by = Some(UserId::new(99));
        let users = HashMap::from([(UserId::new(1), user(Role::Sales))]);

        let row = AdminOrder::new(o, &users);
        assert_eq!(row.order_type, "Guest Order");
        assert_eq!(row.salesperson, "Pat Lee");
        assert_eq!(row.technician, "Unknown");
        assert_eq!(row.total, Decimal::from(200));

        let row = AdminOrder::new(order(), &HashMap::new());
        assert_eq!(row.salesperson, "Not Assigned");
        assert_eq!(row.technician, "Not Scheduled Yet");
    }

    #[test]
    fn test_stats_with_no_orders() {
        let stats = OrderStats::from(OrderCounts::default());
        assert_eq!(stats.total, 0);
        assert!(stats.guest_percent.abs() < f64::EPSILON);
        assert!(stats.checkout_percent.abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_percentages() {
        let stats = OrderStats::from(OrderCounts { total: 3, guest: 1 });
        assert_eq!(stats.checkout, 2);
        assert!((stats.guest_percent - 33.3).abs() < 1e-9);
        assert!((stats.checkout_percent - 66.7).abs() < 1e-9);
    }
}
