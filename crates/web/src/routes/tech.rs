//! Technician job board and schedule.

use std::collections::HashMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use cfac_core::{OrderId, OrderStatus, UserId};

use crate::db::{OrderRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{Page, RequireTech, flash_redirect};
use crate::models::session::FlashLevel;
use crate::models::{Order, User};
use crate::state::AppState;

const TECH_HOME: &str = "/tech/main";
const MY_SCHEDULE: &str = "/tech/my_schedule";
const NOT_SCHEDULABLE: &str = "Only orders with status \"ordered\" can be scheduled.";

/// A job on the technician pages with its customer details resolved.
pub struct TechJob {
    pub order: Order,
    pub customer: String,
    pub phone: String,
    pub address: String,
}

impl TechJob {
    fn new(order: Order, customers: &HashMap<UserId, User>) -> Self {
        let customer = order.user_id.and_then(|id| customers.get(&id));
        let contact = customer
            .and_then(|u| u.email.as_ref())
            .map(|e| e.as_str().to_string())
            .or_else(|| order.guest_email.clone().filter(|e| !e.is_empty()))
            .unwrap_or_else(|| "Guest".to_string());
        let phone = order
            .guest_phone_number
            .clone()
            .filter(|p| !p.is_empty())
            .or_else(|| customer.map(|u| u.phone_str().to_string()))
            .unwrap_or_default();
        let address = order
            .service_address(customer)
            .map(|a| a.full_address())
            .unwrap_or_else(|| "Not provided".to_string());

        Self {
            order,
            customer: contact,
            phone,
            address,
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "tech/main.html")]
pub struct TechMainTemplate {
    pub page: Page,
    pub jobs: Vec<TechJob>,
}

#[derive(Template, WebTemplate)]
#[template(path = "tech/my_schedule.html")]
pub struct MyScheduleTemplate {
    pub page: Page,
    pub jobs: Vec<TechJob>,
}

#[derive(Template, WebTemplate)]
#[template(path = "tech/view_order.html")]
pub struct TechOrderTemplate {
    pub page: Page,
    pub job: TechJob,
    pub customer_name: String,
}

async fn with_customers(state: &AppState, orders: Vec<Order>) -> Result<Vec<TechJob>> {
    let mut ids: Vec<UserId> = orders.iter().filter_map(|o| o.user_id).collect();
    ids.sort_unstable();
    ids.dedup();
    let customers: HashMap<UserId, User> = UserRepository::new(state.pool())
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    Ok(orders
        .into_iter()
        .map(|order| TechJob::new(order, &customers))
        .collect())
}

async fn load_user(state: &AppState, id: UserId) -> Result<Option<User>> {
    Ok(UserRepository::new(state.pool()).get_by_id(id).await?)
}

pub async fn main(
    State(state): State<AppState>,
    page: Page,
    RequireTech(_tech): RequireTech,
) -> Result<impl IntoResponse> {
    let orders = OrderRepository::new(state.pool()).list_available().await?;
    Ok(TechMainTemplate {
        page,
        jobs: with_customers(&state, orders).await?,
    })
}

pub async fn my_schedule(
    State(state): State<AppState>,
    page: Page,
    RequireTech(tech): RequireTech,
) -> Result<impl IntoResponse> {
    let orders = OrderRepository::new(state.pool())
        .list_scheduled_by(tech.id)
        .await?;
    Ok(MyScheduleTemplate {
        page,
        jobs: with_customers(&state, orders).await?,
    })
}

pub async fn schedule(
    State(state): State<AppState>,
    session: Session,
    RequireTech(current): RequireTech,
    Path(id): Path<OrderId>,
) -> Result<Response> {
    let orders = OrderRepository::new(state.pool());
    let Some(order) = orders.get(id).await? else {
        return Ok(flash_redirect(&session, FlashLevel::Danger, "Order not found.", TECH_HOME).await);
    };

    if !order.status.can_advance_to(OrderStatus::Scheduled) {
        return Ok(flash_redirect(&session, FlashLevel::Danger, NOT_SCHEDULABLE, TECH_HOME).await);
    }
    // Another technician may have taken the job since the page loaded.
    let Some(order) = orders.schedule(id, current.id).await? else {
        return Ok(flash_redirect(&session, FlashLevel::Danger, NOT_SCHEDULABLE, TECH_HOME).await);
    };
    tracing::info!(order_id = %id, tech_id = %current.id, "Order scheduled");

    let tech = load_user(&state, current.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;
    let customer = match order.user_id {
        Some(user_id) => load_user(&state, user_id).await?,
        None => None,
    };

    match state
        .notifier()
        .order_scheduled(&order, customer.as_ref(), &tech)
        .await
    {
        Ok(()) => Ok(flash_redirect(
            &session,
            FlashLevel::Success,
            "Order scheduled successfully. The customer has been notified.",
            MY_SCHEDULE,
        )
        .await),
        Err(e) => {
            tracing::warn!(order_id = %id, error = %e, "Failed to send schedule email");
            Ok(flash_redirect(
                &session,
                FlashLevel::Warning,
                "Order scheduled, but the customer could not be emailed.",
                MY_SCHEDULE,
            )
            .await)
        }
    }
}

pub async fn complete(
    State(state): State<AppState>,
    session: Session,
    RequireTech(current): RequireTech,
    Path(id): Path<OrderId>,
) -> Result<Response> {
    let orders = OrderRepository::new(state.pool());
    let Some(order) = orders.get(id).await? else {
        return Ok(flash_redirect(&session, FlashLevel::Danger, "Order not found.", MY_SCHEDULE).await);
    };
    if order.scheduled_by != Some(current.id) {
        return Ok(flash_redirect(
            &session,
            FlashLevel::Danger,
            "You do not have permission to modify this order.",
            MY_SCHEDULE,
        )
        .await);
    }
    if !order.status.can_advance_to(OrderStatus::Completed)
        || orders.complete(id, current.id).await?.is_none()
    {
        return Ok(flash_redirect(
            &session,
            FlashLevel::Danger,
            "Only scheduled orders can be completed.",
            MY_SCHEDULE,
        )
        .await);
    }

    tracing::info!(order_id = %id, tech_id = %current.id, "Order completed");
    Ok(flash_redirect(&session, FlashLevel::Success, "Order marked as completed.", MY_SCHEDULE).await)
}

pub async fn view_order(
    State(state): State<AppState>,
    session: Session,
    page: Page,
    RequireTech(current): RequireTech,
    Path(id): Path<OrderId>,
) -> Result<Response> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|o| o.scheduled_by == Some(current.id));
    let Some(order) = order else {
        return Ok(flash_redirect(
            &session,
            FlashLevel::Danger,
            "You do not have permission to view this order.",
            TECH_HOME,
        )
        .await);
    };

    let customer = match order.user_id {
        Some(user_id) => load_user(&state, user_id).await?,
        None => None,
    };
    let customer_name = order.customer_name(customer.as_ref()).to_string();
    let customers: HashMap<UserId, User> = customer.into_iter().map(|u| (u.id, u)).collect();

    Ok(TechOrderTemplate {
        page,
        job: TechJob::new(order, &customers),
        customer_name,
    }
    .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cfac_core::{Address, Role};

    use super::*;
    use crate::models::order::tests::order;
    use crate::models::user::tests::user;

    #[test]
    fn test_status_guards_match_repository_updates() {
        // OrderRepository::schedule and ::complete only match these rows.
        let schedulable: Vec<_> = OrderStatus::ALL
            .iter()
            .filter(|s| s.can_advance_to(OrderStatus::Scheduled))
            .collect();
        assert_eq!(schedulable, [&OrderStatus::Ordered]);

        let completable: Vec<_> = OrderStatus::ALL
            .iter()
            .filter(|s| s.can_advance_to(OrderStatus::Completed))
            .collect();
        assert_eq!(completable, [&OrderStatus::Scheduled]);
    }

    #[test]
    fn test_guest_job_uses_guest_details() {
        let mut o = order();
        o.guest_email = None;
        let job = TechJob::new(o, &HashMap::new());
        assert_eq!(job.customer, "Guest");
        assert_eq!(job.phone, "5125550199");
        assert_eq!(job.address, "Not provided");
    }

    #[test]
    fn test_customer_job_uses_account_details() {
        let mut o = order();
        o.is_guest = false;
        o.guest_email = None;
        o.guest_phone_number = None;
        o.user_id = Some(UserId::new(1));
        let mut customer = user(Role::Customer);
        customer.address = Address {
            street: "12 Elm Street".to_string(),
            unit_apt: String::new(),
            city: "Austin".to_string(),
            country: "United States".to_string(),
            zip_code: "78701".to_string(),
        };
        let customers = HashMap::from([(UserId::new(1), customer)]);

        let job = TechJob::new(o, &customers);
        assert_eq!(job.customer, "pat@example.com");
        assert_eq!(job.phone, "5125550100");
        assert!(job.address.contains("12 Elm Street"));
    }
}
