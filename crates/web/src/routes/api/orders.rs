//! Order listings for the field apps.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use cfac_core::Role;

use crate::db::{OrderRepository, Pagination};
use crate::error::{ApiError, ApiResult};
use crate::middleware::BearerUser;
use crate::state::AppState;

const DEFAULT_PER_PAGE: i64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Orders placed by or for the token's user, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    BearerUser(user): BearerUser,
    Query(query): Query<OrdersQuery>,
) -> ApiResult<Json<Value>> {
    let page = Pagination::new(query.page, Some(query.per_page.unwrap_or(DEFAULT_PER_PAGE)));
    let (orders, total) = OrderRepository::new(state.pool())
        .list_for_user(user.id, page)
        .await?;

    Ok(Json(json!({
        "orders": orders,
        "page": page.page,
        "per_page": page.per_page,
        "total_orders": total,
    })))
}

/// Jobs with a collected down payment, for technicians.
pub async fn orders_with_downpayment(
    State(state): State<AppState>,
    BearerUser(user): BearerUser,
) -> ApiResult<Json<Value>> {
    if user.role != Role::Tech {
        return Err(ApiError::forbidden("Access denied."));
    }
    let orders = OrderRepository::new(state.pool()).list_with_downpayment().await?;
    Ok(Json(json!({ "orders": orders })))
}
