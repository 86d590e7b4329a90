//! Service catalogue for the field apps.

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_services(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let services = state.catalogue().active(state.pool()).await?;
    let services: Vec<Value> = services
        .iter()
        .map(|s| {
            json!({
                "key": s.key,
                "label": s.label,
                "category": s.category,
                "price_by_vehicle_size": s.price_by_vehicle_size,
            })
        })
        .collect();
    Ok(Json(json!({ "services": services })))
}
