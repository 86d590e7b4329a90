//! Sales territories drawn in the field app.

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use cfac_core::geo::{GeoError, LonLat, Ring};

use crate::db::TerritoryRepository;
use crate::error::{ApiError, ApiResult};
use crate::middleware::BearerUser;
use crate::models::Territory;
use crate::state::AppState;

/// Pull `ring_lonlat` and the optional `name` out of the request body.
fn parse_request(body: &Value) -> Result<(Ring, Option<String>), ApiError> {
    let points = match body.get("ring_lonlat") {
        None | Some(Value::Null) => Vec::new(),
        Some(raw) => serde_json::from_value::<Vec<LonLat>>(raw.clone()).map_err(|_| {
            ApiError::bad_request("ring_lonlat must be a list of [longitude, latitude] pairs")
        })?,
    };
    let ring = Ring::close(points).map_err(|e: GeoError| ApiError::bad_request(e.to_string()))?;
    let name = body
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(ToString::to_string);
    Ok((ring, name))
}

pub async fn create_territory(
    State(state): State<AppState>,
    BearerUser(user): BearerUser,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<Territory>)> {
    let (ring, name) = parse_request(&body)?;
    let territories = TerritoryRepository::new(state.pool());
    let name = match name {
        Some(name) => name,
        None => format!("Territory {}", territories.count_for_user(user.id).await? + 1),
    };

    let territory = territories.create(user.id, &name, &ring).await?;
    tracing::info!(
        territory_id = %territory.id,
        user_id = %user.id,
        vertices = ring.points().len(),
        "Territory created"
    );
    Ok((StatusCode::CREATED, Json(territory)))
}

pub async fn list_territories(
    State(state): State<AppState>,
    BearerUser(user): BearerUser,
) -> ApiResult<Json<Vec<Territory>>> {
    let territories = TerritoryRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(territories))
}

/// Placeholder until house data is available to the field app.
pub async fn houses_in_area(BearerUser(_user): BearerUser) -> Json<Value> {
    Json(json!({ "ok": true, "message": "stub" }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_closed_and_name_optional() {
        let body = json!({
            "ring_lonlat": [[-97.75, 30.26], [-97.70, 30.26], [-97.70, 30.30]],
            "name": "  "
        });
        let (ring, name) = parse_request(&body).unwrap();
        assert_eq!(ring.points().len(), 4);
        assert_eq!(ring.points().first(), ring.points().last());
        assert!(name.is_none());
    }

    #[test]
    fn test_invalid_rings_rejected() {
        let err = parse_request(&json!({"ring_lonlat": [[0.0, 0.0], [1.0, 1.0]]})).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "ring_lonlat must have at least 3 vertices");

        let err = parse_request(&json!({})).unwrap_err();
        assert_eq!(err.message, "ring_lonlat must have at least 3 vertices");

        let err = parse_request(&json!({"ring_lonlat": "north austin"})).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
