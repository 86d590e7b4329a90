//! Guest orders booked by salespeople from the field app.

use axum::{Json, extract::State, http::StatusCode};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde_json::{Map, Value, json};

use cfac_core::pricing::{PriceBreakdown, estimated_minutes, format_service_name};
use cfac_core::{Address, PaymentStatus, PaymentTiming, Role, VehicleSize};

use crate::db::OrderRepository;
use crate::error::{ApiError, ApiResult};
use crate::middleware::OptionalBearerUser;
use crate::models::order::NewOrder;
use crate::models::{OrderLine, Service};
use crate::state::AppState;

const REQUIRED_FIELDS: [&str; 5] = [
    "guest_name",
    "guest_email",
    "vehicle_size",
    "guest_address",
    "selectedServices",
];
const ADDRESS_FIELDS: [&str; 5] = ["street_address", "unit_apt", "city", "country", "zip_code"];

/// `['a', 'b']`, the list format the field app already parses.
fn field_list(fields: &[&str]) -> String {
    let quoted: Vec<String> = fields.iter().map(|f| format!("'{f}'")).collect();
    format!("[{}]", quoted.join(", "))
}

fn missing<'a>(object: &Map<String, Value>, fields: &[&'a str]) -> Vec<&'a str> {
    fields
        .iter()
        .copied()
        .filter(|f| !object.contains_key(*f))
        .collect()
}

fn text(object: &Map<String, Value>, field: &str) -> String {
    match object.get(field) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn parse_address(object: &Map<String, Value>) -> Address {
    let country = text(object, "country");
    Address {
        street: text(object, "street_address"),
        unit_apt: text(object, "unit_apt"),
        city: text(object, "city"),
        country: if country.is_empty() {
            Address::DEFAULT_COUNTRY.to_string()
        } else {
            country
        },
        zip_code: text(object, "zip_code"),
    }
}

fn decimal(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.trim().trim_start_matches('$').parse().ok(),
        _ => None,
    }
}

/// A client-supplied line price: absent, or a non-negative amount.
fn client_price(object: &Map<String, Value>, name: &str) -> Result<Option<Decimal>, String> {
    match object.get("price") {
        None | Some(Value::Null) => Ok(None),
        raw => decimal(raw)
            .filter(|p| *p >= Decimal::ZERO)
            .map(Some)
            .ok_or_else(|| format!("Invalid price for service {name}")),
    }
}

/// Resolve one `selectedServices` entry: a catalogue key, or an object
/// carrying `key`/`label` and optionally its own `price`.
fn order_line(
    entry: &Value,
    size: Option<VehicleSize>,
    catalogue: &[Service],
) -> Result<Option<OrderLine>, String> {
    let (key, label, price) = match entry {
        Value::String(key) => (key.trim().to_string(), String::new(), None),
        Value::Object(object) => {
            let label = text(object, "label");
            let key = Some(text(object, "key"))
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| format_service_name(&label));
            let name = if label.is_empty() { key.clone() } else { label.clone() };
            let price = client_price(object, &name)?;
            (key, label, price)
        }
        _ => return Ok(None),
    };
    if key.is_empty() {
        return Ok(None);
    }

    let known = catalogue.iter().find(|s| s.key == key);
    let priced = known.zip(size).and_then(|(s, size)| s.price_for(size));
    Ok(Some(OrderLine {
        service_id: known.map(|s| s.id),
        label: known.map_or(label, |s| s.label.clone()),
        vehicle_size: size,
        price: priced.map(|p| p.price).or(price),
        completion_time: priced.map(|p| p.completion_time.clone()).unwrap_or_default(),
        service_key: key,
    }))
}

fn parse_service_date(object: &Map<String, Value>) -> Option<NaiveDateTime> {
    let raw = text(object, "service_date");
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&raw, format).ok())
}

/// Build the order from the request body, or the 400 message.
fn parse_guest_order(
    body: &Value,
    catalogue: &[Service],
) -> Result<NewOrder, String> {
    let Some(object) = body.as_object() else {
        return Err("Invalid or missing JSON data.".to_string());
    };
    let absent = missing(object, &REQUIRED_FIELDS);
    if !absent.is_empty() {
        return Err(format!("Missing required fields: {}", field_list(&absent)));
    }

    let Some(address) = object.get("guest_address").and_then(Value::as_object) else {
        return Err("guest_address must be provided as an object.".to_string());
    };
    let absent = missing(address, &ADDRESS_FIELDS);
    if !absent.is_empty() {
        return Err(format!("Missing required address fields: {}", field_list(&absent)));
    }

    let size = VehicleSize::normalize(&text(object, "vehicle_size"));
    let mut lines = Vec::new();
    for entry in object
        .get("selectedServices")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
    {
        lines.extend(order_line(entry, size, catalogue)?);
    }

    let breakdown = PriceBreakdown::from_prices(lines.iter().filter_map(|l| l.price)).rounded();
    let minutes = estimated_minutes(lines.iter().map(|l| l.completion_time.as_str()));
    let phone = text(object, "guest_phone_number");

    Ok(NewOrder {
        user_id: None,
        is_guest: true,
        guest_name: Some(text(object, "guest_name")),
        guest_email: Some(text(object, "guest_email").to_lowercase()),
        guest_phone_number: Some(phone).filter(|p| !p.is_empty()),
        guest_address: Some(parse_address(address)),
        vehicle_size: size,
        services_total: breakdown.services_total,
        fee: breakdown.fee,
        travel_fee: breakdown.travel_fee,
        final_price: (!lines.is_empty()).then_some(breakdown.final_total),
        estimated_minutes: i32::try_from(minutes).unwrap_or(i32::MAX),
        lines,
        service_date: parse_service_date(object),
        payment_timing: PaymentTiming::PayNow,
        payment_status: PaymentStatus::Unpaid,
        address: None,
        salesperson_id: None,
        service_package: text(object, "service_package"),
        senior_rv_discount: object
            .get("senior_rv_discount")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

pub async fn create_guest_order(
    State(state): State<AppState>,
    OptionalBearerUser(seller): OptionalBearerUser,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let catalogue = state.catalogue().active(state.pool()).await?;
    let mut new = parse_guest_order(&body, &catalogue).map_err(|message| {
        tracing::warn!(reason = %message, "Rejected guest order");
        ApiError::bad_request(message)
    })?;
    new.salesperson_id = seller.filter(|u| u.role == Role::Sales).map(|u| u.id);

    let order = OrderRepository::new(state.pool()).create(&new).await?;
    tracing::info!(order_id = %order.id, salesperson_id = ?order.salesperson_id, "Guest order created");
    state.notifier().guest_order_created(&order).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Order created successfully!",
            "order_id": order.id,
        })),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use cfac_core::ServiceId;
    use cfac_core::pricing::SizePrice;

    use super::*;

    fn catalogue() -> Vec<Service> {
        vec![Service {
            id: ServiceId::new(3),
            key: "sedan_complete_detailing".to_string(),
            label: "Sedan Complete Detailing".to_string(),
            category: "Detailing Services".to_string(),
            active: true,
            image: None,
            price_by_vehicle_size: BTreeMap::from([(
                VehicleSize::Sedan4Door,
                SizePrice {
                    price: Decimal::from(110),
                    completion_time: "120 minutes".to_string(),
                },
            )]),
        }]
    }

    fn body() -> Value {
        json!({
            "guest_name": "Sam Guest",
            "guest_email": "Sam@Example.com",
            "vehicle_size": "sedan_4_door",
            "guest_address": {
                "street_address": "12 Elm Street",
                "unit_apt": "",
                "city": "Austin",
                "country": "",
                "zip_code": "78701"
            },
            "selectedServices": ["sedan_complete_detailing", {"label": "Pet Hair Removal", "price": 25}]
        })
    }

    #[test]
    fn test_missing_fields_listed() {
        let err = parse_guest_order(&json!({"guest_name": "Sam"}), &[]).unwrap_err();
        assert_eq!(
            err,
            "Missing required fields: ['guest_email', 'vehicle_size', 'guest_address', 'selectedServices']"
        );
    }

    #[test]
    fn test_address_must_be_object_with_fields() {
        let mut b = body();
        b["guest_address"] = json!("12 Elm Street");
        assert_eq!(
            parse_guest_order(&b, &[]).unwrap_err(),
            "guest_address must be provided as an object."
        );

        let mut b = body();
        b["guest_address"] = json!({"street_address": "12 Elm Street", "city": "Austin"});
        assert_eq!(
            parse_guest_order(&b, &[]).unwrap_err(),
            "Missing required address fields: ['unit_apt', 'country', 'zip_code']"
        );
    }

    #[test]
    fn test_prices_from_catalogue() {
        let order = parse_guest_order(&body(), &catalogue()).unwrap();
        assert!(order.is_guest);
        assert_eq!(order.payment_timing, PaymentTiming::PayNow);
        assert_eq!(order.payment_status, PaymentStatus::Unpaid);
        assert_eq!(order.guest_email.as_deref(), Some("sam@example.com"));
        assert_eq!(order.guest_address.as_ref().unwrap().country, Address::DEFAULT_COUNTRY);

        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.lines[0].service_id, Some(ServiceId::new(3)));
        assert_eq!(order.lines[1].service_key, "pet_hair_removal");
        assert_eq!(order.services_total, Decimal::from(135));
        assert_eq!(order.estimated_minutes, 120);
        assert!(order.final_price.is_some());
    }

    #[test]
    fn test_negative_or_malformed_client_price_rejected() {
        let mut b = body();
        b["selectedServices"] = json!([{"label": "Discount", "price": -500}]);
        assert_eq!(
            parse_guest_order(&b, &catalogue()).unwrap_err(),
            "Invalid price for service Discount"
        );

        b["selectedServices"] = json!([{"key": "wax", "price": "lots"}]);
        assert_eq!(
            parse_guest_order(&b, &catalogue()).unwrap_err(),
            "Invalid price for service wax"
        );

        // Negative price on a catalogue line is rejected even though the catalogue wins.
        b["selectedServices"] = json!([{"key": "sedan_complete_detailing", "price": -1}]);
        assert!(parse_guest_order(&b, &catalogue()).is_err());
    }

    #[test]
    fn test_client_price_used_for_unlisted_service() {
        let mut b = body();
        b["selectedServices"] = json!([
            {"key": "sedan_complete_detailing", "price": 1},
            {"label": "Headlight Restoration", "price": "$40.50"},
            {"label": "Quote Pending", "price": null}
        ]);
        let order = parse_guest_order(&b, &catalogue()).unwrap();
        assert_eq!(order.lines.len(), 3);
        assert_eq!(order.lines[0].price, Some(Decimal::from(110)));
        assert_eq!(order.lines[1].price, Some(Decimal::new(4050, 2)));
        assert_eq!(order.lines[2].price, None);
        assert_eq!(order.services_total, Decimal::new(15050, 2));
        assert!(order.final_price.unwrap() >= Decimal::ZERO);
    }

    #[test]
    fn test_unknown_services_leave_order_unpriced() {
        let mut b = body();
        b["selectedServices"] = json!([]);
        let order = parse_guest_order(&b, &catalogue()).unwrap();
        assert!(order.lines.is_empty());
        assert_eq!(order.final_price, None);
    }
}
