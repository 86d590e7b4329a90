//! Order domain types.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cfac_core::{
    Address, CompensationStatus, OrderId, OrderStatus, PaymentMethod, PaymentStatus,
    PaymentTiming, ServiceId, UserId, VehicleSize,
};

use super::User;

/// One service on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Catalogue id, absent when the field app sent a key we don't know.
    #[serde(default)]
    pub service_id: Option<ServiceId>,
    pub service_key: String,
    pub label: String,
    #[serde(default)]
    pub vehicle_size: Option<VehicleSize>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub completion_time: String,
}

/// A booked detailing job.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub is_guest: bool,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone_number: Option<String>,
    pub guest_address: Option<Address>,
    pub vehicle_size: Option<VehicleSize>,
    pub lines: Vec<OrderLine>,
    pub services_total: Decimal,
    pub fee: Decimal,
    pub travel_fee: Decimal,
    pub final_price: Option<Decimal>,
    pub estimated_minutes: i32,
    pub order_date: DateTime<Utc>,
    pub service_date: Option<NaiveDateTime>,
    pub payment_timing: PaymentTiming,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_intent_id: Option<String>,
    /// Snapshot of the customer's address when the order was placed.
    pub address: Option<Address>,
    pub status: OrderStatus,
    /// Technician who scheduled the job.
    pub scheduled_by: Option<UserId>,
    pub salesperson_id: Option<UserId>,
    pub tech_compensation: CompensationStatus,
    pub salesperson_compensation: CompensationStatus,
    pub has_downpayment_collected: bool,
    pub downpayment_checkout_url: Option<String>,
    pub remaining_balance_checkout_url: Option<String>,
    pub service_package: String,
    pub senior_rv_discount: bool,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Amount owed: the final price, or the services subtotal for orders
    /// that were never priced.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.final_price.unwrap_or(self.services_total)
    }

    #[must_use]
    pub const fn order_type(&self) -> &'static str {
        if self.is_guest {
            "Guest Order"
        } else {
            "Customer Order"
        }
    }

    /// Where the job happens: the guest address, the snapshot taken at
    /// checkout, or the customer's current address.
    #[must_use]
    pub fn service_address(&self, customer: Option<&User>) -> Option<Address> {
        self.guest_address
            .clone()
            .or_else(|| self.address.clone())
            .or_else(|| customer.map(|u| u.address.clone()))
            .filter(|a| !a.is_empty())
    }

    /// Comma-separated service labels.
    #[must_use]
    pub fn service_names(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.label.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Whether the customer identified by email/phone placed this order as a guest.
    #[must_use]
    pub fn is_guest_match(&self, email: Option<&str>, phone: Option<&str>) -> bool {
        if !self.is_guest {
            return false;
        }
        let email_match = matches!(
            (email, self.guest_email.as_deref()),
            (Some(a), Some(b)) if a.eq_ignore_ascii_case(b)
        );
        let phone_match = matches!(
            (phone, self.guest_phone_number.as_deref()),
            (Some(a), Some(b)) if !a.is_empty() && a == b
        );
        email_match || phone_match
    }

    /// Whether `user_id` may see this order on their customer pages.
    #[must_use]
    pub fn visible_to_customer(&self, user: &User) -> bool {
        self.user_id == Some(user.id)
            || self.is_guest_match(
                user.email.as_ref().map(cfac_core::Email::as_str),
                user.phone_number.as_ref().map(cfac_core::PhoneNumber::as_str),
            )
    }

    /// Service date and time formatted for people.
    #[must_use]
    pub fn service_date_display(&self) -> String {
        self.service_date.map_or_else(
            || "Not set".to_string(),
            |d| d.format("%B %-d, %Y at %-I:%M %p").to_string(),
        )
    }

    /// Service date formatted for a `<input type="date">`.
    #[must_use]
    pub fn service_date_input(&self) -> String {
        self.service_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }

    /// Name to address the customer by in messages.
    #[must_use]
    pub fn customer_name<'a>(&'a self, customer: Option<&'a User>) -> &'a str {
        self.guest_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| customer.map(User::display_name))
            .unwrap_or("Customer")
    }

    /// Email to send customer messages to.
    #[must_use]
    pub fn customer_email(&self, customer: Option<&User>) -> Option<String> {
        self.guest_email
            .clone()
            .filter(|e| !e.trim().is_empty())
            .or_else(|| customer.and_then(|u| u.email.as_ref()).map(|e| e.as_str().to_string()))
    }
}

/// Fields for inserting an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<UserId>,
    pub is_guest: bool,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone_number: Option<String>,
    pub guest_address: Option<Address>,
    pub vehicle_size: Option<VehicleSize>,
    pub lines: Vec<OrderLine>,
    pub services_total: Decimal,
    pub fee: Decimal,
    pub travel_fee: Decimal,
    pub final_price: Option<Decimal>,
    pub estimated_minutes: i32,
    pub service_date: Option<NaiveDateTime>,
    pub payment_timing: PaymentTiming,
    pub payment_status: PaymentStatus,
    pub address: Option<Address>,
    pub salesperson_id: Option<UserId>,
    pub service_package: String,
    pub senior_rv_discount: bool,
}

/// Changes an admin can make from the edit-order page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEdit {
    pub status: OrderStatus,
    pub payment_method: Option<PaymentMethod>,
    pub final_price: Decimal,
    pub service_date: Option<NaiveDateTime>,
}

impl OrderEdit {
    /// The current values of an order, for change detection.
    #[must_use]
    pub fn from_order(order: &Order) -> Self {
        Self {
            status: order.status,
            payment_method: order.payment_method,
            final_price: order.total(),
            service_date: order.service_date,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::models::user::tests::user;
    use cfac_core::Role;

    pub fn order() -> Order {
        Order {
            id: OrderId::new(10),
            user_id: None,
            is_guest: true,
            guest_name: Some("Sam Guest".to_string()),
            guest_email: Some("Sam@Example.com".to_string()),
            guest_phone_number: Some("5125550199".to_string()),
            guest_address: None,
            vehicle_size: Some(VehicleSize::Sedan4Door),
            lines: vec![OrderLine {
                service_id: Some(ServiceId::new(1)),
                service_key: "sedan_complete_detailing".to_string(),
                label: "Sedan Complete Detailing".to_string(),
                vehicle_size: Some(VehicleSize::Sedan4Door),
                price: Some(Decimal::from(110)),
                completion_time: "120 minutes".to_string(),
            }],
            services_total: Decimal::from(110),
            fee: Decimal::from(90),
            travel_fee: Decimal::ZERO,
            final_price: Some(Decimal::from(200)),
            estimated_minutes: 120,
            order_date: Utc::now(),
            service_date: None,
            payment_timing: PaymentTiming::PayNow,
            payment_status: PaymentStatus::Unpaid,
            payment_method: None,
            payment_intent_id: None,
            address: None,
            status: OrderStatus::Ordered,
            scheduled_by: None,
            salesperson_id: None,
            tech_compensation: CompensationStatus::Unpaid,
            salesperson_compensation: CompensationStatus::Unpaid,
            has_downpayment_collected: false,
            downpayment_checkout_url: None,
            remaining_balance_checkout_url: None,
            service_package: String::new(),
            senior_rv_discount: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_total_falls_back_to_subtotal() {
        let mut o = order();
        assert_eq!(o.total(), Decimal::from(200));
        o.final_price = None;
        assert_eq!(o.total(), Decimal::from(110));
    }

    #[test]
    fn test_guest_match_is_case_insensitive_on_email() {
        let o = order();
        assert!(o.is_guest_match(Some("sam@example.com"), None));
        assert!(o.is_guest_match(None, Some("5125550199")));
        assert!(!o.is_guest_match(Some("other@example.com"), Some("")));
    }

    #[test]
    fn test_visible_to_customer() {
        let mut o = order();
        let mut customer = user(Role::Customer);
        assert!(!o.visible_to_customer(&customer));

        customer.phone_number = Some(cfac_core::PhoneNumber::parse("5125550199").unwrap());
        assert!(o.visible_to_customer(&customer));

        o.is_guest = false;
        o.user_id = Some(customer.id);
        assert!(o.visible_to_customer(&customer));
    }

    #[test]
    fn test_service_address_prefers_guest_address() {
        let mut o = order();
        let mut customer = user(Role::Customer);
        customer.address.street = "1 Customer Way".to_string();
        assert_eq!(
            o.service_address(Some(&customer)).unwrap().street,
            "1 Customer Way"
        );

        o.guest_address = Some(Address {
            street: "9 Guest Rd".to_string(),
            ..Address::default()
        });
        assert_eq!(o.service_address(Some(&customer)).unwrap().street, "9 Guest Rd");
        assert!(order().service_address(None).is_none());
    }

    #[test]
    fn test_customer_contact() {
        let o = order();
        assert_eq!(o.customer_name(None), "Sam Guest");
        assert_eq!(o.customer_email(None).as_deref(), Some("Sam@Example.com"));
        assert_eq!(o.service_names(), "Sedan Complete Detailing");
        assert_eq!(o.service_date_display(), "Not set");
    }
}
