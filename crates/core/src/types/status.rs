//! Roles and status enums.
//!
//! Each enum is stored as `TEXT` and serialized as its lowercase wire value,
//! the same strings the field apps and Stripe metadata use.

string_enum! {
    /// Account role. Decides which back-office pages a user may open.
    pub enum Role {
        Admin => "admin",
        Tech => "tech",
        Sales => "sales",
        Customer => "customer",
    }
}

impl Role {
    /// Employees sign in through the employee login or the field-app API.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        !matches!(self, Self::Customer)
    }

    /// Human-readable role name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Tech => "Technician",
            Self::Sales => "Salesperson",
            Self::Customer => "Customer",
        }
    }
}

string_enum! {
    /// Order lifecycle: `ordered -> scheduled -> completed`, or cancelled.
    pub enum OrderStatus {
        Ordered => "ordered",
        Scheduled => "scheduled",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl OrderStatus {
    /// Whether a technician may move an order from `self` to `next`.
    ///
    /// Admins edit the status directly and are not bound by this.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Ordered, Self::Scheduled | Self::Cancelled)
                | (Self::Scheduled, Self::Completed | Self::Cancelled)
        )
    }

    /// Human-readable status.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ordered => "Ordered",
            Self::Scheduled => "Scheduled",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }
}

string_enum! {
    /// Where an order stands with respect to payment.
    pub enum PaymentStatus {
        Pending => "pending",
        Unpaid => "unpaid",
        Paid => "paid",
        DownpaymentCollected => "downpaymentcollected",
        RequiresAction => "requires_action",
        Processing => "processing",
        Failed => "failed",
        Canceled => "canceled",
    }
}

impl PaymentStatus {
    /// Map a Stripe `PaymentIntent.status` onto an order payment status.
    ///
    /// `succeeded` maps to [`Self::Paid`]; callers collecting a down payment
    /// in the field record [`Self::DownpaymentCollected`] instead.
    #[must_use]
    pub fn from_intent_status(status: &str) -> Self {
        match status {
            "succeeded" => Self::Paid,
            "requires_action" | "requires_source_action" => Self::RequiresAction,
            "requires_payment_method" => Self::Failed,
            "canceled" => Self::Canceled,
            _ => Self::Processing,
        }
    }

    /// Whether money has been received for the order.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Paid | Self::DownpaymentCollected)
    }

    /// Whether the order still needs a payment collected.
    #[must_use]
    pub const fn is_outstanding(self) -> bool {
        !self.is_settled()
    }

    /// Human-readable status.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Unpaid => "Unpaid",
            Self::Paid => "Paid",
            Self::DownpaymentCollected => "Down Payment Collected",
            Self::RequiresAction => "Requires Action",
            Self::Processing => "Processing",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
        }
    }
}

string_enum! {
    /// How a payment was taken.
    pub enum PaymentMethod {
        Card => "card",
        Cash => "cash",
    }
}

impl PaymentMethod {
    /// Capitalised name used in notification text.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Card => "Card",
            Self::Cash => "Cash",
        }
    }
}

string_enum! {
    /// When the customer chose to pay.
    pub enum PaymentTiming {
        /// Card charged at checkout.
        Now => "now",
        /// Paid to the technician or salesperson on the day of service.
        After => "after",
        /// Guest orders from the field apps, collected on site.
        PayNow => "pay_now",
    }
}

string_enum! {
    /// Whether an employee has been paid their share of an order.
    pub enum CompensationStatus {
        Unpaid => "unpaid",
        Paid => "paid",
    }
}

impl CompensationStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unpaid => "Unpaid",
            Self::Paid => "Paid",
        }
    }
}

string_enum! {
    /// Which employee on an order a compensation entry refers to.
    pub enum EmployeeKind {
        Tech => "tech",
        Salesperson => "salesperson",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_string_values_round_trip_through_from_str() {
        for status in PaymentStatus::ALL {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), *status);
        }
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), *role);
        }
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        let err = "manager".parse::<Role>().unwrap_err();
        assert_eq!(err, "invalid Role: manager");
        assert!("Paid".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_values() {
        let json = serde_json::to_string(&PaymentStatus::DownpaymentCollected).unwrap();
        assert_eq!(json, "\"downpaymentcollected\"");
        let timing: PaymentTiming = serde_json::from_str("\"pay_now\"").unwrap();
        assert_eq!(timing, PaymentTiming::PayNow);
    }

    #[test]
    fn test_order_status_sequence() {
        assert!(OrderStatus::Ordered.can_advance_to(OrderStatus::Scheduled));
        assert!(OrderStatus::Scheduled.can_advance_to(OrderStatus::Completed));
        assert!(!OrderStatus::Ordered.can_advance_to(OrderStatus::Completed));
        assert!(!OrderStatus::Completed.can_advance_to(OrderStatus::Scheduled));
        assert!(!OrderStatus::Cancelled.can_advance_to(OrderStatus::Ordered));
    }

    #[test]
    fn test_payment_status_from_intent() {
        assert_eq!(PaymentStatus::from_intent_status("succeeded"), PaymentStatus::Paid);
        assert_eq!(
            PaymentStatus::from_intent_status("requires_action"),
            PaymentStatus::RequiresAction
        );
        assert_eq!(
            PaymentStatus::from_intent_status("requires_payment_method"),
            PaymentStatus::Failed
        );
        assert_eq!(
            PaymentStatus::from_intent_status("processing"),
            PaymentStatus::Processing
        );
    }

    #[test]
    fn test_settled() {
        assert!(PaymentStatus::Paid.is_settled());
        assert!(PaymentStatus::DownpaymentCollected.is_settled());
        assert!(PaymentStatus::Unpaid.is_outstanding());
        assert!(PaymentStatus::RequiresAction.is_outstanding());
    }

    #[test]
    fn test_role_is_staff() {
        assert!(Role::Admin.is_staff());
        assert!(Role::Sales.is_staff());
        assert!(!Role::Customer.is_staff());
    }
}
