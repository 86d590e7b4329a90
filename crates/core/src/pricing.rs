//! Order pricing.
//!
//! A detailing order is priced from the per-vehicle-size prices of its
//! services. The services subtotal is treated as 55% of the customer price;
//! the remaining 45% is the platform fee. Small orders also carry a flat travel
//! fee. Stripe is charged in whole cents, always rounding up.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::VehicleSize;

/// Share of the customer price that covers the services themselves.
pub const SERVICE_SHARE: Decimal = Decimal::from_parts(55, 0, 0, false, 2);

/// Flat fee for orders whose services subtotal is below [`TRAVEL_FEE_THRESHOLD`].
pub const TRAVEL_FEE: Decimal = Decimal::from_parts(35, 0, 0, false, 0);

/// Subtotal at or above which no travel fee is charged.
pub const TRAVEL_FEE_THRESHOLD: Decimal = Decimal::from_parts(60, 0, 0, false, 0);

/// Errors from price calculations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    #[error("amount cannot be negative")]
    Negative,
    #[error("amount is too large to charge")]
    OutOfRange,
    #[error("total cannot be below the services subtotal of ${minimum}")]
    BelowMinimum { minimum: Decimal },
}

/// Price and duration of one service for one vehicle size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizePrice {
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Free text such as `"90 minutes"`.
    #[serde(default)]
    pub completion_time: String,
}

/// A service's prices keyed by vehicle size.
pub type PriceSheet = BTreeMap<VehicleSize, SizePrice>;

/// The computed charges for a set of services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub services_total: Decimal,
    pub fee: Decimal,
    pub travel_fee: Decimal,
    pub final_total: Decimal,
}

impl PriceBreakdown {
    /// Compute the breakdown for a list of service prices.
    ///
    /// ```
    /// use cfac_core::pricing::PriceBreakdown;
    /// use rust_decimal::Decimal;
    ///
    /// let breakdown = PriceBreakdown::from_prices([Decimal::from(110)]);
    /// assert_eq!(breakdown.final_total, Decimal::from(200));
    /// assert_eq!(breakdown.fee, Decimal::from(90));
    /// assert_eq!(breakdown.travel_fee, Decimal::ZERO);
    /// ```
    #[must_use]
    pub fn from_prices(prices: impl IntoIterator<Item = Decimal>) -> Self {
        let services_total: Decimal = prices.into_iter().sum();
        let preliminary = services_total / SERVICE_SHARE;
        let travel_fee = if services_total < TRAVEL_FEE_THRESHOLD {
            TRAVEL_FEE
        } else {
            Decimal::ZERO
        };

        Self {
            services_total,
            fee: preliminary - services_total,
            travel_fee,
            final_total: preliminary + travel_fee,
        }
    }

    /// The breakdown rounded to cents for storage and display.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            services_total: round_cents(self.services_total),
            fee: round_cents(self.fee),
            travel_fee: round_cents(self.travel_fee),
            final_total: round_cents(self.final_total),
        }
    }

    /// Amount to charge through Stripe, in cents.
    ///
    /// # Errors
    ///
    /// See [`amount_in_cents`].
    pub fn amount_in_cents(&self) -> Result<i64, PricingError> {
        amount_in_cents(self.final_total)
    }
}

/// Round half away from zero to two decimal places.
#[must_use]
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a dollar amount to Stripe's integer cents, rounding any fraction
/// of a cent up.
///
/// # Errors
///
/// Returns [`PricingError::Negative`] for negative amounts and
/// [`PricingError::OutOfRange`] if the result does not fit an `i64`.
pub fn amount_in_cents(amount: Decimal) -> Result<i64, PricingError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(PricingError::Negative);
    }
    (amount * Decimal::ONE_HUNDRED)
        .ceil()
        .to_i64()
        .ok_or(PricingError::OutOfRange)
}

/// Lowest total an order with this services subtotal is sold for.
#[must_use]
pub fn minimum_total(services_total: Decimal) -> Decimal {
    round_cents(PriceBreakdown::from_prices([services_total]).final_total)
}

/// Check a total entered by an admin against the order's services subtotal.
///
/// # Errors
///
/// Returns [`PricingError::Negative`] or [`PricingError::BelowMinimum`].
pub fn validate_admin_total(total: Decimal, services_total: Decimal) -> Result<Decimal, PricingError> {
    if total.is_sign_negative() && !total.is_zero() {
        return Err(PricingError::Negative);
    }
    if total < services_total {
        return Err(PricingError::BelowMinimum {
            minimum: round_cents(services_total),
        });
    }
    Ok(round_cents(total))
}

/// Leading whole number of a completion time such as `"45 minutes"`.
///
/// Returns 0 when the text does not start with a number.
#[must_use]
pub fn completion_minutes(completion_time: &str) -> u32 {
    let digits: String = completion_time
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}

/// Total estimated duration of a set of services.
#[must_use]
pub fn estimated_minutes<'a>(completion_times: impl IntoIterator<Item = &'a str>) -> u32 {
    completion_times
        .into_iter()
        .map(completion_minutes)
        .fold(0, u32::saturating_add)
}

/// Turn a service label into a key: `"Wash & Wax - Deluxe"` becomes
/// `"wash_and_wax___deluxe"`.
#[must_use]
pub fn format_service_name(name: &str) -> String {
    name.to_lowercase()
        .replace(' ', "_")
        .replace('&', "and")
        .replace('-', "_")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_breakdown_without_travel_fee() {
        let breakdown = PriceBreakdown::from_prices([dec("100"), dec("65")]);
        assert_eq!(breakdown.services_total, dec("165"));
        assert_eq!(breakdown.final_total, dec("300"));
        assert_eq!(breakdown.fee, dec("135"));
        assert_eq!(breakdown.travel_fee, Decimal::ZERO);
    }

    #[test]
    fn test_breakdown_adds_travel_fee_below_threshold() {
        let breakdown = PriceBreakdown::from_prices([dec("55")]);
        assert_eq!(breakdown.travel_fee, TRAVEL_FEE);
        assert_eq!(breakdown.final_total, dec("135"));

        let at_threshold = PriceBreakdown::from_prices([dec("60")]);
        assert_eq!(at_threshold.travel_fee, Decimal::ZERO);
    }

    #[test]
    fn test_final_total_never_below_services_total() {
        for price in ["0.01", "1", "59.99", "60", "249.99"] {
            let breakdown = PriceBreakdown::from_prices([dec(price)]);
            assert!(breakdown.final_total >= breakdown.services_total);
        }
    }

    #[test]
    fn test_rounded_and_cents_round_up() {
        let breakdown = PriceBreakdown::from_prices([dec("100")]);
        let rounded = breakdown.rounded();
        assert_eq!(rounded.final_total, dec("181.82"));
        assert_eq!(rounded.fee, dec("81.82"));
        // 181.8181... dollars is charged as 18182 cents.
        assert_eq!(breakdown.amount_in_cents().unwrap(), 18182);
    }

    #[test]
    fn test_amount_in_cents() {
        assert_eq!(amount_in_cents(dec("49.99")).unwrap(), 4999);
        assert_eq!(amount_in_cents(dec("10.001")).unwrap(), 1001);
        assert_eq!(amount_in_cents(Decimal::ZERO).unwrap(), 0);
        assert_eq!(amount_in_cents(dec("-1")), Err(PricingError::Negative));
    }

    #[test]
    fn test_validate_admin_total() {
        assert_eq!(
            validate_admin_total(dec("150.456"), dec("100")).unwrap(),
            dec("150.46")
        );
        assert_eq!(
            validate_admin_total(dec("-5"), Decimal::ZERO),
            Err(PricingError::Negative)
        );
        assert!(matches!(
            validate_admin_total(dec("99.99"), dec("100")),
            Err(PricingError::BelowMinimum { .. })
        ));
    }

    #[test]
    fn test_minimum_total() {
        assert_eq!(minimum_total(dec("110")), dec("200"));
        assert_eq!(minimum_total(Decimal::ZERO), TRAVEL_FEE);
    }

    #[test]
    fn test_completion_minutes() {
        assert_eq!(completion_minutes("45 minutes"), 45);
        assert_eq!(completion_minutes(" 120 min"), 120);
        assert_eq!(completion_minutes("about an hour"), 0);
        assert_eq!(estimated_minutes(["45 minutes", "90 minutes", ""]), 135);
    }

    #[test]
    fn test_format_service_name() {
        assert_eq!(format_service_name("Wash & Wax"), "wash_and_wax");
        assert_eq!(
            format_service_name("Sedan Complete-Detailing"),
            "sedan_complete_detailing"
        );
    }

    #[test]
    fn test_price_sheet_deserializes_from_catalogue_json() {
        let json = r#"{"sedan_4_door": {"price": 149.99, "completion_time": "120 minutes"}}"#;
        let sheet: PriceSheet = serde_json::from_str(json).unwrap();
        let sedan = sheet.get(&VehicleSize::Sedan4Door).unwrap();
        assert_eq!(sedan.price, dec("149.99"));
        assert_eq!(completion_minutes(&sedan.completion_time), 120);
    }
}
