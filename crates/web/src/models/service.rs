//! Detailing service catalogue entries.

use serde::Serialize;

use cfac_core::pricing::{PriceSheet, SizePrice};
use cfac_core::{ServiceId, VehicleSize};

/// A bookable service with per-vehicle-size pricing.
#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub id: ServiceId,
    /// Stable key, `format_service_name(label)`.
    pub key: String,
    pub label: String,
    pub category: String,
    pub active: bool,
    pub image: Option<String>,
    pub price_by_vehicle_size: PriceSheet,
}

impl Service {
    /// Price and duration for one vehicle size, if offered.
    #[must_use]
    pub fn price_for(&self, size: VehicleSize) -> Option<&SizePrice> {
        self.price_by_vehicle_size.get(&size)
    }

    /// Cheapest price across sizes, for "from $X" labels.
    #[must_use]
    pub fn starting_price(&self) -> Option<rust_decimal::Decimal> {
        self.price_by_vehicle_size.values().map(|p| p.price).min()
    }
}

/// Fields for inserting or replacing a catalogue entry.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewService {
    pub label: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub image: Option<String>,
    pub price_by_vehicle_size: PriceSheet,
}

fn default_category() -> String {
    "Detailing Services".to_string()
}

const fn default_active() -> bool {
    true
}
