//! Vehicle size categories.
//!
//! Every service is priced per vehicle size, so the size a customer picks is
//! part of a cart item's identity.

string_enum! {
    /// The vehicle categories a service can be priced for.
    pub enum VehicleSize {
        Coupe2Seater => "coupe_2_seater",
        Truck2Seater => "truck_2_seater",
        Truck4Seater => "truck_4_seater",
        Hatchback2Door => "hatchback_2_door",
        Hatchback4Door => "hatchback_4_door",
        Sedan2Door => "sedan_2_door",
        Sedan4Door => "sedan_4_door",
        Suv4Seater => "suv_4_seater",
        Suv6Seater => "suv_6_seater",
        Minivan6Seater => "minivan_6_seater",
    }
}

impl VehicleSize {
    /// Label shown in the size picker.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Coupe2Seater => "Coup 2 Seater",
            Self::Truck2Seater => "Truck 2 Seater",
            Self::Truck4Seater => "Truck 4 Seater",
            Self::Hatchback2Door => "Hatchback 2 Door",
            Self::Hatchback4Door => "Hatchback 4 Door",
            Self::Sedan2Door => "Sedan 2 Door",
            Self::Sedan4Door => "Sedan 4 Door",
            Self::Suv4Seater => "SUV 4 Seater",
            Self::Suv6Seater => "SUV 6 Seater",
            Self::Minivan6Seater => "Minivan 6 Seater",
        }
    }

    /// Parse loosely entered input: trimmed, lowercased, spaces to underscores.
    ///
    /// ```
    /// use cfac_core::VehicleSize;
    ///
    /// assert_eq!(VehicleSize::normalize("SUV 4 Seater"), Some(VehicleSize::Suv4Seater));
    /// assert_eq!(VehicleSize::normalize("boat"), None);
    /// ```
    #[must_use]
    pub fn normalize(input: &str) -> Option<Self> {
        input.trim().to_lowercase().replace(' ', "_").parse().ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ten_sizes() {
        assert_eq!(VehicleSize::ALL.len(), 10);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            VehicleSize::normalize("  Sedan 4 Door "),
            Some(VehicleSize::Sedan4Door)
        );
        assert_eq!(
            VehicleSize::normalize("minivan_6_seater"),
            Some(VehicleSize::Minivan6Seater)
        );
        assert_eq!(VehicleSize::normalize(""), None);
    }

    #[test]
    fn test_display_uses_stored_value() {
        assert_eq!(VehicleSize::Coupe2Seater.to_string(), "coupe_2_seater");
        assert_eq!(VehicleSize::Coupe2Seater.display_name(), "Coup 2 Seater");
    }
}
