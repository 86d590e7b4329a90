//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

use rust_decimal::Decimal;

/// Format a dollar amount with two decimals: `{{ order.total()|currency }}` gives `$200.00`.
#[askama::filter_fn]
pub fn currency(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let text = value.to_string();
    Ok(text
        .parse::<Decimal>()
        .map_or(text, format_currency))
}

/// Percentage with one decimal place.
#[askama::filter_fn]
pub fn percent(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let text = value.to_string();
    Ok(text
        .parse::<f64>()
        .map_or(text, |v| format!("{v:.1}%")))
}

pub(crate) fn format_currency(value: Decimal) -> String {
    format!("${:.2}", cfac_core::pricing::round_cents(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(Decimal::from(200)), "$200.00");
        assert_eq!(format_currency(Decimal::new(181_818, 3)), "$181.82");
    }
}
