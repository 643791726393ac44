//! Fixed-point money helpers. Amounts are `Decimal` with two places and
//! half-up rounding; floats only enter as quantities.

use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

pub const CURRENCY: &str = "EUR";

/// Largest quantity priced as is. Larger values would overflow `Decimal`
/// or lose the cents once multiplied by a unit price.
pub const MAX_QUANTITY: f64 = 1e15;

/// Finite, non-negative and at most `MAX_QUANTITY`
pub fn is_priceable_quantity(quantity: f64) -> bool {
    quantity.is_finite() && (0.0..=MAX_QUANTITY).contains(&quantity)
}

/// Round to cents, ties away from zero
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Decimal with the shortest decimal expansion of `value`. Non-finite
/// input maps to zero.
pub fn decimal_from_f64(value: f64) -> Decimal {
    if !value.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::from_str(&value.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(value))
        .unwrap_or(Decimal::ZERO)
}

/// `round_half_up(quantity × unit_price)`
pub fn line_total(quantity: f64, unit_price: Decimal) -> Decimal {
    round_half_up(decimal_from_f64(quantity) * unit_price)
}

/// `part / whole` as a percentage, zero when `whole` is zero
pub fn share_percent(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        part / whole * Decimal::ONE_HUNDRED
    }
}
