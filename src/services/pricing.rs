//! Fare pricing and money rounding.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{account::UserClass, rate::Rate};

/// Decimal places kept for every balance and amount.
pub const MONEY_SCALE: u32 = 2;

/// Largest amount or balance a `NUMERIC(12,2)` column holds: 9999999999.99.
pub const MAX_MONEY: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, MONEY_SCALE);

/// Round half-up to two decimal places and fix the scale at two.
///
/// Used for every amount the service accepts or computes, so stored and
/// displayed values never disagree.
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Price of one use of `rate` for an account of class `class`.
///
/// Only the subsidized class gets `subsidized_discount` taken off.
pub fn price_for(rate: &Rate, class: UserClass) -> Decimal {
    let price = match class {
        UserClass::Subsidized => rate.base_rate * (Decimal::ONE - rate.subsidized_discount),
        _ => rate.base_rate,
    };
    round_money(price)
}
