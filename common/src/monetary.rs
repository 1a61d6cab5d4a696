//! Decimal rules for cash and asset quantities.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::error::{LedgerError, Result};

/// Cash is always held at this many decimal places.
pub const CASH_SCALE: u32 = 2;

/// Fix a cash amount at two places, rounding toward negative infinity.
pub fn floor_cash(value: Decimal) -> Decimal {
    with_scale(value.round_dp_with_strategy(CASH_SCALE, RoundingStrategy::ToNegativeInfinity))
}

/// What a buyer pays: rounded up so nobody pays less than market.
pub fn buy_total(unit_price: Decimal, amount: Decimal) -> Result<Decimal> {
    let gross = unit_price
        .checked_mul(amount)
        .ok_or_else(|| LedgerError::InvalidAmount(format!("{} x {} overflows", amount, unit_price)))?;
    Ok(with_scale(
        gross.round_dp_with_strategy(CASH_SCALE, RoundingStrategy::AwayFromZero),
    ))
}

/// What a seller receives: rounded down so nobody receives more than market.
pub fn sell_total(unit_price: Decimal, amount: Decimal) -> Result<Decimal> {
    let gross = unit_price
        .checked_mul(amount)
        .ok_or_else(|| LedgerError::InvalidAmount(format!("{} x {} overflows", amount, unit_price)))?;
    Ok(with_scale(
        gross.round_dp_with_strategy(CASH_SCALE, RoundingStrategy::ToZero),
    ))
}

/// Loan principal, rounded half-up. Loans are not market trades.
pub fn loan_principal(value: Decimal) -> Decimal {
    with_scale(value.round_dp_with_strategy(CASH_SCALE, RoundingStrategy::MidpointAwayFromZero))
}

/// Canonical form of an asset quantity: trailing zeros stripped.
pub fn normalize_quantity(value: Decimal) -> Decimal {
    value.normalize()
}

/// Parse a strictly positive decimal typed by a user.
///
/// Plain and scientific notation are both accepted.
pub fn parse_amount(input: &str) -> Result<Decimal> {
    let input = input.trim();
    let value = Decimal::from_str(input)
        .or_else(|_| Decimal::from_scientific(input))
        .map_err(|_| LedgerError::InvalidAmount(input.to_string()))?;

    if value <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(input.to_string()));
    }
    Ok(value)
}

/// Render cash as `$1,234.56`, dropping a `.00` tail.
pub fn format_cash(value: Decimal) -> String {
    let rounded = with_scale(value.round_dp(CASH_SCALE).abs());
    let text = rounded.to_string();
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };

    if fraction == "00" {
        format!("{}${}", sign, grouped)
    } else {
        format!("{}${}.{}", sign, grouped, fraction)
    }
}

/// Render a unit price; sub-dollar prices keep up to eight places.
pub fn format_price(value: Decimal) -> String {
    if value.abs() >= Decimal::ONE {
        format_cash(value)
    } else {
        format!("${}", value.round_dp(8).normalize())
    }
}

fn with_scale(mut value: Decimal) -> Decimal {
    value.rescale(CASH_SCALE);
    value
}
