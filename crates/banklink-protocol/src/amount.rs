//! Amount codec between minor units and the two-decimal wire format.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Formats minor units as a two-decimal string (`1250` -> `"12.50"`).
pub fn format_amount(minor: u64) -> String {
	Decimal::from_i128_with_scale(i128::from(minor), 2).to_string()
}

/// Parses a wire amount back into minor units.
///
/// Returns `None` for negative values, more than two decimals, or anything
/// that is not a plain decimal number.
pub fn parse_amount(value: &str) -> Option<u64> {
	let amount = Decimal::from_str(value.trim()).ok()?;
	if amount.is_sign_negative() {
		return None;
	}

	let minor = amount.checked_mul(Decimal::ONE_HUNDRED)?;
	if !minor.fract().is_zero() {
		return None;
	}
	minor.to_u64()
}
