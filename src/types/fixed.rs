//! Fixed-point decimal utilities for monetary values.
//!
//! ## Overview
//!
//! USD amounts, scores and pool shares are carried as [`Decimal`] and
//! re-quantized to [`SCALE_DP`] fractional digits after every step that
//! can introduce rounding. Token amounts in the smallest unit are carried
//! as [`U256`] and never pass through floating point.
//!
//! The only floating-point operation in the crate is the square root in
//! [`sqrt_quantized`], whose result is re-quantized immediately.
//!
//! ## Examples
//!
//! ```
//! use qf_kernel::types::fixed::{to_base_units, quantize};
//! use rust_decimal::Decimal;
//! use ruint::aliases::U256;
//! use std::str::FromStr;
//!
//! // 1.5 tokens with 18 decimals
//! let units = to_base_units(Decimal::from_str("1.5").unwrap(), 18).unwrap();
//! assert_eq!(units, U256::from(1_500_000_000_000_000_000u128));
//!
//! let q = quantize(Decimal::from_str("0.1234567890123456789012").unwrap());
//! assert_eq!(q.scale(), 18);
//! ```

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use ruint::aliases::U256;

use crate::errors::{QfError, Result};

/// Number of fractional digits every monetary output is quantized to.
pub const SCALE_DP: u32 = 18;

/// Largest decimals value a token can declare (uint256 holds 10^77).
pub const MAX_TOKEN_DECIMALS: u32 = 77;

// ============================================================================
// Quantization
// ============================================================================

/// Round a decimal to [`SCALE_DP`] fractional digits (banker's rounding).
#[inline]
pub fn quantize(d: Decimal) -> Decimal {
    d.round_dp(SCALE_DP)
}

/// Square root of a non-negative decimal, quantized to [`SCALE_DP`].
///
/// The root is taken in `f64` and converted back right away, so the
/// floating-point error never leaks past this function.
///
/// # Errors
///
/// * `Precision` if `d` is negative or the result is not representable.
pub fn sqrt_quantized(d: Decimal) -> Result<Decimal> {
    if d.is_sign_negative() && !d.is_zero() {
        return Err(QfError::Precision(format!("square root of negative amount {d}")));
    }
    // equal values must take the same path through f64
    let as_float = d
        .normalize()
        .to_f64()
        .ok_or_else(|| QfError::Precision(format!("{d} does not fit in f64")))?;
    let root = Decimal::from_f64(as_float.sqrt())
        .ok_or_else(|| QfError::Precision(format!("sqrt({d}) is not representable")))?;
    Ok(quantize(root))
}

// ============================================================================
// Checked Arithmetic
// ============================================================================

/// Checked multiplication, quantized.
pub fn mul(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_mul(b)
        .map(quantize)
        .ok_or_else(|| QfError::Precision(format!("{a} * {b} overflows")))
}

/// Checked division, quantized. Division by zero is a precision error.
pub fn div(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_div(b)
        .map(quantize)
        .ok_or_else(|| QfError::Precision(format!("{a} / {b} is not representable")))
}

/// Checked addition.
pub fn add(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| QfError::Precision(format!("{a} + {b} overflows")))
}

/// Checked subtraction.
pub fn sub(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_sub(b)
        .ok_or_else(|| QfError::Precision(format!("{a} - {b} overflows")))
}

/// Checked sum over decimals.
pub fn sum<I: IntoIterator<Item = Decimal>>(values: I) -> Result<Decimal> {
    values.into_iter().try_fold(Decimal::ZERO, add)
}

/// Checked sum over token amounts.
pub fn sum_units<I: IntoIterator<Item = U256>>(values: I) -> Result<U256> {
    values.into_iter().try_fold(U256::ZERO, |acc, v| {
        acc.checked_add(v)
            .ok_or_else(|| QfError::Precision("token amount sum exceeds uint256".to_string()))
    })
}

// ============================================================================
// Token Unit Conversion
// ============================================================================

/// Convert a human token amount into the token's smallest unit.
///
/// Digits beyond `decimals` are truncated toward zero, so a converted
/// payout never exceeds the decimal amount it came from.
///
/// # Errors
///
/// * `Precision` for negative amounts or results beyond uint256.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<U256> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(QfError::Precision(format!("negative token amount {amount}")));
    }
    if decimals > MAX_TOKEN_DECIMALS {
        return Err(QfError::Precision(format!("token decimals {decimals} too large")));
    }

    let truncated = amount.round_dp_with_strategy(decimals, RoundingStrategy::ToZero);
    let mantissa = u128::try_from(truncated.mantissa())
        .map_err(|_| QfError::Precision(format!("negative token amount {amount}")))?;
    let shift = decimals - truncated.scale();

    U256::from(10u64)
        .checked_pow(U256::from(shift))
        .and_then(|factor| U256::from(mantissa).checked_mul(factor))
        .ok_or_else(|| QfError::Precision(format!("{amount} exceeds uint256 at {decimals} decimals")))
}

// ============================================================================
// Comparison Helpers
// ============================================================================

/// Default tolerance for comparing values that went through several
/// quantization steps.
pub fn epsilon() -> Decimal {
    Decimal::new(1, 12)
}

/// `true` if |a - b| <= tolerance
pub fn approx_eq(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    (a - b).abs() <= tolerance
}

// ============================================================================
// Unit Tests
// ============================================================================
