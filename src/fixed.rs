//! Signed fixed-point arithmetic with a canonical 10^-6 scale.
//!
//! Every monetary, price and position quantity in the engine is a [`Fixed6`]:
//! an `i128` holding the value scaled by 1e6. All arithmetic is overflow
//! checked and surfaces [`LedgerError::Overflow`] instead of wrapping;
//! division truncates toward zero.

use core::fmt;
use core::ops::{Add, Div, Mul, Neg, Sub};

use num_traits::{CheckedAdd, CheckedMul, CheckedNeg, CheckedSub, One, Zero};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Raw scale factor: one whole unit is 1_000_000 raw.
pub const SCALE: i128 = 1_000_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fixed6(i128);

impl Fixed6 {
    pub const ZERO: Fixed6 = Fixed6(0);
    pub const ONE: Fixed6 = Fixed6(SCALE);

    /// Wrap an already-scaled raw value.
    pub const fn from_raw(raw: i128) -> Self {
        Fixed6(raw)
    }

    /// Convert a whole number of units. Cannot overflow: `i64::MAX * 1e6`
    /// fits comfortably in an `i128`.
    pub const fn from_int(units: i64) -> Self {
        Fixed6(units as i128 * SCALE)
    }

    /// Build from a units/micros pair, e.g. `from_parts(1, 500_000)` = 1.5.
    pub const fn from_parts(units: i64, micros: u32) -> Self {
        let sign = if units < 0 { -1 } else { 1 };
        Fixed6(units as i128 * SCALE + sign * micros as i128)
    }

    pub const fn raw(self) -> i128 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, rhs: Fixed6) -> Result<Fixed6> {
        self.0
            .checked_add(rhs.0)
            .map(Fixed6)
            .ok_or(LedgerError::Overflow)
    }

    pub fn checked_sub(self, rhs: Fixed6) -> Result<Fixed6> {
        self.0
            .checked_sub(rhs.0)
            .map(Fixed6)
            .ok_or(LedgerError::Overflow)
    }

    /// Fixed-point multiply: `(self * rhs) / 1e6`, truncated toward zero.
    pub fn checked_mul(self, rhs: Fixed6) -> Result<Fixed6> {
        self.0
            .checked_mul(rhs.0)
            .and_then(|p| p.checked_div(SCALE))
            .map(Fixed6)
            .ok_or(LedgerError::Overflow)
    }

    /// Fixed-point divide: `(self * 1e6) / rhs`, truncated toward zero.
    /// Division by zero is an overflow error, matching the rest of the
    /// checked-math chain.
    pub fn checked_div(self, rhs: Fixed6) -> Result<Fixed6> {
        if rhs.0 == 0 {
            return Err(LedgerError::Overflow);
        }
        self.0
            .checked_mul(SCALE)
            .and_then(|p| p.checked_div(rhs.0))
            .map(Fixed6)
            .ok_or(LedgerError::Overflow)
    }

    /// Fused `(self * mul) / div` without the intermediate rescale. The two
    /// scale factors cancel, so this keeps one more factor of 1e6 of headroom
    /// than `checked_mul` followed by `checked_div`.
    pub fn mul_div(self, mul: Fixed6, div: Fixed6) -> Result<Fixed6> {
        if div.0 == 0 {
            return Err(LedgerError::Overflow);
        }
        self.0
            .checked_mul(mul.0)
            .and_then(|p| p.checked_div(div.0))
            .map(Fixed6)
            .ok_or(LedgerError::Overflow)
    }

    pub fn checked_neg(self) -> Result<Fixed6> {
        self.0
            .checked_neg()
            .map(Fixed6)
            .ok_or(LedgerError::Overflow)
    }

    pub fn checked_abs(self) -> Result<Fixed6> {
        self.0
            .checked_abs()
            .map(Fixed6)
            .ok_or(LedgerError::Overflow)
    }

    /// -1, 0 or +1 in whole units.
    pub fn signum(self) -> Fixed6 {
        Fixed6(self.0.signum() * SCALE)
    }

    pub fn min(self, other: Fixed6) -> Fixed6 {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    pub fn max(self, other: Fixed6) -> Fixed6 {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    /// Clamp into `[lo, hi]`.
    pub fn clamp(self, lo: Fixed6, hi: Fixed6) -> Fixed6 {
        debug_assert!(lo <= hi);
        self.max(lo).min(hi)
    }
}

// Std operators delegate to the checked forms and panic on overflow. The
// settlement paths use the checked forms exclusively; the operators exist for
// bounded-by-invariant expressions and tests.
impl Add for Fixed6 {
    type Output = Fixed6;
    fn add(self, rhs: Fixed6) -> Fixed6 {
        self.checked_add(rhs).expect("Fixed6 add overflow")
    }
}

impl Sub for Fixed6 {
    type Output = Fixed6;
    fn sub(self, rhs: Fixed6) -> Fixed6 {
        self.checked_sub(rhs).expect("Fixed6 sub overflow")
    }
}

impl Mul for Fixed6 {
    type Output = Fixed6;
    fn mul(self, rhs: Fixed6) -> Fixed6 {
        self.checked_mul(rhs).expect("Fixed6 mul overflow")
    }
}

impl Div for Fixed6 {
    type Output = Fixed6;
    fn div(self, rhs: Fixed6) -> Fixed6 {
        self.checked_div(rhs).expect("Fixed6 div overflow")
    }
}

impl Neg for Fixed6 {
    type Output = Fixed6;
    fn neg(self) -> Fixed6 {
        self.checked_neg().expect("Fixed6 neg overflow")
    }
}

impl Zero for Fixed6 {
    fn zero() -> Self {
        Fixed6::ZERO
    }
    fn is_zero(&self) -> bool {
        Fixed6::is_zero(*self)
    }
}

impl One for Fixed6 {
    fn one() -> Self {
        Fixed6::ONE
    }
}

impl CheckedAdd for Fixed6 {
    fn checked_add(&self, v: &Self) -> Option<Self> {
        Fixed6::checked_add(*self, *v).ok()
    }
}

impl CheckedSub for Fixed6 {
    fn checked_sub(&self, v: &Self) -> Option<Self> {
        Fixed6::checked_sub(*self, *v).ok()
    }
}

impl CheckedMul for Fixed6 {
    fn checked_mul(&self, v: &Self) -> Option<Self> {
        Fixed6::checked_mul(*self, *v).ok()
    }
}

impl CheckedNeg for Fixed6 {
    fn checked_neg(&self) -> Option<Self> {
        Fixed6::checked_neg(*self).ok()
    }
}

impl fmt::Display for Fixed6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:06}", sign, abs / SCALE as u128, abs % SCALE as u128)
    }
}

// ============================================================================
// Write-boundary range validation
// ============================================================================
//
// Storage words in the source system were bit-packed; off-chain we keep plain
// records but preserve the validation contract exactly: a signed field with N
// value bits accepts [-(2^(N-1)), 2^N - 1], an unsigned field [0, 2^N - 1].
// Out-of-range values are rejected with a RangeError, never truncated.

pub fn validate_signed(value: Fixed6, field: &'static str, bits: u32) -> Result<()> {
    debug_assert!(bits >= 1 && bits <= 126);
    let max = (1i128 << bits) - 1;
    let min = -(1i128 << (bits - 1));
    if value.0 < min || value.0 > max {
        return Err(LedgerError::Range { field, bits });
    }
    Ok(())
}

pub fn validate_unsigned(value: Fixed6, field: &'static str, bits: u32) -> Result<()> {
    debug_assert!(bits >= 1 && bits <= 126);
    let max = (1i128 << bits) - 1;
    if value.0 < 0 || value.0 > max {
        return Err(LedgerError::Range { field, bits });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_truncates_toward_zero() {
        let a = Fixed6::from_parts(0, 500_000); // 0.5
        let b = Fixed6::from_raw(3); // 0.000003
        assert_eq!(a.checked_mul(b).unwrap().raw(), 1);
        assert_eq!(a.checked_mul(-b).unwrap().raw(), -1);
    }

    #[test]
    fn div_truncates_toward_zero() {
        let a = Fixed6::from_int(-7);
        let b = Fixed6::from_int(2);
        assert_eq!(a.checked_div(b).unwrap(), Fixed6::from_parts(-3, 500_000));
        assert_eq!(
            Fixed6::from_raw(-1).checked_div(Fixed6::from_int(3)).unwrap(),
            Fixed6::ZERO
        );
    }

    #[test]
    fn div_by_zero_is_overflow() {
        assert_eq!(
            Fixed6::ONE.checked_div(Fixed6::ZERO),
            Err(LedgerError::Overflow)
        );
    }

    #[test]
    fn add_overflow_detected() {
        let big = Fixed6::from_raw(i128::MAX);
        assert_eq!(big.checked_add(Fixed6::from_raw(1)), Err(LedgerError::Overflow));
    }

    #[test]
    fn mul_div_keeps_headroom() {
        // 10^20 * 10^6 would overflow checked_mul's rescale path at larger
        // magnitudes; mul_div cancels the scales.
        let a = Fixed6::from_raw(100_000_000_000_000_000_000);
        let price = Fixed6::from_int(1);
        assert_eq!(a.mul_div(price, Fixed6::ONE).unwrap(), a);
    }

    #[test]
    fn range_validation_boundaries() {
        // unsigned 64: 2^64-1 ok, 2^64 rejected
        let max = Fixed6::from_raw((1i128 << 64) - 1);
        assert!(validate_unsigned(max, "f", 64).is_ok());
        let over = Fixed6::from_raw(1i128 << 64);
        assert_eq!(
            validate_unsigned(over, "f", 64),
            Err(LedgerError::Range { field: "f", bits: 64 })
        );
        // signed 47: [-(2^46), 2^47-1]
        assert!(validate_signed(Fixed6::from_raw((1i128 << 47) - 1), "g", 47).is_ok());
        assert!(validate_signed(Fixed6::from_raw(-(1i128 << 46)), "g", 47).is_ok());
        assert!(validate_signed(Fixed6::from_raw(1i128 << 47), "g", 47).is_err());
        assert!(validate_signed(Fixed6::from_raw(-(1i128 << 46) - 1), "g", 47).is_err());
    }

    #[test]
    fn display_renders_micros() {
        assert_eq!(Fixed6::from_parts(1, 500_000).to_string(), "1.500000");
        assert_eq!(Fixed6::from_parts(-2, 25).to_string(), "-2.000025");
        assert_eq!(Fixed6::ZERO.to_string(), "0.000000");
    }
}
