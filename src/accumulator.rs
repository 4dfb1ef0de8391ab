//! Per-unit cumulative accumulators.
//!
//! An [`Accumulator`] carries "cumulative signed amount per unit of position
//! held, since epoch" for one semantic channel (pnl, fee, spread, funding).
//! Settling an account over an interval takes the difference of two snapshots
//! and scales it by the position size held, making settlement O(1) regardless
//! of how many global updates happened in between.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fixed::Fixed6;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accumulator {
    value: Fixed6,
}

impl Accumulator {
    pub const ZERO: Accumulator = Accumulator { value: Fixed6::ZERO };

    pub const fn new(value: Fixed6) -> Self {
        Accumulator { value }
    }

    pub const fn value(&self) -> Fixed6 {
        self.value
    }

    /// Add `amount / unit` to the running per-unit value, truncated toward
    /// zero. A zero `unit` skips the increment entirely: a position of zero
    /// size cannot accrue a per-unit value, and we must not divide by zero.
    pub fn increment(&mut self, amount: Fixed6, unit: Fixed6) -> Result<()> {
        if unit.is_zero() {
            return Ok(());
        }
        self.value = self.value.checked_add(amount.checked_div(unit)?)?;
        Ok(())
    }

    /// Charge `amount` across `unit`: the per-unit value moves down. Fee
    /// channels only ever move this way.
    pub fn decrement(&mut self, amount: Fixed6, unit: Fixed6) -> Result<()> {
        self.increment(amount.checked_neg()?, unit)
    }

    /// Snapshot difference: `self.value - other.value`.
    pub fn subtract(&self, other: &Accumulator) -> Result<Fixed6> {
        self.value.checked_sub(other.value)
    }

    /// Amount accrued to a position of size `units` between the `from`
    /// snapshot and this one: `(self - from) * units`.
    pub fn accumulated(&self, from: &Accumulator, units: Fixed6) -> Result<Fixed6> {
        self.subtract(from)?.checked_mul(units)
    }
}
