//! Settled position state.
//!
//! A [`Position`] holds the maker/long/short magnitudes as of the last
//! applied order. It starts all-zero at genesis and only ever advances by
//! applying the next settled [`Order`]; ids stay contiguous.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::fixed::Fixed6;
use crate::order::Order;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Id of the last applied order; genesis is 0.
    pub id: u32,
    pub timestamp: u32,
    /// Unsigned side magnitudes.
    pub maker: Fixed6,
    pub long: Fixed6,
    pub short: Fixed6,
    /// Aggregate trade fee attributed to this position (global variant).
    pub fee: Fixed6,
}

impl Position {
    /// Advance the position by one settled order. Each side moves by
    /// `pos - neg`; a magnitude that would go negative means the order and
    /// position got out of sync and the whole step is rejected.
    pub fn update(&mut self, order: &Order) -> Result<()> {
        let maker = Self::shift(self.maker, order.maker_pos, order.maker_neg)?;
        let long = Self::shift(self.long, order.long_pos, order.long_neg)?;
        let short = Self::shift(self.short, order.short_pos, order.short_neg)?;

        self.id = self.id.checked_add(1).ok_or(LedgerError::Overflow)?;
        self.timestamp = order.timestamp;
        self.maker = maker;
        self.long = long;
        self.short = short;
        Ok(())
    }

    /// Copy of this position with `order` applied, leaving `self` untouched.
    pub fn after(&self, order: &Order) -> Result<Position> {
        let mut next = *self;
        next.update(order)?;
        Ok(next)
    }

    fn shift(side: Fixed6, pos: Fixed6, neg: Fixed6) -> Result<Fixed6> {
        let next = side.checked_add(pos)?.checked_sub(neg)?;
        if next.is_negative() {
            return Err(LedgerError::Overflow);
        }
        Ok(next)
    }

    /// Fold a realized trade-fee amount into the position's fee aggregate.
    pub fn add_fee(&mut self, fee: Fixed6) -> Result<()> {
        self.fee = self.fee.checked_add(fee)?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.maker.is_zero() && self.long.is_zero() && self.short.is_zero()
    }

    /// Largest of the three side magnitudes.
    pub fn magnitude(&self) -> Fixed6 {
        self.maker.max(self.long).max(self.short)
    }

    /// Larger taker side.
    pub fn major(&self) -> Fixed6 {
        self.long.max(self.short)
    }

    /// Smaller taker side.
    pub fn minor(&self) -> Fixed6 {
        self.long.min(self.short)
    }

    /// Net taker exposure `long - short`. Side magnitudes are bounded by
    /// their 64-bit storage range, so the subtraction cannot overflow i128.
    pub fn net(&self) -> Fixed6 {
        self.long - self.short
    }

    /// True when at most one of long/short is active, the shape a local
    /// (per-account) position must keep.
    pub fn single_sided(&self) -> bool {
        self.long.is_zero() || self.short.is_zero()
    }
}
